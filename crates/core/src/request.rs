//! The inbound request for one user turn.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a processed request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference into the caller's conversational memory.
///
/// The router never looks inside; it only forwards the reference into
/// capability call payloads so servers can resolve it themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationContext(pub Option<String>);

impl ConversationContext {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn reference(r: impl Into<String>) -> Self {
        Self(Some(r.into()))
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

/// A user's natural-language request. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub text: String,
    #[serde(default)]
    pub context: ConversationContext,
    pub timestamp: DateTime<Utc>,
}

impl Request {
    /// Create a request with no conversation context.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: RequestId::new(),
            text: text.into(),
            context: ConversationContext::none(),
            timestamp: Utc::now(),
        }
    }

    /// Attach an opaque conversation reference.
    pub fn with_context(mut self, context: ConversationContext) -> Self {
        self.context = context;
        self
    }

    /// Whether the request carries no usable text.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}
