//! Error types for the Clarion domain.
//!
//! Each bounded context has its own error type; request-time problems are
//! never raised to callers but classified as [`EnhancementIssue`]s.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a single call to a capability server.
#[derive(Debug, Clone, Error)]
pub enum CapabilityError {
    #[error("Server returned an error: {message} (status: {status_code})")]
    Application { status_code: u16, message: String },

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Server not configured: {0}")]
    NotConfigured(String),
}

impl CapabilityError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Application errors are answers from the server; retrying them only
    /// adds latency.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}

/// Contract violations in a persona/server/framework catalog.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CatalogError {
    #[error("Duplicate {kind} id: {id}")]
    DuplicateId { kind: &'static str, id: String },

    #[error("Persona '{persona}' references unknown server '{server}'")]
    UnknownServer { persona: String, server: String },

    #[error("Fallback persona '{0}' is not in the catalog")]
    UnknownFallback(String),

    #[error("Server '{0}' must have timeout_ms > 0")]
    ZeroTimeout(String),

    #[error("Framework '{0}' has no distinguishing terms")]
    EmptyFramework(String),

    #[error("Persona '{persona}' has activation threshold {threshold} outside [0, 1]")]
    InvalidThreshold { persona: String, threshold: f64 },

    #[error("Catalog has no personas")]
    NoPersonas,
}

/// Request-time problem classes recorded in the audit trail.
///
/// These are never returned as errors: they describe how a request was
/// degraded so the transparency record can explain it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EnhancementIssue {
    /// The request text was empty; the default score was used.
    InputEmpty,
    /// Every candidate server was circuit-open.
    NoCapacity,
    /// A call exceeded its own timeout.
    CallTimeout,
    /// A call failed below the application layer.
    CallTransportError,
    /// A server answered with an error payload.
    CallApplicationError,
    /// The outer request deadline elapsed with calls still pending.
    DeadlineExceeded,
}

impl std::fmt::Display for EnhancementIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InputEmpty => write!(f, "input_empty"),
            Self::NoCapacity => write!(f, "no_capacity"),
            Self::CallTimeout => write!(f, "call_timeout"),
            Self::CallTransportError => write!(f, "call_transport_error"),
            Self::CallApplicationError => write!(f, "call_application_error"),
            Self::DeadlineExceeded => write!(f, "deadline_exceeded"),
        }
    }
}
