//! Capability server trait — the abstraction over enhancement backends.
//!
//! A capability server provides specialized analysis (systematic reasoning,
//! pattern libraries, generation, validation) behind a request/response
//! contract. The orchestrator talks to every server through
//! [`CapabilityClient`] without knowing how the bytes move.
//!
//! Implementations: HTTP JSON endpoints, in-process loopback.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::CapabilityError;

/// A static catalog entry describing one capability server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityServer {
    pub id: String,
    /// Public capability name; the only server naming users ever see.
    pub display_name: String,
    pub capabilities: Vec<String>,
    /// Where the transport should connect (e.g. `http://…`, `local:…`).
    pub endpoint: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub max_retries: u32,
}

fn default_timeout_ms() -> u64 {
    5000
}

impl CapabilityServer {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn provides(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }
}

/// One call to a capability server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityRequest {
    /// Which capability to exercise (e.g. "systematic_analysis").
    pub capability: String,
    /// Structured text describing the task.
    pub payload: String,
    pub timeout_ms: u64,
    /// Opaque conversation reference, forwarded untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<String>,
}

/// Application-level status reported by a server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// What a capability server sends back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityResponse {
    pub status: ResponseStatus,
    pub content: String,
    #[serde(default)]
    pub latency_ms: u64,
}

impl CapabilityResponse {
    pub fn success(content: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            status: ResponseStatus::Success,
            content: content.into(),
            latency_ms,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            content: content.into(),
            latency_ms: 0,
        }
    }
}

/// The core transport trait.
///
/// Implementations must not apply their own retries or circuit breaking;
/// the orchestrator owns both so that every attempt is accounted for.
#[async_trait]
pub trait CapabilityClient: Send + Sync {
    /// A human-readable name for this transport (e.g. "http", "loopback").
    fn name(&self) -> &str;

    /// Send one request to `server`.
    async fn call(
        &self,
        server: &CapabilityServer,
        request: CapabilityRequest,
    ) -> std::result::Result<CapabilityResponse, CapabilityError>;

    /// Can we reach the server?
    async fn health_check(
        &self,
        _server: &CapabilityServer,
    ) -> std::result::Result<bool, CapabilityError> {
        Ok(true)
    }
}
