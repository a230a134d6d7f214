//! Circuit breaker states as seen from outside the breaker bank.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Circuit breaker state for one capability server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls flow normally.
    Closed,
    /// Calls are skipped until the cooldown elapses.
    Open,
    /// A single trial call decides the next state.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Snapshot of a server's breaker for health reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitStatus {
    pub server_id: String,
    pub state: CircuitState,
    /// Consecutive failures since the last success.
    pub failure_count: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Milliseconds until an open circuit admits a trial call.
    pub open_remaining_ms: Option<u64>,
    /// Times the circuit has tripped open.
    pub trips: u64,
    pub total_successes: u64,
    pub total_failures: u64,
}
