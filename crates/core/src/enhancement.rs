//! Enhancement calls and their recorded outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EnhancementIssue;

/// How much enhancement a request receives.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnhancementTier {
    /// Standard response, no calls.
    None,
    /// One server for the primary persona.
    SingleServer,
    /// One server per coordinating persona, called concurrently.
    MultiServer,
}

impl std::fmt::Display for EnhancementTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::SingleServer => write!(f, "single_server"),
            Self::MultiServer => write!(f, "multi_server"),
        }
    }
}

/// Why a call failed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transport,
    Application,
    /// The parent request was abandoned before the call finished.
    Cancelled,
}

/// Final outcome of one enhancement call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallOutcome {
    Success {
        content: String,
        latency_ms: u64,
    },
    Failure {
        kind: FailureKind,
        reason: String,
    },
    TimedOut {
        elapsed_ms: u64,
        /// True when the outer request deadline, not the call's own
        /// timeout, cut the call short.
        deadline_exceeded: bool,
    },
    CircuitOpenSkipped,
}

/// A single fan-out call, immutable once its outcome is recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancementCall {
    pub server_id: String,
    /// Public name of the server, safe to show users.
    pub server_name: String,
    /// The persona this server was resolved for.
    pub persona_id: String,
    pub capability: String,
    pub request_payload: String,
    pub started_at: DateTime<Utc>,
    /// Number of transport attempts made (0 when skipped).
    #[serde(default)]
    pub attempts: u32,
    pub outcome: CallOutcome,
}

impl EnhancementCall {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, CallOutcome::Success { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, CallOutcome::CircuitOpenSkipped)
    }

    /// Successful content, if any.
    pub fn content(&self) -> Option<&str> {
        match &self.outcome {
            CallOutcome::Success { content, .. } => Some(content),
            _ => None,
        }
    }

    /// Classify a non-successful outcome into the issue taxonomy.
    ///
    /// Skips are not classified individually; `NoCapacity` is a property of
    /// the whole request and is derived in [`issues_for`].
    pub fn issue(&self) -> Option<EnhancementIssue> {
        match &self.outcome {
            CallOutcome::Success { .. } | CallOutcome::CircuitOpenSkipped => None,
            CallOutcome::Failure {
                kind: FailureKind::Application,
                ..
            } => Some(EnhancementIssue::CallApplicationError),
            CallOutcome::Failure { .. } => Some(EnhancementIssue::CallTransportError),
            CallOutcome::TimedOut {
                deadline_exceeded: true,
                ..
            } => Some(EnhancementIssue::DeadlineExceeded),
            CallOutcome::TimedOut { .. } => Some(EnhancementIssue::CallTimeout),
        }
    }
}

/// Derive the deduplicated, ordered issue list for a request's calls.
pub fn issues_for(calls: &[EnhancementCall]) -> Vec<EnhancementIssue> {
    let mut issues: Vec<EnhancementIssue> = Vec::new();
    if !calls.is_empty() && calls.iter().all(EnhancementCall::is_skipped) {
        issues.push(EnhancementIssue::NoCapacity);
    }
    for issue in calls.iter().filter_map(EnhancementCall::issue) {
        if !issues.contains(&issue) {
            issues.push(issue);
        }
    }
    issues
}
