//! Transparency types — what the user is shown and what the audit trail keeps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::complexity::ComplexityScore;
use crate::enhancement::{EnhancementCall, EnhancementTier};
use crate::error::EnhancementIssue;
use crate::request::RequestId;

/// Byte range in the response text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchSpan {
    pub start: usize,
    pub end: usize,
}

/// A framework detected in response text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameworkMatch {
    pub framework_id: String,
    /// Display name used when crediting the framework.
    pub name: String,
    pub confidence: f64,
    pub matched_span: MatchSpan,
    pub matched_terms: Vec<String>,
}

/// Disclosure text split into the parts that wrap the body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Disclosure {
    /// Persona identification, shown before the body.
    pub header: String,
    /// Enhancement and attribution lines, shown after the body.
    pub trailer: String,
}

impl Disclosure {
    pub fn has_trailer(&self) -> bool {
        !self.trailer.is_empty()
    }
}

impl std::fmt::Display for Disclosure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.header)?;
        if self.has_trailer() {
            write!(f, "\n\n{}", self.trailer)?;
        }
        Ok(())
    }
}

/// The audit unit, created once per request and never modified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyRecord {
    pub request_id: RequestId,
    pub persona_ids: Vec<String>,
    pub tier: EnhancementTier,
    pub complexity: ComplexityScore,
    pub enhancement_calls: Vec<EnhancementCall>,
    pub framework_matches: Vec<FrameworkMatch>,
    #[serde(default)]
    pub issues: Vec<EnhancementIssue>,
    pub composed_disclosure_text: String,
    pub created_at: DateTime<Utc>,
}

impl TransparencyRecord {
    /// Whether the response fell back to standard guidance even though
    /// enhancement was requested.
    pub fn degraded(&self) -> bool {
        !self.enhancement_calls.is_empty()
            && !self.enhancement_calls.iter().any(EnhancementCall::is_success)
    }
}

/// Terminal output of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Model-generated prose, exactly as drafted.
    pub body_text: String,
    /// Header, body, and trailer assembled for display.
    pub rendered_text: String,
    pub transparency_record: TransparencyRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disclosure_display_without_trailer() {
        let d = Disclosure {
            header: "🎯 Diego | Engineering Leadership".into(),
            trailer: String::new(),
        };
        assert_eq!(d.to_string(), "🎯 Diego | Engineering Leadership");
    }

    #[test]
    fn disclosure_display_with_trailer() {
        let d = Disclosure {
            header: "H".into(),
            trailer: "T".into(),
        };
        assert_eq!(d.to_string(), "H\n\nT");
    }
}
