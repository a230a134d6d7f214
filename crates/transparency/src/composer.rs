//! Disclosure composition.
//!
//! Header: who answered. Trailer: what enhanced the answer, what was
//! unavailable, and which frameworks were credited. Failed calls are named
//! by capability only; server ids and error details stay in the record.

use chrono::Utc;
use clarion_core::enhancement::issues_for;
use clarion_core::{
    ComplexityScore, Disclosure, EnhancementCall, EnhancementIssue, EnhancementTier,
    FrameworkMatch, Request, SelectedPersona, TransparencyRecord,
};

/// Shown when every requested enhancement failed or was skipped.
pub const STANDARD_GUIDANCE_NOTICE: &str =
    "⚠️ Enhanced analysis was unavailable; standard guidance was used.";

/// Everything the composer needs about one processed request.
#[derive(Debug, Clone)]
pub struct Composition<'a> {
    pub request: &'a Request,
    pub personas: &'a [SelectedPersona],
    pub complexity: &'a ComplexityScore,
    pub tier: EnhancementTier,
    pub calls: Vec<EnhancementCall>,
    pub matches: Vec<FrameworkMatch>,
}

/// Builds disclosure text and the audit record. Deterministic for equal
/// inputs (apart from the record timestamp).
#[derive(Debug, Default, Clone, Copy)]
pub struct TransparencyComposer;

impl TransparencyComposer {
    pub fn new() -> Self {
        Self
    }

    pub fn compose(&self, input: Composition<'_>) -> (Disclosure, TransparencyRecord) {
        let disclosure = Disclosure {
            header: self.header(input.personas),
            trailer: self.trailer(&input.calls, &input.matches),
        };

        let mut issues = Vec::new();
        if input.request.is_blank() {
            issues.push(EnhancementIssue::InputEmpty);
        }
        issues.extend(issues_for(&input.calls));

        let record = TransparencyRecord {
            request_id: input.request.id.clone(),
            persona_ids: input.personas.iter().map(|p| p.id().to_string()).collect(),
            tier: input.tier,
            complexity: input.complexity.clone(),
            enhancement_calls: input.calls,
            framework_matches: input.matches,
            issues,
            composed_disclosure_text: disclosure.to_string(),
            created_at: Utc::now(),
        };

        (disclosure, record)
    }

    fn header(&self, personas: &[SelectedPersona]) -> String {
        let mut lines = Vec::with_capacity(personas.len() + 1);
        if personas.len() > 1 {
            lines.push("🤝 Coordinated response".to_string());
        }
        for selected in personas {
            lines.push(format!(
                "🎯 {} | {}",
                selected.persona.display_name, selected.persona.domain
            ));
        }
        lines.join("\n")
    }

    fn trailer(&self, calls: &[EnhancementCall], matches: &[FrameworkMatch]) -> String {
        let mut lines = Vec::new();

        for call in calls.iter().filter(|c| c.is_success()) {
            lines.push(format!(
                "🔧 Enhanced analysis: {} ({})",
                call.server_name, call.capability
            ));
        }

        let mut unavailable: Vec<&str> = Vec::new();
        for call in calls.iter().filter(|c| !c.is_success()) {
            if !unavailable.contains(&call.capability.as_str()) {
                unavailable.push(&call.capability);
            }
        }
        if !calls.is_empty() && !calls.iter().any(EnhancementCall::is_success) {
            lines.push(STANDARD_GUIDANCE_NOTICE.to_string());
        } else if !unavailable.is_empty() {
            lines.push(format!(
                "⚠️ Partially enhanced; unavailable: {}",
                unavailable.join(", ")
            ));
        }

        for m in matches {
            lines.push(format!(
                "📚 Framework: {} ({}%)",
                m.name,
                (m.confidence * 100.0).round() as u32
            ));
        }

        lines.join("\n")
    }
}
