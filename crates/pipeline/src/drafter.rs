//! Response drafting — the persona-voiced body text.
//!
//! The pipeline only needs *some* body; where it comes from (a language
//! model, templates, a human) is behind [`ResponseDrafter`]. The composer
//! never edits what a drafter returns.

use async_trait::async_trait;
use clarion_core::{EnhancementCall, Request, SelectedPersona};

/// What a drafter gets to work with.
#[derive(Debug, Clone, Copy)]
pub struct DraftInput<'a> {
    pub request: &'a Request,
    pub personas: &'a [SelectedPersona],
    pub calls: &'a [EnhancementCall],
}

#[async_trait]
pub trait ResponseDrafter: Send + Sync {
    fn name(&self) -> &str;

    /// Produce body text. Must not fail; degrade to generic guidance.
    async fn draft(&self, input: DraftInput<'_>) -> String;
}

/// Deterministic drafter that voices the lead persona and folds in the
/// content of successful enhancement calls.
#[derive(Debug, Default, Clone, Copy)]
pub struct DigestDrafter;

impl DigestDrafter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ResponseDrafter for DigestDrafter {
    fn name(&self) -> &str {
        "digest"
    }

    async fn draft(&self, input: DraftInput<'_>) -> String {
        let domain = input
            .personas
            .first()
            .map(|p| p.persona.domain.to_lowercase())
            .unwrap_or_else(|| "general".into());
        let article = if domain.starts_with(['a', 'e', 'i', 'o', 'u']) {
            "an"
        } else {
            "a"
        };

        if input.request.is_blank() {
            return format!(
                "There was no question to answer. Share what you are working on and \
                 I will look at it from {article} {domain} perspective."
            );
        }

        let mut body =
            format!("From {article} {domain} perspective, here is how I would approach this:\n");
        let findings: Vec<&str> = input.calls.iter().filter_map(|c| c.content()).collect();
        if findings.is_empty() {
            body.push_str(
                "\n- Clarify the outcome you need and the constraints you are under.\
                 \n- Identify who is affected and how they will hear about the change.\
                 \n- Pick the smallest next step that tests your assumptions.",
            );
        } else {
            for finding in findings {
                body.push_str("\n- ");
                body.push_str(finding.trim());
            }
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use clarion_core::{CallOutcome, Persona};

    fn diego() -> SelectedPersona {
        SelectedPersona {
            persona: Persona {
                id: "diego".into(),
                display_name: "Diego".into(),
                domain: "Engineering Leadership".into(),
                activation_keywords: vec![],
                capability_affinities: vec![],
                activation_threshold: 0.15,
            },
            affinity: 0.2,
            fallback: false,
        }
    }

    #[tokio::test]
    async fn folds_in_successful_findings() {
        let request = Request::new("How should we restructure?");
        let calls = vec![EnhancementCall {
            server_id: "sequential".into(),
            server_name: "Systematic Analysis".into(),
            persona_id: "diego".into(),
            capability: "systematic_analysis".into(),
            request_payload: String::new(),
            started_at: Utc::now(),
            attempts: 1,
            outcome: CallOutcome::Success {
                content: "Map team dependencies first.".into(),
                latency_ms: 3,
            },
        }];
        let personas = [diego()];
        let body = DigestDrafter
            .draft(DraftInput {
                request: &request,
                personas: &personas,
                calls: &calls,
            })
            .await;
        assert!(body.starts_with("From an engineering leadership perspective"));
        assert!(body.contains("- Map team dependencies first."));
    }

    #[tokio::test]
    async fn standard_guidance_without_findings() {
        let request = Request::new("What is Team Topologies?");
        let personas = [diego()];
        let body = DigestDrafter
            .draft(DraftInput {
                request: &request,
                personas: &personas,
                calls: &[],
            })
            .await;
        assert!(body.contains("Clarify the outcome"));
    }

    #[tokio::test]
    async fn blank_request_gets_a_prompt() {
        let request = Request::new("");
        let personas = [diego()];
        let body = DigestDrafter
            .draft(DraftInput {
                request: &request,
                personas: &personas,
                calls: &[],
            })
            .await;
        assert!(body.contains("no question"));
    }
}
