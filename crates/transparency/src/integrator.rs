//! Final assembly of the user-facing response.

use clarion_core::{Disclosure, ResponseEnvelope, TransparencyRecord};

/// Separates the body from the trailer in rendered text.
pub const TRAILER_SEPARATOR: &str = "---";

/// Wraps drafted body text with its disclosure. Never edits the body.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseIntegrator;

impl ResponseIntegrator {
    pub fn new() -> Self {
        Self
    }

    pub fn integrate(
        &self,
        body: String,
        disclosure: &Disclosure,
        record: TransparencyRecord,
    ) -> ResponseEnvelope {
        let mut rendered = String::with_capacity(
            disclosure.header.len() + body.len() + disclosure.trailer.len() + 8,
        );
        rendered.push_str(&disclosure.header);
        rendered.push_str("\n\n");
        rendered.push_str(&body);
        if disclosure.has_trailer() {
            rendered.push_str("\n\n");
            rendered.push_str(TRAILER_SEPARATOR);
            rendered.push('\n');
            rendered.push_str(&disclosure.trailer);
        }

        ResponseEnvelope {
            body_text: body,
            rendered_text: rendered,
            transparency_record: record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use clarion_core::{ComplexityScore, EnhancementTier, RequestId};

    fn record() -> TransparencyRecord {
        TransparencyRecord {
            request_id: RequestId::new(),
            persona_ids: vec!["diego".into()],
            tier: EnhancementTier::None,
            complexity: ComplexityScore::zero(),
            enhancement_calls: vec![],
            framework_matches: vec![],
            issues: vec![],
            composed_disclosure_text: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn header_body_and_trailer() {
        let disclosure = Disclosure {
            header: "🎯 Diego | Engineering Leadership".into(),
            trailer: "📚 Framework: Team Topologies (75%)".into(),
        };
        let envelope = ResponseIntegrator::new().integrate("Body.".into(), &disclosure, record());
        assert_eq!(
            envelope.rendered_text,
            "🎯 Diego | Engineering Leadership\n\nBody.\n\n---\n📚 Framework: Team Topologies (75%)"
        );
        assert_eq!(envelope.body_text, "Body.");
    }

    #[test]
    fn no_separator_without_trailer() {
        let disclosure = Disclosure {
            header: "H".into(),
            trailer: String::new(),
        };
        let envelope = ResponseIntegrator::new().integrate("B".into(), &disclosure, record());
        assert_eq!(envelope.rendered_text, "H\n\nB");
    }
}
