//! Persona selection by keyword affinity.
//!
//! Affinity is the share of a persona's activation keywords found in the
//! request. The best persona that clears its own threshold leads; for
//! high-complexity requests every persona that clears its threshold joins,
//! up to a small bound. Equal affinities keep catalog order.

use clarion_core::{Catalog, ComplexityScore, Persona, Request, SelectedPersona};
use tracing::debug;

use crate::text::Words;

/// Ranks catalog personas for a request.
#[derive(Debug, Clone)]
pub struct PersonaSelector {
    /// Score at or above which several personas may coordinate.
    coordination_threshold: f64,
    max_personas: usize,
}

impl PersonaSelector {
    pub fn new(coordination_threshold: f64, max_personas: usize) -> Self {
        Self {
            coordination_threshold,
            max_personas: max_personas.max(1),
        }
    }

    /// Keyword-overlap ratio of `persona` against already tokenized text.
    pub fn affinity(persona: &Persona, words: &Words) -> f64 {
        if persona.activation_keywords.is_empty() {
            return 0.0;
        }
        let hits = persona
            .activation_keywords
            .iter()
            .filter(|k| words.contains(k))
            .count();
        hits as f64 / persona.activation_keywords.len() as f64
    }

    /// Select 1..=max personas. Never returns an empty list.
    pub fn select(
        &self,
        catalog: &Catalog,
        request: &Request,
        score: &ComplexityScore,
    ) -> Vec<SelectedPersona> {
        let words = Words::new(&request.text);

        // Stable sort keeps catalog declaration order for equal affinities.
        let mut ranked: Vec<(&Persona, f64)> = catalog
            .personas()
            .iter()
            .map(|p| (p, Self::affinity(p, &words)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let qualified: Vec<(&Persona, f64)> = ranked
            .into_iter()
            .filter(|(p, affinity)| *affinity > 0.0 && *affinity >= p.activation_threshold)
            .collect();

        if qualified.is_empty() {
            let fallback = catalog.fallback_persona();
            debug!(
                request_id = %request.id,
                persona = %fallback.id,
                "No persona cleared its threshold, using fallback"
            );
            return vec![SelectedPersona {
                persona: fallback.clone(),
                affinity: 0.0,
                fallback: true,
            }];
        }

        let take = if score.value >= self.coordination_threshold && qualified.len() >= 2 {
            self.max_personas
        } else {
            1
        };

        let selected: Vec<SelectedPersona> = qualified
            .into_iter()
            .take(take)
            .map(|(persona, affinity)| SelectedPersona {
                persona: persona.clone(),
                affinity,
                fallback: false,
            })
            .collect();

        debug!(
            request_id = %request.id,
            personas = ?selected.iter().map(|s| s.id()).collect::<Vec<_>>(),
            "Personas selected"
        );
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clarion_config::AppConfig;

    fn catalog() -> Catalog {
        AppConfig::default().catalog().unwrap()
    }

    fn score(value: f64) -> ComplexityScore {
        ComplexityScore {
            value,
            factors: vec![],
        }
    }

    fn ids(selected: &[SelectedPersona]) -> Vec<&str> {
        selected.iter().map(|s| s.id()).collect()
    }

    #[test]
    fn team_restructuring_selects_engineering_leadership() {
        let selector = PersonaSelector::new(0.7, 3);
        let req = Request::new("How should we restructure our teams for this platform initiative?");
        let selected = selector.select(&catalog(), &req, &score(0.55));
        assert_eq!(ids(&selected), vec!["diego"]);
        assert!((selected[0].affinity - 0.2).abs() < 1e-9);
        assert!(!selected[0].fallback);
    }

    #[test]
    fn unmatched_request_falls_back() {
        let selector = PersonaSelector::new(0.7, 3);
        let req = Request::new("What is Team Topologies?");
        let selected = selector.select(&catalog(), &req, &score(0.0));
        assert_eq!(ids(&selected), vec!["diego"]);
        assert!(selected[0].fallback);
    }

    #[test]
    fn empty_text_still_selects_one() {
        let selector = PersonaSelector::new(0.7, 3);
        let selected = selector.select(&catalog(), &Request::new(""), &score(0.0));
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn high_complexity_coordinates_multiple_personas() {
        let selector = PersonaSelector::new(0.7, 3);
        let req = Request::new(
            "Our executive strategy and roadmap need engineering leadership to restructure \
             teams; what platform architecture and migration plan fits?",
        );
        let selected = selector.select(&catalog(), &req, &score(0.9));
        assert!(selected.len() >= 2);
        assert!(selected.len() <= 3);
        let got = ids(&selected);
        assert!(got.contains(&"diego"));
        assert!(got.contains(&"camille"));
    }

    #[test]
    fn medium_complexity_keeps_only_primary() {
        let selector = PersonaSelector::new(0.7, 3);
        let req = Request::new(
            "Our executive strategy and roadmap need engineering leadership to restructure teams",
        );
        let selected = selector.select(&catalog(), &req, &score(0.5));
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn coordination_is_bounded() {
        let selector = PersonaSelector::new(0.7, 2);
        let req = Request::new(
            "executive strategy roadmap engineering leadership teams platform architecture \
             migration budget roi cost design system accessibility",
        );
        let selected = selector.select(&catalog(), &req, &score(1.0));
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn ties_keep_catalog_order() {
        // diego and camille both hit 2 of 10 keywords.
        let selector = PersonaSelector::new(0.7, 3);
        let req = Request::new("engineering leadership strategy vision");
        let selected = selector.select(&catalog(), &req, &score(0.9));
        assert_eq!(ids(&selected), vec!["diego", "camille"]);
        let again = selector.select(&catalog(), &req, &score(0.9));
        assert_eq!(ids(&selected), ids(&again));
    }

    #[test]
    fn affinity_is_keyword_overlap_ratio() {
        let catalog = catalog();
        let martin = catalog.persona("martin").unwrap();
        let words = Words::new("platform architecture and api scalability");
        assert!((PersonaSelector::affinity(martin, &words) - 0.4).abs() < 1e-9);
    }
}
