//! Framework attribution — which known frameworks a response draws on.
//!
//! Every framework term is compiled once into a case-insensitive pattern
//! anchored on word boundaries. A framework is credited when the share of
//! its terms present in the text reaches the configured confidence.

use clarion_core::{FrameworkDefinition, FrameworkMatch, MatchSpan};
use regex_lite::Regex;
use tracing::debug;

use crate::error::TransparencyError;

struct CompiledTerm {
    term: String,
    pattern: Regex,
}

struct CompiledFramework {
    id: String,
    name: String,
    terms: Vec<CompiledTerm>,
}

/// Detects framework usage in response text. Pure and order-stable.
pub struct FrameworkAttributionEngine {
    frameworks: Vec<CompiledFramework>,
    min_confidence: f64,
}

impl std::fmt::Debug for FrameworkAttributionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameworkAttributionEngine")
            .field("frameworks", &self.frameworks.len())
            .field("min_confidence", &self.min_confidence)
            .finish()
    }
}

/// Case-insensitive, word-bounded pattern for one term. Inner whitespace
/// matches any run of whitespace.
fn term_pattern(term: &str) -> String {
    let body = term
        .split_whitespace()
        .map(regex_lite::escape)
        .collect::<Vec<_>>()
        .join(r"\s+");
    let word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
    let lead = if word(term.chars().next()) { r"\b" } else { "" };
    let tail = if word(term.chars().last()) { r"\b" } else { "" };
    format!("(?i){lead}{body}{tail}")
}

impl FrameworkAttributionEngine {
    pub fn new(
        frameworks: &[FrameworkDefinition],
        min_confidence: f64,
    ) -> Result<Self, TransparencyError> {
        let mut compiled = Vec::with_capacity(frameworks.len());
        for framework in frameworks {
            let mut terms = Vec::new();
            for term in framework.terms.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
                let pattern = Regex::new(&term_pattern(term)).map_err(|e| {
                    TransparencyError::InvalidTerm {
                        framework: framework.id.clone(),
                        term: term.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                terms.push(CompiledTerm {
                    term: term.to_string(),
                    pattern,
                });
            }
            compiled.push(CompiledFramework {
                id: framework.id.clone(),
                name: framework.name.clone(),
                terms,
            });
        }

        Ok(Self {
            frameworks: compiled,
            min_confidence,
        })
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    /// Frameworks found in `text`, highest confidence first. Equal
    /// confidences keep catalog order.
    pub fn detect(&self, text: &str) -> Vec<FrameworkMatch> {
        let mut matches: Vec<FrameworkMatch> = self
            .frameworks
            .iter()
            .filter_map(|f| self.score(f, text))
            .collect();
        matches.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        if !matches.is_empty() {
            debug!(
                frameworks = ?matches.iter().map(|m| m.framework_id.as_str()).collect::<Vec<_>>(),
                "Frameworks attributed"
            );
        }
        matches
    }

    fn score(&self, framework: &CompiledFramework, text: &str) -> Option<FrameworkMatch> {
        if framework.terms.is_empty() {
            return None;
        }

        let mut matched_terms = Vec::new();
        let mut start = usize::MAX;
        let mut end = 0;
        for term in &framework.terms {
            let mut hit = false;
            for m in term.pattern.find_iter(text) {
                hit = true;
                start = start.min(m.start());
                end = end.max(m.end());
            }
            if hit {
                matched_terms.push(term.term.clone());
            }
        }

        let confidence = matched_terms.len() as f64 / framework.terms.len() as f64;
        if matched_terms.is_empty() || confidence < self.min_confidence {
            return None;
        }

        Some(FrameworkMatch {
            framework_id: framework.id.clone(),
            name: framework.name.clone(),
            confidence,
            matched_span: MatchSpan { start, end },
            matched_terms,
        })
    }
}
