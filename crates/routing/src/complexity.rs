//! Complexity analyzer — weighted additive scoring over four signal classes.
//!
//! Each class has a vocabulary, a per-hit weight, and a cap. The score is
//! the capped sum of all classes, clamped to `[0, 1]`. Every hit is kept as
//! a [`ContributingFactor`] so the decision can be disclosed and debugged.
//!
//! Pure: no randomness, no I/O, no clock.

use clarion_config::{ComplexityConfig, SignalConfig};
use clarion_core::{ComplexityScore, ContributingFactor, Request, SignalClass};
use tracing::debug;

use crate::text::Words;

/// One compiled signal class.
#[derive(Debug, Clone)]
struct Signal {
    class: SignalClass,
    weight: f64,
    cap: f64,
    terms: Vec<String>,
}

impl Signal {
    fn from_config(class: SignalClass, config: &SignalConfig) -> Self {
        Self {
            class,
            weight: config.weight,
            cap: config.cap,
            terms: config
                .terms
                .iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }
}

/// Scores a request's complexity from lexical signals.
#[derive(Debug, Clone)]
pub struct ComplexityAnalyzer {
    signals: Vec<Signal>,
}

impl ComplexityAnalyzer {
    pub fn new(config: &ComplexityConfig) -> Self {
        let signals = SignalClass::ALL
            .iter()
            .zip(config.signals())
            .map(|(class, (_, signal))| Signal::from_config(*class, signal))
            .collect();
        Self { signals }
    }

    /// Score a request. Never fails; blank input scores `0.0` with no factors.
    ///
    /// The conversation context is opaque and deliberately not consulted.
    pub fn score(&self, request: &Request) -> ComplexityScore {
        if request.is_blank() {
            return ComplexityScore::zero();
        }

        let words = Words::new(&request.text);
        let mut factors = Vec::new();

        for signal in &self.signals {
            let mut remaining = signal.cap;
            for term in &signal.terms {
                if remaining <= f64::EPSILON {
                    break;
                }
                if !words.contains(term) {
                    continue;
                }
                let weight = signal.weight.min(remaining);
                remaining -= weight;
                factors.push(ContributingFactor {
                    signal: signal.class,
                    term: term.clone(),
                    weight,
                });
            }
        }

        let score = ComplexityScore::from_factors(factors);
        debug!(
            request_id = %request.id,
            score = score.value,
            factors = score.factors.len(),
            "Complexity scored"
        );
        score
    }
}

impl Default for ComplexityAnalyzer {
    fn default() -> Self {
        Self::new(&ComplexityConfig::default())
    }
}
