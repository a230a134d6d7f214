//! Complexity score produced once per request.

use serde::{Deserialize, Serialize};

/// The four signal classes the analyzer scores.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SignalClass {
    /// Strategy, restructuring, initiative vocabulary.
    Strategic,
    /// Multiple teams, stakeholders, or domains involved.
    MultiStakeholder,
    /// Phrasing that calls for a structured framework.
    FrameworkApplicability,
    /// Executive or board audience markers.
    ElevatedAudience,
}

impl SignalClass {
    /// All classes in scoring order.
    pub const ALL: [SignalClass; 4] = [
        Self::Strategic,
        Self::MultiStakeholder,
        Self::FrameworkApplicability,
        Self::ElevatedAudience,
    ];
}

impl std::fmt::Display for SignalClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strategic => write!(f, "strategic"),
            Self::MultiStakeholder => write!(f, "multi_stakeholder"),
            Self::FrameworkApplicability => write!(f, "framework_applicability"),
            Self::ElevatedAudience => write!(f, "elevated_audience"),
        }
    }
}

/// A single signal that moved the score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContributingFactor {
    pub signal: SignalClass,
    /// The keyword or phrase that matched.
    pub term: String,
    /// Amount actually added to the score (after the class cap).
    pub weight: f64,
}

/// Complexity in `[0, 1]` with the factors that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplexityScore {
    pub value: f64,
    pub factors: Vec<ContributingFactor>,
}

impl ComplexityScore {
    /// The "no enhancement" default.
    pub fn zero() -> Self {
        Self {
            value: 0.0,
            factors: Vec::new(),
        }
    }

    /// Build a score from factors, clamping the sum to `[0, 1]`.
    pub fn from_factors(factors: Vec<ContributingFactor>) -> Self {
        let sum: f64 = factors.iter().map(|f| f.weight).sum();
        Self {
            value: sum.clamp(0.0, 1.0),
            factors,
        }
    }

    /// Total weight contributed by one signal class.
    pub fn class_total(&self, class: SignalClass) -> f64 {
        self.factors
            .iter()
            .filter(|f| f.signal == class)
            .map(|f| f.weight)
            .sum()
    }
}
