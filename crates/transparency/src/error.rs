//! Errors raised while building transparency components.
//!
//! Composition itself never fails; these only surface at startup.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransparencyError {
    #[error("Framework '{framework}' has an unusable term '{term}': {reason}")]
    InvalidTerm {
        framework: String,
        term: String,
        reason: String,
    },

    #[error("Audit sink I/O error: {0}")]
    Io(#[from] std::io::Error),
}
