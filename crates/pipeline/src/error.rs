//! Errors that can stop an [`crate::Enhancer`] from being built.
//!
//! Once built, processing never fails.

use clarion_config::ConfigError;
use clarion_core::CapabilityError;
use clarion_transparency::TransparencyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Transport setup failed: {0}")]
    Transport(#[from] CapabilityError),

    #[error(transparent)]
    Transparency(#[from] TransparencyError),
}
