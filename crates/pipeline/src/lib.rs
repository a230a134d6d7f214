//! # Clarion Pipeline
//!
//! Wires routing, enhancement, and transparency into one entry point:
//! [`Enhancer::process`] takes a [`clarion_core::Request`] and always returns
//! a [`clarion_core::ResponseEnvelope`], however the capability servers
//! behave.

pub mod drafter;
pub mod enhancer;
pub mod error;

pub use drafter::{DigestDrafter, DraftInput, ResponseDrafter};
pub use enhancer::{Enhancer, EnhancerBuilder, ServerHealth};
pub use error::PipelineError;
