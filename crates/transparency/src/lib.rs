//! Transparency for Clarion — framework attribution, disclosure text,
//! response assembly, and the audit trail.
//!
//! Everything here runs after enhancement and is synchronous.

pub mod attribution;
pub mod audit;
pub mod composer;
pub mod error;
pub mod integrator;

pub use attribution::FrameworkAttributionEngine;
pub use audit::{AuditLog, AuditSink, JsonlSink, TracingSink};
pub use composer::{Composition, STANDARD_GUIDANCE_NOTICE, TransparencyComposer};
pub use error::TransparencyError;
pub use integrator::{ResponseIntegrator, TRAILER_SEPARATOR};
