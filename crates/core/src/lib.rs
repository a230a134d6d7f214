//! # Clarion Core
//!
//! Domain types, traits, and error definitions for the Clarion adaptive
//! enhancement router. This crate has **no runtime dependencies** beyond
//! serialization and a broadcast channel. It defines the domain model that
//! every other crate implements against.
//!
//! Capability transports implement [`CapabilityClient`]; audit sinks and
//! response drafters are traits in their own crates. All crates depend
//! inward on this one.

pub mod capability;
pub mod catalog;
pub mod circuit;
pub mod complexity;
pub mod enhancement;
pub mod error;
pub mod event;
pub mod persona;
pub mod request;
pub mod transparency;

// Re-export key types at crate root for ergonomics
pub use capability::{
    CapabilityClient, CapabilityRequest, CapabilityResponse, CapabilityServer, ResponseStatus,
};
pub use catalog::{Catalog, FrameworkDefinition};
pub use circuit::{CircuitState, CircuitStatus};
pub use complexity::{ComplexityScore, ContributingFactor, SignalClass};
pub use enhancement::{CallOutcome, EnhancementCall, EnhancementTier, FailureKind};
pub use error::{CapabilityError, CatalogError, EnhancementIssue};
pub use event::{EnhancementEvent, EventBus};
pub use persona::{CapabilityAffinity, Persona, SelectedPersona};
pub use request::{ConversationContext, Request, RequestId};
pub use transparency::{
    Disclosure, FrameworkMatch, MatchSpan, ResponseEnvelope, TransparencyRecord,
};
