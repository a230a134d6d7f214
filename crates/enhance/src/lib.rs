//! Enhancement fan-out for Clarion.
//!
//! The [`EnhancementOrchestrator`] resolves capability servers for the
//! selected personas and calls them concurrently, guarded by a shared
//! [`CircuitBreakerBank`]. Transports live behind
//! [`clarion_core::CapabilityClient`]:
//!
//! - [`HttpCapabilityClient`] for `http://` / `https://` endpoints
//! - [`LoopbackClient`] for in-process `local:` endpoints

pub mod breaker;
pub mod http;
pub mod loopback;
pub mod orchestrator;
pub mod registry;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use breaker::{BreakerPolicy, CallPermit, CircuitBreakerBank, ServerBreaker, Transition};
pub use http::HttpCapabilityClient;
pub use loopback::LoopbackClient;
pub use orchestrator::{EnhancementOrchestrator, OrchestratorSettings};
pub use registry::{CapabilityRegistry, RegisteredServer, build_from_catalog};
