//! In-process transport for `local:` endpoints.
//!
//! Answers instantly with a deterministic acknowledgement built from the
//! request payload. Lets the whole pipeline run offline, in demos and in
//! tests, with the same breaker and deadline accounting as a remote server.

use async_trait::async_trait;
use clarion_core::{
    CapabilityClient, CapabilityError, CapabilityRequest, CapabilityResponse, CapabilityServer,
};

/// Loopback capability client.
#[derive(Debug, Default, Clone)]
pub struct LoopbackClient;

impl LoopbackClient {
    pub fn new() -> Self {
        Self
    }
}

/// The user text at the end of an orchestrator payload. Only a line that
/// starts with the `request: ` key counts, so header values mentioning it
/// are skipped.
fn request_line(payload: &str) -> &str {
    payload
        .split_once("\nrequest: ")
        .map(|(_, rest)| rest)
        .or_else(|| payload.strip_prefix("request: "))
        .unwrap_or(payload)
        .trim()
}

#[async_trait]
impl CapabilityClient for LoopbackClient {
    fn name(&self) -> &str {
        "loopback"
    }

    async fn call(
        &self,
        server: &CapabilityServer,
        request: CapabilityRequest,
    ) -> std::result::Result<CapabilityResponse, CapabilityError> {
        if !server.provides(&request.capability) {
            return Ok(CapabilityResponse::error(format!(
                "capability '{}' is not offered here",
                request.capability
            )));
        }

        let subject = request_line(&request.payload);
        let excerpt: String = subject.chars().take(160).collect();
        let content = format!(
            "{} ({}): reviewed \"{}\"",
            server.display_name, request.capability, excerpt
        );
        Ok(CapabilityResponse::success(content, 0))
    }
}
