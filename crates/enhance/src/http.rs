//! HTTP JSON transport for capability servers.
//!
//! Protocol:
//! - `POST {endpoint}/invoke` with a [`CapabilityRequest`] body, answered by
//!   a [`CapabilityResponse`]
//! - `GET {endpoint}/health`, any 2xx means healthy
//!
//! One instance (and one connection pool) serves every HTTP server in a
//! registry; the target comes from each call's [`CapabilityServer`].

use async_trait::async_trait;
use clarion_config::TransportConfig;
use clarion_core::{
    CapabilityClient, CapabilityError, CapabilityRequest, CapabilityResponse, CapabilityServer,
};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Pooled HTTP client for capability servers.
pub struct HttpCapabilityClient {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl HttpCapabilityClient {
    /// Build the shared client from transport settings.
    pub fn from_config(config: &TransportConfig) -> Result<Self, CapabilityError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build()
            .map_err(|e| CapabilityError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    fn url(server: &CapabilityServer, path: &str) -> String {
        format!("{}/{}", server.endpoint.trim_end_matches('/'), path)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("Bearer {key}")),
            None => builder,
        }
    }
}

fn map_send_error(server: &CapabilityServer, e: reqwest::Error) -> CapabilityError {
    if e.is_timeout() {
        CapabilityError::Timeout(format!(
            "server '{}' did not answer within {}ms",
            server.id, server.timeout_ms
        ))
    } else {
        CapabilityError::Transport(e.to_string())
    }
}

/// Overload and gateway statuses are transport trouble and may be retried;
/// any other non-2xx means the server rejected the request.
fn map_status(
    server: &CapabilityServer,
    status: reqwest::StatusCode,
    body: String,
) -> CapabilityError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        CapabilityError::Transport(format!("server '{}' returned {status}: {body}", server.id))
    } else {
        CapabilityError::Application {
            status_code: status.as_u16(),
            message: body,
        }
    }
}

#[async_trait]
impl CapabilityClient for HttpCapabilityClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn call(
        &self,
        server: &CapabilityServer,
        request: CapabilityRequest,
    ) -> std::result::Result<CapabilityResponse, CapabilityError> {
        let url = Self::url(server, "invoke");
        debug!(server = %server.id, url = %url, capability = %request.capability, "Sending capability request");

        let started = Instant::now();
        let response = self
            .authorize(self.client.post(&url))
            .timeout(Duration::from_millis(request.timeout_ms))
            .json(&request)
            .send()
            .await
            .map_err(|e| map_send_error(server, e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(server = %server.id, status = %status, "Capability server returned an error");
            return Err(map_status(server, status, error_body));
        }

        let mut body: CapabilityResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                map_send_error(server, e)
            } else {
                CapabilityError::Application {
                    status_code: status.as_u16(),
                    message: format!("Failed to parse response: {e}"),
                }
            }
        })?;

        if body.latency_ms == 0 {
            body.latency_ms = started.elapsed().as_millis() as u64;
        }
        Ok(body)
    }

    async fn health_check(
        &self,
        server: &CapabilityServer,
    ) -> std::result::Result<bool, CapabilityError> {
        let response = self
            .authorize(self.client.get(Self::url(server, "health")))
            .timeout(server.timeout())
            .send()
            .await
            .map_err(|e| map_send_error(server, e))?;

        Ok(response.status().is_success())
    }
}
