//! Shared test helpers for orchestrator and registry tests.

use clarion_core::{
    CapabilityAffinity, CapabilityClient, CapabilityError, CapabilityRequest, CapabilityResponse,
    CapabilityServer, Persona,
};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// What a scripted client does on one call.
#[derive(Debug, Clone)]
pub enum Step {
    Reply(String),
    /// Server answers with an error payload.
    Refuse(String),
    Transport,
    /// Never answers.
    Hang,
    /// Answers after a delay.
    Slow(Duration, String),
    /// Panics inside the call task.
    Panic,
}

/// A mock client that plays back a script, then repeats a default step.
///
/// Records every request it receives.
pub struct ScriptedClient {
    script: Mutex<VecDeque<Step>>,
    default: Step,
    requests: Mutex<Vec<CapabilityRequest>>,
}

impl ScriptedClient {
    pub fn new(script: Vec<Step>, default: Step) -> Self {
        Self {
            script: Mutex::new(script.into()),
            default,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn always(step: Step) -> Self {
        Self::new(vec![], step)
    }

    pub fn succeeding(content: &str) -> Self {
        Self::always(Step::Reply(content.into()))
    }

    pub fn failing() -> Self {
        Self::always(Step::Transport)
    }

    pub fn hanging() -> Self {
        Self::always(Step::Hang)
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CapabilityRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CapabilityClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn call(
        &self,
        _server: &CapabilityServer,
        request: CapabilityRequest,
    ) -> Result<CapabilityResponse, CapabilityError> {
        self.requests.lock().unwrap().push(request);
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone());

        match step {
            Step::Reply(content) => Ok(CapabilityResponse::success(content, 5)),
            Step::Refuse(content) => Ok(CapabilityResponse::error(content)),
            Step::Transport => Err(CapabilityError::Transport("connection reset".into())),
            Step::Hang => std::future::pending().await,
            Step::Slow(delay, content) => {
                tokio::time::sleep(delay).await;
                Ok(CapabilityResponse::success(content, delay.as_millis() as u64))
            }
            Step::Panic => panic!("scripted client panicked"),
        }
    }
}

/// A server offering the `analysis` capability with a 1s timeout.
pub fn server(id: &str) -> CapabilityServer {
    CapabilityServer {
        id: id.into(),
        display_name: format!("{id} analysis"),
        capabilities: vec!["analysis".into()],
        endpoint: format!("local:{id}"),
        timeout_ms: 1000,
        max_retries: 0,
    }
}

/// A persona preferring `servers` in order, all for `analysis`.
pub fn persona(id: &str, servers: &[&str]) -> Persona {
    Persona {
        id: id.into(),
        display_name: id.to_uppercase(),
        domain: format!("{id} domain"),
        activation_keywords: vec![id.into()],
        capability_affinities: servers
            .iter()
            .map(|s| CapabilityAffinity {
                capability: "analysis".into(),
                server_id: (*s).into(),
            })
            .collect(),
        activation_threshold: 0.15,
    }
}
