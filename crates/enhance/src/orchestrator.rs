//! Enhancement orchestrator — decides the tier, resolves servers, and fans
//! calls out under breakers, per-call timeouts, and one outer deadline.
//!
//! Resolution walks each persona's affinities like a fallback chain: a
//! server whose breaker refuses the call is recorded as skipped and the next
//! affinity is tried. Every admitted call runs as its own task on a
//! [`JoinSet`]; the orchestrator never waits past the request deadline.
//!
//! Nothing here returns an error. Every failure ends up as a
//! [`CallOutcome`] on the returned calls.

use chrono::Utc;
use clarion_config::AppConfig;
use clarion_core::{
    CallOutcome, CapabilityClient, CapabilityError, CapabilityRequest, CapabilityResponse,
    CapabilityServer, ComplexityScore, EnhancementCall, EnhancementEvent, EnhancementTier,
    EventBus, FailureKind, Request, ResponseStatus, SelectedPersona,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::breaker::{CallPermit, CircuitBreakerBank};
use crate::registry::CapabilityRegistry;

/// How long past the deadline to wait for tasks to report before aborting.
const DEADLINE_GRACE: Duration = Duration::from_millis(50);

/// Tier thresholds, outer deadline, and retry pacing.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub low_threshold: f64,
    pub high_threshold: f64,
    pub deadline: Duration,
    pub retry_backoff: Duration,
}

impl OrchestratorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            low_threshold: config.routing.low_threshold,
            high_threshold: config.routing.high_threshold,
            deadline: Duration::from_millis(config.orchestrator.deadline_ms),
            retry_backoff: Duration::from_millis(config.orchestrator.retry_backoff_ms),
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// A call that passed its breaker and is ready to run.
struct PlannedCall {
    slot: Slot,
    server: CapabilityServer,
    client: Arc<dyn CapabilityClient>,
    request: CapabilityRequest,
    permit: CallPermit,
}

/// Identity and ordering key of one call, kept so a lost task can still be
/// reported.
#[derive(Debug, Clone)]
struct Slot {
    persona_rank: usize,
    position: usize,
    server_id: String,
    server_name: String,
    persona_id: String,
    capability: String,
    payload: String,
}

impl Slot {
    fn finish(
        self,
        started_at: chrono::DateTime<Utc>,
        attempts: u32,
        outcome: CallOutcome,
    ) -> EnhancementCall {
        EnhancementCall {
            server_id: self.server_id,
            server_name: self.server_name,
            persona_id: self.persona_id,
            capability: self.capability,
            request_payload: self.payload,
            started_at,
            attempts,
            outcome,
        }
    }
}

/// Runs the enhancement fan-out for a request.
pub struct EnhancementOrchestrator {
    registry: RwLock<Arc<CapabilityRegistry>>,
    breakers: Arc<CircuitBreakerBank>,
    settings: OrchestratorSettings,
    events: Option<Arc<EventBus>>,
}

impl EnhancementOrchestrator {
    pub fn new(
        registry: CapabilityRegistry,
        breakers: Arc<CircuitBreakerBank>,
        settings: OrchestratorSettings,
    ) -> Self {
        breakers.register(registry.ids());
        Self {
            registry: RwLock::new(Arc::new(registry)),
            breakers,
            settings,
            events: None,
        }
    }

    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn breakers(&self) -> &Arc<CircuitBreakerBank> {
        &self.breakers
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// The registry snapshot in use. In-flight requests keep the snapshot
    /// they started with.
    pub fn registry(&self) -> Arc<CapabilityRegistry> {
        Arc::clone(&self.registry.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replace the registry. Breaker history for surviving ids is kept.
    pub fn swap_registry(&self, registry: CapabilityRegistry) {
        self.breakers.register(registry.ids());
        let mut current = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        *current = Arc::new(registry);
    }

    /// Which tier a request gets.
    pub fn tier(&self, score: &ComplexityScore, personas: &[SelectedPersona]) -> EnhancementTier {
        if score.value < self.settings.low_threshold {
            EnhancementTier::None
        } else if score.value >= self.settings.high_threshold && personas.len() >= 2 {
            EnhancementTier::MultiServer
        } else {
            EnhancementTier::SingleServer
        }
    }

    /// Run every enhancement call the request's tier calls for.
    ///
    /// Returns within the outer deadline (plus a small grace period) no
    /// matter how servers behave. Calls are ordered by persona rank, then
    /// by server catalog position.
    pub async fn enhance(
        &self,
        personas: &[SelectedPersona],
        score: &ComplexityScore,
        request: &Request,
        cancel: &CancellationToken,
    ) -> Vec<EnhancementCall> {
        let tier = self.tier(score, personas);
        let participants = match tier {
            EnhancementTier::None => return Vec::new(),
            EnhancementTier::SingleServer => &personas[..personas.len().min(1)],
            EnhancementTier::MultiServer => personas,
        };

        let registry = self.registry();
        let (planned, mut calls) = self.resolve(&registry, participants, score, request);

        debug!(
            request_id = %request.id,
            tier = %tier,
            planned = planned.len(),
            skipped = calls.len(),
            "Enhancement resolved"
        );

        if !planned.is_empty() {
            calls.extend(self.dispatch(planned, request, cancel).await);
        }

        calls.sort_by_key(|(slot, _)| (slot.persona_rank, slot.position));
        let calls: Vec<EnhancementCall> = calls.into_iter().map(|(_, call)| call).collect();

        if let Some(bus) = &self.events {
            for call in calls.iter().filter(|c| !c.is_skipped()) {
                bus.publish(EnhancementEvent::CallCompleted {
                    request_id: request.id.to_string(),
                    server_id: call.server_id.clone(),
                    success: call.is_success(),
                    duration_ms: elapsed_of(&call.outcome),
                    timestamp: Utc::now(),
                });
            }
        }

        calls
    }

    /// Pick one server per persona and take its breaker permit.
    ///
    /// A server already claimed by an earlier persona resolves that persona
    /// too, without a second call.
    fn resolve(
        &self,
        registry: &CapabilityRegistry,
        personas: &[SelectedPersona],
        score: &ComplexityScore,
        request: &Request,
    ) -> (Vec<PlannedCall>, Vec<(Slot, EnhancementCall)>) {
        let mut planned = Vec::new();
        let mut skipped = Vec::new();
        let mut claimed: HashSet<&str> = HashSet::new();
        let mut refused: HashSet<&str> = HashSet::new();

        for (rank, selected) in personas.iter().enumerate() {
            for affinity in &selected.persona.capability_affinities {
                let Some(entry) = registry.get(&affinity.server_id) else {
                    continue;
                };
                let id = entry.server.id.as_str();
                if claimed.contains(id) {
                    break;
                }
                if refused.contains(id) {
                    continue;
                }

                let payload = build_payload(&affinity.capability, selected, score, request);
                let slot = Slot {
                    persona_rank: rank,
                    position: entry.position,
                    server_id: entry.server.id.clone(),
                    server_name: entry.server.display_name.clone(),
                    persona_id: selected.persona.id.clone(),
                    capability: affinity.capability.clone(),
                    payload: payload.clone(),
                };

                match self.breakers.admit(id) {
                    Some(permit) => {
                        claimed.insert(id);
                        planned.push(PlannedCall {
                            request: CapabilityRequest {
                                capability: affinity.capability.clone(),
                                payload,
                                timeout_ms: entry.server.timeout_ms,
                                conversation: request.context.as_str().map(str::to_string),
                            },
                            server: entry.server.clone(),
                            client: Arc::clone(&entry.client),
                            permit,
                            slot,
                        });
                        break;
                    }
                    None => {
                        refused.insert(id);
                        info!(
                            request_id = %request.id,
                            server = %id,
                            persona = %selected.persona.id,
                            "Circuit open, skipping server"
                        );
                        let call = slot
                            .clone()
                            .finish(Utc::now(), 0, CallOutcome::CircuitOpenSkipped);
                        skipped.push((slot, call));
                    }
                }
            }
        }

        (planned, skipped)
    }

    async fn dispatch(
        &self,
        planned: Vec<PlannedCall>,
        request: &Request,
        cancel: &CancellationToken,
    ) -> Vec<(Slot, EnhancementCall)> {
        let deadline = Instant::now() + self.settings.deadline;
        let started_at = Utc::now();
        let mut pending: Vec<Option<(Slot, bool)>> = planned
            .iter()
            .map(|p| Some((p.slot.clone(), p.permit.is_trial())))
            .collect();
        let mut done = Vec::with_capacity(planned.len());

        let mut set = JoinSet::new();
        for (index, call) in planned.into_iter().enumerate() {
            let cancel = cancel.clone();
            let backoff = self.settings.retry_backoff;
            let request_id = request.id.to_string();
            set.spawn(async move {
                let (attempts, outcome) = run_call(
                    call.server,
                    call.client,
                    call.request,
                    call.permit,
                    deadline,
                    backoff,
                    &cancel,
                    &request_id,
                )
                .await;
                (index, attempts, outcome)
            });
        }

        while !set.is_empty() {
            match tokio::time::timeout_at(deadline + DEADLINE_GRACE, set.join_next()).await {
                Ok(Some(Ok((index, attempts, outcome)))) => {
                    if let Some((slot, _)) = pending[index].take() {
                        done.push((slot.clone(), slot.finish(started_at, attempts, outcome)));
                    }
                }
                Ok(Some(Err(e))) => {
                    warn!(request_id = %request.id, error = %e, "Enhancement task failed");
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        request_id = %request.id,
                        remaining = set.len(),
                        "Deadline grace elapsed, aborting remaining calls"
                    );
                    set.abort_all();
                    break;
                }
            }
        }

        // Tasks that panicked or were aborted never reported back. Their
        // permits went with them, so the failure is recorded here.
        let now = Instant::now();
        for (slot, trial) in pending.into_iter().flatten() {
            if !cancel.is_cancelled() {
                self.breakers.breaker(&slot.server_id).record_lost(trial);
            }
            let outcome = if cancel.is_cancelled() {
                cancelled()
            } else if now >= deadline {
                CallOutcome::TimedOut {
                    elapsed_ms: self.settings.deadline.as_millis() as u64,
                    deadline_exceeded: true,
                }
            } else {
                CallOutcome::Failure {
                    kind: FailureKind::Transport,
                    reason: "call did not complete".into(),
                }
            };
            done.push((slot.clone(), slot.finish(started_at, 0, outcome)));
        }

        done
    }
}

/// One call from admission to settled permit.
#[allow(clippy::too_many_arguments)]
async fn run_call(
    server: CapabilityServer,
    client: Arc<dyn CapabilityClient>,
    request: CapabilityRequest,
    permit: CallPermit,
    deadline: Instant,
    backoff: Duration,
    cancel: &CancellationToken,
    request_id: &str,
) -> (u32, CallOutcome) {
    let started = Instant::now();
    let attempts = AtomicU32::new(0);

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        _ = tokio::time::sleep_until(deadline) => Some(Err(Cut::Deadline)),
        result = attempt(&server, client.as_ref(), &request, backoff, &attempts, request_id) => {
            Some(result.map_err(Cut::Error))
        }
    };

    let attempts = attempts.load(Ordering::Relaxed);
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let Some(result) = result else {
        debug!(request_id, server = %server.id, "Call cancelled");
        permit.release();
        return (attempts, cancelled());
    };

    let outcome = match result {
        Ok(response) if response.status == ResponseStatus::Success => CallOutcome::Success {
            content: response.content,
            latency_ms: elapsed_ms,
        },
        Ok(response) => CallOutcome::Failure {
            kind: FailureKind::Application,
            reason: response.content,
        },
        Err(Cut::Deadline) => CallOutcome::TimedOut {
            elapsed_ms,
            deadline_exceeded: true,
        },
        Err(Cut::Error(CapabilityError::Timeout(_))) => CallOutcome::TimedOut {
            elapsed_ms,
            deadline_exceeded: false,
        },
        Err(Cut::Error(CapabilityError::Application { message, .. })) => CallOutcome::Failure {
            kind: FailureKind::Application,
            reason: message,
        },
        Err(Cut::Error(e)) => CallOutcome::Failure {
            kind: FailureKind::Transport,
            reason: e.to_string(),
        },
    };

    if matches!(outcome, CallOutcome::Success { .. }) {
        info!(
            request_id,
            server = %server.id,
            latency_ms = elapsed_ms,
            attempts,
            "Enhancement call succeeded"
        );
        permit.succeed();
    } else {
        warn!(
            request_id,
            server = %server.id,
            latency_ms = elapsed_ms,
            attempts,
            outcome = ?outcome,
            "Enhancement call failed"
        );
        permit.fail();
    }

    (attempts, outcome)
}

enum Cut {
    Deadline,
    Error(CapabilityError),
}

/// Call with the per-attempt timeout, retrying retryable errors.
async fn attempt(
    server: &CapabilityServer,
    client: &dyn CapabilityClient,
    request: &CapabilityRequest,
    backoff: Duration,
    attempts: &AtomicU32,
    request_id: &str,
) -> Result<CapabilityResponse, CapabilityError> {
    loop {
        let n = attempts.fetch_add(1, Ordering::Relaxed) + 1;
        let call = client.call(server, request.clone());
        let error = match tokio::time::timeout(server.timeout(), call).await {
            Ok(Ok(response)) => return Ok(response),
            Ok(Err(e)) => e,
            Err(_) => CapabilityError::Timeout(format!(
                "'{}' timed out after {}ms",
                server.display_name, server.timeout_ms
            )),
        };

        if !error.is_retryable() || n > server.max_retries {
            return Err(error);
        }
        debug!(
            request_id,
            server = %server.id,
            attempt = n,
            error = %error,
            "Retrying capability call"
        );
        tokio::time::sleep(backoff).await;
    }
}

fn cancelled() -> CallOutcome {
    CallOutcome::Failure {
        kind: FailureKind::Cancelled,
        reason: "request cancelled".into(),
    }
}

fn elapsed_of(outcome: &CallOutcome) -> u64 {
    match outcome {
        CallOutcome::Success { latency_ms, .. } => *latency_ms,
        CallOutcome::TimedOut { elapsed_ms, .. } => *elapsed_ms,
        _ => 0,
    }
}

/// Structured task description sent to a capability server.
fn build_payload(
    capability: &str,
    selected: &SelectedPersona,
    score: &ComplexityScore,
    request: &Request,
) -> String {
    format!(
        "capability: {}\npersona: {} ({})\ncomplexity: {:.2}\nrequest: {}",
        capability,
        selected.persona.display_name,
        selected.persona.domain,
        score.value,
        request.text.trim()
    )
}
