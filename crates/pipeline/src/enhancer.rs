//! The request pipeline.
//!
//! ```text
//! Request ─▶ ComplexityAnalyzer ─▶ PersonaSelector ─▶ EnhancementOrchestrator
//!                                                           │
//!   ResponseEnvelope ◀─ ResponseIntegrator ◀─ TransparencyComposer
//!                                 ▲                 ▲
//!                          ResponseDrafter ─▶ FrameworkAttributionEngine
//! ```
//!
//! Catalog-dependent parts (personas, frameworks, the server registry) live
//! in an immutable snapshot. A catalog swap builds a whole new snapshot and
//! replaces the pointer; requests in flight finish on the snapshot they
//! started with. Breakers outlive snapshots.

use chrono::Utc;
use clarion_config::{AppConfig, TransportConfig};
use clarion_core::{
    Catalog, CircuitState, CircuitStatus, EnhancementEvent, EventBus, Request, ResponseEnvelope,
};
use clarion_enhance::{
    BreakerPolicy, CapabilityRegistry, CircuitBreakerBank, EnhancementOrchestrator,
    OrchestratorSettings, build_from_catalog,
};
use clarion_routing::{ComplexityAnalyzer, PersonaSelector};
use clarion_transparency::{
    AuditLog, AuditSink, Composition, FrameworkAttributionEngine, JsonlSink, ResponseIntegrator,
    TracingSink, TransparencyComposer,
};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::drafter::{DigestDrafter, DraftInput, ResponseDrafter};
use crate::error::PipelineError;

/// Catalog-derived state, replaced as a unit.
struct Snapshot {
    catalog: Arc<Catalog>,
    attribution: FrameworkAttributionEngine,
}

/// Reachability and breaker state of one server.
#[derive(Debug, Clone, Serialize)]
pub struct ServerHealth {
    pub server_id: String,
    pub display_name: String,
    pub transport: String,
    pub reachable: bool,
    pub error: Option<String>,
    pub circuit: Option<CircuitStatus>,
}

/// Adaptive enhancement router: one entry point from request to envelope.
pub struct Enhancer {
    analyzer: ComplexityAnalyzer,
    selector: PersonaSelector,
    orchestrator: EnhancementOrchestrator,
    composer: TransparencyComposer,
    integrator: ResponseIntegrator,
    drafter: Arc<dyn ResponseDrafter>,
    snapshot: RwLock<Arc<Snapshot>>,
    audit: Arc<AuditLog>,
    events: Arc<EventBus>,
    transport: TransportConfig,
    min_confidence: f64,
}

impl std::fmt::Debug for Enhancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enhancer")
            .field("drafter", &self.drafter.name())
            .field("servers", &self.orchestrator.registry().len())
            .field("audit", &self.audit)
            .finish()
    }
}

impl Enhancer {
    /// Build from configuration with the default drafter and the audit
    /// sinks named in `config.audit`.
    pub fn from_config(config: &AppConfig) -> Result<Self, PipelineError> {
        EnhancerBuilder::new(config.clone()).build()
    }

    pub fn builder(config: AppConfig) -> EnhancerBuilder {
        EnhancerBuilder::new(config)
    }

    /// Process one request with no external cancellation.
    pub async fn process(&self, request: Request) -> ResponseEnvelope {
        self.process_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Process one request. Cancelling `cancel` abandons pending
    /// enhancement calls; an envelope is still produced.
    pub async fn process_with_cancel(
        &self,
        request: Request,
        cancel: CancellationToken,
    ) -> ResponseEnvelope {
        let snapshot = self.snapshot();

        let score = self.analyzer.score(&request);
        let personas = self.selector.select(&snapshot.catalog, &request, &score);
        let tier = self.orchestrator.tier(&score, &personas);

        self.events.publish(EnhancementEvent::RequestRouted {
            request_id: request.id.to_string(),
            complexity: score.value,
            tier,
            personas: personas.iter().map(|p| p.id().to_string()).collect(),
            timestamp: Utc::now(),
        });

        let calls = self
            .orchestrator
            .enhance(&personas, &score, &request, &cancel)
            .await;

        let body = self
            .drafter
            .draft(DraftInput {
                request: &request,
                personas: &personas,
                calls: &calls,
            })
            .await;

        let matches = snapshot.attribution.detect(&body);
        let (disclosure, record) = self.composer.compose(Composition {
            request: &request,
            personas: &personas,
            complexity: &score,
            tier,
            calls,
            matches,
        });

        self.audit.append(record.clone());
        self.events.publish(EnhancementEvent::ResponseComposed {
            request_id: request.id.to_string(),
            degraded: record.degraded(),
            frameworks: record.framework_matches.len(),
            timestamp: Utc::now(),
        });

        info!(
            request_id = %request.id,
            complexity = score.value,
            tier = %tier,
            personas = record.persona_ids.len(),
            calls = record.enhancement_calls.len(),
            issues = ?record.issues,
            "Request processed"
        );

        self.integrator.integrate(body, &disclosure, record)
    }

    /// Current breaker state of a server.
    pub fn circuit_state(&self, server_id: &str) -> Option<CircuitState> {
        self.circuit_status(server_id).map(|s| s.state)
    }

    /// Full breaker status of a server.
    pub fn circuit_status(&self, server_id: &str) -> Option<CircuitStatus> {
        self.orchestrator.breakers().status(server_id)
    }

    /// Breaker status of every known server, sorted by id.
    pub fn circuit_report(&self) -> Vec<CircuitStatus> {
        self.orchestrator.breakers().report()
    }

    pub fn catalog(&self) -> Arc<Catalog> {
        Arc::clone(&self.snapshot().catalog)
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Replace the catalog, building transports from configuration.
    pub fn swap_catalog(&self, catalog: Catalog) -> Result<(), PipelineError> {
        let registry = build_from_catalog(&catalog, &self.transport)?;
        self.swap_catalog_with(catalog, registry)
    }

    /// Replace the catalog and the server registry together.
    pub fn swap_catalog_with(
        &self,
        catalog: Catalog,
        registry: CapabilityRegistry,
    ) -> Result<(), PipelineError> {
        let attribution =
            FrameworkAttributionEngine::new(catalog.frameworks(), self.min_confidence)?;
        let next = Arc::new(Snapshot {
            catalog: Arc::new(catalog),
            attribution,
        });
        self.orchestrator.swap_registry(registry);
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = next;
        info!("Catalog swapped");
        Ok(())
    }

    /// Health-check every registered server concurrently.
    pub async fn check_servers(&self) -> Vec<ServerHealth> {
        let registry = self.orchestrator.registry();
        let checks = registry.servers().iter().map(|entry| async move {
            let result = tokio::time::timeout(
                entry.server.timeout(),
                entry.client.health_check(&entry.server),
            )
            .await;
            let (reachable, error) = match result {
                Ok(Ok(healthy)) => (healthy, None),
                Ok(Err(e)) => (false, Some(e.to_string())),
                Err(_) => (false, Some("health check timed out".to_string())),
            };
            ServerHealth {
                server_id: entry.server.id.clone(),
                display_name: entry.server.display_name.clone(),
                transport: entry.client.name().to_string(),
                reachable,
                error,
                circuit: self.circuit_status(&entry.server.id),
            }
        });
        futures::future::join_all(checks).await
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Assembles an [`Enhancer`], with overrides for transports, drafting,
/// auditing, and events.
pub struct EnhancerBuilder {
    config: AppConfig,
    registry: Option<CapabilityRegistry>,
    drafter: Option<Arc<dyn ResponseDrafter>>,
    sinks: Vec<Box<dyn AuditSink>>,
    configured_sinks: bool,
    events: Option<Arc<EventBus>>,
}

impl EnhancerBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            registry: None,
            drafter: None,
            sinks: Vec::new(),
            configured_sinks: true,
            events: None,
        }
    }

    /// Use this registry instead of building one from endpoints.
    pub fn registry(mut self, registry: CapabilityRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn drafter(mut self, drafter: Arc<dyn ResponseDrafter>) -> Self {
        self.drafter = Some(drafter);
        self
    }

    /// Add a sink in addition to the configured ones.
    pub fn audit_sink(mut self, sink: Box<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Skip the sinks named in `config.audit` (tracing, JSONL).
    pub fn without_configured_sinks(mut self) -> Self {
        self.configured_sinks = false;
        self
    }

    pub fn events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn build(self) -> Result<Enhancer, PipelineError> {
        let config = self.config;
        config.validate()?;
        let catalog = config.catalog()?;

        let registry = match self.registry {
            Some(registry) => registry,
            None => build_from_catalog(&catalog, &config.transport)?,
        };

        let events = self.events.unwrap_or_default();
        let breakers = Arc::new(
            CircuitBreakerBank::new(BreakerPolicy::from(&config.breaker))
                .with_events(Arc::clone(&events)),
        );
        let orchestrator = EnhancementOrchestrator::new(
            registry,
            breakers,
            OrchestratorSettings::from_config(&config),
        )
        .with_events(Arc::clone(&events));

        let mut sinks = self.sinks;
        if self.configured_sinks {
            if config.audit.tracing {
                sinks.push(Box::new(TracingSink));
            }
            if let Some(path) = &config.audit.jsonl_path {
                sinks.push(Box::new(JsonlSink::open(path)?));
            }
        }

        let min_confidence = config.attribution.min_confidence;
        let attribution = FrameworkAttributionEngine::new(catalog.frameworks(), min_confidence)?;

        info!(
            personas = catalog.personas().len(),
            servers = catalog.servers().len(),
            frameworks = catalog.frameworks().len(),
            "Enhancer ready"
        );

        Ok(Enhancer {
            analyzer: ComplexityAnalyzer::new(&config.complexity),
            selector: PersonaSelector::new(
                config.routing.high_threshold,
                config.routing.max_personas,
            ),
            orchestrator,
            composer: TransparencyComposer::new(),
            integrator: ResponseIntegrator::new(),
            drafter: self
                .drafter
                .unwrap_or_else(|| Arc::new(DigestDrafter::new())),
            snapshot: RwLock::new(Arc::new(Snapshot {
                catalog: Arc::new(catalog),
                attribution,
            })),
            audit: Arc::new(AuditLog::with_sinks(config.audit.retain, sinks)),
            events,
            transport: config.transport.clone(),
            min_confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clarion_core::{EnhancementIssue, EnhancementTier};

    fn enhancer() -> Enhancer {
        Enhancer::builder(AppConfig::default())
            .without_configured_sinks()
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn medium_request_gets_one_loopback_call() {
        let e = enhancer();
        let envelope = e
            .process(Request::new(
                "How should we restructure our teams for this platform initiative?",
            ))
            .await;
        let record = &envelope.transparency_record;
        assert_eq!(record.tier, EnhancementTier::SingleServer);
        assert_eq!(record.persona_ids, vec!["diego"]);
        assert_eq!(record.enhancement_calls.len(), 1);
        assert!(record.enhancement_calls[0].is_success());
        assert!(envelope.rendered_text.starts_with("🎯"));
        assert!(envelope.rendered_text.contains("🔧 Enhanced analysis: Systematic Analysis"));
    }

    #[tokio::test]
    async fn blank_request_still_answers() {
        let e = enhancer();
        let envelope = e.process(Request::new("   ")).await;
        let record = &envelope.transparency_record;
        assert_eq!(record.tier, EnhancementTier::None);
        assert_eq!(record.issues, vec![EnhancementIssue::InputEmpty]);
        assert!(!envelope.body_text.is_empty());
        assert_eq!(record.persona_ids.len(), 1);
    }

    #[tokio::test]
    async fn every_request_is_audited_once() {
        let e = enhancer();
        e.process(Request::new("What is Team Topologies?")).await;
        e.process(Request::new("How should we restructure our teams?"))
            .await;
        assert_eq!(e.audit().count(), 2);
    }

    #[tokio::test]
    async fn routing_and_composition_events_are_published() {
        let e = enhancer();
        let mut rx = e.events().subscribe();
        e.process(Request::new("What is Team Topologies?")).await;

        let first = rx.recv().await.unwrap();
        assert!(matches!(
            first.as_ref(),
            EnhancementEvent::RequestRouted {
                tier: EnhancementTier::None,
                ..
            }
        ));
        let second = rx.recv().await.unwrap();
        assert!(matches!(
            second.as_ref(),
            EnhancementEvent::ResponseComposed { .. }
        ));
    }

    #[tokio::test]
    async fn swap_catalog_changes_personas_and_keeps_breakers() {
        let e = enhancer();
        e.process(Request::new(
            "How should we restructure our teams for this platform initiative?",
        ))
        .await;
        let before = e.circuit_status("sequential").unwrap();
        assert_eq!(before.total_successes, 1);

        let mut config = AppConfig::default();
        config.personas.retain(|p| p.id == "martin");
        config.routing.fallback_persona = "martin".into();
        e.swap_catalog(config.catalog().unwrap()).unwrap();

        assert_eq!(e.catalog().personas().len(), 1);
        assert_eq!(e.circuit_status("sequential").unwrap().total_successes, 1);
        let envelope = e.process(Request::new("What is Team Topologies?")).await;
        assert_eq!(envelope.transparency_record.persona_ids, vec!["martin"]);
    }

    #[tokio::test]
    async fn loopback_servers_report_healthy() {
        let e = enhancer();
        let report = e.check_servers().await;
        assert_eq!(report.len(), 4);
        assert!(report.iter().all(|h| h.reachable && h.transport == "loopback"));
        assert_eq!(
            e.circuit_state("sequential"),
            Some(CircuitState::Closed)
        );
        assert_eq!(e.circuit_report().len(), 4);
    }

    #[test]
    fn invalid_config_is_rejected_at_build() {
        let mut config = AppConfig::default();
        config.routing.fallback_persona = "nobody".into();
        assert!(Enhancer::builder(config).build().is_err());
    }
}
