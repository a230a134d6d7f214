//! Configuration loading, validation, and management for Clarion.
//!
//! Loads configuration from `~/.clarion/config.toml` with environment
//! variable overrides. Validates all settings at startup; a malformed
//! catalog is a startup error, never a request-time one.

mod defaults;

use clarion_core::{Catalog, CatalogError, CapabilityServer, FrameworkDefinition, Persona};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.clarion/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Tier thresholds and persona selection limits
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Complexity signal vocabularies and weights
    #[serde(default)]
    pub complexity: ComplexityConfig,

    /// Circuit breaker policy shared by all servers
    #[serde(default)]
    pub breaker: BreakerConfig,

    /// Fan-out deadline and retry policy
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// HTTP transport settings
    #[serde(default)]
    pub transport: TransportConfig,

    /// Framework attribution settings
    #[serde(default)]
    pub attribution: AttributionConfig,

    /// Audit sink configuration
    #[serde(default)]
    pub audit: AuditConfig,

    /// Persona catalog
    #[serde(default = "defaults::personas")]
    pub personas: Vec<Persona>,

    /// Capability server catalog
    #[serde(default = "defaults::servers")]
    pub servers: Vec<CapabilityServer>,

    /// Framework catalog
    #[serde(default = "defaults::frameworks")]
    pub frameworks: Vec<FrameworkDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Scores below this get a standard response.
    #[serde(default = "default_low_threshold")]
    pub low_threshold: f64,

    /// Scores at or above this may coordinate several personas.
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,

    #[serde(default = "default_max_personas")]
    pub max_personas: usize,

    #[serde(default = "default_fallback_persona")]
    pub fallback_persona: String,
}

fn default_low_threshold() -> f64 {
    0.3
}
fn default_high_threshold() -> f64 {
    0.7
}
fn default_max_personas() -> usize {
    3
}
fn default_fallback_persona() -> String {
    "diego".into()
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            low_threshold: default_low_threshold(),
            high_threshold: default_high_threshold(),
            max_personas: default_max_personas(),
            fallback_persona: default_fallback_persona(),
        }
    }
}

/// One signal class: its vocabulary, the weight of each hit, and a cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    pub weight: f64,
    pub cap: f64,
    pub terms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexityConfig {
    #[serde(default = "default_strategic")]
    pub strategic: SignalConfig,

    #[serde(default = "default_multi_stakeholder")]
    pub multi_stakeholder: SignalConfig,

    #[serde(default = "default_framework_applicability")]
    pub framework_applicability: SignalConfig,

    #[serde(default = "default_elevated_audience")]
    pub elevated_audience: SignalConfig,
}

fn default_strategic() -> SignalConfig {
    SignalConfig {
        weight: 0.1,
        cap: 0.3,
        terms: defaults::strategic_terms(),
    }
}
fn default_multi_stakeholder() -> SignalConfig {
    SignalConfig {
        weight: 0.1,
        cap: 0.2,
        terms: defaults::multi_stakeholder_terms(),
    }
}
fn default_framework_applicability() -> SignalConfig {
    SignalConfig {
        weight: 0.15,
        cap: 0.3,
        terms: defaults::framework_applicability_terms(),
    }
}
fn default_elevated_audience() -> SignalConfig {
    SignalConfig {
        weight: 0.2,
        cap: 0.2,
        terms: defaults::elevated_audience_terms(),
    }
}

impl Default for ComplexityConfig {
    fn default() -> Self {
        Self {
            strategic: default_strategic(),
            multi_stakeholder: default_multi_stakeholder(),
            framework_applicability: default_framework_applicability(),
            elevated_audience: default_elevated_audience(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures that trip a circuit open.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// How long an open circuit skips calls before a trial.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Upper bound for the cooldown after repeated failed trials.
    #[serde(default = "default_max_cooldown_ms")]
    pub max_cooldown_ms: u64,

    /// Cooldown growth factor applied when a half-open trial fails.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_failure_threshold() -> u32 {
    5
}
fn default_cooldown_ms() -> u64 {
    30_000
}
fn default_max_cooldown_ms() -> u64 {
    300_000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_ms: default_cooldown_ms(),
            max_cooldown_ms: default_max_cooldown_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Outer deadline for all enhancement calls of one request.
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,

    /// Pause between retry attempts against the same server.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_deadline_ms() -> u64 {
    8_000
}
fn default_retry_backoff_ms() -> u64 {
    100
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            deadline_ms: default_deadline_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Bearer token sent to HTTP capability servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Idle keep-alive connections kept per server host.
    #[serde(default = "default_pool_max_idle")]
    pub pool_max_idle_per_host: usize,
}

fn default_connect_timeout_ms() -> u64 {
    2_000
}
fn default_pool_max_idle() -> usize {
    8
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            connect_timeout_ms: default_connect_timeout_ms(),
            pool_max_idle_per_host: default_pool_max_idle(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConfig")
            .field("api_key", &redact(&self.api_key))
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("pool_max_idle_per_host", &self.pool_max_idle_per_host)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributionConfig {
    /// Minimum confidence for a framework to be credited.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
}

fn default_min_confidence() -> f64 {
    0.7
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Emit every record as a tracing event.
    #[serde(default = "default_true")]
    pub tracing: bool,

    /// Append records as JSON lines to this file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonl_path: Option<String>,

    /// Records kept in the in-memory log.
    #[serde(default = "default_retain")]
    pub retain: usize,
}

fn default_true() -> bool {
    true
}
fn default_retain() -> usize {
    1_000
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            tracing: true,
            jsonl_path: None,
            retain: default_retain(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.clarion/config.toml).
    ///
    /// Environment variables override file values:
    /// - `CLARION_DEADLINE_MS`
    /// - `CLARION_LOW_THRESHOLD` / `CLARION_HIGH_THRESHOLD`
    /// - `CLARION_AUDIT_PATH`
    /// - `CLARION_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_overrides(&Self::config_dir().join("config.toml"))
    }

    /// Load configuration from `path`, then apply the same environment
    /// overrides as [`AppConfig::load`].
    pub fn load_with_overrides(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = std::env::var("CLARION_DEADLINE_MS") {
            self.orchestrator.deadline_ms = parse_env("CLARION_DEADLINE_MS", &v)?;
        }
        if let Ok(v) = std::env::var("CLARION_LOW_THRESHOLD") {
            self.routing.low_threshold = parse_env("CLARION_LOW_THRESHOLD", &v)?;
        }
        if let Ok(v) = std::env::var("CLARION_HIGH_THRESHOLD") {
            self.routing.high_threshold = parse_env("CLARION_HIGH_THRESHOLD", &v)?;
        }
        if let Ok(path) = std::env::var("CLARION_AUDIT_PATH") {
            self.audit.jsonl_path = Some(path);
        }
        if self.transport.api_key.is_none() {
            self.transport.api_key = std::env::var("CLARION_API_KEY").ok();
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".clarion")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.routing;
        if !(0.0..=1.0).contains(&r.low_threshold) || !(0.0..=1.0).contains(&r.high_threshold) {
            return Err(ConfigError::ValidationError(
                "routing thresholds must be between 0.0 and 1.0".into(),
            ));
        }
        if r.low_threshold >= r.high_threshold {
            return Err(ConfigError::ValidationError(
                "routing.low_threshold must be below routing.high_threshold".into(),
            ));
        }
        if r.max_personas == 0 {
            return Err(ConfigError::ValidationError(
                "routing.max_personas must be at least 1".into(),
            ));
        }

        for (name, signal) in self.complexity.signals() {
            if signal.weight < 0.0 || signal.cap < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "complexity.{name} weight and cap must be non-negative"
                )));
            }
        }

        if self.breaker.failure_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "breaker.failure_threshold must be at least 1".into(),
            ));
        }
        if self.breaker.cooldown_ms == 0 || self.breaker.max_cooldown_ms < self.breaker.cooldown_ms
        {
            return Err(ConfigError::ValidationError(
                "breaker cooldown must be > 0 and not exceed max_cooldown_ms".into(),
            ));
        }
        if self.breaker.backoff_multiplier < 1.0 {
            return Err(ConfigError::ValidationError(
                "breaker.backoff_multiplier must be >= 1.0".into(),
            ));
        }

        if self.orchestrator.deadline_ms == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.deadline_ms must be > 0".into(),
            ));
        }

        let c = self.attribution.min_confidence;
        if c <= 0.0 || c > 1.0 {
            return Err(ConfigError::ValidationError(
                "attribution.min_confidence must be in (0, 1]".into(),
            ));
        }

        // Catalog contract violations are configuration errors too.
        self.catalog()?;
        Ok(())
    }

    /// Build the validated catalog snapshot described by this config.
    pub fn catalog(&self) -> Result<Catalog, ConfigError> {
        Ok(Catalog::new(
            self.personas.clone(),
            self.servers.clone(),
            self.frameworks.clone(),
            self.routing.fallback_persona.clone(),
        )?)
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl ComplexityConfig {
    /// Signal classes in scoring order, with their config names.
    pub fn signals(&self) -> [(&'static str, &SignalConfig); 4] {
        [
            ("strategic", &self.strategic),
            ("multi_stakeholder", &self.multi_stakeholder),
            ("framework_applicability", &self.framework_applicability),
            ("elevated_audience", &self.elevated_audience),
        ]
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            routing: RoutingConfig::default(),
            complexity: ComplexityConfig::default(),
            breaker: BreakerConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            transport: TransportConfig::default(),
            attribution: AttributionConfig::default(),
            audit: AuditConfig::default(),
            personas: defaults::personas(),
            servers: defaults::servers(),
            frameworks: defaults::frameworks(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::ValidationError(format!("{key} has an invalid value: {value}")))
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Invalid catalog: {0}")]
    Catalog(#[from] CatalogError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.routing.fallback_persona, "diego");
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.orchestrator.deadline_ms, 8_000);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.personas.len(), config.personas.len());
        assert_eq!(parsed.servers[0].id, "sequential");
        assert_eq!(parsed.routing.high_threshold, config.routing.high_threshold);
    }

    #[test]
    fn inverted_thresholds_rejected() {
        let mut config = AppConfig::default();
        config.routing.low_threshold = 0.8;
        config.routing.high_threshold = 0.4;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn zero_failure_threshold_rejected() {
        let mut config = AppConfig::default();
        config.breaker.failure_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn catalog_errors_surface_at_validation() {
        let mut config = AppConfig::default();
        config.routing.fallback_persona = "nobody".into();
        assert!(matches!(config.validate(), Err(ConfigError::Catalog(_))));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().servers.len(), 4);
    }

    #[test]
    fn partial_file_keeps_default_catalog() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[breaker]
failure_threshold = 3
cooldown_ms = 1000

[orchestrator]
deadline_ms = 2500
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.breaker.failure_threshold, 3);
        assert_eq!(config.breaker.cooldown_ms, 1000);
        assert_eq!(config.orchestrator.deadline_ms, 2500);
        assert_eq!(config.personas.len(), 5);
    }

    #[test]
    fn env_overrides_apply_to_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[orchestrator]\ndeadline_ms = 2500").unwrap();

        // SAFETY: no other test in this crate reads these variables.
        unsafe {
            std::env::set_var("CLARION_DEADLINE_MS", "1234");
            std::env::set_var("CLARION_AUDIT_PATH", "/tmp/clarion-audit.jsonl");
        }
        let overridden = AppConfig::load_with_overrides(file.path());
        let plain = AppConfig::load_from(file.path());
        unsafe {
            std::env::remove_var("CLARION_DEADLINE_MS");
            std::env::remove_var("CLARION_AUDIT_PATH");
        }

        let overridden = overridden.unwrap();
        assert_eq!(overridden.orchestrator.deadline_ms, 1234);
        assert_eq!(
            overridden.audit.jsonl_path.as_deref(),
            Some("/tmp/clarion-audit.jsonl")
        );
        assert_eq!(plain.unwrap().orchestrator.deadline_ms, 2500);
    }

    #[test]
    fn custom_catalog_parsing() {
        let toml_str = r#"
[routing]
fallback_persona = "ops"

[[personas]]
id = "ops"
display_name = "Ops"
domain = "Operations"
activation_keywords = ["incident", "on-call"]
capability_affinities = [{ capability = "validation", server_id = "checker" }]

[[servers]]
id = "checker"
display_name = "Checks"
capabilities = ["validation"]
endpoint = "http://localhost:9000"

[[frameworks]]
id = "sre"
name = "SRE Error Budgets"
terms = ["error budget", "slo"]
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        let catalog = config.catalog().unwrap();
        assert_eq!(catalog.personas().len(), 1);
        assert_eq!(catalog.servers()[0].timeout_ms, 5000);
        assert_eq!(catalog.personas()[0].activation_threshold, 0.15);
        assert_eq!(catalog.frameworks()[0].terms.len(), 2);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[breaker\nfailure_threshold = ").unwrap();
        assert!(matches!(
            AppConfig::load_from(file.path()),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn api_key_is_redacted_in_debug() {
        let transport = TransportConfig {
            api_key: Some("sk-secret".into()),
            ..TransportConfig::default()
        };
        let debug = format!("{transport:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("sequential"));
        assert!(toml_str.contains("deadline_ms"));
    }
}
