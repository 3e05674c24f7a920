//! Configuration loading, validation, and management for CrewForge.
//!
//! Loads configuration from `~/.crewforge/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.crewforge/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the primary provider (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Primary LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Primary model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Fallback model used once retries are exhausted
    #[serde(default)]
    pub fallback: FallbackConfig,

    /// Per-agent execution behavior
    #[serde(default)]
    pub agent: AgentConfig,

    /// Crew scheduling
    #[serde(default)]
    pub crew: CrewConfig,

    /// Circuit breaker thresholds, one breaker per provider
    #[serde(default)]
    pub breaker: BreakerConfig,

    /// Short-term memory
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Mid-term run history
    #[serde(default)]
    pub history: HistoryConfig,

    /// Top-level pipeline and focus group
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_true() -> bool {
    true
}
fn default_ttl_secs() -> u64 {
    3600
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("providers", &self.providers)
            .field("fallback", &self.fallback)
            .field("agent", &self.agent)
            .field("crew", &self.crew)
            .field("breaker", &self.breaker)
            .field("memory", &self.memory)
            .field("history", &self.history)
            .field("orchestrator", &self.orchestrator)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_fallback_provider")]
    pub provider: String,

    #[serde(default = "default_fallback_model")]
    pub model: String,
}

fn default_fallback_provider() -> String {
    "anthropic".into()
}
fn default_fallback_model() -> String {
    "claude-3-5-sonnet-20241022".into()
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: default_fallback_provider(),
            model: default_fallback_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Attempts against the primary model before falling back
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_true")]
    pub enable_reflection: bool,

    #[serde(default = "default_true")]
    pub enable_self_correction: bool,

    /// Merged context beyond this many characters keeps only its tail
    #[serde(default = "default_context_window")]
    pub context_window_chars: usize,

    #[serde(default = "default_ttl_secs")]
    pub memory_ttl_secs: u64,

    #[serde(default = "default_reflection_temperature")]
    pub reflection_temperature: f32,

    /// Delay before retry n is `backoff_base_secs^n` seconds
    #[serde(default = "default_backoff_base")]
    pub backoff_base_secs: u64,
}

fn default_max_retries() -> u32 {
    3
}
fn default_context_window() -> usize {
    8000
}
fn default_reflection_temperature() -> f32 {
    0.3
}
fn default_backoff_base() -> u64 {
    2
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            enable_reflection: true,
            enable_self_correction: true,
            context_window_chars: default_context_window(),
            memory_ttl_secs: default_ttl_secs(),
            reflection_temperature: default_reflection_temperature(),
            backoff_base_secs: default_backoff_base(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewConfig {
    #[serde(default = "default_max_parallel")]
    pub max_parallel_tasks: usize,

    #[serde(default = "default_true")]
    pub dynamic_recovery: bool,

    #[serde(default = "default_ttl_secs")]
    pub crew_context_ttl_secs: u64,
}

fn default_max_parallel() -> usize {
    5
}

impl Default for CrewConfig {
    fn default() -> Self {
        Self {
            max_parallel_tasks: default_max_parallel(),
            dynamic_recovery: true,
            crew_context_ttl_secs: default_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,

    #[serde(default = "default_breaker_timeout")]
    pub timeout_ms: u64,
}

fn default_failure_threshold() -> u32 {
    5
}
fn default_success_threshold() -> u32 {
    2
}
fn default_breaker_timeout() -> u64 {
    60_000
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            timeout_ms: default_breaker_timeout(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Redis connection URL; unset means in-process only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis_url: Option<String>,

    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_key_prefix() -> String {
    "crewforge".into()
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            key_prefix: default_key_prefix(),
        }
    }
}

impl std::fmt::Debug for MemoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Redis URLs carry credentials.
        f.debug_struct("MemoryConfig")
            .field("redis_url", &redact(&self.redis_url))
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// `sqlite`, `memory`, or `none`
    #[serde(default = "default_history_backend")]
    pub backend: String,

    /// SQLite file; defaults to `<config dir>/history.db`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_history_backend() -> String {
    "sqlite".into()
}

const HISTORY_BACKENDS: &[&str] = &["sqlite", "memory", "none"];

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            backend: default_history_backend(),
            path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_focus_group_iterations")]
    pub focus_group_max_iterations: u32,

    #[serde(default = "default_min_score")]
    pub min_focus_group_score: f32,

    /// Rewrite the deliverable from persona feedback between iterations
    #[serde(default = "default_true")]
    pub refine_between_iterations: bool,

    /// Directory of `<client_id>.md` brand files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_context_dir: Option<PathBuf>,
}

fn default_focus_group_iterations() -> u32 {
    3
}
fn default_min_score() -> f32 {
    7.0
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            focus_group_max_iterations: default_focus_group_iterations(),
            min_focus_group_score: default_min_score(),
            refine_between_iterations: true,
            brand_context_dir: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.crewforge/config.toml).
    ///
    /// Environment overrides:
    /// - `CREWFORGE_API_KEY`, then `OPENAI_API_KEY` (primary key)
    /// - `ANTHROPIC_API_KEY` (fallback provider key)
    /// - `CREWFORGE_PROVIDER`, `CREWFORGE_MODEL`
    /// - `REDIS_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
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

    fn apply_env_overrides(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var("CREWFORGE_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            let entry = self.providers.entry("anthropic".into()).or_default();
            if entry.api_key.is_none() {
                entry.api_key = Some(key);
            }
        }

        if let Ok(provider) = std::env::var("CREWFORGE_PROVIDER") {
            self.default_provider = provider;
        }

        if let Ok(model) = std::env::var("CREWFORGE_MODEL") {
            self.default_model = model;
        }

        if let Ok(url) = std::env::var("REDIS_URL") {
            self.memory.redis_url = Some(url);
        }
    }

    /// Get the configuration directory path. `CREWFORGE_HOME` wins over `~/.crewforge`.
    pub fn config_dir() -> PathBuf {
        match std::env::var("CREWFORGE_HOME") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs_home().join(".crewforge"),
        }
    }

    /// Resolved SQLite history file.
    pub fn history_path(&self) -> PathBuf {
        self.history
            .path
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("history.db"))
    }

    /// API key for a provider: per-provider entry first, then the top-level key
    /// for the primary provider.
    pub fn api_key_for(&self, provider: &str) -> Option<String> {
        self.providers
            .get(provider)
            .and_then(|p| p.api_key.clone())
            .or_else(|| {
                if provider == self.default_provider {
                    self.api_key.clone()
                } else {
                    None
                }
            })
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !(0.0..=2.0).contains(&self.agent.reflection_temperature) {
            return Err(ConfigError::ValidationError(
                "agent.reflection_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_retries == 0 {
            return Err(ConfigError::ValidationError("agent.max_retries must be >= 1".into()));
        }

        if self.crew.max_parallel_tasks == 0 {
            return Err(ConfigError::ValidationError(
                "crew.max_parallel_tasks must be >= 1".into(),
            ));
        }

        if self.breaker.failure_threshold == 0 || self.breaker.success_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "breaker thresholds must be >= 1".into(),
            ));
        }

        if !(0.0..=10.0).contains(&self.orchestrator.min_focus_group_score) {
            return Err(ConfigError::ValidationError(
                "orchestrator.min_focus_group_score must be between 0 and 10".into(),
            ));
        }

        if !HISTORY_BACKENDS.contains(&self.history.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "history.backend must be one of {}, got '{}'",
                HISTORY_BACKENDS.join(", "),
                self.history.backend
            )));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key_for(&self.default_provider).is_some()
    }

    /// Generate a default config TOML string (for the `config init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            providers: HashMap::new(),
            fallback: FallbackConfig::default(),
            agent: AgentConfig::default(),
            crew: CrewConfig::default(),
            breaker: BreakerConfig::default(),
            memory: MemoryConfig::default(),
            history: HistoryConfig::default(),
            orchestrator: OrchestratorConfig::default(),
        }
    }
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_provider, "openai");
        assert_eq!(config.agent.max_retries, 3);
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.breaker.timeout_ms, 60_000);
        assert_eq!(config.crew.max_parallel_tasks, 5);
        assert_eq!(config.orchestrator.focus_group_max_iterations, 3);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.fallback.model, config.fallback.model);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_parallelism_rejected() {
        let mut config = AppConfig::default();
        config.crew.max_parallel_tasks = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_history_backend_rejected() {
        let mut config = AppConfig::default();
        config.history.backend = "postgres".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("postgres"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        let config = result.unwrap();
        assert_eq!(config.default_model, "gpt-4o");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "default_model = \"gpt-4o-mini\"\n[agent]\nmax_retries = 5\n[orchestrator]\nmin_focus_group_score = 8.5\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.default_model, "gpt-4o-mini");
        assert_eq!(config.agent.max_retries, 5);
        assert!(config.agent.enable_reflection);
        assert!((config.orchestrator.min_focus_group_score - 8.5).abs() < f32::EPSILON);
        assert_eq!(config.breaker.success_threshold, 2);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_model = [").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        config.memory.redis_url = Some("redis://:hunter2@cache:6379".into());
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn api_key_lookup_prefers_provider_entry() {
        let mut config = AppConfig {
            api_key: Some("top".into()),
            ..AppConfig::default()
        };
        assert_eq!(config.api_key_for("openai").as_deref(), Some("top"));
        assert_eq!(config.api_key_for("anthropic"), None);

        config.providers.insert(
            "anthropic".into(),
            ProviderConfig { api_key: Some("ant".into()), ..Default::default() },
        );
        assert_eq!(config.api_key_for("anthropic").as_deref(), Some("ant"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4o"));
        assert!(toml_str.contains("[breaker]"));
    }
}
