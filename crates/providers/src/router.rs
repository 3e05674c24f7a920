//! Provider router: builds providers from config and pairs each with its
//! circuit breaker.
//!
//! Agents never talk to a bare provider: they get a [`ModelEndpoint`] that
//! bundles the provider, the model to request, and the breaker guarding that
//! provider. Every endpoint for the same provider shares one breaker.

use std::collections::HashMap;
use std::sync::Arc;
use crewforge_core::provider::Provider;
use tracing::info;
use crate::anthropic::AnthropicProvider;
use crate::breaker::{BreakerSettings, CircuitBreaker};
use crate::openai_compat::OpenAiCompatProvider;

/// A provider, the model to ask it for, and the breaker guarding it.
#[derive(Clone)]
pub struct ModelEndpoint {
    pub provider: Arc<dyn Provider>,
    pub model: String,
    pub breaker: Arc<CircuitBreaker>,
}

impl ModelEndpoint {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            breaker,
        }
    }

    /// Same provider and breaker, different model.
    pub fn with_model(&self, model: impl Into<String>) -> Self {
        Self {
            provider: self.provider.clone(),
            model: model.into(),
            breaker: self.breaker.clone(),
        }
    }
}

impl std::fmt::Debug for ModelEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelEndpoint")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("breaker", &self.breaker.state())
            .finish()
    }
}

/// Routes LLM requests to the correct provider.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    breakers: HashMap<String, Arc<CircuitBreaker>>,
    settings: BreakerSettings,
    primary: Option<(String, String)>,
    fallback: Option<(String, String)>,
}

impl ProviderRouter {
    /// Create an empty router. Breakers created by `register` use `settings`.
    pub fn new(settings: BreakerSettings) -> Self {
        Self {
            providers: HashMap::new(),
            breakers: HashMap::new(),
            settings,
            primary: None,
            fallback: None,
        }
    }

    /// Register a provider and give it a breaker of its own.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        let name = name.into();
        self.breakers
            .entry(name.clone())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(name.clone(), self.settings)));
        self.providers.insert(name, provider);
    }

    pub fn set_primary(&mut self, provider: impl Into<String>, model: impl Into<String>) {
        self.primary = Some((provider.into(), model.into()));
    }

    pub fn set_fallback(&mut self, provider: impl Into<String>, model: impl Into<String>) {
        self.fallback = Some((provider.into(), model.into()));
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// The breaker guarding a provider.
    pub fn breaker(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).cloned()
    }

    /// Endpoint for an explicit provider/model pair.
    pub fn endpoint(&self, provider: &str, model: &str) -> Option<ModelEndpoint> {
        Some(ModelEndpoint::new(self.get(provider)?, model, self.breaker(provider)?))
    }

    /// The primary endpoint.
    pub fn primary(&self) -> Option<ModelEndpoint> {
        let (provider, model) = self.primary.as_ref()?;
        self.endpoint(provider, model)
    }

    /// The fallback endpoint, if one is configured and registered.
    pub fn fallback(&self) -> Option<ModelEndpoint> {
        let (provider, model) = self.fallback.as_ref()?;
        self.endpoint(provider, model)
    }

    /// List all registered provider names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Build a provider for `name`, native for Anthropic and OpenAI-compatible otherwise.
fn build_provider(name: &str, api_key: &str, api_url: Option<&str>) -> Arc<dyn Provider> {
    if name == "anthropic" {
        let mut p = AnthropicProvider::new(api_key);
        if let Some(url) = api_url {
            p = p.with_base_url(url);
        }
        Arc::new(p)
    } else {
        let base_url = api_url.map(String::from).unwrap_or_else(|| default_base_url(name));
        Arc::new(OpenAiCompatProvider::new(name, base_url, api_key))
    }
}

/// Build providers, breakers, and the primary/fallback routes from configuration.
pub fn build_from_config(config: &crewforge_config::AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(BreakerSettings::from(&config.breaker));

    for (name, provider_config) in &config.providers {
        let api_key = config.api_key_for(name).unwrap_or_default();
        router.register(
            name.clone(),
            build_provider(name, &api_key, provider_config.api_url.as_deref()),
        );
    }

    // Ensure the default provider exists (even if not explicitly configured)
    if router.get(&config.default_provider).is_none() {
        let api_key = config.api_key_for(&config.default_provider).unwrap_or_default();
        router.register(
            config.default_provider.clone(),
            build_provider(&config.default_provider, &api_key, None),
        );
    }

    let primary_model = config
        .providers
        .get(&config.default_provider)
        .and_then(|p| p.default_model.clone())
        .unwrap_or_else(|| config.default_model.clone());
    router.set_primary(config.default_provider.clone(), primary_model);

    if config.fallback.enabled {
        let name = &config.fallback.provider;
        if router.get(name).is_none() {
            match config.api_key_for(name) {
                Some(key) => router.register(name.clone(), build_provider(name, &key, None)),
                None => info!(
                    provider = %name,
                    "No API key for fallback provider, fallback disabled"
                ),
            }
        }
        if router.get(name).is_some() {
            router.set_fallback(name.clone(), config.fallback.model.clone());
        }
    }

    router
}

/// Get the default base URL for well-known OpenAI-compatible providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crewforge_config::{AppConfig, ProviderConfig};

    #[test]
    fn router_register_and_lookup() {
        let mut router = ProviderRouter::new(BreakerSettings::default());
        router.register("openai", Arc::new(OpenAiCompatProvider::openai("sk-test")));
        router.set_primary("openai", "gpt-4o");

        assert!(router.get("openai").is_some());
        assert!(router.get("nonexistent").is_none());
        let primary = router.primary().unwrap();
        assert_eq!(primary.model, "gpt-4o");
        assert_eq!(primary.breaker.service(), "openai");
        assert!(router.fallback().is_none());
    }

    #[test]
    fn endpoints_for_same_provider_share_breaker() {
        let mut router = ProviderRouter::new(BreakerSettings::default());
        router.register("openai", Arc::new(OpenAiCompatProvider::openai("sk-test")));
        let a = router.endpoint("openai", "gpt-4o").unwrap();
        let b = a.with_model("gpt-4o-mini");
        assert!(Arc::ptr_eq(&a.breaker, &b.breaker));
        assert_eq!(b.model, "gpt-4o-mini");
    }

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("openrouter").contains("openrouter.ai"));
        assert!(default_base_url("openai").contains("api.openai.com"));
        assert!(default_base_url("ollama").contains("localhost:11434"));
    }

    #[test]
    fn build_from_default_config() {
        let config = AppConfig::default();
        let router = build_from_config(&config);
        let primary = router.primary().unwrap();
        assert_eq!(primary.provider.name(), "openai");
        assert_eq!(primary.model, "gpt-4o");
    }

    #[test]
    fn fallback_registered_when_key_present() {
        let mut config = AppConfig::default();
        config.providers.insert(
            "anthropic".into(),
            ProviderConfig { api_key: Some("sk-ant".into()), ..Default::default() },
        );
        let router = build_from_config(&config);
        let fallback = router.fallback().unwrap();
        assert_eq!(fallback.provider.name(), "anthropic");
        assert_eq!(fallback.model, "claude-3-5-sonnet-20241022");
        assert!(!Arc::ptr_eq(&fallback.breaker, &router.primary().unwrap().breaker));
    }

    #[test]
    fn fallback_disabled_flag_respected() {
        let mut config = AppConfig::default();
        config.fallback.enabled = false;
        config.providers.insert(
            "anthropic".into(),
            ProviderConfig { api_key: Some("sk-ant".into()), ..Default::default() },
        );
        assert!(build_from_config(&config).fallback().is_none());
    }
}
