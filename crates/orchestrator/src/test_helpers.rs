//! Stub providers for orchestrator tests.

use async_trait::async_trait;
use crewforge_core::error::ProviderError;
use crewforge_core::message::Message;
use crewforge_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use crewforge_providers::{BreakerSettings, CircuitBreaker, ModelEndpoint};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Answers every request with the same text (10 in, 5 out tokens).
pub struct ConstantProvider {
    text: String,
    calls: AtomicUsize,
}

impl ConstantProvider {
    pub fn new(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: text.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for ConstantProvider {
    fn name(&self) -> &str {
        "constant"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ProviderResponse {
            message: Message::assistant(self.text.clone()),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: request.model,
            metadata: serde_json::Map::new(),
        })
    }
}

/// Fails every request.
pub struct DownProvider;

#[async_trait]
impl Provider for DownProvider {
    fn name(&self) -> &str {
        "down"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::Network("connection refused".into()))
    }
}

/// An endpoint whose breaker never opens during a test.
pub fn endpoint(provider: Arc<dyn Provider>, model: &str) -> ModelEndpoint {
    let settings = BreakerSettings {
        failure_threshold: 100,
        ..BreakerSettings::default()
    };
    let breaker = Arc::new(CircuitBreaker::new(format!("stub-{model}"), settings));
    ModelEndpoint::new(provider, model, breaker)
}
