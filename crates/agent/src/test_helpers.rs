//! Scripted providers and builders shared by the agent and crew tests.

use async_trait::async_trait;
use crewforge_core::agent::AgentSpec;
use crewforge_core::error::ProviderError;
use crewforge_core::message::{Message, Role};
use crewforge_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use crewforge_providers::{BreakerSettings, CircuitBreaker, ModelEndpoint};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

use crate::agent::{Agent, AgentSettings};

/// A text response with fixed token usage (10 in, 5 out).
pub fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
        metadata: serde_json::Map::new(),
    }
}

fn last_user(request: &ProviderRequest) -> String {
    request
        .messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.clone())
        .unwrap_or_default()
}

/// Returns scripted outcomes in order; panics when the script runs out.
pub struct SequentialMockProvider {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    calls: Mutex<usize>,
}

impl SequentialMockProvider {
    pub fn new(script: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(0),
        }
    }

    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        *self.calls.lock().unwrap() += 1;
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .expect("SequentialMockProvider: script exhausted");
        next.map(|text| text_response(&text))
    }
}

/// Echoes the last user message back, prefixed with `ECHO: `.
pub struct EchoProvider;

#[async_trait]
impl Provider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Ok(text_response(&format!("ECHO: {}", last_user(&request))))
    }
}

/// Always fails; records the instant of every call.
pub struct FailingProvider {
    calls: Mutex<Vec<Instant>>,
}

impl FailingProvider {
    pub fn new() -> Self {
        Self { calls: Mutex::new(Vec::new()) }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.calls.lock().unwrap().push(Instant::now());
        Err(ProviderError::Network("connection refused".into()))
    }
}

/// Records every request and answers with a function of it.
pub struct RecordingProvider {
    requests: Mutex<Vec<ProviderRequest>>,
    respond: Box<dyn Fn(&ProviderRequest) -> Result<String, ProviderError> + Send + Sync>,
}

impl RecordingProvider {
    pub fn new(
        respond: impl Fn(&ProviderRequest) -> Result<String, ProviderError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    /// Fails any request whose user message contains `needle`; echoes the rest.
    pub fn failing_on(needle: &'static str) -> Self {
        Self::new(move |req| {
            let user = last_user(req);
            if user.contains(needle) {
                Err(ProviderError::ApiError {
                    status_code: 500,
                    message: format!("refused: {needle}"),
                })
            } else {
                Ok(format!("ECHO: {user}"))
            }
        })
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn user_messages(&self) -> Vec<String> {
        self.requests().iter().map(last_user).collect()
    }
}

#[async_trait]
impl Provider for RecordingProvider {
    fn name(&self) -> &str {
        "recording"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let answer = (self.respond)(&request);
        self.requests.lock().unwrap().push(request);
        answer.map(|text| text_response(&text))
    }
}

/// An endpoint with its own breaker that will not trip during a test.
pub fn endpoint(provider: Arc<dyn Provider>) -> ModelEndpoint {
    let settings = BreakerSettings {
        failure_threshold: 100,
        ..BreakerSettings::default()
    };
    let breaker = Arc::new(CircuitBreaker::new(provider.name().to_string(), settings));
    ModelEndpoint::new(provider, "mock-model", breaker)
}

/// A plain agent: one attempt, no reflection, no memory.
pub fn basic_agent(id: &str, role: &str, provider: Arc<dyn Provider>) -> Arc<Agent> {
    let spec = AgentSpec::new(id, id.to_uppercase(), role).with_model("mock-model");
    Arc::new(Agent::new(spec, endpoint(provider)).with_settings(AgentSettings::basic()))
}
