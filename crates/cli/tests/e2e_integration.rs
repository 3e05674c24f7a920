//! End-to-end tests for the CrewForge pipeline.
//!
//! These exercise the full path from an orchestration request to a parsed
//! response: demand analysis, crew building, tool lookups, crew execution,
//! focus-group validation, and history recording.

use std::sync::{Arc, Mutex};

use crewforge_agent::{Agent, AgentSettings, Crew, CrewSettings};
use crewforge_core::agent::AgentSpec;
use crewforge_core::crew::{CrewSpec, ProcessMode, TaskSpec};
use crewforge_core::error::ProviderError;
use crewforge_core::history::HistoryStore;
use crewforge_core::message::{Message, Role};
use crewforge_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use crewforge_memory::{InMemoryHistory, InProcessMemory, SqliteHistory};
use crewforge_orchestrator::{
    AgentRegistry, CrewBuilder, MasterOrchestrator, NoBrandContext, OrchestrationRequest,
    OrchestratorSettings, StaticBrandContext,
};
use crewforge_providers::{BreakerSettings, CircuitBreaker, ModelEndpoint};

// ── Stub providers ──────────────────────────────────────────────────

fn response(text: String) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "e2e".into(),
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

/// Echoes the last user message. Fails requests containing `needle`, if set.
struct EchoProvider {
    needle: Option<&'static str>,
    prompts: Mutex<Vec<String>>,
}

impl EchoProvider {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            needle: None,
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn failing_on(needle: &'static str) -> Arc<Self> {
        Arc::new(Self {
            needle: Some(needle),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for EchoProvider {
    fn name(&self) -> &str {
        "e2e_echo"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let user = last_user(&request);
        self.prompts.lock().unwrap().push(user.clone());
        if self.needle.is_some_and(|n| user.contains(n)) {
            return Err(ProviderError::ApiError {
                status_code: 500,
                message: "scripted failure".into(),
            });
        }
        Ok(response(format!("ECHO: {user}")))
    }
}

/// Fails the Instagram caption task until a recovery approach is in its prompt.
struct FlakyCaptionProvider;

#[async_trait::async_trait]
impl Provider for FlakyCaptionProvider {
    fn name(&self) -> &str {
        "e2e_flaky"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let user = last_user(&request);
        let is_caption = user.starts_with("Write the Instagram caption");
        if is_caption && !user.contains("Alternative approach:") {
            return Err(ProviderError::Network("down".into()));
        }
        Ok(response(format!("ECHO: {user}")))
    }
}

/// Always unreachable.
struct DownProvider;

#[async_trait::async_trait]
impl Provider for DownProvider {
    fn name(&self) -> &str {
        "e2e_down"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::Network("connection refused".into()))
    }
}

fn endpoint(provider: Arc<dyn Provider>, model: &str, failure_threshold: u32) -> ModelEndpoint {
    let breaker = CircuitBreaker::new(
        provider.name().to_string(),
        BreakerSettings {
            failure_threshold,
            ..BreakerSettings::default()
        },
    );
    ModelEndpoint::new(provider, model, Arc::new(breaker))
}

fn orchestrator(builder: CrewBuilder, history: Arc<dyn HistoryStore>) -> MasterOrchestrator {
    MasterOrchestrator::new(builder, Arc::new(NoBrandContext), history).with_settings(
        OrchestratorSettings {
            max_iterations: 3,
            min_score: 7.0,
            refine_between_iterations: true,
        },
    )
}

fn echo_builder(provider: Arc<dyn Provider>) -> CrewBuilder {
    CrewBuilder::new(AgentRegistry::default(), endpoint(provider, "echo-model", 100))
}

// ── E2E: orchestration ──────────────────────────────────────────────

#[tokio::test]
async fn e2e_instagram_post_with_echo_model() {
    let provider = EchoProvider::new();
    let builder = echo_builder(provider.clone())
        .with_memory(Arc::new(InProcessMemory::new()))
        .with_agent_settings(AgentSettings::basic());
    let orch = orchestrator(builder, Arc::new(InMemoryHistory::new()));

    let response = orch
        .orchestrate(OrchestrationRequest::new("acme", "instagram_post", "lançamento de produto"))
        .await;

    assert!(response.success, "error: {:?}", response.error);
    let copy = response.outputs.copy.as_deref().unwrap_or_default();
    assert!(!copy.trim().is_empty());
    assert!(copy.contains("lançamento de produto"));
    assert!(response.agents_involved.contains(&"strategist".to_string()));
    assert!(response.agents_involved.contains(&"copywriter_instagram".to_string()));
    assert_eq!(response.crew_used, "instagram_crew");

    let fg = response.focus_group_result.expect("instagram posts are validated");
    assert!((1..=3).contains(&fg.iterations));
    assert!(response.token_usage.total > 0);
}

#[tokio::test]
async fn e2e_history_is_recorded_in_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("history.db");
    let sqlite = SqliteHistory::new(&db.to_string_lossy()).await.unwrap();
    let history: Arc<dyn HistoryStore> = Arc::new(sqlite);

    let provider = EchoProvider::new();
    let builder = CrewBuilder::new(AgentRegistry::default(), endpoint(provider, "echo-model", 100))
        .with_agent_settings(AgentSettings::basic());
    let orch = orchestrator(builder, history.clone());

    let response = orch
        .orchestrate(
            OrchestrationRequest::new("acme", "blog_post", "remote work")
                .with_objective("rank on search")
                .with_focus_group(false),
        )
        .await;
    assert!(response.success);

    let runs = history.list_runs("acme", 10).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].crew_type, "blog_post");
    assert!(runs[0].success);
    assert_eq!(runs[0].params["topic"], "remote work");

    let found = history.search_runs("acme", "remote work", 10).await.unwrap();
    assert_eq!(found.len(), 1);

    let perf = history.agent_performance("acme", None).await.unwrap().unwrap();
    assert_eq!(perf.total_interactions as u32, runs[0].total_tasks);
}

#[tokio::test]
async fn e2e_brand_context_reaches_the_first_prompt() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("acme.md"), "Voice: warm, never use the word 'cheap'.").unwrap();

    let provider = EchoProvider::new();
    let builder = echo_builder(provider.clone())
        .with_agent_settings(AgentSettings::basic());
    let orch = MasterOrchestrator::new(
        builder,
        Arc::new(StaticBrandContext::new(dir.path())),
        Arc::new(InMemoryHistory::new()),
    );

    let response = orch
        .orchestrate(
            OrchestrationRequest::new("acme", "linkedin_post", "hiring").with_focus_group(false),
        )
        .await;

    assert!(response.success);
    let prompts = provider.prompts();
    assert!(prompts[0].contains("## Brand context"));
    assert!(prompts[0].contains("never use the word 'cheap'"));
}

#[tokio::test(start_paused = true)]
async fn e2e_primary_down_falls_back() {
    let primary = endpoint(Arc::new(DownProvider), "down-model", 2);
    let fallback = endpoint(EchoProvider::new(), "fallback-model", 100);
    let builder = CrewBuilder::new(AgentRegistry::default(), primary.clone())
        .with_fallback(Some(fallback))
        .with_agent_settings(AgentSettings {
            max_retries: 2,
            ..AgentSettings::basic()
        });
    let history = Arc::new(InMemoryHistory::new());
    let orch = orchestrator(builder, history.clone());

    let response = orch
        .orchestrate(
            OrchestrationRequest::new("acme", "email_marketing", "black friday")
                .with_focus_group(false),
        )
        .await;

    assert!(response.success, "error: {:?}", response.error);
    assert_eq!(primary.breaker.state(), crewforge_providers::CircuitState::Open);
    let perf = history.agent_performance("acme", None).await.unwrap().unwrap();
    assert_eq!(perf.fallback_rate, 100.0);
}

#[tokio::test]
async fn e2e_recovered_caption_is_the_delivered_copy() {
    let builder = CrewBuilder::new(
        AgentRegistry::default(),
        endpoint(Arc::new(FlakyCaptionProvider), "flaky-model", 100),
    )
    .with_agent_settings(AgentSettings::basic());
    let history = Arc::new(InMemoryHistory::new());
    let orch = orchestrator(builder, history.clone());

    let response = orch
        .orchestrate(
            OrchestrationRequest::new("acme", "instagram_post", "lançamento de produto")
                .with_focus_group(false),
        )
        .await;

    assert!(response.success, "error: {:?}", response.error);
    let copy = response.outputs.copy.as_deref().unwrap_or_default();
    assert!(!copy.contains("Execution failed"), "copy: {copy}");
    assert!(copy.contains("Alternative approach:"));

    let runs = history.list_runs("acme", 10).await.unwrap();
    assert_eq!(runs[0].failed_tasks, 0);
}

#[tokio::test]
async fn e2e_unknown_demand_uses_generic_template() {
    let builder = echo_builder(EchoProvider::new())
        .with_agent_settings(AgentSettings::basic());
    let orch = orchestrator(builder, Arc::new(InMemoryHistory::new()));

    let response = orch
        .orchestrate(
            OrchestrationRequest::new("acme", "tiktok_dance", "summer").with_focus_group(false),
        )
        .await;

    assert!(response.success);
    assert_eq!(response.demand_type, "tiktok_dance");
    assert!(!response.agents_involved.is_empty());
}

// ── E2E: crew scheduling through the public API ─────────────────────

fn agent(id: &str, provider: Arc<dyn Provider>) -> Arc<Agent> {
    let spec = AgentSpec::new(id, id.to_uppercase(), "writer").with_model("echo-model");
    let agent = Agent::new(spec, endpoint(provider, "echo-model", 100));
    Arc::new(agent.with_settings(AgentSettings::basic()))
}

#[tokio::test]
async fn e2e_partial_failure_is_reported() {
    let provider = EchoProvider::failing_on("SECOND");
    let spec = CrewSpec::new("crew-1", "Partial", ProcessMode::Sequential);
    let mut crew = Crew::new(spec).with_settings(CrewSettings {
        dynamic_recovery: false,
        ..CrewSettings::default()
    });
    crew.add_agent(agent("writer", provider.clone()));
    crew.add_task(TaskSpec::new("t1", "FIRST draft", "text", "writer"));
    crew.add_task(TaskSpec::new("t2", "SECOND draft", "text", "writer"));
    crew.add_task(TaskSpec::new("t3", "THIRD draft", "text", "writer"));

    let result = crew.kickoff(None).await;

    assert!(!result.success);
    assert_eq!(result.task_results.len(), 3);
    assert!(result.task_results[1].error.as_deref().is_some_and(|e| !e.is_empty()));
    assert!(!result.task_results[2].is_failure());
    assert_eq!(result.error.as_deref(), Some("1 tasks failed"));
}

#[tokio::test]
async fn e2e_sequential_output_is_deterministic() {
    async fn run() -> String {
        let provider = EchoProvider::new();
        let mut crew = Crew::new(CrewSpec::new("crew-1", "Pair", ProcessMode::Sequential));
        crew.add_agent(agent("a", provider.clone()));
        crew.add_agent(agent("b", provider));
        crew.add_task(TaskSpec::new("t1", "Outline the launch", "outline", "a"));
        crew.add_task(TaskSpec::new("t2", "Write the launch post", "post", "b"));
        let result = crew.kickoff(Some("Product: Falcon")).await;
        assert!(result.success);
        assert!(result.task_results[1].output.contains("Outline the launch"));
        result.final_output
    }

    assert_eq!(run().await, run().await);
}
