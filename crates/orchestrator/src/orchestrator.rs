//! The top-level pipeline: one request in, one response out.
//!
//! ```text
//! orchestrate(req)
//!   1. brand context      best-effort, "" on failure
//!   2. analyze + build    DemandAnalyzer → CrewBuilder
//!   3. kickoff + parse    crew failure aborts with its error
//!   4. focus group        evaluate → average → (refine → evaluate)* up to the cap
//! ```
//!
//! [`MasterOrchestrator::orchestrate`] never fails; every error ends up in
//! the response.

use crewforge_agent::{AgentSettings, CrewSettings};
use crewforge_config::{AppConfig, OrchestratorConfig};
use crewforge_core::agent::TokenUsage;
use crewforge_core::crew::{CrewExecutionResult, CrewSpec};
use crewforge_core::error::{Error, Result};
use crewforge_core::history::{AgentInteraction, HistoryStore, RunRecord};
use crewforge_providers::build_from_config;
use crewforge_tools::{KnowledgeBase, StaticKnowledgeBase};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::brand::{BrandContextSource, NoBrandContext, StaticBrandContext};
use crate::builder::CrewBuilder;
use crate::demand::{DemandAnalysis, DemandAnalyzer};
use crate::focus_group::{
    FocusGroupResult, average_score, evaluations_from_results, refinement_task,
};
use crate::parser::{ParsedOutputs, parse_outputs};
use crate::registry::AgentRegistry;

/// Crew type recorded in history for focus-group runs.
const FOCUS_GROUP_CREW_TYPE: &str = "focus_group";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationRequest {
    pub client_id: String,
    pub demand_type: String,
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
    /// Overrides the template's focus-group flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_focus_group: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_focus_group_score: Option<f32>,
}

impl OrchestrationRequest {
    pub fn new(
        client_id: impl Into<String>,
        demand_type: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            demand_type: demand_type.into(),
            topic: topic.into(),
            objective: None,
            use_focus_group: None,
            min_focus_group_score: None,
        }
    }

    pub fn with_objective(mut self, objective: impl Into<String>) -> Self {
        self.objective = Some(objective.into());
        self
    }

    pub fn with_focus_group(mut self, enabled: bool) -> Self {
        self.use_focus_group = Some(enabled);
        self
    }

    pub fn with_min_score(mut self, score: f32) -> Self {
        self.min_focus_group_score = Some(score);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationResponse {
    pub success: bool,
    pub request_id: String,
    pub demand_type: String,
    pub crew_used: String,
    /// Agent ids, in template order
    pub agents_involved: Vec<String>,
    pub outputs: ParsedOutputs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_group_result: Option<FocusGroupResult>,
    pub execution_time_ms: u64,
    pub token_usage: TokenUsage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Focus-group loop knobs.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub max_iterations: u32,
    pub min_score: f32,
    pub refine_between_iterations: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from(&OrchestratorConfig::default())
    }
}

impl From<&OrchestratorConfig> for OrchestratorSettings {
    fn from(config: &OrchestratorConfig) -> Self {
        Self {
            max_iterations: config.focus_group_max_iterations.max(1),
            min_score: config.min_focus_group_score,
            refine_between_iterations: config.refine_between_iterations,
        }
    }
}

/// What a successful pipeline produced.
struct Delivery {
    outputs: ParsedOutputs,
    focus_group: Option<FocusGroupResult>,
}

pub struct MasterOrchestrator {
    builder: CrewBuilder,
    brand: Arc<dyn BrandContextSource>,
    history: Arc<dyn HistoryStore>,
    knowledge: Arc<dyn KnowledgeBase>,
    settings: OrchestratorSettings,
}

impl MasterOrchestrator {
    pub fn new(
        builder: CrewBuilder,
        brand: Arc<dyn BrandContextSource>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            builder,
            brand,
            history,
            knowledge: Arc::new(StaticKnowledgeBase::new()),
            settings: OrchestratorSettings::default(),
        }
    }

    pub fn with_knowledge(mut self, knowledge: Arc<dyn KnowledgeBase>) -> Self {
        self.knowledge = knowledge;
        self
    }

    pub fn with_settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Wire providers, memory, history and brand context from configuration.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let router = build_from_config(config);
        let primary = router.primary().ok_or_else(|| Error::Config {
            message: format!("Provider '{}' is not available", config.default_provider),
        })?;

        let memory = crewforge_memory::short_term_from_config(&config.memory);
        let history = crewforge_memory::history_from_config(config).await?;

        let builder = CrewBuilder::new(AgentRegistry::default(), primary)
            .with_fallback(router.fallback())
            .with_memory(memory)
            .with_agent_settings(AgentSettings::from(&config.agent))
            .with_crew_settings(CrewSettings::from(&config.crew));

        let (brand, knowledge): (Arc<dyn BrandContextSource>, Arc<dyn KnowledgeBase>) =
            match &config.orchestrator.brand_context_dir {
                Some(dir) => {
                    let knowledge = StaticKnowledgeBase::from_dir(dir).unwrap_or_else(|e| {
                        warn!(error = %e, "Knowledge directory unreadable, lookups will be empty");
                        StaticKnowledgeBase::new()
                    });
                    (Arc::new(StaticBrandContext::new(dir.clone())), Arc::new(knowledge))
                }
                None => (Arc::new(NoBrandContext), Arc::new(StaticKnowledgeBase::new())),
            };

        info!(history = history.name(), "Orchestrator ready");
        Ok(Self::new(builder, brand, history)
            .with_knowledge(knowledge)
            .with_settings(OrchestratorSettings::from(&config.orchestrator)))
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Run the full pipeline for one request. Never fails.
    pub async fn orchestrate(&self, request: OrchestrationRequest) -> OrchestrationResponse {
        let start = Instant::now();
        let request_id = Uuid::new_v4().to_string();
        let analysis = DemandAnalyzer::analyze(&request.demand_type);
        info!(
            request = %request_id,
            client = %request.client_id,
            demand = %request.demand_type,
            crew = %analysis.crew_template,
            "Orchestration started"
        );

        let mut tokens = TokenUsage::default();
        let outcome = self.pipeline(&request, &analysis, &mut tokens).await;
        let execution_time_ms = start.elapsed().as_millis() as u64;

        let mut response = OrchestrationResponse {
            success: false,
            request_id,
            demand_type: request.demand_type.clone(),
            crew_used: analysis.crew_template.clone(),
            agents_involved: involved(&analysis),
            outputs: ParsedOutputs::default(),
            focus_group_result: None,
            execution_time_ms,
            token_usage: tokens,
            error: None,
        };

        match outcome {
            Ok(delivery) => {
                info!(
                    request = %response.request_id,
                    elapsed_ms = execution_time_ms,
                    tokens = tokens.total,
                    "Orchestration finished"
                );
                response.success = true;
                response.outputs = delivery.outputs;
                response.focus_group_result = delivery.focus_group;
            }
            Err(e) => {
                error!(request = %response.request_id, error = %e, "Orchestration failed");
                response.error = Some(e.to_string());
            }
        }
        response
    }

    async fn pipeline(
        &self,
        request: &OrchestrationRequest,
        analysis: &DemandAnalysis,
        tokens: &mut TokenUsage,
    ) -> Result<Delivery> {
        let brand = match self.brand.brand_context(&request.client_id).await {
            Ok(text) => text,
            Err(e) => {
                warn!(client = %request.client_id, error = %e, "Brand context unavailable");
                String::new()
            }
        };
        let initial_context = (!brand.is_empty()).then(|| format!("## Brand context\n{brand}"));

        let tools = crewforge_tools::default_registry(
            self.knowledge.clone(),
            self.history.clone(),
            &request.client_id,
            &analysis.demand_type,
        );
        let mut crew = self
            .builder
            .build(analysis, &request.topic, request.objective.as_deref(), &tools)?;

        let result = crew.kickoff(initial_context.as_deref()).await;
        *tokens += result.total_tokens;
        let context = initial_context.as_deref();
        self.record(request, crew.spec(), &analysis.demand_type, &result, context).await;
        if !result.success {
            return Err(Error::Internal(
                result.error.unwrap_or_else(|| "Crew execution failed".into()),
            ));
        }

        let mut outputs = parse_outputs(&result.final_output);
        let use_focus_group = request.use_focus_group.unwrap_or(analysis.requires_focus_group);
        let focus_group = if use_focus_group {
            let min_score = request.min_focus_group_score.unwrap_or(self.settings.min_score);
            Some(self.focus_group(request, &mut outputs, min_score, tokens).await?)
        } else {
            None
        };

        Ok(Delivery { outputs, focus_group })
    }

    /// Evaluate until the average reaches `min_score` or the cap is hit.
    async fn focus_group(
        &self,
        request: &OrchestrationRequest,
        outputs: &mut ParsedOutputs,
        min_score: f32,
        tokens: &mut TokenUsage,
    ) -> Result<FocusGroupResult> {
        let max = self.settings.max_iterations.max(1);
        let mut result = FocusGroupResult {
            average_score: 0.0,
            passed: false,
            iterations: 0,
            evaluations: Vec::new(),
        };

        for iteration in 1..=max {
            let mut crew = self.builder.build_focus_group(&outputs.format_for_review())?;
            let run = crew.kickoff(None).await;
            *tokens += run.total_tokens;
            self.record(request, crew.spec(), FOCUS_GROUP_CREW_TYPE, &run, None).await;

            result.iterations = iteration;
            result.evaluations = evaluations_from_results(&run.task_results);
            result.average_score = average_score(&result.evaluations);
            info!(
                iteration,
                evaluations = result.evaluations.len(),
                average = result.average_score,
                min_score,
                "Focus group iteration"
            );

            if result.average_score >= min_score {
                result.passed = true;
                break;
            }
            if iteration < max && self.settings.refine_between_iterations {
                self.refine(outputs, &result, tokens).await?;
            }
        }

        if !result.passed {
            warn!(
                iterations = result.iterations,
                average = result.average_score,
                "Focus group did not pass"
            );
        }
        Ok(result)
    }

    async fn refine(
        &self,
        outputs: &mut ParsedOutputs,
        round: &FocusGroupResult,
        tokens: &mut TokenUsage,
    ) -> Result<()> {
        let refiner = self.builder.refiner()?;
        let task = refinement_task(outputs, &round.evaluations);
        let refined = refiner.execute(&task, None).await;
        *tokens += refined.token_usage;
        if refined.is_failure() || refined.output.trim().is_empty() {
            warn!(error = ?refined.error, "Refinement failed, keeping current copy");
        } else {
            debug!(chars = refined.output.len(), "Copy refined");
            outputs.copy = Some(refined.output);
        }
        Ok(())
    }

    /// Append a run and its interactions. Failures are logged only.
    async fn record(
        &self,
        request: &OrchestrationRequest,
        crew: &CrewSpec,
        crew_type: &str,
        result: &CrewExecutionResult,
        initial_context: Option<&str>,
    ) {
        let run = RunRecord::from_crew_result(&request.client_id, crew, crew_type, result)
            .with_initial_context(initial_context.unwrap_or_default())
            .with_params(serde_json::json!({
                "topic": request.topic,
                "objective": request.objective,
                "demandType": request.demand_type,
            }));

        let run_id = match self.history.append_run(&run).await {
            Ok(id) => id,
            Err(e) => {
                warn!(crew = %crew.id, error = %e, "Failed to record run");
                return;
            }
        };
        let interactions: Vec<AgentInteraction> = result
            .task_results
            .iter()
            .map(|r| AgentInteraction::from_result(&request.client_id, r))
            .collect();
        if let Err(e) = self.history.append_agent_interactions(&run_id, &interactions).await {
            warn!(run = %run_id, error = %e, "Failed to record agent interactions");
        }
    }
}

fn involved(analysis: &DemandAnalysis) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for id in &analysis.agents {
        if !ids.contains(id) {
            ids.push(id.clone());
        }
    }
    ids
}

impl std::fmt::Debug for MasterOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterOrchestrator")
            .field("builder", &self.builder)
            .field("history", &self.history.name())
            .field("settings", &self.settings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ConstantProvider, DownProvider, endpoint};
    use crewforge_core::provider::Provider;
    use crewforge_memory::InMemoryHistory;

    const APPROVAL: &str = r#"Avaliação: {"nota": 9, "veredicto": "aprovado"}"#;

    fn orchestrator(
        provider: Arc<dyn Provider>,
        history: Arc<InMemoryHistory>,
        min_score: f32,
    ) -> MasterOrchestrator {
        let builder = CrewBuilder::new(AgentRegistry::default(), endpoint(provider, "stub-model"))
            .with_agent_settings(AgentSettings::basic());
        MasterOrchestrator::new(builder, Arc::new(NoBrandContext), history).with_settings(
            OrchestratorSettings {
                max_iterations: 3,
                min_score,
                refine_between_iterations: true,
            },
        )
    }

    fn launch() -> OrchestrationRequest {
        OrchestrationRequest::new("acme", "instagram_post", "launch")
    }

    #[tokio::test]
    async fn unreachable_score_runs_every_iteration() {
        let provider = ConstantProvider::new(APPROVAL);
        let history = Arc::new(InMemoryHistory::new());
        let orch = orchestrator(provider.clone(), history.clone(), 10.0);

        let response = orch.orchestrate(launch()).await;

        assert!(response.success);
        let fg = response.focus_group_result.unwrap();
        assert_eq!(fg.iterations, 3);
        assert!(!fg.passed);
        assert_eq!(fg.evaluations.len(), 4);
        assert_eq!(fg.average_score, 9.0);
        // 4 crew tasks, 3 × 4 evaluations, 2 refinements
        assert_eq!(provider.call_count(), 4 + 12 + 2);
        // main crew + 3 focus-group runs
        assert_eq!(history.list_runs("acme", 10).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn reachable_score_stops_after_first_iteration() {
        let provider = ConstantProvider::new(APPROVAL);
        let orch = orchestrator(provider.clone(), Arc::new(InMemoryHistory::new()), 7.0);

        let response = orch.orchestrate(launch()).await;

        let fg = response.focus_group_result.unwrap();
        assert_eq!(fg.iterations, 1);
        assert!(fg.passed);
        assert!(fg.evaluations.iter().all(|e| e.score == 9.0));
        assert_eq!(fg.evaluations[0].persona_id, "persona_skeptic");
        assert_eq!(response.token_usage.total, 15 * 8);
    }

    #[tokio::test]
    async fn request_overrides_focus_group_settings() {
        let provider = ConstantProvider::new(APPROVAL);
        let orch = orchestrator(provider.clone(), Arc::new(InMemoryHistory::new()), 10.0);

        let skipped = orch
            .orchestrate(launch().with_focus_group(false))
            .await;
        assert!(skipped.focus_group_result.is_none());
        assert_eq!(provider.call_count(), 4);

        let lowered = orch
            .orchestrate(launch().with_min_score(8.0))
            .await;
        assert!(lowered.focus_group_result.unwrap().passed);
    }

    #[tokio::test]
    async fn response_metadata_follows_template() {
        let provider = ConstantProvider::new("plain text");
        let orch = orchestrator(provider, Arc::new(InMemoryHistory::new()), 7.0);

        let response = orch
            .orchestrate(
                OrchestrationRequest::new("acme", "blog_post", "remote work")
                    .with_objective("rank on search"),
            )
            .await;

        let analysis = DemandAnalyzer::analyze("blog_post");
        assert!(response.success);
        assert_eq!(response.demand_type, "blog_post");
        assert_eq!(response.crew_used, analysis.crew_template);
        assert_eq!(response.agents_involved, involved(&analysis));
        assert!(response.outputs.copy.is_some());
        assert!(Uuid::parse_str(&response.request_id).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn crew_failure_is_reported_not_raised() {
        let history = Arc::new(InMemoryHistory::new());
        let orch = orchestrator(Arc::new(DownProvider), history.clone(), 7.0);

        let response = orch.orchestrate(launch()).await;

        assert!(!response.success);
        assert!(response.outputs.is_empty());
        assert!(response.focus_group_result.is_none());
        assert!(response.error.unwrap().contains("tasks failed"));
        let runs = history.list_runs("acme", 10).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert!(!runs[0].success);
    }

    #[test]
    fn request_accepts_camel_case() {
        let json = r#"{"clientId": "acme", "demandType": "instagram_post",
            "topic": "x", "useFocusGroup": false}"#;
        let request: OrchestrationRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.client_id, "acme");
        assert_eq!(request.use_focus_group, Some(false));
        assert!(request.min_focus_group_score.is_none());
    }
}
