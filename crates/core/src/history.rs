//! Mid-term history: a durable, append-only log of crew runs.
//!
//! Every completed run and each agent interaction inside it are recorded for
//! audit and analytics. Write failures are logged by callers and never fail a
//! live run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::agent::ExecutionResult;
use crate::crew::{CrewExecutionResult, CrewSpec, ProcessMode};
use crate::error::HistoryError;

/// One completed crew run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub client_id: String,
    pub crew_id: String,
    pub crew_name: String,
    /// Demand type or template the crew was built from
    pub crew_type: String,
    pub process: ProcessMode,
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub failed_tasks: u32,
    pub final_output: String,
    pub total_tokens: u64,
    pub total_time_ms: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_context: Option<String>,
    /// Caller parameters (topic, objective, ...)
    #[serde(default)]
    pub params: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl RunRecord {
    pub fn from_crew_result(
        client_id: &str,
        crew: &CrewSpec,
        crew_type: &str,
        result: &CrewExecutionResult,
    ) -> Self {
        let failed = result.task_results.iter().filter(|r| r.is_failure()).count() as u32;
        Self {
            id: Uuid::new_v4().to_string(),
            client_id: client_id.to_string(),
            crew_id: crew.id.clone(),
            crew_name: crew.name.clone(),
            crew_type: crew_type.to_string(),
            process: crew.process,
            total_tasks: result.task_results.len() as u32,
            completed_tasks: result.task_results.len() as u32 - failed,
            failed_tasks: failed,
            final_output: result.final_output.clone(),
            total_tokens: result.total_tokens.total,
            total_time_ms: result.total_time_ms,
            success: result.success,
            error: result.error.clone(),
            initial_context: None,
            params: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    pub fn with_initial_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        if !context.is_empty() {
            self.initial_context = Some(context);
        }
        self
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }
}

/// One agent execution inside a recorded run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInteraction {
    /// Filled in by the store on append
    #[serde(default)]
    pub run_id: String,
    pub client_id: String,
    pub agent_id: String,
    pub agent_name: String,
    pub output: String,
    pub tokens_used: u64,
    pub execution_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection_confidence: Option<f32>,
    pub was_corrected: bool,
    pub fallback_used: bool,
    #[serde(default)]
    pub tools_called: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AgentInteraction {
    pub fn from_result(client_id: &str, result: &ExecutionResult) -> Self {
        Self {
            run_id: String::new(),
            client_id: client_id.to_string(),
            agent_id: result.agent_id.clone(),
            agent_name: result.agent_name.clone(),
            output: result.output.clone(),
            tokens_used: result.token_usage.total,
            execution_time_ms: result.execution_time_ms,
            reflection_score: result.reflection.as_ref().map(|r| r.score),
            reflection_confidence: result.reflection.as_ref().map(|r| r.confidence),
            was_corrected: result.corrected,
            fallback_used: result.fallback_used,
            tools_called: result.tools_called.clone(),
            error: result.error.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Aggregated agent statistics over a set of interactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPerformance {
    pub total_interactions: usize,
    pub avg_reflection_score: f64,
    pub avg_confidence: f64,
    /// Percent of interactions that were self-corrected
    pub correction_rate: f64,
    /// Percent of interactions served by the fallback model
    pub fallback_rate: f64,
    pub avg_tokens_used: f64,
    pub avg_execution_time_ms: f64,
}

impl AgentPerformance {
    /// `None` for an empty slice. Missing reflection scores count as zero.
    pub fn from_interactions(interactions: &[AgentInteraction]) -> Option<Self> {
        if interactions.is_empty() {
            return None;
        }
        let n = interactions.len() as f64;
        let avg =
            |f: &dyn Fn(&AgentInteraction) -> f64| interactions.iter().map(f).sum::<f64>() / n;
        let rate = |f: &dyn Fn(&AgentInteraction) -> bool| {
            interactions.iter().filter(|i| f(i)).count() as f64 / n * 100.0
        };

        Some(Self {
            total_interactions: interactions.len(),
            avg_reflection_score: avg(&|i| i.reflection_score.unwrap_or(0.0) as f64),
            avg_confidence: avg(&|i| i.reflection_confidence.unwrap_or(0.0) as f64),
            correction_rate: rate(&|i| i.was_corrected),
            fallback_rate: rate(&|i| i.fallback_used),
            avg_tokens_used: avg(&|i| i.tokens_used as f64),
            avg_execution_time_ms: avg(&|i| i.execution_time_ms as f64),
        })
    }
}

/// The mid-term history contract.
///
/// Implementations: SQLite (sqlx), in-memory, no-op.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Append a run. Returns the stored run id.
    async fn append_run(&self, run: &RunRecord) -> Result<String, HistoryError>;

    /// Most recent runs for a client, newest first.
    async fn list_runs(
        &self,
        client_id: &str,
        limit: usize,
    ) -> Result<Vec<RunRecord>, HistoryError>;

    /// Attach per-agent interactions to a stored run.
    async fn append_agent_interactions(
        &self,
        run_id: &str,
        interactions: &[AgentInteraction],
    ) -> Result<(), HistoryError>;

    /// Most recent successful runs of one crew type, newest first.
    async fn successful_runs(
        &self,
        client_id: &str,
        crew_type: &str,
        limit: usize,
    ) -> Result<Vec<RunRecord>, HistoryError>;

    /// Runs whose output or topic contains `term` (case-insensitive), newest first.
    async fn search_runs(
        &self,
        client_id: &str,
        term: &str,
        limit: usize,
    ) -> Result<Vec<RunRecord>, HistoryError>;

    /// Interactions for a client, optionally narrowed to one agent, newest first.
    async fn agent_interactions(
        &self,
        client_id: &str,
        agent_id: Option<&str>,
    ) -> Result<Vec<AgentInteraction>, HistoryError>;

    /// Remove runs (and their interactions) older than `days`. Returns runs removed.
    async fn delete_older_than(&self, days: u32) -> Result<u64, HistoryError>;

    /// Aggregate statistics over `agent_interactions`.
    async fn agent_performance(
        &self,
        client_id: &str,
        agent_id: Option<&str>,
    ) -> Result<Option<AgentPerformance>, HistoryError> {
        let interactions = self.agent_interactions(client_id, agent_id).await?;
        Ok(AgentPerformance::from_interactions(&interactions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentSpec, ReflectionResult, TokenUsage};

    fn interaction(score: Option<f32>, corrected: bool, tokens: u64) -> AgentInteraction {
        let spec = AgentSpec::new("writer", "Writer", "Copywriter");
        let mut result = ExecutionResult::success(&spec, "text");
        result.reflection = score.map(|s| ReflectionResult {
            score: s,
            ..ReflectionResult::neutral()
        });
        result.corrected = corrected;
        result.token_usage = TokenUsage { input: 0, output: 0, total: tokens };
        AgentInteraction::from_result("client-1", &result)
    }

    #[test]
    fn performance_of_empty_set_is_none() {
        assert!(AgentPerformance::from_interactions(&[]).is_none());
    }

    #[test]
    fn performance_averages_and_rates() {
        let perf = AgentPerformance::from_interactions(&[
            interaction(Some(8.0), true, 100),
            interaction(None, false, 300),
        ])
        .unwrap();
        assert_eq!(perf.total_interactions, 2);
        assert!((perf.avg_reflection_score - 4.0).abs() < 1e-9);
        assert!((perf.correction_rate - 50.0).abs() < 1e-9);
        assert!(perf.fallback_rate.abs() < 1e-9);
        assert!((perf.avg_tokens_used - 200.0).abs() < 1e-9);
    }

    #[test]
    fn run_record_counts_failures() {
        let spec = AgentSpec::new("writer", "Writer", "Copywriter");
        let crew = CrewSpec::new("crew-1", "Instagram", ProcessMode::Sequential);
        let result = CrewExecutionResult {
            crew_id: "crew-1".into(),
            final_output: "out".into(),
            task_results: vec![
                ExecutionResult::success(&spec, "ok"),
                ExecutionResult::failure(&spec, "boom"),
            ],
            total_tokens: TokenUsage { input: 1, output: 1, total: 2 },
            total_time_ms: 10,
            success: false,
            error: Some("1 tasks failed".into()),
        };
        let run = RunRecord::from_crew_result("client-1", &crew, "instagram_post", &result)
            .with_initial_context("");
        assert_eq!(run.total_tasks, 2);
        assert_eq!(run.failed_tasks, 1);
        assert_eq!(run.completed_tasks, 1);
        assert_eq!(run.total_tokens, 2);
        assert!(run.initial_context.is_none());
    }
}
