//! Crews: a set of agents and tasks run under one process strategy.
//!
//! ```text
//! kickoff(ctx)
//!   ├─ snapshot ─────────────▶ crew:{id}:context (short-term memory)
//!   ├─ Sequential    tasks in order, context grows after each
//!   ├─ Parallel      independent batches ⇉ fan-in ⇉ dependents in order
//!   └─ Hierarchical  plan → (execute → review → redo?)* → summary
//!   └─ compile ──────────────▶ CrewExecutionResult
//! ```

mod hierarchical;
mod parallel;
mod sequential;

use crewforge_config::CrewConfig;
use crewforge_core::agent::{ExecutionResult, TokenUsage};
use crewforge_core::crew::{CrewExecutionResult, CrewSpec, ProcessMode, TaskSpec};
use crewforge_core::memory::{ShortTermMemory, keys};
use serde::Serialize;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::agent::Agent;
use crate::review::ReviewPolicy;
use crate::task::Task;

/// Delimiter between task sections in the compiled output.
pub const SECTION_DELIMITER: &str = "\n\n---\n\n";

/// Scheduling knobs for a [`Crew`].
#[derive(Debug, Clone)]
pub struct CrewSettings {
    pub max_parallel_tasks: usize,
    pub dynamic_recovery: bool,
    pub context_ttl_secs: u64,
}

impl Default for CrewSettings {
    fn default() -> Self {
        Self::from(&CrewConfig::default())
    }
}

impl From<&CrewConfig> for CrewSettings {
    fn from(config: &CrewConfig) -> Self {
        Self {
            max_parallel_tasks: config.max_parallel_tasks.max(1),
            dynamic_recovery: config.dynamic_recovery,
            context_ttl_secs: config.crew_context_ttl_secs,
        }
    }
}

/// Counts from the last kickoff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CrewStats {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// Percentage of tasks whose latest result succeeded
    pub success_rate: f64,
}

/// What a strategy hands back to `kickoff`.
#[derive(Default)]
pub(crate) struct Outcome {
    /// Results in the order they belong in `task_results`
    results: Vec<ExecutionResult>,
    /// Tokens spent on calls that are not task results (plans, reviews, analyses)
    overhead: TokenUsage,
    /// Tasks that ended in an unrecovered failure
    failed: usize,
}

pub struct Crew {
    spec: CrewSpec,
    agents: Vec<Arc<Agent>>,
    tasks: Vec<Task>,
    settings: CrewSettings,
    memory: Option<Arc<dyn ShortTermMemory>>,
    review: ReviewPolicy,
}

impl Crew {
    pub fn new(spec: CrewSpec) -> Self {
        Self {
            spec,
            agents: Vec::new(),
            tasks: Vec::new(),
            settings: CrewSettings::default(),
            memory: None,
            review: ReviewPolicy::default(),
        }
    }

    pub fn with_settings(mut self, settings: CrewSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_memory(mut self, memory: Arc<dyn ShortTermMemory>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_review_policy(mut self, review: ReviewPolicy) -> Self {
        self.review = review;
        self
    }

    pub fn spec(&self) -> &CrewSpec {
        &self.spec
    }

    /// Register an agent. Tasks added later for its id are bound to it.
    pub fn add_agent(&mut self, agent: Arc<Agent>) {
        let id = agent.id().to_string();
        let unbound = self
            .tasks
            .iter_mut()
            .filter(|t| t.spec().agent_id == id && t.agent().is_none());
        for task in unbound {
            task.assign_agent(agent.clone());
        }
        self.agents.push(agent);
    }

    /// Register a task, binding it to its agent when that agent is known.
    ///
    /// A task whose agent is never registered fails at execution time with
    /// a configuration error recorded on its result.
    pub fn add_task(&mut self, spec: TaskSpec) {
        let mut task = Task::new(spec);
        if let Some(agent) = self.agent(&task.spec().agent_id) {
            task.assign_agent(agent);
        }
        self.tasks.push(task);
    }

    pub fn agent(&self, id: &str) -> Option<Arc<Agent>> {
        self.agents.iter().find(|a| a.id() == id).cloned()
    }

    pub fn agents(&self) -> &[Arc<Agent>] {
        &self.agents
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Run every task under the crew's process mode. Never fails.
    pub async fn kickoff(&mut self, initial_context: Option<&str>) -> CrewExecutionResult {
        let start = Instant::now();
        let context = initial_context.unwrap_or_default().to_string();
        info!(
            crew = %self.spec.id,
            process = %self.spec.process,
            tasks = self.tasks.len(),
            agents = self.agents.len(),
            "Crew kickoff"
        );
        self.store_snapshot(&context).await;

        let outcome = match self.spec.process {
            ProcessMode::Sequential => self.run_sequential(context).await,
            ProcessMode::Parallel => self.run_parallel(context).await,
            ProcessMode::Hierarchical => self.run_hierarchical(context).await,
        };

        let mut total_tokens = outcome.overhead;
        for r in &outcome.results {
            total_tokens += r.token_usage;
        }
        let success = outcome.failed == 0;
        let error = (!success).then(|| format!("{} tasks failed", outcome.failed));
        let total_time_ms = start.elapsed().as_millis() as u64;

        if success {
            info!(
                crew = %self.spec.id,
                tokens = total_tokens.total,
                elapsed_ms = total_time_ms,
                "Crew finished"
            );
        } else {
            warn!(
                crew = %self.spec.id,
                failed = outcome.failed,
                elapsed_ms = total_time_ms,
                "Crew finished with failures"
            );
        }

        CrewExecutionResult {
            crew_id: self.spec.id.clone(),
            final_output: self.compile(&outcome.results),
            task_results: outcome.results,
            total_tokens,
            total_time_ms,
            success,
            error,
        }
    }

    /// Counts over each task's latest result.
    pub fn stats(&self) -> CrewStats {
        let total = self.tasks.len();
        let completed = self
            .tasks
            .iter()
            .filter(|t| t.result().is_some_and(|r| !r.is_failure()))
            .count();
        let failed = total - completed;
        let success_rate = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64 * 100.0
        };
        CrewStats {
            total,
            completed,
            failed,
            success_rate,
        }
    }

    fn compile(&self, results: &[ExecutionResult]) -> String {
        let mut out = format!("# {}\n\n", self.spec.name);
        if !self.spec.description.is_empty() {
            out.push_str(&format!("{}\n\n", self.spec.description));
        }
        let sections: Vec<String> = results
            .iter()
            .enumerate()
            .map(|(i, r)| format!("### {}. {}\n{}", i + 1, r.agent_name, r.output))
            .collect();
        out.push_str(&sections.join(SECTION_DELIMITER));
        out
    }

    async fn store_snapshot(&self, context: &str) {
        let Some(memory) = &self.memory else {
            return;
        };
        let tasks: Vec<_> = self
            .tasks
            .iter()
            .map(|t| serde_json::json!({ "id": t.id(), "description": t.spec().description }))
            .collect();
        let snapshot = serde_json::json!({
            "crewId": self.spec.id,
            "crewName": self.spec.name,
            "process": self.spec.process,
            "tasks": tasks,
            "context": context,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        if let Err(e) = memory
            .set(&keys::crew_context(&self.spec.id), snapshot, self.settings.context_ttl_secs)
            .await
        {
            warn!(crew = %self.spec.id, error = %e, "Crew snapshot write failed");
        }
    }

    /// Run task `index` and store its result; a missing agent becomes a failed result.
    async fn execute_task(&mut self, index: usize, context: &str) -> ExecutionResult {
        let task = &mut self.tasks[index];
        match task.execute(Some(context)).await {
            Ok(result) => result,
            Err(e) => {
                warn!(task = %task.id(), error = %e, "Task could not run");
                let result = task.failed_result(e.to_string());
                task.set_result(result.clone());
                result
            }
        }
    }
}

/// Append a finished result to the running crew context.
fn fold_into_context(context: &mut String, task_id: &str, result: &ExecutionResult) {
    if !context.is_empty() {
        context.push_str("\n\n");
    }
    context.push_str(&format!("## {} ({})\n{}", result.agent_name, task_id, result.output));
}

impl std::fmt::Debug for Crew {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crew")
            .field("id", &self.spec.id)
            .field("process", &self.spec.process)
            .field("agents", &self.agents.iter().map(|a| a.id()).collect::<Vec<_>>())
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use crewforge_memory::InProcessMemory;

    fn crew(process: ProcessMode) -> Crew {
        Crew::new(CrewSpec::new("crew-1", "Launch crew", process))
    }

    #[tokio::test]
    async fn late_agent_registration_binds_tasks() {
        let mut c = crew(ProcessMode::Sequential);
        c.add_task(TaskSpec::new("t1", "Do it", "done", "writer"));
        assert!(c.tasks()[0].agent().is_none());
        c.add_agent(basic_agent("writer", "writer", Arc::new(EchoProvider)));
        assert!(c.tasks()[0].agent().is_some());
    }

    #[tokio::test]
    async fn missing_agent_is_recorded_not_raised() {
        let mut c = crew(ProcessMode::Sequential).with_settings(CrewSettings {
            dynamic_recovery: false,
            ..CrewSettings::default()
        });
        c.add_task(TaskSpec::new("t1", "Do it", "done", "ghost"));
        let result = c.kickoff(None).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("1 tasks failed"));
        assert!(result.task_results[0].error.as_deref().unwrap().contains("no agent assigned"));
    }

    #[tokio::test]
    async fn compiled_output_has_sections() {
        let provider = Arc::new(SequentialMockProvider::texts(&["strategy text", "caption text"]));
        let mut c = crew(ProcessMode::Sequential).with_settings(CrewSettings {
            dynamic_recovery: false,
            ..CrewSettings::default()
        });
        c.add_agent(basic_agent("strategist", "strategist", provider.clone()));
        c.add_agent(basic_agent("copy", "copywriter", provider));
        c.add_task(TaskSpec::new("t1", "Plan", "plan", "strategist"));
        c.add_task(TaskSpec::new("t2", "Write", "caption", "copy"));

        let result = c.kickoff(None).await;
        assert_eq!(
            result.final_output,
            "# Launch crew\n\n### 1. STRATEGIST\nstrategy text\n\n---\n\n### 2. COPY\ncaption text"
        );
        assert_eq!(result.total_tokens.total, 30);
        let stats = c.stats();
        assert_eq!((stats.total, stats.completed, stats.failed), (2, 2, 0));
        assert_eq!(stats.success_rate, 100.0);
    }

    #[tokio::test]
    async fn kickoff_stores_snapshot() {
        let memory = Arc::new(InProcessMemory::new());
        let mut c = crew(ProcessMode::Parallel).with_memory(memory.clone());
        c.add_agent(basic_agent("a", "writer", Arc::new(EchoProvider)));
        c.add_task(TaskSpec::new("t1", "Describe the launch", "text", "a"));
        c.kickoff(Some("brand notes")).await;

        let snapshot = memory.get("crew:crew-1:context").await.unwrap().unwrap();
        assert_eq!(snapshot["crewName"], "Launch crew");
        assert_eq!(snapshot["process"], "parallel");
        assert_eq!(snapshot["tasks"][0]["description"], "Describe the launch");
        assert_eq!(snapshot["context"], "brand notes");
    }

    #[test]
    fn stats_before_kickoff() {
        let mut c = crew(ProcessMode::Sequential);
        c.add_task(TaskSpec::new("t1", "x", "y", "a"));
        let stats = c.stats();
        assert_eq!((stats.total, stats.completed, stats.failed), (1, 0, 1));
        assert_eq!(crew(ProcessMode::Sequential).stats().success_rate, 0.0);
    }
}
