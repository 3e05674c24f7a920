//! Task and crew definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::agent::{ExecutionResult, TokenUsage};

/// How a crew schedules its tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessMode {
    /// Registration order, one at a time, shared running context
    #[default]
    Sequential,
    /// Independent tasks in batches, then dependents one at a time
    Parallel,
    /// Manager plans, reviews every task, and summarizes
    Hierarchical,
}

impl fmt::Display for ProcessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
            Self::Hierarchical => "hierarchical",
        };
        f.write_str(s)
    }
}

impl FromStr for ProcessMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "parallel" => Ok(Self::Parallel),
            "hierarchical" => Ok(Self::Hierarchical),
            other => Err(format!("unknown process mode: {other}")),
        }
    }
}

/// One unit of work bound to one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Unique within a crew
    pub id: String,
    pub description: String,
    /// The output contract, restated as the last line of the agent's context
    pub expected_output: String,
    /// Id of the owning agent
    pub agent_id: String,
    /// Fixed context, placed before any caller-supplied context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Ids of tasks that must complete first (parallel mode only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

impl TaskSpec {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        expected_output: impl Into<String>,
        agent_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            expected_output: expected_output.into(),
            agent_id: agent_id.into(),
            context: None,
            dependencies: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn depends_on(mut self, task_id: impl Into<String>) -> Self {
        self.dependencies.push(task_id.into());
        self
    }
}

/// Crew identity and scheduling mode. Agents and tasks live on the runtime crew.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewSpec {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub process: ProcessMode,
}

impl CrewSpec {
    pub fn new(id: impl Into<String>, name: impl Into<String>, process: ProcessMode) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            process,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// The outcome of a crew kickoff. Partial success is a normal outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewExecutionResult {
    pub crew_id: String,
    pub final_output: String,
    /// Every attempted execution in order, recoveries included
    pub task_results: Vec<ExecutionResult>,
    pub total_tokens: TokenUsage,
    pub total_time_ms: u64,
    /// True iff no task ended in an unrecovered failure
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_mode_parses_and_displays() {
        assert_eq!("Parallel".parse::<ProcessMode>().unwrap(), ProcessMode::Parallel);
        assert_eq!(ProcessMode::Hierarchical.to_string(), "hierarchical");
        assert!("round_robin".parse::<ProcessMode>().is_err());
        assert_eq!(ProcessMode::default(), ProcessMode::Sequential);
    }

    #[test]
    fn task_spec_builder_collects_dependencies() {
        let t = TaskSpec::new("c", "Combine", "One post", "writer")
            .depends_on("a")
            .depends_on("b")
            .with_context("brand voice");
        assert_eq!(t.dependencies, vec!["a", "b"]);
        assert_eq!(t.context.as_deref(), Some("brand voice"));
    }

    #[test]
    fn process_mode_serde_is_snake_case() {
        let json = serde_json::to_string(&ProcessMode::Hierarchical).unwrap();
        assert_eq!(json, "\"hierarchical\"");
    }
}
