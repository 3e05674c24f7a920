//! A task: one description and output contract bound to one agent.

use crewforge_core::agent::{AgentSpec, ExecutionResult};
use crewforge_core::crew::TaskSpec;
use crewforge_core::error::{Error, Result};
use std::sync::Arc;

use crate::agent::Agent;

pub struct Task {
    spec: TaskSpec,
    agent: Option<Arc<Agent>>,
    result: Option<ExecutionResult>,
}

impl Task {
    pub fn new(spec: TaskSpec) -> Self {
        Self {
            spec,
            agent: None,
            result: None,
        }
    }

    pub fn spec(&self) -> &TaskSpec {
        &self.spec
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn agent(&self) -> Option<&Arc<Agent>> {
        self.agent.as_ref()
    }

    pub fn assign_agent(&mut self, agent: Arc<Agent>) {
        self.agent = Some(agent);
    }

    /// The latest result, overwritten by every execution.
    pub fn result(&self) -> Option<&ExecutionResult> {
        self.result.as_ref()
    }

    pub(crate) fn set_result(&mut self, result: ExecutionResult) {
        self.result = Some(result);
    }

    /// Context handed to the agent: own context, caller context, then the
    /// output contract last.
    pub fn build_context(&self, additional: Option<&str>) -> String {
        let contract = format!("Expected output: {}", self.spec.expected_output);
        [self.spec.context.as_deref(), additional, Some(contract.as_str())]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Execute and store the result.
    pub async fn execute(&mut self, additional: Option<&str>) -> Result<ExecutionResult> {
        let result = self.run(additional).await?;
        self.result = Some(result.clone());
        Ok(result)
    }

    /// Execute without storing; lets a crew run a batch of tasks concurrently.
    pub(crate) async fn run(&self, additional: Option<&str>) -> Result<ExecutionResult> {
        let agent = self.agent.as_ref().ok_or_else(|| Error::Config {
            message: format!("Task '{}' has no agent assigned", self.spec.id),
        })?;
        let context = self.build_context(additional);
        Ok(agent.execute(&self.spec.description, Some(&context)).await)
    }

    /// A failed result standing in for a task that could not run at all.
    pub(crate) fn failed_result(&self, error: impl Into<String>) -> ExecutionResult {
        let agent_spec = match &self.agent {
            Some(agent) => agent.spec().clone(),
            None => AgentSpec::new(&self.spec.agent_id, &self.spec.agent_id, ""),
        };
        ExecutionResult::failure(&agent_spec, error)
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.spec.id)
            .field("agent", &self.spec.agent_id)
            .field("assigned", &self.agent.is_some())
            .field("done", &self.result.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;

    fn spec() -> TaskSpec {
        TaskSpec::new("t1", "Write the caption", "One caption under 200 chars", "copy")
    }

    #[tokio::test]
    async fn unassigned_task_is_a_config_error() {
        let mut task = Task::new(spec());
        let err = task.execute(None).await.unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("t1"));
        assert!(task.result().is_none());
    }

    #[test]
    fn context_order_puts_contract_last() {
        let task = Task::new(spec().with_context("Brand: Acme"));
        assert_eq!(
            task.build_context(Some("Previous work")),
            "Brand: Acme\n\nPrevious work\n\nExpected output: One caption under 200 chars"
        );
        assert_eq!(
            Task::new(spec()).build_context(None),
            "Expected output: One caption under 200 chars"
        );
    }

    #[tokio::test]
    async fn execute_stores_result() {
        let provider = std::sync::Arc::new(RecordingProvider::new(|_| Ok("caption".into())));
        let mut task = Task::new(spec());
        task.assign_agent(basic_agent("copy", "copywriter", provider.clone()));

        let result = task.execute(Some("ctx")).await.unwrap();
        assert_eq!(result.output, "caption");
        assert_eq!(task.result().unwrap().output, "caption");

        let user = &provider.user_messages()[0];
        assert!(user.starts_with("Write the caption"));
        assert!(user.ends_with("Expected output: One caption under 200 chars"));
    }

    #[test]
    fn failed_result_without_agent_uses_agent_id() {
        let task = Task::new(spec());
        let r = task.failed_result("no agent");
        assert_eq!(r.agent_id, "copy");
        assert_eq!(r.error.as_deref(), Some("no agent"));
    }
}
