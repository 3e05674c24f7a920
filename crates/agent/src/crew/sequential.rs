//! Sequential process: registration order, one running context.

use crewforge_core::agent::ExecutionResult;
use tracing::{info, warn};

use super::{Crew, Outcome, fold_into_context};

impl Crew {
    pub(super) async fn run_sequential(&mut self, mut context: String) -> Outcome {
        let mut outcome = Outcome::default();

        for index in 0..self.tasks.len() {
            let result = self.execute_task(index, &context).await;
            let task_id = self.tasks[index].id().to_string();

            if !result.is_failure() {
                fold_into_context(&mut context, &task_id, &result);
                outcome.results.push(result);
                continue;
            }

            warn!(crew = %self.spec.id, task = %task_id, "Task failed");
            let recovered = if self.settings.dynamic_recovery {
                self.recover(index, &result, &context, &mut outcome).await
            } else {
                None
            };

            // A recovered task keeps one slot; the failed attempt only costs tokens.
            match recovered {
                Some(recovery) => {
                    info!(crew = %self.spec.id, task = %task_id, "Task recovered");
                    outcome.overhead += result.token_usage;
                    fold_into_context(&mut context, &task_id, &recovery);
                    outcome.results.push(recovery);
                }
                None => {
                    outcome.results.push(result);
                    outcome.failed += 1;
                }
            }
        }

        outcome
    }

    /// One recovery pass: an analyst proposes an alternative approach, then
    /// the task's own agent retries once with it. Returns the retry's result
    /// when it succeeds.
    async fn recover(
        &mut self,
        index: usize,
        failed: &ExecutionResult,
        context: &str,
        outcome: &mut Outcome,
    ) -> Option<ExecutionResult> {
        let task_agent = self.tasks[index].spec().agent_id.clone();
        let analyst = self
            .agents
            .iter()
            .find(|a| a.id() != task_agent)
            .or_else(|| self.agents.first())
            .cloned()?;

        let description = self.tasks[index].spec().description.clone();
        let prompt = format!(
            "A task in this crew failed.\n\nTask:\n{description}\n\nError:\n{}\n\n\
             Analyze why it failed and propose an alternative approach the same agent can follow.",
            failed.error.as_deref().unwrap_or("unknown error"),
        );
        let analysis = analyst.execute(&prompt, Some(context)).await;
        outcome.overhead += analysis.token_usage;
        if analysis.is_failure() {
            warn!(crew = %self.spec.id, analyst = %analyst.id(), "Recovery analysis failed");
            return None;
        }

        let retry_context = format!("{context}\n\nAlternative approach:\n{}", analysis.output);
        let retry = self.execute_task(index, &retry_context).await;
        if retry.is_failure() {
            outcome.overhead += retry.token_usage;
            None
        } else {
            Some(retry)
        }
    }
}
