//! Hierarchical process: a manager plans, reviews each task, and summarizes.
//!
//! Manager calls go through [`Agent::direct`], so the review text the
//! [`ReviewPolicy`] reads is exactly what the manager answered.

use crewforge_core::agent::ExecutionResult;
use std::sync::Arc;
use tracing::{info, warn};

use super::{Crew, Outcome, fold_into_context};
use crate::agent::Agent;
use crate::review::ReviewPolicy;

const MANAGER_MARKERS: [&str; 6] = ["manager", "lead", "head", "gerente", "líder", "coordenador"];

impl Crew {
    /// The agent whose role names a manager/lead, else the first registered.
    pub fn manager(&self) -> Option<Arc<Agent>> {
        self.agents
            .iter()
            .find(|a| {
                let role = a.spec().role.to_lowercase();
                MANAGER_MARKERS.iter().any(|m| role.contains(m))
            })
            .or_else(|| self.agents.first())
            .cloned()
    }

    pub(super) async fn run_hierarchical(&mut self, mut context: String) -> Outcome {
        let mut outcome = Outcome::default();
        let Some(manager) = self.manager() else {
            warn!(crew = %self.spec.id, "Hierarchical crew has no agents");
            for task in &mut self.tasks {
                let result = task.failed_result("no manager available");
                task.set_result(result.clone());
                outcome.results.push(result);
                outcome.failed += 1;
            }
            return outcome;
        };
        info!(crew = %self.spec.id, manager = %manager.id(), "Manager selected");

        let plan = manager.direct(&self.plan_prompt(), Some(&context)).await;
        outcome.overhead += plan.token_usage;
        if plan.is_failure() {
            warn!(crew = %self.spec.id, "Manager plan failed, continuing without it");
        } else {
            if !context.is_empty() {
                context.push_str("\n\n");
            }
            context.push_str(&format!("## Execution plan\n{}", plan.output));
        }

        for index in 0..self.tasks.len() {
            let task_id = self.tasks[index].id().to_string();
            let mut result = self.execute_task(index, &context).await;

            if !result.is_failure() {
                let review = manager
                    .direct(&self.review_prompt(index, &result), Some(&context))
                    .await;
                outcome.overhead += review.token_usage;

                if !review.is_failure() && self.review.needs_adjustment(&review.output) {
                    info!(crew = %self.spec.id, task = %task_id, "Manager requested adjustment");
                    let redo_context = format!("{context}\n\n## Manager review\n{}", review.output);
                    let redo = self.execute_task(index, &redo_context).await;
                    if redo.is_failure() {
                        // Keep the first attempt; the redo still cost tokens.
                        outcome.overhead += redo.token_usage;
                        self.tasks[index].set_result(result.clone());
                    } else {
                        outcome.overhead += result.token_usage;
                        result = redo;
                    }
                }
            }

            if result.is_failure() {
                warn!(crew = %self.spec.id, task = %task_id, "Task failed");
                outcome.failed += 1;
            } else {
                fold_into_context(&mut context, &task_id, &result);
            }
            outcome.results.push(result);
        }

        let summary = manager
            .direct(
                "Compile the crew's work above into a final consolidated deliverable.",
                Some(&context),
            )
            .await;
        if summary.is_failure() {
            warn!(crew = %self.spec.id, "Manager summary failed");
            outcome.overhead += summary.token_usage;
        } else {
            outcome.results.push(summary);
        }

        outcome
    }

    fn plan_prompt(&self) -> String {
        let tasks = self
            .tasks
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let spec = t.spec();
                format!("{}. [{}] {} (agent: {})", i + 1, t.id(), spec.description, spec.agent_id)
            })
            .collect::<Vec<_>>()
            .join("\n");
        format!("Create an execution plan for these tasks:\n{tasks}")
    }

    fn review_prompt(&self, index: usize, result: &ExecutionResult) -> String {
        let spec = self.tasks[index].spec();
        format!(
            "Review this result.\n\nTask:\n{}\n\nExpected output:\n{}\n\nResult from {}:\n{}\n\n{}",
            spec.description,
            spec.expected_output,
            result.agent_name,
            result.output,
            ReviewPolicy::instruction(),
        )
    }
}
