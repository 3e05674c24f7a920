//! Parallel process: independent tasks in bounded batches, then dependents.
//!
//! Every task in a batch sees the context as it stood before the batch.
//! Results are folded in registration order after the whole batch joins.

use futures::future::join_all;
use std::collections::HashSet;
use tracing::{debug, warn};

use super::{Crew, Outcome, fold_into_context};

impl Crew {
    pub(super) async fn run_parallel(&mut self, mut context: String) -> Outcome {
        let mut outcome = Outcome::default();
        let mut completed: HashSet<String> = HashSet::new();

        let (independent, dependent): (Vec<usize>, Vec<usize>) =
            (0..self.tasks.len()).partition(|&i| self.tasks[i].spec().dependencies.is_empty());

        for batch in independent.chunks(self.settings.max_parallel_tasks.max(1)) {
            debug!(crew = %self.spec.id, size = batch.len(), "Dispatching batch");
            let snapshot = context.clone();
            let runs = batch.iter().map(|&i| self.tasks[i].run(Some(&snapshot)));
            let outcomes = join_all(runs).await;

            for (&index, run) in batch.iter().zip(outcomes) {
                let task = &mut self.tasks[index];
                let result = run.unwrap_or_else(|e| task.failed_result(e.to_string()));
                task.set_result(result.clone());
                let task_id = task.id().to_string();

                if result.is_failure() {
                    warn!(crew = %self.spec.id, task = %task_id, "Task failed");
                    outcome.failed += 1;
                } else {
                    fold_into_context(&mut context, &task_id, &result);
                    completed.insert(task_id);
                }
                outcome.results.push(result);
            }
        }

        for index in dependent {
            let deps = self.tasks[index].spec().dependencies.clone();
            let task_id = self.tasks[index].id().to_string();
            let missing: Vec<&String> = deps.iter().filter(|d| !completed.contains(*d)).collect();

            if !missing.is_empty() {
                let names = missing.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ");
                warn!(
                    crew = %self.spec.id,
                    task = %task_id,
                    missing = %names,
                    "Skipping task with unmet dependencies"
                );
                let task = &mut self.tasks[index];
                let result = task.failed_result(format!("skipped: unmet dependencies [{names}]"));
                task.set_result(result.clone());
                outcome.failed += 1;
                outcome.results.push(result);
                continue;
            }

            let result = self.execute_task(index, &context).await;
            if result.is_failure() {
                warn!(crew = %self.spec.id, task = %task_id, "Task failed");
                outcome.failed += 1;
            } else {
                fold_into_context(&mut context, &task_id, &result);
                completed.insert(task_id);
            }
            outcome.results.push(result);
        }

        outcome
    }
}
