//! In-memory run history: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use crewforge_core::error::HistoryError;
use crewforge_core::history::{AgentInteraction, HistoryStore, RunRecord};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Log {
    runs: Vec<RunRecord>,
    interactions: Vec<AgentInteraction>,
}

/// An append-only history kept in process memory.
#[derive(Clone, Default)]
pub struct InMemoryHistory {
    log: Arc<RwLock<Log>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total runs recorded, across all clients.
    pub async fn run_count(&self) -> usize {
        self.log.read().await.runs.len()
    }
}

/// Newest first, matching `client_id`, filtered by `pred`, at most `limit`.
fn newest(
    runs: &[RunRecord],
    client_id: &str,
    limit: usize,
    pred: impl Fn(&RunRecord) -> bool,
) -> Vec<RunRecord> {
    runs.iter()
        .rev()
        .filter(|r| r.client_id == client_id && pred(r))
        .take(limit)
        .cloned()
        .collect()
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    fn name(&self) -> &str { "memory" }

    async fn append_run(&self, run: &RunRecord) -> Result<String, HistoryError> {
        self.log.write().await.runs.push(run.clone());
        Ok(run.id.clone())
    }

    async fn list_runs(
        &self,
        client_id: &str,
        limit: usize,
    ) -> Result<Vec<RunRecord>, HistoryError> {
        Ok(newest(&self.log.read().await.runs, client_id, limit, |_| true))
    }

    async fn append_agent_interactions(
        &self,
        run_id: &str,
        interactions: &[AgentInteraction],
    ) -> Result<(), HistoryError> {
        let mut log = self.log.write().await;
        if !log.runs.iter().any(|r| r.id == run_id) {
            return Err(HistoryError::Storage(format!("unknown run '{run_id}'")));
        }
        log.interactions.extend(interactions.iter().cloned().map(|mut i| {
            i.run_id = run_id.to_string();
            i
        }));
        Ok(())
    }

    async fn successful_runs(
        &self,
        client_id: &str,
        crew_type: &str,
        limit: usize,
    ) -> Result<Vec<RunRecord>, HistoryError> {
        Ok(newest(&self.log.read().await.runs, client_id, limit, |r| {
            r.success && r.crew_type == crew_type
        }))
    }

    async fn search_runs(
        &self,
        client_id: &str,
        term: &str,
        limit: usize,
    ) -> Result<Vec<RunRecord>, HistoryError> {
        let needle = term.to_lowercase();
        Ok(newest(&self.log.read().await.runs, client_id, limit, |r| {
            r.final_output.to_lowercase().contains(&needle)
                || r.params.to_string().to_lowercase().contains(&needle)
        }))
    }

    async fn agent_interactions(
        &self,
        client_id: &str,
        agent_id: Option<&str>,
    ) -> Result<Vec<AgentInteraction>, HistoryError> {
        let log = self.log.read().await;
        Ok(log
            .interactions
            .iter()
            .rev()
            .filter(|i| i.client_id == client_id && agent_id.is_none_or(|a| i.agent_id == a))
            .cloned()
            .collect())
    }

    async fn delete_older_than(&self, days: u32) -> Result<u64, HistoryError> {
        let cutoff = Utc::now() - Duration::days(days as i64);
        let mut log = self.log.write().await;
        let (old, keep): (Vec<_>, Vec<_>) = log.runs.drain(..).partition(|r| r.created_at < cutoff);
        log.runs = keep;
        log.interactions.retain(|i| !old.iter().any(|r| r.id == i.run_id));
        Ok(old.len() as u64)
    }
}
