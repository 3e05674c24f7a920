//! No-op backends: disable short-term memory or run history entirely.

use async_trait::async_trait;
use crewforge_core::error::{HistoryError, MemoryError};
use crewforge_core::history::{AgentInteraction, HistoryStore, RunRecord};
use crewforge_core::memory::ShortTermMemory;

/// A short-term memory that stores nothing. Every key reads as never set.
pub struct NoopMemory;

#[async_trait]
impl ShortTermMemory for NoopMemory {
    fn name(&self) -> &str { "none" }

    async fn set(
        &self,
        _key: &str,
        _value: serde_json::Value,
        _ttl_secs: u64,
    ) -> Result<(), MemoryError> {
        Ok(())
    }

    async fn get(&self, _key: &str) -> Result<Option<serde_json::Value>, MemoryError> {
        Ok(None)
    }

    async fn delete(&self, _key: &str) -> Result<bool, MemoryError> {
        Ok(false)
    }

    async fn exists(&self, _key: &str) -> Result<bool, MemoryError> {
        Ok(false)
    }

    async fn ttl(&self, _key: &str) -> Result<Option<u64>, MemoryError> {
        Ok(None)
    }

    async fn keys(&self, _pattern: &str) -> Result<Vec<String>, MemoryError> {
        Ok(Vec::new())
    }

    async fn increment(&self, _key: &str, by: i64) -> Result<i64, MemoryError> {
        Ok(by)
    }

    async fn clear(&self, _pattern: &str) -> Result<usize, MemoryError> {
        Ok(0)
    }
}

/// A history store that records nothing.
pub struct NoopHistory;

#[async_trait]
impl HistoryStore for NoopHistory {
    fn name(&self) -> &str { "none" }

    async fn append_run(&self, run: &RunRecord) -> Result<String, HistoryError> {
        Ok(run.id.clone())
    }

    async fn list_runs(
        &self,
        _client_id: &str,
        _limit: usize,
    ) -> Result<Vec<RunRecord>, HistoryError> {
        Ok(Vec::new())
    }

    async fn append_agent_interactions(
        &self,
        _run_id: &str,
        _interactions: &[AgentInteraction],
    ) -> Result<(), HistoryError> {
        Ok(())
    }

    async fn successful_runs(
        &self,
        _client_id: &str,
        _crew_type: &str,
        _limit: usize,
    ) -> Result<Vec<RunRecord>, HistoryError> {
        Ok(Vec::new())
    }

    async fn search_runs(
        &self,
        _client_id: &str,
        _term: &str,
        _limit: usize,
    ) -> Result<Vec<RunRecord>, HistoryError> {
        Ok(Vec::new())
    }

    async fn agent_interactions(
        &self,
        _client_id: &str,
        _agent_id: Option<&str>,
    ) -> Result<Vec<AgentInteraction>, HistoryError> {
        Ok(Vec::new())
    }

    async fn delete_older_than(&self, _days: u32) -> Result<u64, HistoryError> {
        Ok(0)
    }
}
