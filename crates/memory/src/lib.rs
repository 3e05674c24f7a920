//! Memory backends for CrewForge.
//!
//! Two tiers:
//! - short-term: TTL key/value context shared between agents
//!   ([`InProcessMemory`], [`RedisMemory`], [`NoopMemory`])
//! - mid-term: durable run history
//!   ([`SqliteHistory`], [`InMemoryHistory`], [`NoopHistory`])

pub mod in_memory;
pub mod in_process;
pub mod noop;

#[cfg(feature = "redis")]
pub mod redis_store;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryHistory;
pub use in_process::InProcessMemory;
pub use noop::{NoopHistory, NoopMemory};

#[cfg(feature = "redis")]
pub use redis_store::RedisMemory;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteHistory;

use crewforge_config::{AppConfig, MemoryConfig};
use crewforge_core::error::HistoryError;
use crewforge_core::history::HistoryStore;
use crewforge_core::memory::ShortTermMemory;
use std::sync::Arc;
use tracing::info;

/// Build the short-term store described by `[memory]`.
///
/// With a Redis URL the store degrades to in-process on the first
/// connection failure, so this never fails.
pub fn short_term_from_config(config: &MemoryConfig) -> Arc<dyn ShortTermMemory> {
    match config.redis_url.as_deref() {
        #[cfg(feature = "redis")]
        Some(url) if !url.is_empty() => Arc::new(RedisMemory::new(url, &config.key_prefix)),
        _ => {
            info!("No Redis configured, using in-process short-term memory");
            Arc::new(InProcessMemory::new())
        }
    }
}

/// Build the history store described by `[history]`.
pub async fn history_from_config(
    config: &AppConfig,
) -> Result<Arc<dyn HistoryStore>, HistoryError> {
    match config.history.backend.as_str() {
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let path = config.history_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    HistoryError::Storage(format!("Cannot create {}: {e}", parent.display()))
                })?;
            }
            let store = SqliteHistory::new(&path.to_string_lossy()).await?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(InMemoryHistory::new())),
        "none" => Ok(Arc::new(NoopHistory)),
        other => Err(HistoryError::Storage(format!("Unknown history backend: {other}"))),
    }
}
