//! In-process short-term memory: a TTL map behind an async lock.
//!
//! Used directly when no external cache is configured, and as the degrade
//! path for [`crate::RedisMemory`]. Expired entries are dropped lazily on
//! access and by [`InProcessMemory::purge_expired`].

use async_trait::async_trait;
use crewforge_core::error::MemoryError;
use crewforge_core::memory::{ShortTermMemory, effective_ttl, glob_match};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    value: serde_json::Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// Re-check `key` under the write lock: a `set` may have landed since the
/// read lock was released. Only a still-expired entry is removed.
fn evict_if_expired(
    entries: &mut HashMap<String, Entry>,
    key: &str,
    now: Instant,
) -> Option<serde_json::Value> {
    match entries.get(key) {
        Some(e) if e.is_live(now) => Some(e.value.clone()),
        Some(_) => {
            entries.remove(key);
            None
        }
        None => None,
    }
}

/// A TTL-aware key/value map shared across clones.
#[derive(Clone, Default)]
pub struct InProcessMemory {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl InProcessMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        before - entries.len()
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.read().await.values().filter(|e| e.is_live(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ShortTermMemory for InProcessMemory {
    fn name(&self) -> &str {
        "in_process"
    }

    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl_secs: u64,
    ) -> Result<(), MemoryError> {
        let entry = Entry {
            value,
            expires_at: Some(Instant::now() + Duration::from_secs(effective_ttl(ttl_secs))),
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, MemoryError> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(e) if e.is_live(now) => return Ok(Some(e.value.clone())),
                None => return Ok(None),
                Some(_) => {}
            }
        }
        let mut entries = self.entries.write().await;
        Ok(evict_if_expired(&mut entries, key, Instant::now()))
    }

    async fn delete(&self, key: &str) -> Result<bool, MemoryError> {
        let now = Instant::now();
        Ok(self
            .entries
            .write()
            .await
            .remove(key)
            .is_some_and(|e| e.is_live(now)))
    }

    async fn exists(&self, key: &str) -> Result<bool, MemoryError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>, MemoryError> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|e| e.is_live(now))
            .and_then(|e| e.expires_at)
            .map(|at| (at - now).as_secs()))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, MemoryError> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(k, e)| e.is_live(now) && glob_match(pattern, k))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort_unstable();
        Ok(keys)
    }

    async fn increment(&self, key: &str, by: i64) -> Result<i64, MemoryError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry(key.to_string())
            .and_modify(|e| {
                if !e.is_live(now) {
                    *e = Entry { value: serde_json::json!(0), expires_at: None };
                }
            })
            .or_insert(Entry { value: serde_json::json!(0), expires_at: None });

        let current = entry.value.as_i64().ok_or_else(|| {
            MemoryError::Serialization(format!("value at '{key}' is not an integer"))
        })?;
        let next = current + by;
        entry.value = serde_json::json!(next);
        Ok(next)
    }

    async fn clear(&self, pattern: &str) -> Result<usize, MemoryError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let mut removed = 0;
        // Expired entries are swept too but don't count as cleared.
        entries.retain(|k, e| {
            let live = e.is_live(now);
            let hit = glob_match(pattern, k);
            if live && hit {
                removed += 1;
            }
            live && !hit
        });
        Ok(removed)
    }
}
