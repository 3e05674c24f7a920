//! Redis-backed short-term memory with transparent in-process degrade.
//!
//! Values are stored as JSON strings under `<prefix>:<key>` with `SETEX`.
//! The first connection or command failure flips the store into degraded
//! mode for the rest of the process: from then on every call is served by
//! an [`InProcessMemory`] with the same TTL semantics. Callers never see the
//! Redis error.

use async_trait::async_trait;
use crewforge_core::error::MemoryError;
use crewforge_core::memory::{ShortTermMemory, effective_ttl};
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{info, warn};
use crate::in_process::InProcessMemory;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Short-term memory in Redis, falling back to an in-process map.
pub struct RedisMemory {
    client: Option<redis::Client>,
    key_prefix: String,
    connection: OnceCell<MultiplexedConnection>,
    degraded: AtomicBool,
    fallback: InProcessMemory,
}

impl RedisMemory {
    /// Create a store for `url`. An unparseable URL starts degraded.
    pub fn new(url: &str, key_prefix: impl Into<String>) -> Self {
        let (client, degraded) = match redis::Client::open(url) {
            Ok(c) => (Some(c), false),
            Err(e) => {
                warn!(error = %e, "Invalid Redis URL, using in-process memory");
                (None, true)
            }
        };
        Self {
            client,
            key_prefix: key_prefix.into(),
            connection: OnceCell::new(),
            degraded: AtomicBool::new(degraded),
            fallback: InProcessMemory::new(),
        }
    }

    /// Create a store and establish the connection up front.
    pub async fn connect(url: &str, key_prefix: impl Into<String>) -> Self {
        let store = Self::new(url, key_prefix);
        if store.conn().await.is_some() {
            info!(prefix = %store.key_prefix, "Connected to Redis short-term memory");
        }
        store
    }

    /// Whether calls are currently served in-process.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }

    fn strip<'a>(&self, full: &'a str) -> &'a str {
        full.strip_prefix(&self.key_prefix)
            .and_then(|k| k.strip_prefix(':'))
            .unwrap_or(full)
    }

    fn degrade(&self, reason: &str) {
        if !self.degraded.swap(true, Ordering::Relaxed) {
            warn!(error = %reason, "Redis unavailable, degrading to in-process memory");
        }
    }

    async fn conn(&self) -> Option<MultiplexedConnection> {
        if self.is_degraded() {
            return None;
        }
        let client = self.client.as_ref()?;
        let result = self
            .connection
            .get_or_try_init(|| async {
                let connect = client.get_multiplexed_async_connection();
                match tokio::time::timeout(CONNECT_TIMEOUT, connect).await {
                    Ok(Ok(conn)) => Ok(conn),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err("connection timed out".to_string()),
                }
            })
            .await;

        match result {
            Ok(conn) => Some(conn.clone()),
            Err(e) => {
                self.degrade(&e);
                None
            }
        }
    }

    fn decode(raw: Option<String>) -> Result<Option<serde_json::Value>, MemoryError> {
        raw.map(|s| serde_json::from_str(&s).map_err(|e| MemoryError::Serialization(e.to_string())))
            .transpose()
    }
}

#[async_trait]
impl ShortTermMemory for RedisMemory {
    fn name(&self) -> &str {
        if self.is_degraded() { "in_process" } else { "redis" }
    }

    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl_secs: u64,
    ) -> Result<(), MemoryError> {
        if let Some(mut conn) = self.conn().await {
            let payload = serde_json::to_string(&value)
                .map_err(|e| MemoryError::Serialization(e.to_string()))?;
            match conn.set_ex::<_, _, ()>(self.key(key), payload, effective_ttl(ttl_secs)).await {
                Ok(()) => return Ok(()),
                Err(e) => self.degrade(&e.to_string()),
            }
        }
        self.fallback.set(key, value, ttl_secs).await
    }

    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, MemoryError> {
        if let Some(mut conn) = self.conn().await {
            match conn.get::<_, Option<String>>(self.key(key)).await {
                Ok(raw) => return Self::decode(raw),
                Err(e) => self.degrade(&e.to_string()),
            }
        }
        self.fallback.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<bool, MemoryError> {
        if let Some(mut conn) = self.conn().await {
            match conn.del::<_, i64>(self.key(key)).await {
                Ok(n) => return Ok(n > 0),
                Err(e) => self.degrade(&e.to_string()),
            }
        }
        self.fallback.delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, MemoryError> {
        if let Some(mut conn) = self.conn().await {
            match conn.exists::<_, bool>(self.key(key)).await {
                Ok(found) => return Ok(found),
                Err(e) => self.degrade(&e.to_string()),
            }
        }
        self.fallback.exists(key).await
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>, MemoryError> {
        if let Some(mut conn) = self.conn().await {
            match conn.ttl::<_, i64>(self.key(key)).await {
                // -2: missing, -1: no expiry
                Ok(secs) => return Ok((secs >= 0).then_some(secs as u64)),
                Err(e) => self.degrade(&e.to_string()),
            }
        }
        self.fallback.ttl(key).await
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, MemoryError> {
        if let Some(mut conn) = self.conn().await {
            match conn.keys::<_, Vec<String>>(self.key(pattern)).await {
                Ok(found) => {
                    let mut keys: Vec<String> =
                        found.iter().map(|k| self.strip(k).to_string()).collect();
                    keys.sort_unstable();
                    return Ok(keys);
                }
                Err(e) => self.degrade(&e.to_string()),
            }
        }
        self.fallback.keys(pattern).await
    }

    async fn increment(&self, key: &str, by: i64) -> Result<i64, MemoryError> {
        if let Some(mut conn) = self.conn().await {
            match conn.incr::<_, _, i64>(self.key(key), by).await {
                Ok(n) => return Ok(n),
                Err(e)
                    if matches!(
                        e.kind(),
                        redis::ErrorKind::TypeError | redis::ErrorKind::ResponseError
                    ) =>
                {
                    return Err(MemoryError::Serialization(format!(
                        "value at '{key}' is not an integer: {e}"
                    )));
                }
                Err(e) => self.degrade(&e.to_string()),
            }
        }
        self.fallback.increment(key, by).await
    }

    async fn clear(&self, pattern: &str) -> Result<usize, MemoryError> {
        if let Some(mut conn) = self.conn().await {
            let keys = match conn.keys::<_, Vec<String>>(self.key(pattern)).await {
                Ok(keys) => Some(keys),
                Err(e) => {
                    self.degrade(&e.to_string());
                    None
                }
            };
            match keys {
                Some(keys) if keys.is_empty() => return Ok(0),
                Some(keys) => match conn.del::<_, i64>(keys).await {
                    Ok(n) => return Ok(n as usize),
                    Err(e) => self.degrade(&e.to_string()),
                },
                None => {}
            }
        }
        self.fallback.clear(pattern).await
    }
}
