//! Short-term memory: a TTL-bounded key/value working cache.
//!
//! Agents and crews mirror their latest context here so a follow-up run can
//! pick it up. Memory is an optimization, never a source of truth: a missing
//! or expired key reads exactly like a key that was never set.

use async_trait::async_trait;
use crate::error::MemoryError;

/// The short-term memory contract.
///
/// Implementations: in-process TTL map, Redis with in-process degrade, no-op.
#[async_trait]
pub trait ShortTermMemory: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Store `value` under `key`, expiring after `ttl_secs` seconds
    /// (see [`effective_ttl`]).
    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl_secs: u64,
    ) -> Result<(), MemoryError>;

    /// Fetch a live value. Expired keys return `None`.
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, MemoryError>;

    /// Remove a key. Returns whether a live value was removed.
    async fn delete(&self, key: &str) -> Result<bool, MemoryError>;

    /// Whether a live value exists under `key`.
    async fn exists(&self, key: &str) -> Result<bool, MemoryError>;

    /// Remaining lifetime in seconds. `None` when absent or without expiry.
    async fn ttl(&self, key: &str) -> Result<Option<u64>, MemoryError>;

    /// Live keys matching a glob pattern (`*` wildcard only).
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, MemoryError>;

    /// Atomically add `by` to an integer counter, creating it at 0 without expiry.
    async fn increment(&self, key: &str, by: i64) -> Result<i64, MemoryError>;

    /// Delete every key matching `pattern`; returns how many were removed.
    async fn clear(&self, pattern: &str) -> Result<usize, MemoryError>;
}

/// Shortest lifetime a stored value gets, in seconds. Redis rejects a zero
/// `SETEX`, so every backend clamps to this.
pub const MIN_TTL_SECS: u64 = 1;

/// The lifetime every backend actually applies for a requested `ttl_secs`.
pub fn effective_ttl(ttl_secs: u64) -> u64 {
    ttl_secs.max(MIN_TTL_SECS)
}

/// Key layout shared by every backend.
pub mod keys {
    pub fn agent_context(agent_id: &str) -> String {
        format!("agent:{agent_id}:context")
    }

    pub fn crew_context(crew_id: &str) -> String {
        format!("crew:{crew_id}:context")
    }

    pub fn session(session_id: &str) -> String {
        format!("session:{session_id}")
    }
}

/// Glob match supporting `*` only, the subset both backends agree on.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }

    let (first, last) = (parts[0], parts[parts.len() - 1]);
    if !key.starts_with(first) || key.len() < first.len() + last.len() || !key.ends_with(last) {
        return false;
    }

    let mut rest = &key[first.len()..key.len() - last.len()];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_helpers() {
        assert_eq!(keys::agent_context("strategist"), "agent:strategist:context");
        assert_eq!(keys::crew_context("c1"), "crew:c1:context");
        assert_eq!(keys::session("s"), "session:s");
    }

    #[test]
    fn glob_matching() {
        assert!(glob_match("agent:*", "agent:strategist:context"));
        assert!(glob_match("agent:*:context", "agent:a:context"));
        assert!(!glob_match("agent:*:context", "crew:a:context"));
        assert!(glob_match("*", "anything"));
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("exact", "exactly"));
        assert!(glob_match("a*b*c", "axxbyyc"));
        assert!(!glob_match("a*b*c", "axxc"));
        assert!(!glob_match("ab*ba", "aba"));
    }
}
