//! Per-client brand context, fetched before a crew is built.

use async_trait::async_trait;
use crewforge_core::error::{Error, Result};
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

/// Where consolidated brand knowledge for a client comes from.
#[async_trait]
pub trait BrandContextSource: Send + Sync {
    /// The client's brand context; empty when none is known.
    async fn brand_context(&self, client_id: &str) -> Result<String>;
}

/// No brand context for anyone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBrandContext;

#[async_trait]
impl BrandContextSource for NoBrandContext {
    async fn brand_context(&self, _client_id: &str) -> Result<String> {
        Ok(String::new())
    }
}

/// Reads `<dir>/<client_id>.md`.
#[derive(Debug, Clone)]
pub struct StaticBrandContext {
    dir: PathBuf,
}

impl StaticBrandContext {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl BrandContextSource for StaticBrandContext {
    async fn brand_context(&self, client_id: &str) -> Result<String> {
        if client_id.is_empty() || client_id.contains(['/', '\\']) || client_id.starts_with('.') {
            return Err(Error::Config {
                message: format!("Invalid client id '{client_id}'"),
            });
        }
        let path = self.dir.join(format!("{client_id}.md"));
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(text.trim().to_string()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(client = %client_id, path = %path.display(), "No brand file");
                Ok(String::new())
            }
            Err(e) => Err(Error::Internal(format!("Cannot read {}: {e}", path.display()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_client_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("acme.md"), "  Voice: friendly.\n").unwrap();
        let source = StaticBrandContext::new(dir.path());
        assert_eq!(source.brand_context("acme").await.unwrap(), "Voice: friendly.");
    }

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source = StaticBrandContext::new(dir.path());
        assert_eq!(source.brand_context("nobody").await.unwrap(), "");
        assert_eq!(NoBrandContext.brand_context("acme").await.unwrap(), "");
    }

    #[tokio::test]
    async fn rejects_path_like_ids() {
        let source = StaticBrandContext::new("/tmp");
        assert!(source.brand_context("../etc/passwd").await.is_err());
        assert!(source.brand_context("").await.is_err());
    }
}
