//! Error types for the CrewForge domain.
//!
//! One `thiserror` enum per subsystem, all convertible into [`Error`].

use thiserror::Error;

/// Failure of a CrewForge operation, grouped by the subsystem that raised it.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("History error: {0}")]
    History(#[from] HistoryError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// Bad settings, unknown agents or templates, unusable client ids.
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A crew run that finished without a usable result.
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// An LLM call that did not produce a completion.
///
/// Every variant is retryable by the agent except `CircuitOpen`, which routes
/// the call straight to the fallback model.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Circuit open for {service}, retry in {retry_in_ms}ms")]
    CircuitOpen { service: String, retry_in_ms: u64 },
}

/// Short-term memory failures. Backend outages never surface here; the
/// Redis store degrades to its in-process map instead.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Value could not be encoded: {0}")]
    Serialization(String),
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("{tool_name} failed: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}
