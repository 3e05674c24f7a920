//! # CrewForge Core
//!
//! Domain types, traits, and error definitions for the CrewForge agent
//! orchestration engine. It performs no I/O of its own; it defines the
//! domain model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here: the completion provider,
//! tools, the short-term working cache and the durable run history.
//! Implementations live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with scripted/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod agent;
pub mod crew;
pub mod error;
pub mod history;
pub mod memory;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{AgentSpec, ExecutionResult, ReflectionResult, TokenUsage};
pub use crew::{CrewExecutionResult, CrewSpec, ProcessMode, TaskSpec};
pub use error::{Error, Result};
pub use history::{AgentInteraction, AgentPerformance, HistoryStore, RunRecord};
pub use memory::ShortTermMemory;
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use tool::{Tool, ToolRegistry, ToolResult};
