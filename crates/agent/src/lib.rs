//! Agents, tasks, and crews.
//!
//! An [`Agent`] turns one task description into an [`ExecutionResult`]
//! through a breaker-guarded model call with retry, fallback, reflection
//! and self-correction. A [`Task`] binds a description and output contract
//! to one agent. A [`Crew`] runs its tasks under a sequential, parallel or
//! hierarchical process and compiles a [`CrewExecutionResult`].
//!
//! [`ExecutionResult`]: crewforge_core::agent::ExecutionResult
//! [`CrewExecutionResult`]: crewforge_core::crew::CrewExecutionResult

pub mod agent;
pub mod crew;
pub mod prompt;
pub mod reflection;
pub mod review;
pub mod task;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use agent::{Agent, AgentSettings};
pub use crew::{Crew, CrewSettings, CrewStats, SECTION_DELIMITER};
pub use reflection::parse_reflection;
pub use review::{ReviewPolicy, ReviewVerdict};
pub use task::Task;
