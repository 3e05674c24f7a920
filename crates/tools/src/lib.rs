//! Built-in tools for CrewForge agents.
//!
//! Tools run before the model call and contribute text to the prompt:
//! - `knowledge_lookup`: snippets from a [`KnowledgeBase`]
//! - `run_history`: a client's recent approved deliverables

pub mod knowledge_lookup;
pub mod run_history;

pub use knowledge_lookup::{
    KnowledgeBase, KnowledgeLookupTool, KnowledgeSnippet, StaticKnowledgeBase,
};
pub use run_history::RunHistoryTool;

use crewforge_core::history::HistoryStore;
use crewforge_core::tool::ToolRegistry;
use std::sync::Arc;

/// Create a registry with the built-in tools for one client and crew type.
pub fn default_registry(
    knowledge: Arc<dyn KnowledgeBase>,
    history: Arc<dyn HistoryStore>,
    client_id: &str,
    crew_type: &str,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(KnowledgeLookupTool::new(knowledge)));
    registry.register(Arc::new(RunHistoryTool::new(history, client_id, crew_type)));
    registry
}
