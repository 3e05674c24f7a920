//! Run history tool: surfaces a client's recent successful deliverables.
//!
//! Bridges the tool system with the mid-term [`HistoryStore`], so an agent
//! can see what was produced and approved before for the same kind of job.

use async_trait::async_trait;
use crewforge_core::error::ToolError;
use crewforge_core::history::HistoryStore;
use crewforge_core::tool::{Tool, ToolResult};
use std::sync::Arc;

/// Maximum characters of each past output included in the tool result.
const EXCERPT_CHARS: usize = 400;

/// A tool scoped to one client and crew type.
pub struct RunHistoryTool {
    history: Arc<dyn HistoryStore>,
    client_id: String,
    crew_type: String,
    limit: usize,
}

impl RunHistoryTool {
    pub fn new(
        history: Arc<dyn HistoryStore>,
        client_id: impl Into<String>,
        crew_type: impl Into<String>,
    ) -> Self {
        Self {
            history,
            client_id: client_id.into(),
            crew_type: crew_type.into(),
            limit: 3,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }
}

fn excerpt(text: &str) -> String {
    if text.chars().count() <= EXCERPT_CHARS {
        return text.trim().to_string();
    }
    let cut: String = text.chars().take(EXCERPT_CHARS).collect();
    format!("{}...", cut.trim_end())
}

#[async_trait]
impl Tool for RunHistoryTool {
    fn name(&self) -> &str {
        "run_history"
    }

    fn description(&self) -> &str {
        "Recall recent successful deliverables produced for this client."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Optional search term" },
                "limit": { "type": "integer", "description": "Maximum runs (default 3)" }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let limit = arguments["limit"]
            .as_u64()
            .map(|l| l as usize)
            .unwrap_or(self.limit)
            .clamp(1, 20);

        let runs = self
            .history
            .successful_runs(&self.client_id, &self.crew_type, limit)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().to_string(),
                reason: e.to_string(),
            })?;

        let output = runs
            .iter()
            .map(|r| {
                format!(
                    "[{} | {}] {}",
                    r.created_at.format("%Y-%m-%d"),
                    r.crew_name,
                    excerpt(&r.final_output)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(ToolResult {
            tool_name: self.name().to_string(),
            success: true,
            output,
            data: Some(serde_json::json!({ "runs": runs.len() })),
        })
    }
}
