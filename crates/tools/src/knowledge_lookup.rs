//! Knowledge lookup tool: text retrieval over a [`KnowledgeBase`].
//!
//! The agent passes `{"query": <task>, "context": <merged context>}`. The
//! tool returns the best-matching snippets as plain text so they can be
//! folded into the prompt like any other tool contribution.

use async_trait::async_trait;
use crewforge_core::error::ToolError;
use crewforge_core::tool::{Tool, ToolResult};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// One retrieved snippet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeSnippet {
    pub source: String,
    pub content: String,
    pub score: f64,
}

/// Source of domain knowledge for the lookup tool.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Return up to `top_k` snippets relevant to `query`, best first.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<KnowledgeSnippet>, ToolError>;
}

#[derive(Debug, Clone)]
struct Document {
    source: String,
    content: String,
}

/// Keyword-overlap knowledge base over a fixed set of documents.
///
/// Scores each document by the fraction of query terms (3+ chars) it
/// contains. Documents with no overlap are never returned.
#[derive(Debug, Clone, Default)]
pub struct StaticKnowledgeBase {
    documents: Vec<Document>,
}

impl StaticKnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, source: impl Into<String>, content: impl Into<String>) -> Self {
        self.documents.push(Document {
            source: source.into(),
            content: content.into(),
        });
        self
    }

    /// Load every `.md` and `.txt` file in `dir` as a document.
    pub fn from_dir(dir: &Path) -> Result<Self, ToolError> {
        let entries = std::fs::read_dir(dir).map_err(|e| ToolError::ExecutionFailed {
            tool_name: "knowledge_lookup".into(),
            reason: format!("Cannot read {}: {e}", dir.display()),
        })?;

        let mut paths: Vec<_> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|x| x.to_str())
                    .is_some_and(|x| x == "md" || x == "txt")
            })
            .collect();
        paths.sort();

        let mut kb = Self::new();
        for path in paths {
            if let Ok(content) = std::fs::read_to_string(&path) {
                let source = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                kb = kb.with_document(source, content);
            }
        }
        debug!(documents = kb.documents.len(), dir = %dir.display(), "Loaded knowledge documents");
        Ok(kb)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

fn terms(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 3)
        .map(str::to_lowercase)
        .collect();
    terms.sort();
    terms.dedup();
    terms
}

#[async_trait]
impl KnowledgeBase for StaticKnowledgeBase {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<KnowledgeSnippet>, ToolError> {
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return Ok(vec![]);
        }

        let mut hits: Vec<KnowledgeSnippet> = self
            .documents
            .iter()
            .filter_map(|doc| {
                let haystack = doc.content.to_lowercase();
                let matched = query_terms.iter().filter(|t| haystack.contains(t.as_str())).count();
                (matched > 0).then(|| KnowledgeSnippet {
                    source: doc.source.clone(),
                    content: doc.content.clone(),
                    score: matched as f64 / query_terms.len() as f64,
                })
            })
            .collect();

        // Stable sort keeps declaration order among equal scores.
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }
}

/// A tool that looks up relevant knowledge for the current task.
pub struct KnowledgeLookupTool {
    knowledge: Arc<dyn KnowledgeBase>,
    top_k: usize,
}

impl KnowledgeLookupTool {
    pub fn new(knowledge: Arc<dyn KnowledgeBase>) -> Self {
        Self { knowledge, top_k: 3 }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }
}

#[async_trait]
impl Tool for KnowledgeLookupTool {
    fn name(&self) -> &str {
        "knowledge_lookup"
    }

    fn description(&self) -> &str {
        "Look up domain and brand knowledge relevant to the task."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The task or question to find knowledge for"
                },
                "context": {
                    "type": "string",
                    "description": "Accumulated context (unused for ranking)"
                },
                "top_k": {
                    "type": "integer",
                    "description": "Maximum number of snippets (default 3)",
                    "default": 3
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;
        let top_k = arguments["top_k"]
            .as_u64()
            .map(|k| k as usize)
            .unwrap_or(self.top_k)
            .clamp(1, 10);

        let snippets = self.knowledge.search(query, top_k).await?;
        let output = if snippets.is_empty() {
            String::new()
        } else {
            snippets
                .iter()
                .map(|s| format!("[{}] {}", s.source, s.content.trim()))
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        Ok(ToolResult {
            tool_name: self.name().to_string(),
            success: true,
            output,
            data: serde_json::to_value(&snippets).ok(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kb() -> StaticKnowledgeBase {
        StaticKnowledgeBase::new()
            .with_document("voice.md", "Brand voice: friendly, direct, no jargon.")
            .with_document(
                "product.md",
                "The product launch happens in March with a new coffee blend.",
            )
            .with_document("audience.md", "Audience: young professionals who love coffee.")
    }

    #[tokio::test]
    async fn ranks_by_term_overlap() {
        let hits = kb().search("coffee product launch", 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].source, "product.md");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn no_overlap_returns_nothing() {
        assert!(kb().search("quantum physics", 5).await.unwrap().is_empty());
        assert!(kb().search("a b", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn tool_formats_snippets() {
        let tool = KnowledgeLookupTool::new(Arc::new(kb()));
        let result = tool
            .execute(serde_json::json!({"query": "brand voice", "context": "ignored"}))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.starts_with("[voice.md] Brand voice"));
        assert_eq!(result.tool_name, "knowledge_lookup");
    }

    #[tokio::test]
    async fn tool_respects_top_k() {
        let tool = KnowledgeLookupTool::new(Arc::new(kb()));
        let result = tool
            .execute(serde_json::json!({"query": "coffee", "top_k": 1}))
            .await
            .unwrap();
        let data = result.data.unwrap();
        assert_eq!(data.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_query_is_invalid() {
        let tool = KnowledgeLookupTool::new(Arc::new(kb()));
        let err = tool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn loads_markdown_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "alpha").unwrap();
        std::fs::write(dir.path().join("b.txt"), "beta").unwrap();
        std::fs::write(dir.path().join("c.json"), "{}").unwrap();
        let kb = StaticKnowledgeBase::from_dir(dir.path()).unwrap();
        assert_eq!(kb.len(), 2);
    }
}
