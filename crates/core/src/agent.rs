//! Agent definition and execution result types.

use serde::{Deserialize, Serialize};
use std::ops::AddAssign;
use crate::provider::Usage;

/// Immutable description of an agent: who it is and how it calls the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Stable id (e.g., "strategist", "copywriter_instagram")
    pub id: String,

    /// Display name
    pub name: String,

    /// Role text; hierarchical crews look for manager/lead markers here
    pub role: String,

    /// What the agent is trying to achieve
    pub goal: String,

    /// Backstory and standing instructions
    pub backstory: String,

    /// Model identifier
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Tool names, in invocation order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2000
}

impl AgentSpec {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: role.into(),
            goal: String::new(),
            backstory: String::new(),
            model: "gpt-4o".into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            tools: Vec::new(),
        }
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = goal.into();
        self
    }

    pub fn with_backstory(mut self, backstory: impl Into<String>) -> Self {
        self.backstory = backstory.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tools.push(tool.into());
        self
    }
}

/// Token counts summed over every model call that produced a result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
    pub total: u64,
}

impl From<Usage> for TokenUsage {
    fn from(u: Usage) -> Self {
        Self {
            input: u.prompt_tokens as u64,
            output: u.completion_tokens as u64,
            total: u.total_tokens as u64,
        }
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.input += rhs.input;
        self.output += rhs.output;
        self.total += rhs.total;
    }
}

/// A structured self-critique of an output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReflectionResult {
    pub needs_correction: bool,
    pub issues: Vec<String>,
    /// 0–10
    pub score: f32,
    pub suggestions: Vec<String>,
    /// 0–100
    pub confidence: f32,
}

impl Default for ReflectionResult {
    fn default() -> Self {
        Self::neutral()
    }
}

impl ReflectionResult {
    /// What a failed or unparseable reflection degrades to.
    pub fn neutral() -> Self {
        Self {
            needs_correction: false,
            issues: Vec::new(),
            score: 7.0,
            suggestions: Vec::new(),
            confidence: 50.0,
        }
    }

    /// Pull the scores back into range after parsing model output.
    pub fn clamped(mut self) -> Self {
        self.score = self.score.clamp(0.0, 10.0);
        self.confidence = self.confidence.clamp(0.0, 100.0);
        self
    }
}

/// The outcome of one `Agent::execute` call. Never mutated after return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub agent_id: String,
    pub agent_name: String,
    /// Final text, or a human-readable failure message
    pub output: String,
    pub token_usage: TokenUsage,
    pub execution_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection: Option<ReflectionResult>,
    #[serde(default)]
    pub corrected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_output: Option<String>,
    #[serde(default)]
    pub fallback_used: bool,
    /// Tools that contributed to the prompt
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools_called: Vec<String>,
}

impl ExecutionResult {
    pub fn success(spec: &AgentSpec, output: impl Into<String>) -> Self {
        Self {
            agent_id: spec.id.clone(),
            agent_name: spec.name.clone(),
            output: output.into(),
            token_usage: TokenUsage::default(),
            execution_time_ms: 0,
            error: None,
            reflection: None,
            corrected: false,
            original_output: None,
            fallback_used: false,
            tools_called: Vec::new(),
        }
    }

    pub fn failure(spec: &AgentSpec, error: impl Into<String>) -> Self {
        let error = error.into();
        let message = format!("Execution failed for {}: {}", spec.name, error);
        let mut result = Self::success(spec, message);
        result.error = Some(error);
        result
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}
