//! A single agent: one task description in, one [`ExecutionResult`] out.
//!
//! The execution pipeline:
//!
//! 1. **Recall** the agent's last result from short-term memory
//! 2. **Merge** it with the caller's context, trimmed to the window
//! 3. **Tools** run in order and contribute text; failures are skipped
//! 4. **Complete** through the primary breaker with exponential backoff,
//!    then once against the fallback endpoint
//! 5. **Reflect** with a low-temperature critique call
//! 6. **Correct** when the critique asks for it
//! 7. **Remember** the result in short-term memory and local history
//!
//! Steps 1, 5, 6 and 7's memory write are feature flags in
//! [`AgentSettings`]; [`AgentSettings::basic`] turns them all off.

use crewforge_config::AgentConfig;
use crewforge_core::agent::{AgentSpec, ExecutionResult, ReflectionResult, TokenUsage};
use crewforge_core::error::ProviderError;
use crewforge_core::memory::{ShortTermMemory, keys};
use crewforge_core::message::Message;
use crewforge_core::provider::{ProviderRequest, ProviderResponse};
use crewforge_core::tool::Tool;
use crewforge_providers::ModelEndpoint;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::prompt;
use crate::reflection::parse_reflection;

/// Behaviour switches for an [`Agent`].
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Attempts against the primary endpoint (at least 1)
    pub max_retries: u32,
    /// Delay before retry n is `backoff_base_secs^n` seconds
    pub backoff_base_secs: u64,
    pub enable_reflection: bool,
    pub enable_self_correction: bool,
    pub use_memory: bool,
    pub reflection_temperature: f32,
    pub context_window_chars: usize,
    pub memory_ttl_secs: u64,
}

impl AgentSettings {
    /// One attempt, no reflection, no memory.
    pub fn basic() -> Self {
        Self {
            max_retries: 1,
            enable_reflection: false,
            enable_self_correction: false,
            use_memory: false,
            ..Self::default()
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_secs(self.backoff_base_secs.saturating_pow(attempt))
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from(&AgentConfig::default())
    }
}

impl From<&AgentConfig> for AgentSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            max_retries: config.max_retries.max(1),
            backoff_base_secs: config.backoff_base_secs,
            enable_reflection: config.enable_reflection,
            enable_self_correction: config.enable_self_correction,
            use_memory: true,
            reflection_temperature: config.reflection_temperature,
            context_window_chars: config.context_window_chars,
            memory_ttl_secs: config.memory_ttl_secs,
        }
    }
}

/// A configured agent. Cheap to share behind an `Arc`; `execute` takes `&self`.
pub struct Agent {
    spec: AgentSpec,
    primary: ModelEndpoint,
    fallback: Option<ModelEndpoint>,
    tools: Vec<Arc<dyn Tool>>,
    memory: Option<Arc<dyn ShortTermMemory>>,
    settings: AgentSettings,
    history: Mutex<Vec<ExecutionResult>>,
}

/// A successful completion and where it came from.
struct Completion {
    text: String,
    usage: TokenUsage,
    fallback_used: bool,
}

impl Agent {
    /// Create an agent that asks `primary` for `spec.model`.
    pub fn new(spec: AgentSpec, primary: ModelEndpoint) -> Self {
        Self {
            spec,
            primary,
            fallback: None,
            tools: Vec::new(),
            memory: None,
            settings: AgentSettings::default(),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Endpoint tried once after the primary retries are exhausted.
    pub fn with_fallback(mut self, fallback: ModelEndpoint) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_memory(mut self, memory: Arc<dyn ShortTermMemory>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_settings(mut self, settings: AgentSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn spec(&self) -> &AgentSpec {
        &self.spec
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Every result this agent produced, oldest first.
    pub fn history(&self) -> Vec<ExecutionResult> {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear_history(&self) {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Execute `task` with optional caller context.
    ///
    /// Never fails: a call that cannot be completed yields a result with
    /// `error` set and a readable failure message as `output`.
    pub async fn execute(&self, task: &str, context: Option<&str>) -> ExecutionResult {
        let start = Instant::now();
        info!(agent = %self.spec.id, "Agent starting task");

        let recalled = self.recall().await;
        let window = self.settings.context_window_chars;
        let merged = prompt::merge_context(context, recalled.as_deref(), window);
        let (tool_output, tools_called) = self.run_tools(task, &merged).await;
        let messages = prompt::task_messages(&self.spec, task, &merged, &tool_output);

        let completion = match self.complete_with_retry(messages).await {
            Ok(c) => c,
            Err(e) => {
                warn!(agent = %self.spec.id, error = %e, "Agent failed after retries and fallback");
                let mut result = ExecutionResult::failure(&self.spec, e.to_string());
                result.tools_called = tools_called;
                result.execution_time_ms = start.elapsed().as_millis() as u64;
                self.remember(&result).await;
                return result;
            }
        };

        let mut result = ExecutionResult::success(&self.spec, completion.text);
        result.token_usage = completion.usage;
        result.fallback_used = completion.fallback_used;
        result.tools_called = tools_called;

        if self.settings.enable_reflection {
            let (reflection, usage) = self.reflect(task, &result.output).await;
            result.token_usage += usage;

            if reflection.needs_correction && self.settings.enable_self_correction {
                if let Some((improved, usage)) =
                    self.correct(task, &result.output, &reflection).await
                {
                    result.token_usage += usage;
                    result.original_output = Some(std::mem::replace(&mut result.output, improved));
                    result.corrected = true;
                }
            }
            result.reflection = Some(reflection);
        }

        result.execution_time_ms = start.elapsed().as_millis() as u64;
        info!(
            agent = %self.spec.id,
            tokens = result.token_usage.total,
            elapsed_ms = result.execution_time_ms,
            corrected = result.corrected,
            fallback = result.fallback_used,
            "Agent finished task"
        );
        self.remember(&result).await;
        result
    }

    /// Answer `instruction` as-is: retries and fallback apply, but memory,
    /// tools, reflection and correction are skipped and nothing is stored.
    ///
    /// Used for crew control calls (plans, reviews, summaries) whose text
    /// must reach the caller unaltered.
    pub async fn direct(&self, instruction: &str, context: Option<&str>) -> ExecutionResult {
        let start = Instant::now();
        let merged = prompt::merge_context(context, None, self.settings.context_window_chars);
        let messages = prompt::task_messages(&self.spec, instruction, &merged, "");

        let mut result = match self.complete_with_retry(messages).await {
            Ok(completion) => {
                let mut result = ExecutionResult::success(&self.spec, completion.text);
                result.token_usage = completion.usage;
                result.fallback_used = completion.fallback_used;
                result
            }
            Err(e) => {
                warn!(agent = %self.spec.id, error = %e, "Direct call failed");
                ExecutionResult::failure(&self.spec, e.to_string())
            }
        };
        result.execution_time_ms = start.elapsed().as_millis() as u64;
        result
    }

    /// Last stored output for this agent, if memory is on and has one.
    async fn recall(&self) -> Option<String> {
        if !self.settings.use_memory {
            return None;
        }
        let memory = self.memory.as_ref()?;
        match memory.get(&keys::agent_context(&self.spec.id)).await {
            Ok(Some(value)) => serde_json::from_value::<ExecutionResult>(value)
                .ok()
                .filter(|r| !r.is_failure())
                .map(|r| format!("Your previous output:\n{}", r.output)),
            Ok(None) => None,
            Err(e) => {
                warn!(agent = %self.spec.id, error = %e, "Memory recall failed");
                None
            }
        }
    }

    async fn run_tools(&self, task: &str, context: &str) -> (String, Vec<String>) {
        let mut sections = Vec::new();
        let mut called = Vec::new();
        for tool in &self.tools {
            let args = serde_json::json!({ "query": task, "context": context });
            match tool.execute(args).await {
                Ok(r) if r.success && !r.output.trim().is_empty() => {
                    sections.push(format!("[{}]\n{}", tool.name(), r.output.trim()));
                    called.push(tool.name().to_string());
                }
                Ok(_) => debug!(agent = %self.spec.id, tool = tool.name(), "Tool returned nothing"),
                Err(e) => warn!(
                    agent = %self.spec.id,
                    tool = tool.name(),
                    error = %e,
                    "Tool failed, skipping"
                ),
            }
        }
        (sections.join("\n\n"), called)
    }

    async fn call(
        &self,
        endpoint: &ModelEndpoint,
        model: &str,
        messages: Vec<Message>,
        temperature: f32,
    ) -> Result<ProviderResponse, ProviderError> {
        let request = ProviderRequest::new(model, messages)
            .with_temperature(temperature)
            .with_max_tokens(self.spec.max_tokens);
        let provider = endpoint.provider.clone();
        endpoint.breaker.execute(|| async move { provider.complete(request).await }).await
    }

    async fn complete_with_retry(
        &self,
        messages: Vec<Message>,
    ) -> Result<Completion, ProviderError> {
        let attempts = self.settings.max_retries.max(1);
        let mut last_error = ProviderError::NotConfigured("no attempt made".into());

        for attempt in 1..=attempts {
            match self
                .call(&self.primary, &self.spec.model, messages.clone(), self.spec.temperature)
                .await
            {
                Ok(response) => {
                    return Ok(Completion {
                        usage: response.usage.map(TokenUsage::from).unwrap_or_default(),
                        text: response.message.content,
                        fallback_used: false,
                    });
                }
                Err(ProviderError::CircuitOpen { service, retry_in_ms }) => {
                    warn!(
                        agent = %self.spec.id,
                        %service,
                        retry_in_ms,
                        "Primary circuit open, skipping retries"
                    );
                    last_error = ProviderError::CircuitOpen { service, retry_in_ms };
                    break;
                }
                Err(e) => {
                    warn!(
                        agent = %self.spec.id,
                        attempt,
                        max = attempts,
                        error = %e,
                        "Model call failed"
                    );
                    last_error = e;
                    if attempt < attempts {
                        let delay = self.settings.backoff(attempt);
                        debug!(
                            agent = %self.spec.id,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "Backing off"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        let Some(fallback) = &self.fallback else {
            return Err(last_error);
        };

        info!(agent = %self.spec.id, model = %fallback.model, "Trying fallback model");
        match self
            .call(fallback, &fallback.model, messages, self.spec.temperature)
            .await
        {
            Ok(response) => Ok(Completion {
                usage: response.usage.map(TokenUsage::from).unwrap_or_default(),
                text: response.message.content,
                fallback_used: true,
            }),
            Err(e) => {
                warn!(agent = %self.spec.id, error = %e, "Fallback model failed");
                Err(e)
            }
        }
    }

    /// Critique `output`. Any failure yields the neutral reflection.
    async fn reflect(&self, task: &str, output: &str) -> (ReflectionResult, TokenUsage) {
        let messages = prompt::reflection_messages(&self.spec, task, output);
        match self
            .call(&self.primary, &self.spec.model, messages, self.settings.reflection_temperature)
            .await
        {
            Ok(response) => {
                let usage = response.usage.map(TokenUsage::from).unwrap_or_default();
                let reflection = parse_reflection(&response.message.content).unwrap_or_else(|| {
                    warn!(agent = %self.spec.id, "Unparseable reflection, using neutral default");
                    ReflectionResult::neutral()
                });
                debug!(
                    agent = %self.spec.id,
                    score = reflection.score,
                    needs_correction = reflection.needs_correction,
                    "Reflection complete"
                );
                (reflection, usage)
            }
            Err(e) => {
                warn!(
                    agent = %self.spec.id,
                    error = %e,
                    "Reflection failed, using neutral default"
                );
                (ReflectionResult::neutral(), TokenUsage::default())
            }
        }
    }

    /// Rewrite `output` using the critique. `None` keeps the original.
    async fn correct(
        &self,
        task: &str,
        output: &str,
        reflection: &ReflectionResult,
    ) -> Option<(String, TokenUsage)> {
        let messages = prompt::correction_messages(&self.spec, task, output, reflection);
        match self
            .call(&self.primary, &self.spec.model, messages, self.spec.temperature)
            .await
        {
            Ok(response) if !response.message.content.trim().is_empty() => {
                info!(
                    agent = %self.spec.id,
                    issues = reflection.issues.len(),
                    "Output self-corrected"
                );
                Some((
                    response.message.content,
                    response.usage.map(TokenUsage::from).unwrap_or_default(),
                ))
            }
            Ok(_) => {
                warn!(agent = %self.spec.id, "Empty correction, keeping original output");
                None
            }
            Err(e) => {
                warn!(
                    agent = %self.spec.id,
                    error = %e,
                    "Correction failed, keeping original output"
                );
                None
            }
        }
    }

    async fn remember(&self, result: &ExecutionResult) {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(result.clone());

        if !self.settings.use_memory {
            return;
        }
        let Some(memory) = &self.memory else {
            return;
        };
        let value = match serde_json::to_value(result) {
            Ok(v) => v,
            Err(e) => {
                warn!(agent = %self.spec.id, error = %e, "Cannot serialize result for memory");
                return;
            }
        };
        if let Err(e) = memory
            .set(&keys::agent_context(&self.spec.id), value, self.settings.memory_ttl_secs)
            .await
        {
            warn!(agent = %self.spec.id, error = %e, "Memory write failed");
        }
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.spec.id)
            .field("model", &self.spec.model)
            .field("tools", &self.tools.iter().map(|t| t.name()).collect::<Vec<_>>())
            .field("fallback", &self.fallback.as_ref().map(|f| f.model.as_str()))
            .finish()
    }
}
