//! Turns a [`DemandAnalysis`] into a runnable [`Crew`].

use crewforge_agent::{Agent, AgentSettings, Crew, CrewSettings};
use crewforge_core::agent::AgentSpec;
use crewforge_core::crew::{CrewSpec, ProcessMode, TaskSpec};
use crewforge_core::error::{Error, Result};
use crewforge_core::memory::ShortTermMemory;
use crewforge_core::tool::{Tool, ToolRegistry};
use crewforge_providers::ModelEndpoint;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::demand::DemandAnalysis;
use crate::focus_group::evaluation_task;
use crate::registry::{AgentRegistry, FOCUS_GROUP_AGENTS, REFINER_AGENT};

const TASK_EXPECTED_OUTPUT: &str =
    "A complete, ready-to-use deliverable for this step, in the client's language.";
const EVALUATION_EXPECTED_OUTPUT: &str = "One evaluation object in the requested format.";

/// Instantiates agents and tasks from templates.
#[derive(Clone)]
pub struct CrewBuilder {
    registry: AgentRegistry,
    primary: ModelEndpoint,
    fallback: Option<ModelEndpoint>,
    memory: Option<Arc<dyn ShortTermMemory>>,
    agent_settings: AgentSettings,
    crew_settings: CrewSettings,
}

impl CrewBuilder {
    pub fn new(registry: AgentRegistry, primary: ModelEndpoint) -> Self {
        Self {
            registry,
            primary,
            fallback: None,
            memory: None,
            agent_settings: AgentSettings::default(),
            crew_settings: CrewSettings::default(),
        }
    }

    pub fn with_fallback(mut self, fallback: Option<ModelEndpoint>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_memory(mut self, memory: Arc<dyn ShortTermMemory>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_agent_settings(mut self, settings: AgentSettings) -> Self {
        self.agent_settings = settings;
        self
    }

    pub fn with_crew_settings(mut self, settings: CrewSettings) -> Self {
        self.crew_settings = settings;
        self
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Build the crew for a demand. Every template agent must be registered.
    pub fn build(
        &self,
        analysis: &DemandAnalysis,
        topic: &str,
        objective: Option<&str>,
        tools: &ToolRegistry,
    ) -> Result<Crew> {
        let spec = CrewSpec::new(
            format!("{}_{}", analysis.crew_template, short_id()),
            analysis.crew_template.clone(),
            analysis.process,
        )
        .with_description(format!("{}: {}", analysis.demand_type, topic));

        let mut crew = self.crew(spec);
        let mut added: Vec<&str> = Vec::new();
        for agent_id in &analysis.agents {
            if added.contains(&agent_id.as_str()) {
                continue;
            }
            let agent = self.agent(agent_id, tools, self.agent_settings.clone())?;
            crew.add_agent(Arc::new(agent));
            added.push(agent_id);
        }

        for (i, (agent_id, task)) in analysis.agents.iter().zip(&analysis.tasks).enumerate() {
            crew.add_task(TaskSpec::new(
                format!("task_{}", i + 1),
                task_description(task, topic, objective),
                TASK_EXPECTED_OUTPUT,
                agent_id.clone(),
            ));
        }

        debug!(
            crew = %crew.spec().id,
            process = %analysis.process,
            agents = added.len(),
            tasks = analysis.tasks.len(),
            "Crew built"
        );
        Ok(crew)
    }

    /// A parallel crew of persona evaluators, each reviewing `content`.
    ///
    /// Evaluators skip reflection, self-correction and agent memory so
    /// iterations never see each other's verdicts.
    pub fn build_focus_group(&self, content: &str) -> Result<Crew> {
        let id = format!("focus_group_{}", short_id());
        let spec = CrewSpec::new(id, "focus_group", ProcessMode::Parallel)
            .with_description("Persona evaluation of a deliverable");
        let mut crew = self.crew(spec);
        let settings = AgentSettings {
            enable_reflection: false,
            enable_self_correction: false,
            use_memory: false,
            ..self.agent_settings.clone()
        };

        for (i, id) in FOCUS_GROUP_AGENTS.iter().enumerate() {
            let agent = self.agent(id, &ToolRegistry::new(), settings.clone())?;
            let task = TaskSpec::new(
                format!("evaluation_{}", i + 1),
                evaluation_task(&agent.spec().name),
                EVALUATION_EXPECTED_OUTPUT,
                *id,
            )
            .with_context(format!("## Content under evaluation\n{content}"));
            crew.add_agent(Arc::new(agent));
            crew.add_task(task);
        }
        Ok(crew)
    }

    /// The agent that rewrites a deliverable from focus-group feedback.
    pub fn refiner(&self) -> Result<Agent> {
        let settings = AgentSettings {
            enable_reflection: false,
            enable_self_correction: false,
            use_memory: false,
            ..self.agent_settings.clone()
        };
        self.agent(REFINER_AGENT, &ToolRegistry::new(), settings)
    }

    fn crew(&self, spec: CrewSpec) -> Crew {
        let crew = Crew::new(spec).with_settings(self.crew_settings.clone());
        match &self.memory {
            Some(memory) => crew.with_memory(memory.clone()),
            None => crew,
        }
    }

    fn agent(&self, id: &str, tools: &ToolRegistry, settings: AgentSettings) -> Result<Agent> {
        let spec = self.registry.create(id).ok_or_else(|| Error::Config {
            message: format!("Unknown agent '{id}'"),
        })?;
        let spec = AgentSpec {
            model: self.primary.model.clone(),
            ..spec
        };

        let resolved: Vec<Arc<dyn Tool>> = spec
            .tools
            .iter()
            .filter_map(|name| {
                let tool = tools.get(name);
                if tool.is_none() {
                    warn!(agent = %id, tool = %name, "Tool not available, skipping");
                }
                tool
            })
            .collect();

        let mut agent = Agent::new(spec, self.primary.clone())
            .with_tools(resolved)
            .with_settings(settings.clone());
        if let Some(fallback) = &self.fallback {
            agent = agent.with_fallback(fallback.clone());
        }
        if settings.use_memory {
            if let Some(memory) = &self.memory {
                agent = agent.with_memory(memory.clone());
            }
        }
        Ok(agent)
    }
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn task_description(task: &str, topic: &str, objective: Option<&str>) -> String {
    let mut description = format!("{task}\n\nTopic: {topic}");
    if let Some(objective) = objective.filter(|o| !o.trim().is_empty()) {
        description.push_str(&format!("\nObjective: {objective}"));
    }
    description
}

impl std::fmt::Debug for CrewBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrewBuilder")
            .field("registry", &self.registry)
            .field("primary", &self.primary)
            .field("fallback", &self.fallback)
            .finish()
    }
}
