//! Demand-to-deliverable orchestration.
//!
//! [`MasterOrchestrator`] maps a request to a crew template
//! ([`DemandAnalyzer`]), instantiates it ([`CrewBuilder`]), runs it, parses
//! the compiled output into [`ParsedOutputs`], and optionally validates the
//! result with a focus group of persona evaluators.

pub mod brand;
pub mod builder;
pub mod demand;
pub mod focus_group;
pub mod orchestrator;
pub mod parser;
pub mod registry;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use brand::{BrandContextSource, NoBrandContext, StaticBrandContext};
pub use builder::CrewBuilder;
pub use demand::{Complexity, DemandAnalysis, DemandAnalyzer};
pub use focus_group::{
    FocusGroupResult, PersonaEvaluation, Verdict, average_score, parse_evaluations,
};
pub use orchestrator::{
    MasterOrchestrator, OrchestrationRequest, OrchestrationResponse, OrchestratorSettings,
};
pub use parser::{ParsedOutputs, parse_outputs};
pub use registry::{AgentRegistry, FOCUS_GROUP_AGENTS, REFINER_AGENT};
