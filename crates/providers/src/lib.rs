//! LLM Provider implementations for CrewForge.
//!
//! All providers implement the `crewforge_core::Provider` trait. Each
//! provider is guarded by its own [`CircuitBreaker`]; the router hands out
//! provider/model/breaker bundles built from configuration.

pub mod anthropic;
pub mod breaker;
mod http;
pub mod openai_compat;
pub mod router;

pub use anthropic::AnthropicProvider;
pub use breaker::{BreakerSettings, CircuitBreaker, CircuitState};
pub use openai_compat::OpenAiCompatProvider;
pub use router::{ModelEndpoint, ProviderRouter, build_from_config};
