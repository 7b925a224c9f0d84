//! # agent-runtime
//!
//! Vendor LLM providers for the options research agent.
//!
//! ## Providers
//!
//! - **Gemini** (default primary): grounded web search, native system
//!   instructions, JSON response mime type
//! - **OpenAI** (default secondary): chat completions with `json_object`
//!   response format
//! - **Anthropic**: messages API with top-level system prompt
//! - **Dummy**: deterministic canned output for development and tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::CoreConfig;
//! use agent_runtime::standard_registry;
//!
//! let config = CoreConfig::from_env();
//! let registry = standard_registry(&config);
//! let provider = registry.primary();
//! ```

mod http;

pub mod anthropic;
pub mod dummy;
pub mod gemini;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use dummy::DummyProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;

use std::sync::Arc;

use agent_core::config::{CoreConfig, Vendor};
use agent_core::registry::{PRIMARY, ProviderRegistry, SECONDARY};
use agent_core::resilient::ResilientProvider;

// Re-export core types for convenience
pub use agent_core::{GenerationConfig, LlmProvider, ProviderError, Result};

fn resilient(inner: Arc<dyn LlmProvider>) -> Arc<dyn LlmProvider> {
    Arc::new(ResilientProvider::new(inner))
}

/// Build the standard registry: every vendor registered behind the
/// resilient wrapper, with `primary`/`secondary` aliased per config
pub fn standard_registry(config: &CoreConfig) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new(config.model_map.clone());

    registry.register(
        Vendor::Gemini.as_str(),
        Box::new(|| Ok(resilient(Arc::new(GeminiProvider::from_env()?)))),
    );
    registry.register(
        Vendor::OpenAi.as_str(),
        Box::new(|| Ok(resilient(Arc::new(OpenAiProvider::from_env()?)))),
    );
    registry.register(
        Vendor::Anthropic.as_str(),
        Box::new(|| Ok(resilient(Arc::new(AnthropicProvider::from_env()?)))),
    );
    registry.register(
        Vendor::Dummy.as_str(),
        Box::new(|| Ok(Arc::new(DummyProvider::new()) as Arc<dyn LlmProvider>)),
    );

    registry.set_alias(PRIMARY, config.primary_provider.as_str());
    registry.set_alias(SECONDARY, config.secondary_provider.as_str());
    registry
}
