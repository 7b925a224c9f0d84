//! LLM Provider Strategy Pattern
//!
//! Defines a common interface for all LLM providers (Gemini, OpenAI,
//! Anthropic, etc.) so the agent panel can work with any backend without
//! code changes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::provider::{GenerationConfig, LlmProvider};
//!
//! let config = GenerationConfig::for_model("gemini-2.0-flash");
//! let memo = provider.generate_text(prompt, Some(system_prompt), &config).await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Configuration for a single generation call
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Model identifier (e.g., "gemini-2.0-flash", "gpt-4o")
    pub model: String,

    /// Temperature for sampling (0.0 = deterministic, up to 2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Hard per-call deadline, enforced by the resilient wrapper
    /// independently of any vendor SDK timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Request web-grounded search when the vendor supports it
    #[serde(default)]
    pub enable_search: bool,

    /// Force the vendor into JSON output mode
    #[serde(default)]
    pub force_json: bool,
}

fn default_temperature() -> f32 {
    0.3
}
fn default_max_output_tokens() -> u32 {
    8192
}
fn default_timeout_secs() -> u64 {
    60
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".into(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_timeout_secs(),
            enable_search: false,
            force_json: false,
        }
    }
}

impl GenerationConfig {
    /// Create a config for a specific model
    pub fn for_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Override the hard per-call deadline
    #[must_use]
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Override the sampling temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Provider metadata and capability flags
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// Vendor name (e.g., "gemini", "openai")
    pub name: String,

    /// Whether web-grounded search is available
    pub supports_search: bool,

    /// Whether the vendor accepts a native system instruction; when false,
    /// callers fold the system prompt into the user prompt
    pub supports_system_prompt: bool,
}

/// Strategy trait for LLM providers
///
/// Implement this trait to add support for new vendors. Every operation
/// must return non-empty content or fail with a typed [`crate::ProviderError`].
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get provider name and capabilities
    fn info(&self) -> ProviderInfo;

    /// Check if the provider is reachable and configured correctly
    async fn healthcheck(&self) -> Result<bool>;

    /// Generate free-form text (typically Markdown)
    async fn generate_text(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        config: &GenerationConfig,
    ) -> Result<String>;

    /// Generate a parsed JSON object
    ///
    /// Stray code-fence wrappers around the JSON are stripped before
    /// parsing. Non-object output fails with `InvalidResponse`.
    async fn generate_json(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        config: &GenerationConfig,
    ) -> Result<Map<String, Value>> {
        let mut cfg = config.clone();
        cfg.force_json = true;
        let raw = self.generate_text(prompt, system_prompt, &cfg).await?;
        crate::json::parse_json_object(&raw)
    }

    /// Generate text with web-grounded search enabled
    ///
    /// Vendors without a search capability answer from the model alone.
    async fn generate_with_search(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        config: &GenerationConfig,
    ) -> Result<String> {
        let mut cfg = config.clone();
        cfg.enable_search = true;
        self.generate_text(prompt, system_prompt, &cfg).await
    }
}

/// Delimiter used when a vendor lacks native system instructions
const SYSTEM_PROMPT_DELIMITER: &str = "\n\n---\n\n";

/// Fold the system prompt into the user prompt for vendors without native
/// system-instruction support
pub fn fold_system_prompt(system_prompt: Option<&str>, prompt: &str) -> String {
    match system_prompt {
        Some(system) if !system.is_empty() => {
            format!("{system}{SYSTEM_PROMPT_DELIMITER}{prompt}")
        }
        _ => prompt.to_string(),
    }
}
