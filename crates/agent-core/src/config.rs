//! Startup Configuration
//!
//! Loaded once from the environment at process start; immutable afterwards.

use serde::{Deserialize, Serialize};

use crate::registry::ModelMap;
use crate::trim::DEFAULT_BUDGET_BYTES;

/// Supported vendor backends
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    Gemini,
    OpenAi,
    Anthropic,
    Dummy,
}

impl Vendor {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Vendor::Gemini => "gemini",
            Vendor::OpenAi => "openai",
            Vendor::Anthropic => "anthropic",
            Vendor::Dummy => "dummy",
        }
    }

    /// Parse a vendor name, falling back to the given default
    pub fn from_str_or(s: &str, default: Self) -> Self {
        match s.to_lowercase().as_str() {
            "gemini" => Vendor::Gemini,
            "openai" => Vendor::OpenAi,
            "anthropic" => Vendor::Anthropic,
            "dummy" => Vendor::Dummy,
            _ => default,
        }
    }
}

impl std::fmt::Display for Vendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Core orchestration settings
#[derive(Clone, Debug)]
pub struct CoreConfig {
    /// Preferred vendor
    pub primary_provider: Vendor,

    /// Fallback vendor
    pub secondary_provider: Vendor,

    /// Report-kind → model routing
    pub model_map: ModelMap,

    /// Serialized-context budget applied before prompt assembly
    pub token_budget_bytes: usize,

    /// Soft deadline for a deep-research run
    pub deep_research_deadline_secs: u64,

    /// Whether progress callbacks are invoked at all
    pub progress_callback_enabled: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            primary_provider: Vendor::Gemini,
            secondary_provider: Vendor::OpenAi,
            model_map: ModelMap::default(),
            token_budget_bytes: DEFAULT_BUDGET_BYTES,
            deep_research_deadline_secs: 1800,
            progress_callback_enabled: true,
        }
    }
}

impl CoreConfig {
    /// Load from environment variables, keeping defaults for anything unset
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let primary_provider = std::env::var("PRIMARY_PROVIDER")
            .map(|v| Vendor::from_str_or(&v, defaults.primary_provider))
            .unwrap_or(defaults.primary_provider);
        let secondary_provider = std::env::var("SECONDARY_PROVIDER")
            .map(|v| Vendor::from_str_or(&v, defaults.secondary_provider))
            .unwrap_or(defaults.secondary_provider);

        let mut model_map = defaults.model_map.clone();
        if let Ok(model) = std::env::var("MODEL_REPORT") {
            model_map.report = model;
        }
        if let Ok(model) = std::env::var("MODEL_DAILY_PICK") {
            model_map.daily_pick = model;
        }
        if let Ok(model) = std::env::var("MODEL_DEEP_RESEARCH_SYNTHESIS") {
            model_map.deep_research_synthesis = model;
        }
        if let Ok(model) = std::env::var("MODEL_PLANNING") {
            model_map.planning = model;
        }
        if let Ok(model) = std::env::var("MODEL_QUESTION_ANSWER") {
            model_map.question_answer = model;
        }

        let token_budget_bytes = std::env::var("TOKEN_BUDGET_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.token_budget_bytes);
        let deep_research_deadline_secs = std::env::var("DEEP_RESEARCH_DEADLINE_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.deep_research_deadline_secs);
        let progress_callback_enabled = std::env::var("PROGRESS_CALLBACK_ENABLED")
            .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
            .unwrap_or(defaults.progress_callback_enabled);

        Self {
            primary_provider,
            secondary_provider,
            model_map,
            token_budget_bytes,
            deep_research_deadline_secs,
            progress_callback_enabled,
        }
    }
}
