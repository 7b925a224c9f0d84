//! Dummy LLM Provider
//!
//! Deterministic canned provider for development and offline runs. Output
//! depends only on the fixtures, never on temperature or wall clock, so
//! repeated runs produce byte-equal results.

use std::sync::atomic::{AtomicUsize, Ordering};

use agent_core::error::Result;
use agent_core::provider::{GenerationConfig, LlmProvider, ProviderInfo};
use async_trait::async_trait;
use serde_json::{Map, Value, json};

/// Canned markdown returned for text generations
const DEFAULT_TEXT: &str = "## Strategy Assessment\n\n\
The position carries a defined-risk profile with positive carry while the \
underlying trades inside the short strikes. Theta decay is the dominant \
P&L driver over the holding period; the short gamma exposure grows into \
expiry week and warrants an exit or roll before the final five sessions. \
Implied volatility sits near the middle of its one-year range, so the \
premium collected is fair rather than rich.\n\n\
### Recommendation\n\n\
Hold to 50% of maximum profit or 21 days to expiry, whichever comes first.";

/// Dummy LLM provider with fixed fixtures and call counters
pub struct DummyProvider {
    text_fixture: String,
    json_fixture: Map<String, Value>,
    calls: AtomicUsize,
}

impl Default for DummyProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyProvider {
    pub fn new() -> Self {
        let json_fixture = match json!({
            "risk_score": 5.0,
            "verdict": "hold",
            "key_insights": ["defined risk", "positive carry"],
            "analysis_text": DEFAULT_TEXT,
        }) {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        Self {
            text_fixture: DEFAULT_TEXT.into(),
            json_fixture,
            calls: AtomicUsize::new(0),
        }
    }

    /// Replace the text fixture
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text_fixture = text.into();
        self
    }

    /// Replace the JSON fixture
    #[must_use]
    pub fn with_json(mut self, map: Map<String, Value>) -> Self {
        self.json_fixture = map;
        self
    }

    /// Number of generation calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for DummyProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "dummy".into(),
            supports_search: true,
            supports_system_prompt: true,
        }
    }

    async fn healthcheck(&self) -> Result<bool> {
        Ok(true)
    }

    async fn generate_text(
        &self,
        _prompt: &str,
        _system_prompt: Option<&str>,
        _config: &GenerationConfig,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.text_fixture.clone())
    }

    async fn generate_json(
        &self,
        _prompt: &str,
        _system_prompt: Option<&str>,
        _config: &GenerationConfig,
    ) -> Result<Map<String, Value>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.json_fixture.clone())
    }
}
