//! Anthropic LLM Provider
//!
//! Implementation of `LlmProvider` for the Anthropic messages API. The
//! system prompt is a top-level request field; JSON mode is prompt-steered
//! since the API has no structured-output switch.

use agent_core::error::{ProviderError, Result};
use agent_core::provider::{GenerationConfig, LlmProvider, ProviderInfo};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::http::map_status;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

/// Instruction appended when the caller forces JSON output
const JSON_STEERING: &str =
    "\n\nRespond with a single JSON object only, no prose and no code fences.";

/// Anthropic provider configuration
#[derive(Clone, Debug)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl AnthropicConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow::anyhow!("ANTHROPIC_API_KEY env var not set"))?;
        let base_url =
            std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        Ok(Self {
            api_key,
            base_url,
            timeout_secs: 120,
        })
    }
}

// ── Wire types ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

// ── Implementation ──────────────────────────────────────────────────────

/// Anthropic LLM provider
pub struct AnthropicProvider {
    client: reqwest::Client,
    config: AnthropicConfig,
}

impl AnthropicProvider {
    pub fn from_config(config: AnthropicConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self::from_config(AnthropicConfig::from_env()?))
    }

    fn build_request(
        prompt: &str,
        system_prompt: Option<&str>,
        config: &GenerationConfig,
    ) -> ApiRequest {
        let mut user_prompt = prompt.to_string();
        if config.force_json {
            user_prompt.push_str(JSON_STEERING);
        }

        ApiRequest {
            model: config.model.clone(),
            max_tokens: config.max_output_tokens,
            temperature: config.temperature,
            system: system_prompt.map(String::from),
            messages: vec![ApiMessage {
                role: "user",
                content: user_prompt,
            }],
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "anthropic".into(),
            supports_search: false,
            supports_system_prompt: true,
        }
    }

    async fn healthcheck(&self) -> Result<bool> {
        // No cheap unauthenticated probe; configured key means reachable
        Ok(!self.config.api_key.is_empty())
    }

    async fn generate_text(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        config: &GenerationConfig,
    ) -> Result<String> {
        let request = Self::build_request(prompt, system_prompt, config);
        let url = format!("{}/messages", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|err| ProviderError::Unavailable(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, &body));
        }

        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::InvalidResponse(err.to_string()))?;

        let text: String = parsed
            .content
            .iter()
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(text)
    }
}
