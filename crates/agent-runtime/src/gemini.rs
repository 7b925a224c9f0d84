//! Gemini LLM Provider
//!
//! Implementation of `LlmProvider` for the Google Generative Language API.
//! Gemini is the only vendor in the set with grounded web search, exposed
//! through the `google_search` tool.

use agent_core::error::{ProviderError, Result};
use agent_core::provider::{GenerationConfig, LlmProvider, ProviderInfo};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::http::map_status;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini provider configuration
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    /// API key for the Generative Language API
    pub api_key: String,

    /// Base URL (override for proxies/test servers)
    pub base_url: String,

    /// Vendor-side connection timeout; the hard per-call deadline lives in
    /// the resilient wrapper
    pub timeout_secs: u64,
}

impl GeminiConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow::anyhow!("GEMINI_API_KEY env var not set"))?;
        let base_url =
            std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        Ok(Self {
            api_key,
            base_url,
            timeout_secs: 120,
        })
    }
}

// ── Wire types ──────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: ApiGenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolSpec>>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Serialize)]
struct ToolSpec {
    google_search: Map<String, Value>,
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

// ── Implementation ──────────────────────────────────────────────────────

/// Gemini LLM provider
pub struct GeminiProvider {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    pub fn from_config(config: GeminiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self::from_config(GeminiConfig::from_env()?))
    }

    fn build_request(
        prompt: &str,
        system_prompt: Option<&str>,
        config: &GenerationConfig,
    ) -> ApiRequest {
        ApiRequest {
            contents: vec![Content {
                role: Some("user".into()),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            system_instruction: system_prompt.map(|text| Content {
                role: None,
                parts: vec![Part { text: text.into() }],
            }),
            generation_config: ApiGenerationConfig {
                temperature: config.temperature,
                max_output_tokens: config.max_output_tokens,
                response_mime_type: config.force_json.then_some("application/json"),
            },
            tools: config.enable_search.then(|| {
                vec![ToolSpec {
                    google_search: Map::new(),
                }]
            }),
        }
    }

    async fn send(&self, model: &str, request: &ApiRequest) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url, model, self.config.api_key
        );

        let response = self
            .client
            .post(&url)
            .json(request)
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
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(text)
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "gemini".into(),
            supports_search: true,
            supports_system_prompt: true,
        }
    }

    async fn healthcheck(&self) -> Result<bool> {
        let url = format!(
            "{}/models?key={}&pageSize=1",
            self.config.base_url, self.config.api_key
        );
        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(err) => {
                tracing::warn!(vendor = "gemini", "healthcheck failed: {err}");
                Ok(false)
            }
        }
    }

    async fn generate_text(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        config: &GenerationConfig,
    ) -> Result<String> {
        let request = Self::build_request(prompt, system_prompt, config);
        self.send(&config.model, &request).await
    }
}
