//! Resilient Provider Wrapper
//!
//! Decorates any [`LlmProvider`] with a circuit breaker, bounded retry with
//! exponential backoff, a hard per-call timeout, and cancellation-aware
//! sleeps. The wrapper is itself an `LlmProvider`, so callers compose it
//! transparently.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::breaker::{BreakerConfig, BreakerState, CircuitBreaker};
use crate::error::{ProviderError, Result};
use crate::provider::{GenerationConfig, LlmProvider, ProviderInfo};
use crate::retry::RetryPolicy;

/// Minimum content length considered a real answer
const MIN_CONTENT_CHARS: usize = 100;

/// Provider decorator adding retry, breaker, and timeout behavior
pub struct ResilientProvider {
    inner: Arc<dyn LlmProvider>,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl ResilientProvider {
    /// Wrap a provider with default resilience settings
    pub fn new(inner: Arc<dyn LlmProvider>) -> Self {
        Self::with_policy(inner, BreakerConfig::default(), RetryPolicy::default())
    }

    /// Wrap a provider with explicit breaker and retry settings
    pub fn with_policy(
        inner: Arc<dyn LlmProvider>,
        breaker: BreakerConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            inner,
            breaker: CircuitBreaker::new(breaker),
            retry,
            cancel: CancellationToken::new(),
        }
    }

    /// Attach a cancellation token; retry loops and backoff sleeps abort
    /// when it fires
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn circuit_open_error(&self) -> ProviderError {
        ProviderError::CircuitOpen {
            provider: self.inner.info().name,
        }
    }

    /// Drive one logical operation through the breaker, timeout, and retry
    /// loop
    async fn call<T, F, Fut>(&self, config: &GenerationConfig, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if self.breaker.check() == BreakerState::Open {
            return Err(self.circuit_open_error());
        }

        let call_id = Uuid::new_v4();
        let deadline = Duration::from_secs(config.timeout_secs);
        let mut attempt: u32 = 1;

        loop {
            if self.cancel.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }

            let outcome = match tokio::time::timeout(deadline, op()).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout {
                    seconds: config.timeout_secs,
                }),
            };

            let err = match outcome {
                Ok(value) => {
                    self.breaker.record_success();
                    return Ok(value);
                }
                Err(ProviderError::Cancelled) => return Err(ProviderError::Cancelled),
                Err(err) => err,
            };

            self.breaker.record_failure();

            let budget = self.retry.attempts_for(&err);
            if attempt >= budget {
                return Err(err);
            }

            attempt += 1;
            let delay = self.retry.backoff(attempt);
            tracing::warn!(
                call_id = %call_id,
                kind = err.kind(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                "provider call failed, backing off"
            );

            tokio::select! {
                () = self.cancel.cancelled() => return Err(ProviderError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }

            if self.breaker.check() == BreakerState::Open {
                return Err(self.circuit_open_error());
            }
        }
    }
}

/// Reject empty or too-short content
fn ensure_substantial(content: String) -> Result<String> {
    if content.trim().len() < MIN_CONTENT_CHARS {
        return Err(ProviderError::EmptyResponse);
    }
    Ok(content)
}

#[async_trait]
impl LlmProvider for ResilientProvider {
    fn info(&self) -> ProviderInfo {
        self.inner.info()
    }

    async fn healthcheck(&self) -> Result<bool> {
        // Health probes bypass the breaker; they are how it would recover
        self.inner.healthcheck().await
    }

    async fn generate_text(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        config: &GenerationConfig,
    ) -> Result<String> {
        self.call(config, || async move {
            let content = self
                .inner
                .generate_text(prompt, system_prompt, config)
                .await?;
            ensure_substantial(content)
        })
        .await
    }

    async fn generate_json(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        config: &GenerationConfig,
    ) -> Result<Map<String, Value>> {
        self.call(config, || async move {
            let map = self
                .inner
                .generate_json(prompt, system_prompt, config)
                .await?;
            if map.is_empty() {
                return Err(ProviderError::EmptyResponse);
            }
            Ok(map)
        })
        .await
    }

    async fn generate_with_search(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        config: &GenerationConfig,
    ) -> Result<String> {
        self.call(config, || async move {
            let content = self
                .inner
                .generate_with_search(prompt, system_prompt, config)
                .await?;
            ensure_substantial(content)
        })
        .await
    }
}
