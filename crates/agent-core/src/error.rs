//! Error Types

use thiserror::Error;

/// Result type alias for provider operations
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Provider error taxonomy
///
/// Every failure surfaced by a provider (or its resilient wrapper) is one of
/// these kinds. Retry behavior is derived from the kind, never from message
/// contents.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Network failure or 5xx from the vendor
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// 429 or vendor-side quota exhaustion
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Response failed parsing or validation
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Hard per-call deadline elapsed
    #[error("Provider call timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Circuit breaker is open for this provider
    #[error("Circuit open for provider '{provider}'")]
    CircuitOpen { provider: String },

    /// Empty or too-short response content
    #[error("Empty response from provider")]
    EmptyResponse,

    /// Call aborted by the caller's cancellation token
    #[error("Cancelled")]
    Cancelled,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    /// Check if the error may be retried with backoff
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Unavailable(_) | ProviderError::Timeout { .. }
        )
    }

    /// Short stable label for structured logs (never includes payloads)
    pub const fn kind(&self) -> &'static str {
        match self {
            ProviderError::Unavailable(_) => "unavailable",
            ProviderError::RateLimited(_) => "rate_limited",
            ProviderError::InvalidResponse(_) => "invalid_response",
            ProviderError::Timeout { .. } => "timeout",
            ProviderError::CircuitOpen { .. } => "circuit_open",
            ProviderError::EmptyResponse => "empty_response",
            ProviderError::Cancelled => "cancelled",
            ProviderError::Config(_) => "config",
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::InvalidResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ProviderError::Unavailable("503".into()).is_retryable());
        assert!(ProviderError::Timeout { seconds: 60 }.is_retryable());
        assert!(!ProviderError::InvalidResponse("garbage".into()).is_retryable());
        assert!(!ProviderError::EmptyResponse.is_retryable());
        assert!(!ProviderError::RateLimited("429".into()).is_retryable());
    }
}
