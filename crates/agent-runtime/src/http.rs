//! Shared HTTP helpers for vendor adapters

use agent_core::error::ProviderError;

/// Map an HTTP error status to the provider error taxonomy: 429 is a rate
/// limit, 5xx is transient, anything else is a content/request bug
pub(crate) fn map_status(status: reqwest::StatusCode, body: &str) -> ProviderError {
    let detail = format!("{status}: {}", truncate(body, 200));
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        ProviderError::RateLimited(detail)
    } else if status.is_server_error() {
        ProviderError::Unavailable(detail)
    } else {
        ProviderError::InvalidResponse(detail)
    }
}

/// Char-boundary-safe prefix for error payload excerpts
pub(crate) fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
