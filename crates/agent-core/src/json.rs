//! LLM Response Parsing
//!
//! Models frequently wrap JSON answers in markdown code fences. A single
//! pre-processing step strips the wrapper before parsing; anything that
//! still fails to parse is an `InvalidResponse`.

use serde_json::{Map, Value};

use crate::error::{ProviderError, Result};

/// Strip a surrounding ```json ... ``` (or bare ```) fence, if present
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json", "JSON", or empty) up to the first newline
    let body = rest.split_once('\n').map_or(rest, |(_, body)| body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Parse a provider response into a JSON object
///
/// Falls back to the outermost brace-bounded slice when the model wrapped
/// the object in prose.
pub fn parse_json_object(raw: &str) -> Result<Map<String, Value>> {
    let cleaned = strip_code_fences(raw);

    match serde_json::from_str::<Value>(cleaned) {
        Ok(Value::Object(map)) => return Ok(map),
        Ok(other) => {
            return Err(ProviderError::InvalidResponse(format!(
                "expected JSON object, got {}",
                value_kind(&other)
            )));
        }
        Err(_) => {}
    }

    // Fallback: locate the outermost object in surrounding prose
    let start = cleaned.find('{');
    let end = cleaned.rfind('}');
    if let (Some(start), Some(end)) = (start, end) {
        if end > start {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&cleaned[start..=end]) {
                return Ok(map);
            }
        }
    }

    Err(ProviderError::InvalidResponse(
        "response is not valid JSON".into(),
    ))
}

const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
