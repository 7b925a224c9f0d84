//! Token-Budget Trimming
//!
//! Structured context (fundamentals, option-chain excerpts) can dwarf the
//! prompt budget. Before serialization, callers shrink the payload with a
//! deterministic routine that removes leaf sections in a fixed priority
//! order until the serialized JSON fits. The value stays valid JSON at
//! every intermediate step; when the budget is below the minimal skeleton,
//! the result collapses to an empty object instead of truncated text.

use serde_json::{Map, Value};

/// Default serialized-size budget in bytes
pub const DEFAULT_BUDGET_BYTES: usize = 80_000;

/// Removal order for enriched strategy context, least-essential first
pub const STRATEGY_CONTEXT_PRIORITY: &[&str] = &[
    "fundamental_snapshot.filings",
    "fundamental_snapshot.news",
    "fundamental_snapshot.ratios",
    "option_chain_context.puts",
    "option_chain_context.calls",
    "fundamental_snapshot",
    "option_chain_context",
];

/// Serialized length of a value in bytes
pub fn serialized_len(value: &Value) -> usize {
    serde_json::to_string(value).map_or(0, |s| s.len())
}

/// Shrink `value` below `budget_bytes` by removing the dot-separated leaf
/// paths in `priority` order
pub fn trim_to_budget(value: &Value, budget_bytes: usize, priority: &[&str]) -> Value {
    let mut current = value.clone();
    if serialized_len(&current) <= budget_bytes {
        return current;
    }

    for path in priority {
        remove_path(&mut current, path);
        if serialized_len(&current) <= budget_bytes {
            return current;
        }
    }

    // Still over budget with every optional section gone: drop remaining
    // keys in reverse key order until the skeleton fits
    if let Value::Object(map) = &mut current {
        while serialized_len(&Value::Object(map.clone())) > budget_bytes && !map.is_empty() {
            let last_key = map.keys().next_back().cloned();
            if let Some(key) = last_key {
                map.remove(&key);
            }
        }
    } else {
        current = Value::Object(Map::new());
    }

    if serialized_len(&current) > budget_bytes {
        current = Value::Object(Map::new());
    }
    current
}

/// Remove the object member addressed by a dot-separated path; missing
/// segments are a no-op
fn remove_path(value: &mut Value, path: &str) {
    let segments: Vec<&str> = path.split('.').collect();
    let Some((leaf, parents)) = segments.split_last() else {
        return;
    };

    let mut cursor = value;
    for segment in parents {
        match cursor.get_mut(*segment) {
            Some(next) => cursor = next,
            None => return,
        }
    }

    if let Value::Object(map) = cursor {
        map.remove(*leaf);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample() -> Value {
        json!({
            "symbol": "AAPL",
            "option_chain_context": {
                "spot_price": 232.5,
                "calls": [{"strike": 230.0, "iv": 0.31}, {"strike": 240.0, "iv": 0.29}],
                "puts": [{"strike": 225.0, "iv": 0.33}]
            },
            "fundamental_snapshot": {
                "pe_ratio": 35.1,
                "news": ["headline one", "headline two"],
                "filings": ["10-K excerpt"]
            }
        })
    }

    #[test]
    fn test_under_budget_untouched() {
        let value = sample();
        let trimmed = trim_to_budget(&value, 10_000, STRATEGY_CONTEXT_PRIORITY);
        assert_eq!(trimmed, value);
    }

    #[test]
    fn test_removes_in_priority_order() {
        let value = sample();
        let full = serialized_len(&value);

        // A budget just below the full size should drop only the leading
        // priority sections
        let trimmed = trim_to_budget(&value, full - 10, STRATEGY_CONTEXT_PRIORITY);
        assert!(trimmed.get("fundamental_snapshot").is_some());
        assert!(
            trimmed["fundamental_snapshot"].get("filings").is_none(),
            "filings is first in the removal order"
        );
        assert!(serialized_len(&trimmed) <= full - 10);
    }

    #[test]
    fn test_every_step_is_valid_json() {
        let value = sample();
        // Walk budgets downward; every result must re-serialize cleanly
        for budget in [400, 300, 200, 100, 50, 20] {
            let trimmed = trim_to_budget(&value, budget, STRATEGY_CONTEXT_PRIORITY);
            let text = serde_json::to_string(&trimmed).unwrap();
            assert!(serde_json::from_str::<Value>(&text).is_ok());
            assert!(text.len() <= budget.max(2));
        }
    }

    #[test]
    fn test_impossible_budget_yields_skeleton() {
        let trimmed = trim_to_budget(&sample(), 0, STRATEGY_CONTEXT_PRIORITY);
        assert_eq!(trimmed, Value::Object(Map::new()));
    }

    #[test]
    fn test_missing_paths_are_noops() {
        let value = json!({"symbol": "SPY"});
        let trimmed = trim_to_budget(&value, 4, &["nope.deeper", "also_missing"]);
        // Falls through to key dropping, then the skeleton
        assert_eq!(trimmed, Value::Object(Map::new()));
    }
}
