//! Domain Models
//!
//! Core data types for options-strategy analysis. Monetary values (strikes,
//! premiums, profit bounds) use `rust_decimal`; Greeks, probabilities, and
//! scores are plain floats.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Long or short leg
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegSide {
    Long,
    Short,
}

/// Call or put
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Call,
    Put,
}

/// A single option leg
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OptionLeg {
    pub side: LegSide,
    pub kind: OptionKind,
    pub strike: Decimal,
    pub expiry: NaiveDate,
    pub quantity: u32,
    pub premium: Decimal,
}

impl OptionLeg {
    /// One-line rendering for prompts ("short call 240 exp 2026-09-18 x1")
    pub fn describe(&self) -> String {
        let side = match self.side {
            LegSide::Long => "long",
            LegSide::Short => "short",
        };
        let kind = match self.kind {
            OptionKind::Call => "call",
            OptionKind::Put => "put",
        };
        format!(
            "{side} {kind} {} exp {} x{}",
            self.strike, self.expiry, self.quantity
        )
    }
}

/// Net position Greeks across all legs
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct PortfolioGreeks {
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub rho: f64,
}

/// Pre-computed strategy analytics, consumed as inputs
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StrategyMetrics {
    pub max_profit: Decimal,
    pub max_loss: Decimal,

    /// Probability of profit, percent
    pub pop: f64,

    pub risk_reward: Option<f64>,
    pub breakevens: Vec<Decimal>,
}

/// A user's multi-leg options strategy, immutable within a run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StrategySummary {
    pub symbol: String,
    pub strategy_name: String,
    pub legs: Vec<OptionLeg>,
    pub portfolio_greeks: PortfolioGreeks,
    pub strategy_metrics: StrategyMetrics,

    /// Live chain excerpt, injected by the orchestrator when available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option_chain_context: Option<Value>,

    /// Fundamentals profile, may be partial or absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fundamental_snapshot: Option<Value>,
}

impl StrategySummary {
    /// Spot price from the chain context, when present and numeric
    ///
    /// Decimal fields arrive as JSON strings; both encodings are accepted.
    pub fn spot_price(&self) -> Option<f64> {
        self.option_chain_context
            .as_ref()
            .and_then(|ctx| ctx.get("spot_price"))
            .and_then(lenient_f64)
            .filter(|spot| spot.is_finite() && *spot > 0.0)
    }

    /// Daily theta divided by max profit, clamped to [0, 1]
    ///
    /// Division by zero means the indicator is unavailable, not an error.
    pub fn theta_to_max_profit(&self) -> Option<f64> {
        let max_profit = self.strategy_metrics.max_profit.to_f64()?;
        ratio(self.portfolio_greeks.theta.abs(), max_profit).map(|r| r.clamp(0.0, 1.0))
    }

    /// Compact leg list for prompts
    pub fn describe_legs(&self) -> String {
        self.legs
            .iter()
            .map(OptionLeg::describe)
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Structured context (chain + fundamentals) for budget trimming
    pub fn context_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(chain) = &self.option_chain_context {
            map.insert("option_chain_context".into(), chain.clone());
        }
        if let Some(fundamentals) = &self.fundamental_snapshot {
            map.insert("fundamental_snapshot".into(), fundamentals.clone());
        }
        Value::Object(map)
    }
}

/// Inputs handed to one agent invocation
///
/// Constructed fresh per invocation; `previous_results` is read-only to
/// the agent.
#[derive(Clone, Debug)]
pub struct AgentInput {
    pub strategy: Arc<StrategySummary>,
    pub market_context: Option<Value>,
    pub previous_results: HashMap<String, AgentResult>,
}

impl AgentInput {
    pub fn new(strategy: Arc<StrategySummary>) -> Self {
        Self {
            strategy,
            market_context: None,
            previous_results: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_market_context(mut self, context: Value) -> Self {
        self.market_context = Some(context);
        self
    }

    #[must_use]
    pub fn with_previous(mut self, results: HashMap<String, AgentResult>) -> Self {
        self.previous_results = results;
        self
    }
}

/// Outcome of one agent invocation
///
/// Produced exactly once per agent per run. When `success` is false, `data`
/// is the empty map, never null, so downstream consumers can key into it
/// with safe defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent_id: String,
    pub success: bool,
    pub data: Map<String, Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_text: Option<String>,

    /// Deterministic score in [0, 10], when the agent defines one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub duration_ms: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
}

impl AgentResult {
    /// Failed result with empty data
    pub fn failure(agent_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            success: false,
            data: Map::new(),
            analysis_text: None,
            score: None,
            error: Some(error.into()),
            duration_ms: 0,
            model_used: None,
        }
    }

    /// Defensive numeric field access
    pub fn num(&self, key: &str) -> Option<f64> {
        num_field(&self.data, key)
    }

    /// Defensive string field access
    pub fn text(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

/// Read a numeric field, treating null, absent, or non-numeric values as
/// missing
pub fn num_field(data: &Map<String, Value>, key: &str) -> Option<f64> {
    data.get(key).and_then(Value::as_f64).filter(|n| n.is_finite())
}

/// Number, or a numeric string (the Decimal serde encoding)
fn lenient_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Guarded division: a zero or non-finite denominator means the indicator
/// is unavailable
pub fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 || !denominator.is_finite() || !numerator.is_finite() {
        return None;
    }
    Some(numerator / denominator)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testutil::iron_condor;

    #[test]
    fn test_leg_description() {
        let strategy = iron_condor();
        assert_eq!(
            strategy.legs[0].describe(),
            "short put 220 exp 2026-09-18 x1"
        );
        assert_eq!(strategy.legs.len(), 4);
    }

    #[test]
    fn test_theta_to_max_profit_clamped() {
        let mut strategy = iron_condor();
        assert!((strategy.theta_to_max_profit().unwrap() - 0.031).abs() < 1e-9);

        // Zero max profit: indicator unavailable, not a division error
        strategy.strategy_metrics.max_profit = Decimal::ZERO;
        assert!(strategy.theta_to_max_profit().is_none());
    }

    #[test]
    fn test_spot_price_defensive() {
        let mut strategy = iron_condor();
        assert!(strategy.spot_price().is_none());

        strategy.option_chain_context = Some(json!({"spot_price": "not a number"}));
        assert!(strategy.spot_price().is_none());

        strategy.option_chain_context = Some(json!({"spot_price": 232.5}));
        assert_eq!(strategy.spot_price(), Some(232.5));

        // Decimal serde encoding: numeric string
        strategy.option_chain_context = Some(json!({"spot_price": "232.50"}));
        assert_eq!(strategy.spot_price(), Some(232.5));
    }

    #[test]
    fn test_failure_result_has_empty_data() {
        let result = AgentResult::failure("iv_environment_analyst", "missing:market_context");
        assert!(!result.success);
        assert!(result.data.is_empty());
        assert_eq!(result.error.as_deref(), Some("missing:market_context"));
    }

    #[test]
    fn test_num_field_rejects_non_numeric() {
        let mut data = Map::new();
        data.insert("a".into(), json!("7"));
        data.insert("b".into(), json!(null));
        data.insert("c".into(), json!(7.5));

        assert!(num_field(&data, "a").is_none());
        assert!(num_field(&data, "b").is_none());
        assert!(num_field(&data, "missing").is_none());
        assert_eq!(num_field(&data, "c"), Some(7.5));
    }

    #[test]
    fn test_ratio_guards() {
        assert!(ratio(1.0, 0.0).is_none());
        assert!(ratio(f64::NAN, 2.0).is_none());
        assert_eq!(ratio(1.0, 2.0), Some(0.5));
    }
}
