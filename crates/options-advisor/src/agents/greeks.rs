//! Options Greeks Analyst
//!
//! First-wave agent assessing position Greeks. Exposure indicators are
//! normalized per 100 underlying notional so the scale is comparable
//! across a $10 and a $500 stock; the deterministic values override
//! whatever the model echoes back.

use agent_core::provider::GenerationConfig;
use serde_json::{Map, Value, json};

use super::{AnalysisAgent, context_block, schema_suffix, strategy_block};
use crate::model::{AgentInput, num_field, ratio};

const SYSTEM_PROMPT: &str = "You are a derivatives risk analyst specializing in options \
Greeks. You quantify directional, convexity, volatility, and decay exposure of multi-leg \
positions, and you state risk plainly without hedging language.";

const SCHEMA: &str = r#"{
  "risk_score": 6.5,
  "risk_category": "low | medium | high | very_high",
  "per_100_delta": 0.021,
  "per_100_vega": -0.109,
  "theta_to_max_profit_ratio": 0.031,
  "analysis_text": "two dense paragraphs"
}"#;

/// Greeks-exposure analyst
pub struct OptionsGreeksAnalyst;

/// Greek scaled to 100 underlying notional (`greek × 100 / spot`)
pub(crate) fn per_100_notional(greek: f64, spot: Option<f64>) -> Option<f64> {
    ratio(greek * 100.0, spot?)
}

/// Bucket a 0-10 risk score
pub(crate) const fn risk_category(risk_score: f64) -> &'static str {
    if risk_score < 3.0 {
        "low"
    } else if risk_score < 6.0 {
        "medium"
    } else if risk_score < 8.0 {
        "high"
    } else {
        "very_high"
    }
}

impl AnalysisAgent for OptionsGreeksAnalyst {
    fn id(&self) -> &str {
        super::GREEKS_ANALYST
    }

    fn system_prompt(&self) -> &str {
        SYSTEM_PROMPT
    }

    fn result_schema(&self) -> Option<&str> {
        Some(SCHEMA)
    }

    fn generation(&self, model: &str) -> GenerationConfig {
        GenerationConfig::for_model(model).with_temperature(0.2)
    }

    fn build_prompt(&self, input: &AgentInput) -> String {
        let strategy = &input.strategy;
        let mut prompt = strategy_block(strategy);

        let mut indicators = String::from("\n## Normalized Exposure\n");
        match per_100_notional(strategy.portfolio_greeks.delta, strategy.spot_price()) {
            Some(delta) => indicators.push_str(&format!("Delta per 100 notional: {delta:.4}\n")),
            None => indicators.push_str("Delta per 100 notional: unavailable (no spot)\n"),
        }
        match per_100_notional(strategy.portfolio_greeks.vega, strategy.spot_price()) {
            Some(vega) => indicators.push_str(&format!("Vega per 100 notional: {vega:.4}\n")),
            None => indicators.push_str("Vega per 100 notional: unavailable (no spot)\n"),
        }
        match strategy.theta_to_max_profit() {
            Some(theta_ratio) => {
                indicators.push_str(&format!("Theta / max profit: {theta_ratio:.4}\n"));
            }
            None => indicators.push_str("Theta / max profit: unavailable\n"),
        }
        prompt.push_str(&indicators);
        prompt.push_str(&context_block(strategy));

        prompt.push_str(
            "\nAssess directional, gamma, vega, and decay risk for this position. \
             Score overall Greeks risk from 0 (benign) to 10 (severe).\n",
        );
        prompt.push_str(&schema_suffix(self.result_schema()));
        prompt
    }

    fn post_process(&self, data: &mut Map<String, Value>, input: &AgentInput) {
        let strategy = &input.strategy;
        let spot = strategy.spot_price();

        // Deterministic indicators beat model echoes
        if let Some(delta) = per_100_notional(strategy.portfolio_greeks.delta, spot) {
            data.insert("per_100_delta".into(), json!(delta));
        }
        if let Some(vega) = per_100_notional(strategy.portfolio_greeks.vega, spot) {
            data.insert("per_100_vega".into(), json!(vega));
        }
        if let Some(theta_ratio) = strategy.theta_to_max_profit() {
            data.insert("theta_to_max_profit_ratio".into(), json!(theta_ratio));
        }

        // Derive the bucket when the model skipped or mangled it
        if let Some(risk_score) = num_field(data, "risk_score") {
            let valid = data
                .get("risk_category")
                .and_then(Value::as_str)
                .is_some_and(|c| matches!(c, "low" | "medium" | "high" | "very_high"));
            if !valid {
                data.insert("risk_category".into(), json!(risk_category(risk_score)));
            }
        }
    }

    /// Favorability: low Greeks risk scores high
    fn score(&self, data: &Map<String, Value>) -> Option<f64> {
        num_field(data, "risk_score").map(|risk| 10.0 - risk)
    }
}
