//! Risk Scenario Analyst
//!
//! Second-wave agent. Reads the whole first wave and stress-tests the
//! position: adverse moves, vol shocks, pin risk, and what to do about
//! each. Malformed scenario entries from the model are dropped, not
//! propagated.

use agent_core::provider::GenerationConfig;
use serde_json::{Map, Value, json};

use super::{
    AnalysisAgent, GREEKS_ANALYST, IV_ANALYST, MARKET_ANALYST, previous_results_block,
    schema_suffix, strategy_block,
};
use crate::model::{AgentInput, num_field};

const SYSTEM_PROMPT: &str = "You are a risk scenario analyst for options positions. You \
stress positions against adverse spot moves, volatility shocks, and time decay, quantify \
tail risk, and propose concrete mitigations.";

const SCHEMA: &str = r#"{
  "risk_score": 6.0,
  "stressed_pnl": [{"scenario": "spot -10%", "pnl": -850.0}],
  "tail_risk": "one paragraph",
  "mitigations": ["close at 21 DTE", "roll the tested side"],
  "analysis_text": "two dense paragraphs"
}"#;

const DEPS: &[&str] = &[GREEKS_ANALYST, IV_ANALYST, MARKET_ANALYST];

/// Risk scenario analyst
pub struct RiskScenarioAnalyst;

impl AnalysisAgent for RiskScenarioAnalyst {
    fn id(&self) -> &str {
        super::RISK_ANALYST
    }

    fn depends_on(&self) -> &[&'static str] {
        DEPS
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
        let mut prompt = strategy_block(&input.strategy);
        prompt.push_str(&previous_results_block(self.depends_on(), input));
        prompt.push_str(
            "\nStress this position: at minimum spot ±5%, ±10%, an IV +10-point \
             shock, and expiry pinned between the short strikes. Quantify P&L per \
             scenario, describe the tail, list mitigations, and score overall risk \
             from 0 (benign) to 10 (severe). Treat empty prior sections as \
             unavailable analysis.\n",
        );
        prompt.push_str(&schema_suffix(self.result_schema()));
        prompt
    }

    fn post_process(&self, data: &mut Map<String, Value>, _input: &AgentInput) {
        // Keep only well-formed stress entries
        if let Some(Value::Array(entries)) = data.get("stressed_pnl") {
            let cleaned: Vec<Value> = entries
                .iter()
                .filter(|entry| {
                    entry.get("scenario").and_then(Value::as_str).is_some()
                        && entry
                            .get("pnl")
                            .and_then(Value::as_f64)
                            .is_some_and(f64::is_finite)
                })
                .cloned()
                .collect();
            data.insert("stressed_pnl".into(), Value::Array(cleaned));
        }

        // Mitigations must be a list of strings
        if let Some(Value::Array(entries)) = data.get("mitigations") {
            let cleaned: Vec<Value> = entries
                .iter()
                .filter(|entry| entry.is_string())
                .cloned()
                .collect();
            data.insert("mitigations".into(), Value::Array(cleaned));
        }
    }

    /// Favorability: low scenario risk scores high
    fn score(&self, data: &Map<String, Value>) -> Option<f64> {
        num_field(data, "risk_score").map(|risk| 10.0 - risk)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::AgentResult;
    use crate::testutil::iron_condor;

    #[test]
    fn test_failed_dependency_renders_empty() {
        let agent = RiskScenarioAnalyst;
        let mut input = AgentInput::new(Arc::new(iron_condor()));
        input.previous_results.insert(
            IV_ANALYST.into(),
            AgentResult::failure(IV_ANALYST, "invalid_response"),
        );

        let prompt = agent.build_prompt(&input);
        assert!(prompt.contains("### iv_environment_analyst"));
        assert!(prompt.contains("unavailable analysis"));
    }

    #[test]
    fn test_post_process_drops_malformed_scenarios() {
        let agent = RiskScenarioAnalyst;
        let mut data = Map::new();
        data.insert(
            "stressed_pnl".into(),
            json!([
                {"scenario": "spot -10%", "pnl": -850.0},
                {"scenario": "missing pnl"},
                {"pnl": 120.0},
                "not an object",
                {"scenario": "spot +10%", "pnl": "NaN"}
            ]),
        );
        data.insert("mitigations".into(), json!(["roll", 42, null, "close"]));

        let input = AgentInput::new(Arc::new(iron_condor()));
        agent.post_process(&mut data, &input);

        assert_eq!(data["stressed_pnl"].as_array().unwrap().len(), 1);
        assert_eq!(data["mitigations"], json!(["roll", "close"]));
    }
}
