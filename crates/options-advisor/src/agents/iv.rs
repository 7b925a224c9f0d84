//! IV Environment Analyst
//!
//! First-wave agent judging whether implied volatility is cheap, fair, or
//! expensive for the position being sold or bought, and how exposed the
//! position is to an IV crush around events.

use agent_core::provider::GenerationConfig;
use serde_json::{Map, Value, json};

use super::{AnalysisAgent, context_block, schema_suffix, strategy_block};
use crate::model::{AgentInput, num_field};

const SYSTEM_PROMPT: &str = "You are an implied volatility environment analyst. You judge \
IV rank and percentile, event-driven crush risk, and whether current premium levels favor \
the position's long or short vega exposure.";

const SCHEMA: &str = r#"{
  "iv_rank": 54.0,
  "iv_percentile": 61.0,
  "environment": "cheap | fair | expensive",
  "crush_risk_score": 4.0,
  "analysis_text": "two dense paragraphs"
}"#;

/// IV environment analyst
pub struct IvEnvironmentAnalyst;

/// Environment bucket from IV rank
pub(crate) const fn environment_for_rank(iv_rank: f64) -> &'static str {
    if iv_rank < 30.0 {
        "cheap"
    } else if iv_rank < 70.0 {
        "fair"
    } else {
        "expensive"
    }
}

impl AnalysisAgent for IvEnvironmentAnalyst {
    fn id(&self) -> &str {
        super::IV_ANALYST
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
        prompt.push_str(&context_block(strategy));

        if let Some(market) = &input.market_context {
            prompt.push_str(&format!(
                "\n## Market Context\n```json\n{}\n```\n",
                serde_json::to_string_pretty(market).unwrap_or_default()
            ));
        }

        prompt.push_str(
            "\nAssess the IV environment for this position. Estimate IV rank and \
             percentile from the data given (state assumptions when the chain is \
             missing), classify the environment, and score IV-crush risk from 0 \
             (none) to 10 (severe).\n",
        );
        prompt.push_str(&schema_suffix(self.result_schema()));
        prompt
    }

    fn post_process(&self, data: &mut Map<String, Value>, _input: &AgentInput) {
        // Percent fields live in [0, 100]
        for key in ["iv_rank", "iv_percentile"] {
            if let Some(value) = num_field(data, key) {
                data.insert(key.into(), json!(value.clamp(0.0, 100.0)));
            }
        }

        if let Some(iv_rank) = num_field(data, "iv_rank") {
            let valid = data
                .get("environment")
                .and_then(Value::as_str)
                .is_some_and(|e| matches!(e, "cheap" | "fair" | "expensive"));
            if !valid {
                data.insert("environment".into(), json!(environment_for_rank(iv_rank)));
            }
        }
    }

    /// Favorability: low crush risk scores high
    fn score(&self, data: &Map<String, Value>) -> Option<f64> {
        num_field(data, "crush_risk_score").map(|crush| 10.0 - crush)
    }
}
