//! Market Context Analyst
//!
//! First-wave agent relating the strategy to fundamentals, technicals, and
//! sentiment, and scoring how well the position aligns with them.

use agent_core::provider::GenerationConfig;
use serde_json::{Map, Value};

use super::{AnalysisAgent, context_block, schema_suffix, strategy_block};
use crate::model::{AgentInput, num_field};

const SYSTEM_PROMPT: &str = "You are a market context analyst for equity options. You weigh \
fundamentals, technical posture, and sentiment, and you judge whether a position's \
directional and volatility assumptions align with that backdrop.";

const SCHEMA: &str = r#"{
  "fundamental_score": 6.0,
  "technical_score": 5.0,
  "sentiment": "bearish | neutral | bullish",
  "alignment_score": 6.5,
  "analysis_text": "two dense paragraphs"
}"#;

/// Market context analyst
pub struct MarketContextAnalyst;

impl AnalysisAgent for MarketContextAnalyst {
    fn id(&self) -> &str {
        super::MARKET_ANALYST
    }

    fn system_prompt(&self) -> &str {
        SYSTEM_PROMPT
    }

    fn result_schema(&self) -> Option<&str> {
        Some(SCHEMA)
    }

    fn generation(&self, model: &str) -> GenerationConfig {
        GenerationConfig::for_model(model).with_temperature(0.3)
    }

    fn build_prompt(&self, input: &AgentInput) -> String {
        let strategy = &input.strategy;
        let mut prompt = strategy_block(strategy);
        prompt.push_str(&context_block(strategy));

        match &input.market_context {
            Some(market) => prompt.push_str(&format!(
                "\n## Market Context\n```json\n{}\n```\n",
                serde_json::to_string_pretty(market).unwrap_or_default()
            )),
            None => prompt.push_str(
                "\nNo sector or sentiment feed is available; reason from the \
                 fundamentals snapshot and the position itself, and say so.\n",
            ),
        }

        prompt.push_str(
            "\nScore fundamentals and technicals from 0 to 10, classify sentiment, \
             and score how well this position aligns with the backdrop (0 = fights \
             it, 10 = fully aligned).\n",
        );
        prompt.push_str(&schema_suffix(self.result_schema()));
        prompt
    }

    fn post_process(&self, data: &mut Map<String, Value>, _input: &AgentInput) {
        for key in ["fundamental_score", "technical_score", "alignment_score"] {
            if let Some(value) = num_field(data, key) {
                data.insert(key.into(), serde_json::json!(value.clamp(0.0, 10.0)));
            }
        }
    }

    fn score(&self, data: &Map<String, Value>) -> Option<f64> {
        num_field(data, "alignment_score")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testutil::iron_condor;

    #[test]
    fn test_prompt_mentions_missing_feed() {
        let agent = MarketContextAnalyst;
        let input = AgentInput::new(std::sync::Arc::new(iron_condor()));
        let prompt = agent.build_prompt(&input);
        assert!(prompt.contains("No sector or sentiment feed"));
    }

    #[test]
    fn test_scores_clamped() {
        let agent = MarketContextAnalyst;
        let mut data = Map::new();
        data.insert("alignment_score".into(), json!(15.0));

        let input = AgentInput::new(std::sync::Arc::new(iron_condor()));
        agent.post_process(&mut data, &input);
        assert_eq!(agent.score(&data), Some(10.0));
    }
}
