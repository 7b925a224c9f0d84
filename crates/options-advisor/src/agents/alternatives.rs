//! Alternative Strategy Agent
//!
//! Phase A+ of deep research: given the panel synthesis and the live
//! chain, propose one or two alternative structures with higher POP or a
//! better risk profile than the submitted position.

use agent_core::provider::GenerationConfig;
use serde_json::{Map, Value};

use super::{AnalysisAgent, SYNTHESIS_AGENT, context_block, previous_results_block, schema_suffix, strategy_block};
use crate::model::AgentInput;

const SYSTEM_PROMPT: &str = "You are a derivatives structurer. Given an analyzed options \
position and the live chain, you propose alternative structures with a higher probability \
of profit or a better risk profile, and you are explicit about the trade-offs.";

const SCHEMA: &str = r#"{
  "alternatives": [
    {
      "strategy_name": "Bull Put Spread",
      "legs": "short put 225 / long put 215, same expiry",
      "rationale": "one paragraph",
      "est_pop": 72.0
    }
  ],
  "analysis_text": "one paragraph comparing the alternatives"
}"#;

const DEPS: &[&str] = &[SYNTHESIS_AGENT];

/// Maximum alternatives carried forward
const MAX_ALTERNATIVES: usize = 2;

/// Alternative-strategy proposer
pub struct AltStrategyAgent;

impl AnalysisAgent for AltStrategyAgent {
    fn id(&self) -> &str {
        super::ALT_STRATEGY_AGENT
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
        GenerationConfig::for_model(model).with_temperature(0.5)
    }

    fn build_prompt(&self, input: &AgentInput) -> String {
        let mut prompt = strategy_block(&input.strategy);
        prompt.push_str(&context_block(&input.strategy));
        prompt.push_str(&previous_results_block(self.depends_on(), input));
        prompt.push_str(
            "\nPropose one or two alternative structures on the same underlying \
             with a higher probability of profit or a better risk profile. Use \
             strikes that exist in the chain when one is provided. State estimated \
             POP for each.\n",
        );
        prompt.push_str(&schema_suffix(self.result_schema()));
        prompt
    }

    fn post_process(&self, data: &mut Map<String, Value>, _input: &AgentInput) {
        // Keep at most two well-formed proposals
        if let Some(Value::Array(entries)) = data.get("alternatives") {
            let cleaned: Vec<Value> = entries
                .iter()
                .filter(|entry| entry.get("strategy_name").and_then(Value::as_str).is_some())
                .take(MAX_ALTERNATIVES)
                .cloned()
                .collect();
            data.insert("alternatives".into(), Value::Array(cleaned));
        }
    }
}
