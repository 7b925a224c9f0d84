//! Research Planner
//!
//! Phase B1 of deep research: generate 1-5 research questions tailored to
//! the strategy's complexity. The question list is sanitized here so the
//! fan-out phase never sees garbage.

use agent_core::provider::GenerationConfig;
use agent_core::registry::ReportKind;
use serde_json::{Map, Value};

use super::{AnalysisAgent, SYNTHESIS_AGENT, previous_results_block, schema_suffix, strategy_block};
use crate::model::{AgentInput, AgentResult};

const SYSTEM_PROMPT: &str = "You are a research planner for an options desk. You decide \
what external, current-events questions must be answered before committing capital, and \
you ask only questions web research can actually answer.";

const SCHEMA: &str = r#"{
  "questions": [
    "What is the confirmed next earnings date and has guidance moved?",
    "Are there pending catalysts (product, legal, macro) before expiry?"
  ]
}"#;

const DEPS: &[&str] = &[SYNTHESIS_AGENT];

/// Bounds on the generated question list
pub const MIN_QUESTIONS: usize = 1;
pub const MAX_QUESTIONS: usize = 5;

/// Research-question planner
pub struct ResearchPlanner;

/// Sanitized question list from a planner result; empty when the planner
/// failed
pub fn questions(result: &AgentResult) -> Vec<String> {
    let Some(Value::Array(entries)) = result.data.get("questions") else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .take(MAX_QUESTIONS)
        .map(String::from)
        .collect()
}

impl AnalysisAgent for ResearchPlanner {
    fn id(&self) -> &str {
        super::RESEARCH_PLANNER
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

    fn report_kind(&self) -> ReportKind {
        ReportKind::Planning
    }

    fn generation(&self, model: &str) -> GenerationConfig {
        GenerationConfig::for_model(model).with_temperature(0.4)
    }

    fn build_prompt(&self, input: &AgentInput) -> String {
        let mut prompt = strategy_block(&input.strategy);
        prompt.push_str(&previous_results_block(self.depends_on(), input));
        prompt.push_str(&format!(
            "\nPlan between {MIN_QUESTIONS} and {MAX_QUESTIONS} research questions, \
             scaled to this strategy's complexity and open risks. Simple defined-risk \
             income trades need one or two; multi-catalyst situations need more.\n",
        ));
        prompt.push_str(&schema_suffix(self.result_schema()));
        prompt
    }

    fn post_process(&self, data: &mut Map<String, Value>, _input: &AgentInput) {
        let cleaned: Vec<Value> = match data.get("questions") {
            Some(Value::Array(entries)) => entries
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .take(MAX_QUESTIONS)
                .map(|q| Value::String(q.to_string()))
                .collect(),
            _ => Vec::new(),
        };
        data.insert("questions".into(), Value::Array(cleaned));
    }
}
