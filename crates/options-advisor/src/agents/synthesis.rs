//! Synthesis Agents
//!
//! `OptionsSynthesisAgent` closes the expert panel: it reads every prior
//! result and produces the verdict, key insights, and the memo body. A
//! deterministic composite of the upstream favorability scores is computed
//! here so operators can tune the weights in one place.
//!
//! `ExecutiveSynthesisAgent` is the deep-research finale: it merges the
//! panel synthesis, alternative strategies, and web-research answers into
//! the three-section executive memo.

use agent_core::provider::GenerationConfig;
use agent_core::registry::ReportKind;
use serde_json::{Map, Value, json};

use super::{
    ALT_STRATEGY_AGENT, AnalysisAgent, GREEKS_ANALYST, IV_ANALYST, MARKET_ANALYST, RISK_ANALYST,
    SYNTHESIS_AGENT, previous_results_block, schema_suffix, strategy_block,
};
use crate::model::{AgentInput, num_field};

// Composite weights over the upstream favorability scores. Risk carries
// the largest share; adjust here, never inline.
const W_GREEKS: f64 = 0.25;
const W_IV: f64 = 0.20;
const W_MARKET: f64 = 0.20;
const W_RISK: f64 = 0.35;

const PANEL_SYSTEM_PROMPT: &str = "You are the lead analyst synthesizing an options desk's \
specialist reports into one institutional research memo. You weigh every input, call out \
disagreements between specialists, and commit to a verdict.";

const PANEL_SCHEMA: &str = r#"{
  "overall_score": 6.8,
  "verdict": "avoid | hold | consider | favorable",
  "key_insights": ["..."],
  "final_recommendation": "one paragraph",
  "memo_markdown": "full memo body in markdown"
}"#;

const PANEL_DEPS: &[&str] = &[GREEKS_ANALYST, IV_ANALYST, MARKET_ANALYST, RISK_ANALYST];

/// Panel synthesis agent (Phase-3 of the canonical workflow)
pub struct OptionsSynthesisAgent;

/// Weighted composite of upstream favorability scores; None when every
/// upstream score is missing
pub(crate) fn composite_score(input: &AgentInput) -> Option<f64> {
    let mut total = 0.0;
    let mut weight_sum = 0.0;
    for (agent_id, weight) in [
        (GREEKS_ANALYST, W_GREEKS),
        (IV_ANALYST, W_IV),
        (MARKET_ANALYST, W_MARKET),
        (RISK_ANALYST, W_RISK),
    ] {
        if let Some(score) = input
            .previous_results
            .get(agent_id)
            .and_then(|result| result.score)
        {
            total += score * weight;
            weight_sum += weight;
        }
    }
    (weight_sum > 0.0).then(|| (total / weight_sum).clamp(0.0, 10.0))
}

impl AnalysisAgent for OptionsSynthesisAgent {
    fn id(&self) -> &str {
        SYNTHESIS_AGENT
    }

    fn depends_on(&self) -> &[&'static str] {
        PANEL_DEPS
    }

    fn system_prompt(&self) -> &str {
        PANEL_SYSTEM_PROMPT
    }

    fn result_schema(&self) -> Option<&str> {
        Some(PANEL_SCHEMA)
    }

    fn generation(&self, model: &str) -> GenerationConfig {
        GenerationConfig::for_model(model).with_temperature(0.4)
    }

    fn build_prompt(&self, input: &AgentInput) -> String {
        let mut prompt = strategy_block(&input.strategy);
        prompt.push_str(&previous_results_block(self.depends_on(), input));
        if let Some(composite) = composite_score(input) {
            prompt.push_str(&format!(
                "\nDeterministic composite of specialist scores: {composite:.2} / 10\n"
            ));
        }
        prompt.push_str(
            "\nWrite the final research memo. Empty prior sections mean that \
             specialist was unavailable; say so in the memo rather than guessing. \
             Score the overall opportunity from 0 to 10 and commit to a verdict.\n",
        );
        prompt.push_str(&schema_suffix(self.result_schema()));
        prompt
    }

    fn post_process(&self, data: &mut Map<String, Value>, input: &AgentInput) {
        if let Some(composite) = composite_score(input) {
            data.insert("composite_score".into(), json!(composite));
            // A model that skipped the overall score inherits the composite
            if num_field(data, "overall_score").is_none() {
                data.insert("overall_score".into(), json!(composite));
            }
        }
        if let Some(overall) = num_field(data, "overall_score") {
            data.insert("overall_score".into(), json!(overall.clamp(0.0, 10.0)));
        }
    }

    fn score(&self, data: &Map<String, Value>) -> Option<f64> {
        num_field(data, "overall_score")
    }
}

const EXECUTIVE_SYSTEM_PROMPT: &str = "You are the managing editor of an options research \
desk producing an executive memo for sophisticated clients. You merge internal analysis, \
alternative trade structures, and external research into a decisive three-section brief.";

const EXECUTIVE_SCHEMA: &str = r#"{
  "snapshot": "markdown for the Snapshot section",
  "deep_analysis": "markdown for the Deep Analysis section",
  "action_plan": "markdown for the Action Plan section"
}"#;

const EXECUTIVE_DEPS: &[&str] = &[SYNTHESIS_AGENT, ALT_STRATEGY_AGENT];

/// Deep-research final synthesis (Phase B3)
pub struct ExecutiveSynthesisAgent {
    /// Ids of the answered research questions to fold into the memo
    question_ids: Vec<String>,
}

impl ExecutiveSynthesisAgent {
    pub fn new(question_ids: Vec<String>) -> Self {
        Self { question_ids }
    }
}

impl AnalysisAgent for ExecutiveSynthesisAgent {
    fn id(&self) -> &str {
        super::EXECUTIVE_SYNTHESIS
    }

    fn depends_on(&self) -> &[&'static str] {
        EXECUTIVE_DEPS
    }

    fn system_prompt(&self) -> &str {
        EXECUTIVE_SYSTEM_PROMPT
    }

    fn result_schema(&self) -> Option<&str> {
        Some(EXECUTIVE_SCHEMA)
    }

    fn report_kind(&self) -> ReportKind {
        ReportKind::DeepResearchSynthesis
    }

    /// Synthesis over a long context gets the extended deadline
    fn generation(&self, model: &str) -> GenerationConfig {
        GenerationConfig::for_model(model)
            .with_temperature(0.4)
            .with_timeout(120)
    }

    fn build_prompt(&self, input: &AgentInput) -> String {
        let mut prompt = strategy_block(&input.strategy);
        prompt.push_str(&previous_results_block(self.depends_on(), input));

        if !self.question_ids.is_empty() {
            prompt.push_str("\n## External Research\n");
            for question_id in &self.question_ids {
                let Some(result) = input.previous_results.get(question_id) else {
                    continue;
                };
                let question = result.text("question").unwrap_or("(question lost)");
                let answer = result.text("answer").unwrap_or("(no answer obtained)");
                prompt.push_str(&format!("### Q: {question}\n{answer}\n\n"));
            }
        }

        prompt.push_str(
            "\nWrite the executive memo in three sections: Snapshot (the position \
             and verdict in five lines), Deep Analysis (risks, IV, context, \
             alternatives, research findings), and Action Plan (entry, management, \
             exit, invalidation). Unanswered research questions are noted as open, \
             not guessed at.\n",
        );
        prompt.push_str(&schema_suffix(self.result_schema()));
        prompt
    }
}
