//! Question Research Agent
//!
//! Phase B2 of deep research: one agent per planned question, scheduled in
//! parallel, each answering with web-grounded search. A failed question
//! yields an empty answer, never a failed phase.

use agent_core::provider::GenerationConfig;
use agent_core::registry::ReportKind;
use serde_json::{Map, Value};

use super::{AnalysisAgent, QUESTION_AGENT_PREFIX, strategy_block};
use crate::model::AgentInput;

const SYSTEM_PROMPT: &str = "You are a financial research assistant with web search. You \
answer one question with current, sourced facts, you date every claim, and you say \
clearly when the answer cannot be established.";

/// Per-question hard deadline
const QUESTION_TIMEOUT_SECS: u64 = 120;

/// Web-grounded researcher for a single planned question
pub struct QuestionResearchAgent {
    id: String,
    question: String,
}

impl QuestionResearchAgent {
    /// `index` is zero-based; ids read `research_question_1`, `_2`, ...
    pub fn new(index: usize, question: impl Into<String>) -> Self {
        Self {
            id: format!("{QUESTION_AGENT_PREFIX}{}", index + 1),
            question: question.into(),
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }
}

impl AnalysisAgent for QuestionResearchAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn system_prompt(&self) -> &str {
        SYSTEM_PROMPT
    }

    fn uses_search(&self) -> bool {
        true
    }

    fn report_kind(&self) -> ReportKind {
        ReportKind::QuestionAnswer
    }

    fn generation(&self, model: &str) -> GenerationConfig {
        GenerationConfig::for_model(model)
            .with_temperature(0.2)
            .with_timeout(QUESTION_TIMEOUT_SECS)
    }

    fn build_prompt(&self, input: &AgentInput) -> String {
        let mut prompt = strategy_block(&input.strategy);
        prompt.push_str(&format!(
            "\n## Research Question\n{}\n\nAnswer this question for the strategy \
             above using current web sources. Lead with the direct answer, then \
             the supporting facts with dates.\n",
            self.question
        ));
        prompt
    }

    fn post_process(&self, data: &mut Map<String, Value>, _input: &AgentInput) {
        data.insert("question".into(), Value::String(self.question.clone()));
        if let Some(answer) = data.get("analysis_text").cloned() {
            data.insert("answer".into(), answer);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testutil::{ScriptedProvider, iron_condor};

    #[test]
    fn test_ids_are_one_based() {
        let agent = QuestionResearchAgent::new(0, "When is earnings?");
        assert_eq!(agent.id(), "research_question_1");
        assert_eq!(QuestionResearchAgent::new(3, "q").id(), "research_question_4");
    }

    #[tokio::test]
    async fn test_answer_carries_question() {
        let agent = QuestionResearchAgent::new(0, "When is earnings?");
        let provider = Arc::new(ScriptedProvider::new());
        let input = AgentInput::new(Arc::new(iron_condor()));

        let result = agent.run(provider.clone(), "m", &input).await;
        assert!(result.success);
        assert_eq!(result.text("question"), Some("When is earnings?"));
        assert!(result.text("answer").is_some());
        assert_eq!(provider.search_calls(), 1);
    }
}
