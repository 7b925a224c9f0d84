//! The Agent Panel
//!
//! Each agent is a bounded LLM prompt/response unit with a stable id, typed
//! inputs, and a scored output. The provided `run` method implements the
//! execution contract shared by every agent:
//!
//! 1. validate required inputs; missing keys fail without a provider call
//! 2. build the prompt, filtering previous results to declared dependencies
//! 3. call the provider (`generate_json` when a schema hint is declared)
//! 4. capture any provider error as `success=false, data={}`, never throw
//! 5. on success, post-process, score, and attach duration and model

mod alternatives;
mod greeks;
mod iv;
mod market_context;
mod planner;
mod question;
mod risk;
mod synthesis;

pub use alternatives::AltStrategyAgent;
pub use greeks::OptionsGreeksAnalyst;
pub use iv::IvEnvironmentAnalyst;
pub use market_context::MarketContextAnalyst;
pub use planner::{MAX_QUESTIONS, MIN_QUESTIONS, ResearchPlanner, questions as planned_questions};
pub use question::QuestionResearchAgent;
pub use risk::RiskScenarioAnalyst;
pub use synthesis::{ExecutiveSynthesisAgent, OptionsSynthesisAgent};

use std::sync::Arc;
use std::time::Instant;

use agent_core::provider::{GenerationConfig, LlmProvider};
use agent_core::registry::ReportKind;
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::model::{AgentInput, AgentResult, StrategySummary};

/// Stable ids of the core panel, in canonical workflow order
pub const GREEKS_ANALYST: &str = "options_greeks_analyst";
pub const IV_ANALYST: &str = "iv_environment_analyst";
pub const MARKET_ANALYST: &str = "market_context_analyst";
pub const RISK_ANALYST: &str = "risk_scenario_analyst";
pub const SYNTHESIS_AGENT: &str = "options_synthesis_agent";

/// Deep-research additions
pub const ALT_STRATEGY_AGENT: &str = "alt_strategy_agent";
pub const RESEARCH_PLANNER: &str = "research_planner";
pub const EXECUTIVE_SYNTHESIS: &str = "executive_synthesis_agent";

/// Id prefix for the per-question research agents
pub const QUESTION_AGENT_PREFIX: &str = "research_question_";

/// Keys an agent may require from its input
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputKey {
    Strategy,
    MarketContext,
}

/// A bounded analysis agent
#[async_trait]
pub trait AnalysisAgent: Send + Sync {
    /// Stable agent id
    fn id(&self) -> &str;

    /// Input keys this agent cannot run without
    fn required_inputs(&self) -> &[InputKey] {
        &[InputKey::Strategy]
    }

    /// Prior agent ids whose results are threaded into the prompt; failed
    /// dependencies appear as `{}`
    fn depends_on(&self) -> &[&'static str] {
        &[]
    }

    /// Role description passed as the system prompt
    fn system_prompt(&self) -> &str;

    /// Assemble the user prompt from validated inputs
    fn build_prompt(&self, input: &AgentInput) -> String;

    /// JSON schema hint; declaring one routes the call through
    /// `generate_json`
    fn result_schema(&self) -> Option<&str> {
        None
    }

    /// Whether the provider call uses web-grounded search
    fn uses_search(&self) -> bool {
        false
    }

    /// Model-routing slot for this agent
    fn report_kind(&self) -> ReportKind {
        ReportKind::Report
    }

    /// Generation settings for this agent
    fn generation(&self, model: &str) -> GenerationConfig {
        GenerationConfig::for_model(model)
    }

    /// Deterministic fixes applied to successful data before scoring
    fn post_process(&self, _data: &mut Map<String, Value>, _input: &AgentInput) {}

    /// Deterministic score in [0, 10] derived from the result data
    fn score(&self, _data: &Map<String, Value>) -> Option<f64> {
        None
    }

    /// Execution contract; see the module docs
    async fn run(
        &self,
        provider: Arc<dyn LlmProvider>,
        model: &str,
        input: &AgentInput,
    ) -> AgentResult {
        if let Some(missing) = missing_inputs(self.required_inputs(), input) {
            return AgentResult::failure(self.id(), format!("missing:{missing}"));
        }

        let started = Instant::now();
        let prompt = self.build_prompt(input);
        let config = self.generation(model);
        let system_prompt = self.system_prompt();

        let outcome = if self.result_schema().is_some() {
            provider
                .generate_json(&prompt, Some(system_prompt), &config)
                .await
                .map(AgentOutput::Json)
        } else if self.uses_search() {
            provider
                .generate_with_search(&prompt, Some(system_prompt), &config)
                .await
                .map(AgentOutput::Text)
        } else {
            provider
                .generate_text(&prompt, Some(system_prompt), &config)
                .await
                .map(AgentOutput::Text)
        };

        let duration_ms = started.elapsed().as_millis() as u64;

        let mut data = match outcome {
            Ok(AgentOutput::Json(map)) => map,
            Ok(AgentOutput::Text(text)) => {
                let mut map = Map::new();
                map.insert("analysis_text".into(), Value::String(text));
                map
            }
            Err(err) => {
                tracing::warn!(agent = self.id(), kind = err.kind(), "agent degraded");
                let mut failed = AgentResult::failure(self.id(), err.kind());
                failed.duration_ms = duration_ms;
                return failed;
            }
        };

        self.post_process(&mut data, input);
        let analysis_text = data
            .get("analysis_text")
            .and_then(Value::as_str)
            .map(String::from);
        let score = self.score(&data).map(|s| s.clamp(0.0, 10.0));

        AgentResult {
            agent_id: self.id().to_string(),
            success: true,
            data,
            analysis_text,
            score,
            error: None,
            duration_ms,
            model_used: Some(model.to_string()),
        }
    }
}

enum AgentOutput {
    Json(Map<String, Value>),
    Text(String),
}

/// Comma-joined list of missing required keys, if any
fn missing_inputs(required: &[InputKey], input: &AgentInput) -> Option<String> {
    let mut missing = Vec::new();
    for key in required {
        match key {
            // Present by construction; the variant exists so the contract
            // stays explicit when new inputs appear
            InputKey::Strategy => {}
            InputKey::MarketContext => {
                if input.market_context.is_none() {
                    missing.push("market_context");
                }
            }
        }
    }
    if missing.is_empty() {
        None
    } else {
        Some(missing.join(","))
    }
}

// ── Prompt assembly helpers ─────────────────────────────────────────────

/// Strategy facts block shared by every prompt
pub(crate) fn strategy_block(strategy: &StrategySummary) -> String {
    let greeks = &strategy.portfolio_greeks;
    let metrics = &strategy.strategy_metrics;

    let mut block = format!(
        "## Strategy\n\
         Symbol: {}\n\
         Strategy: {}\n\
         Legs: {}\n\
         Portfolio Greeks: delta {:.4}, gamma {:.4}, theta {:.2}, vega {:.2}, rho {:.4}\n\
         Max profit: {}  Max loss: {}  POP: {:.1}%\n",
        strategy.symbol,
        strategy.strategy_name,
        strategy.describe_legs(),
        greeks.delta,
        greeks.gamma,
        greeks.theta,
        greeks.vega,
        greeks.rho,
        metrics.max_profit,
        metrics.max_loss,
        metrics.pop,
    );
    if let Some(rr) = metrics.risk_reward {
        block.push_str(&format!("Risk/reward: {rr:.2}\n"));
    }
    if !metrics.breakevens.is_empty() {
        let levels = metrics
            .breakevens
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        block.push_str(&format!("Breakevens: {levels}\n"));
    }
    block
}

/// Structured chain/fundamentals context, when the strategy carries any
pub(crate) fn context_block(strategy: &StrategySummary) -> String {
    let context = strategy.context_value();
    if context.as_object().is_some_and(Map::is_empty) {
        return String::new();
    }
    format!(
        "\n## Market Data\n```json\n{}\n```\n",
        serde_json::to_string_pretty(&context).unwrap_or_default()
    )
}

/// Previous results filtered to the declared dependencies; failed or
/// absent entries render as `{}`
pub(crate) fn previous_results_block(deps: &[&str], input: &AgentInput) -> String {
    if deps.is_empty() {
        return String::new();
    }

    let mut block = String::from("\n## Prior Analysis\n");
    for dep in deps {
        let payload = input
            .previous_results
            .get(*dep)
            .map_or_else(|| Value::Object(Map::new()), |r| Value::Object(r.data.clone()));
        block.push_str(&format!(
            "### {dep}\n```json\n{}\n```\n",
            serde_json::to_string_pretty(&payload).unwrap_or_default()
        ));
    }
    block
}

/// Full prompt for the single-call report mode: every fact the panel
/// would see, rendered for one generalist pass
pub(crate) fn render_single_prompt(strategy: &StrategySummary) -> String {
    let mut prompt = strategy_block(strategy);
    prompt.push_str(&context_block(strategy));
    prompt
}

/// Schema-hint suffix appended when the agent declares one
pub(crate) fn schema_suffix(schema: Option<&str>) -> String {
    schema.map_or_else(String::new, |hint| {
        format!("\nRespond with a JSON object of this shape:\n```json\n{hint}\n```\n")
    })
}
