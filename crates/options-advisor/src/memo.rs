//! Memo Rendering & Report Storage
//!
//! The memo always renders: missing inputs prepend a *Confidence
//! Adjustment* block naming what was unavailable instead of failing the
//! run. Only a fully-failed run (no agent produced anything) is an error,
//! handled by the caller.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agents::{
    ALT_STRATEGY_AGENT, EXECUTIVE_SYNTHESIS, GREEKS_ANALYST, IV_ANALYST, MARKET_ANALYST,
    RISK_ANALYST, SYNTHESIS_AGENT,
};
use crate::error::Result;
use crate::model::{AgentResult, StrategySummary};

/// Human label for a missing panel input
pub fn missing_input_label(agent_id: &str) -> String {
    match agent_id {
        GREEKS_ANALYST => "Greeks analysis unavailable".into(),
        IV_ANALYST => "IV environment unavailable".into(),
        MARKET_ANALYST => "market context unavailable".into(),
        RISK_ANALYST => "risk scenarios unavailable".into(),
        SYNTHESIS_AGENT => "panel synthesis unavailable".into(),
        ALT_STRATEGY_AGENT => "alternative strategies unavailable".into(),
        other => format!("{other} unavailable"),
    }
}

/// Confidence Adjustment block naming missing inputs; None when nothing is
/// missing
pub fn confidence_adjustment(missing: &[String]) -> Option<String> {
    if missing.is_empty() {
        return None;
    }
    let mut block = String::from(
        "> **Confidence Adjustment**\n\
         > Parts of the input set were unavailable for this run, and the\n\
         > conclusions below carry correspondingly reduced confidence:\n",
    );
    for item in missing {
        block.push_str(&format!("> - {item}\n"));
    }
    block.push('\n');
    Some(block)
}

/// Panel agent ids whose failures are called out in the confidence block
const PANEL_AGENTS: &[&str] = &[
    GREEKS_ANALYST,
    IV_ANALYST,
    MARKET_ANALYST,
    RISK_ANALYST,
    SYNTHESIS_AGENT,
];

/// Labels for every failed panel agent in a result set
pub fn panel_failures(results: &HashMap<String, AgentResult>) -> Vec<String> {
    PANEL_AGENTS
        .iter()
        .filter(|agent_id| {
            results
                .get(**agent_id)
                .is_none_or(|result| !result.success)
        })
        .map(|agent_id| missing_input_label(agent_id))
        .collect()
}

/// Render the multi-agent panel memo
///
/// Prefers the synthesis agent's memo body; degrades to assembling the
/// specialists' sections when synthesis failed.
pub fn render_panel_memo(
    strategy: &StrategySummary,
    results: &HashMap<String, AgentResult>,
) -> String {
    let mut memo = format!(
        "# {} {} - Research Memo\n\n",
        strategy.symbol, strategy.strategy_name
    );
    if let Some(block) = confidence_adjustment(&panel_failures(results)) {
        memo.push_str(&block);
    }

    let synthesis_body = results
        .get(SYNTHESIS_AGENT)
        .filter(|result| result.success)
        .and_then(|result| result.text("memo_markdown").map(String::from));

    if let Some(body) = synthesis_body {
        memo.push_str(&body);
        if let Some(recommendation) = results
            .get(SYNTHESIS_AGENT)
            .and_then(|result| result.text("final_recommendation"))
        {
            memo.push_str(&format!("\n\n## Recommendation\n{recommendation}\n"));
        }
        return memo;
    }

    // Synthesis failed: the specialists still speak for themselves
    for agent_id in PANEL_AGENTS {
        let Some(result) = results.get(*agent_id) else {
            continue;
        };
        if let Some(text) = &result.analysis_text {
            memo.push_str(&format!("## {agent_id}\n{text}\n\n"));
        }
    }
    memo
}

/// Render the three-section executive memo from the B3 synthesis result
///
/// Sections the synthesis could not produce fall back to the panel data so
/// the memo always renders.
pub fn render_executive_memo(
    strategy: &StrategySummary,
    results: &HashMap<String, AgentResult>,
    missing: &[String],
) -> String {
    let mut memo = format!(
        "# Executive Research Memo - {} {}\n\n",
        strategy.symbol, strategy.strategy_name
    );
    if let Some(block) = confidence_adjustment(missing) {
        memo.push_str(&block);
    }

    let executive = results.get(EXECUTIVE_SYNTHESIS);
    let section = |key: &str| -> Option<String> {
        executive
            .filter(|result| result.success)
            .and_then(|result| result.text(key).map(String::from))
    };

    let snapshot = section("snapshot").unwrap_or_else(|| {
        results
            .get(SYNTHESIS_AGENT)
            .and_then(|result| result.text("final_recommendation"))
            .unwrap_or("Synthesis unavailable for this run.")
            .to_string()
    });
    let deep_analysis = section("deep_analysis").unwrap_or_else(|| {
        render_panel_memo(strategy, results)
    });
    let action_plan = section("action_plan")
        .unwrap_or_else(|| "No action plan could be produced; treat the run as informational.".into());

    memo.push_str(&format!("## Snapshot\n{snapshot}\n\n"));
    memo.push_str(&format!("## Deep Analysis\n{deep_analysis}\n\n"));
    memo.push_str(&format!("## Action Plan\n{action_plan}\n"));
    memo
}

/// A persisted report row (`ai_reports.{id}`)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredReport {
    pub id: String,
    pub report_content: String,
    pub model_used: String,
    pub created_at: DateTime<Utc>,
    pub metadata: Map<String, Value>,
}

impl StoredReport {
    pub fn new(report_content: impl Into<String>, model_used: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            report_content: report_content.into(),
            model_used: model_used.into(),
            created_at: Utc::now(),
            metadata: Map::new(),
        }
    }
}

/// Report storage trait
pub trait ReportStore: Send + Sync {
    fn save(&self, report: &StoredReport) -> Result<()>;

    fn get(&self, id: &str) -> Result<Option<StoredReport>>;
}

/// In-memory report store (for development/testing)
#[derive(Default)]
pub struct MemoryReportStore {
    reports: RwLock<HashMap<String, StoredReport>>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReportStore for MemoryReportStore {
    fn save(&self, report: &StoredReport) -> Result<()> {
        self.reports
            .write()
            .unwrap()
            .insert(report.id.clone(), report.clone());
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<StoredReport>> {
        Ok(self.reports.read().unwrap().get(id).cloned())
    }
}
