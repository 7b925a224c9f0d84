//! Shared test fixtures and scripted providers

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use agent_core::error::{ProviderError, Result};
use agent_core::provider::{GenerationConfig, LlmProvider, ProviderInfo};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal_macros::dec;
use serde_json::{Map, Value, json};

use crate::model::{
    LegSide, OptionKind, OptionLeg, PortfolioGreeks, StrategyMetrics, StrategySummary,
};

/// Canonical AAPL iron condor used across the test suite
pub(crate) fn iron_condor() -> StrategySummary {
    let expiry = NaiveDate::from_ymd_opt(2026, 9, 18).unwrap();
    let leg = |side, kind, strike, premium| OptionLeg {
        side,
        kind,
        strike,
        expiry,
        quantity: 1,
        premium,
    };

    StrategySummary {
        symbol: "AAPL".into(),
        strategy_name: "Iron Condor".into(),
        legs: vec![
            leg(LegSide::Short, OptionKind::Put, dec!(220), dec!(2.10)),
            leg(LegSide::Long, OptionKind::Put, dec!(210), dec!(1.05)),
            leg(LegSide::Short, OptionKind::Call, dec!(250), dec!(1.95)),
            leg(LegSide::Long, OptionKind::Call, dec!(260), dec!(0.95)),
        ],
        portfolio_greeks: PortfolioGreeks {
            delta: 0.05,
            gamma: 0.02,
            theta: -15.5,
            vega: -25.3,
            rho: 0.01,
        },
        strategy_metrics: StrategyMetrics {
            max_profit: dec!(500),
            max_loss: dec!(-1000),
            pop: 65.0,
            risk_reward: Some(0.5),
            breakevens: vec![dec!(215.95), dec!(254.05)],
        },
        option_chain_context: None,
        fundamental_snapshot: None,
    }
}

/// Same strategy with a chain excerpt attached
pub(crate) fn iron_condor_with_chain() -> StrategySummary {
    let mut strategy = iron_condor();
    strategy.option_chain_context = Some(json!({
        "spot_price": 232.5,
        "calls": [{"strike": "250", "implied_volatility": 0.28}],
        "puts": [{"strike": "220", "implied_volatility": 0.31}],
    }));
    strategy
}

/// Long enough to clear the resilient wrapper's minimum-content check
pub(crate) const CANNED_TEXT: &str = "The position keeps positive carry while the \
underlying holds between the short strikes; gamma risk concentrates in expiry week and \
the premium collected prices a fair, not rich, volatility environment. Manage at 50% of \
maximum profit or 21 days to expiry, whichever arrives first, and exit on a breach of \
either short strike.";

fn canned_json() -> Map<String, Value> {
    let fixture = json!({
        "risk_score": 6.5,
        "risk_category": "high",
        "iv_rank": 54.0,
        "iv_percentile": 61.0,
        "environment": "fair",
        "crush_risk_score": 4.0,
        "fundamental_score": 6.0,
        "technical_score": 5.0,
        "sentiment": "neutral",
        "alignment_score": 6.5,
        "stressed_pnl": [{"scenario": "spot -10%", "pnl": -850.0}],
        "tail_risk": "Assignment through the put wing on a gap below 210.",
        "mitigations": ["close at 21 DTE", "roll the tested side"],
        "overall_score": 6.8,
        "verdict": "consider",
        "key_insights": ["theta-positive", "short vega into the event"],
        "final_recommendation": "Hold with a 50% profit target.",
        "memo_markdown": CANNED_TEXT,
        "alternatives": [{"strategy_name": "Bull Put Spread", "legs": "225/215", "rationale": "higher POP", "est_pop": 72.0}],
        "questions": ["What is the confirmed next earnings date?", "Any pending catalysts before expiry?"],
        "snapshot": "Neutral AAPL income trade, verdict: consider.",
        "deep_analysis": CANNED_TEXT,
        "action_plan": "Enter at mid, manage at 50% profit, exit by 21 DTE.",
        "analysis_text": CANNED_TEXT,
    });
    match fixture {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Provider returning one rich fixture for every agent, with optional
/// failure injection keyed on prompt/system-prompt substrings
pub(crate) struct ScriptedProvider {
    json_fixture: Map<String, Value>,
    text_fixture: String,
    fail_markers: Vec<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    search_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub(crate) fn new() -> Self {
        Self {
            json_fixture: canned_json(),
            text_fixture: CANNED_TEXT.into(),
            fail_markers: Vec::new(),
            delay: None,
            calls: AtomicUsize::new(0),
            search_calls: AtomicUsize::new(0),
        }
    }

    /// Fail with `InvalidResponse` whenever the system prompt or prompt
    /// contains `marker`
    #[must_use]
    pub(crate) fn failing_when(mut self, marker: impl Into<String>) -> Self {
        self.fail_markers.push(marker.into());
        self
    }

    /// Sleep before answering (for cancellation and deadline tests)
    #[must_use]
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    async fn gate(&self, prompt: &str, system_prompt: Option<&str>) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let haystack = format!("{}\n{prompt}", system_prompt.unwrap_or_default());
        for marker in &self.fail_markers {
            if haystack.contains(marker.as_str()) {
                return Err(ProviderError::InvalidResponse(format!(
                    "scripted failure for '{marker}'"
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "scripted".into(),
            supports_search: true,
            supports_system_prompt: true,
        }
    }

    async fn healthcheck(&self) -> Result<bool> {
        Ok(true)
    }

    async fn generate_text(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        _config: &GenerationConfig,
    ) -> Result<String> {
        self.gate(prompt, system_prompt).await?;
        Ok(self.text_fixture.clone())
    }

    async fn generate_json(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        _config: &GenerationConfig,
    ) -> Result<Map<String, Value>> {
        self.gate(prompt, system_prompt).await?;
        Ok(self.json_fixture.clone())
    }

    async fn generate_with_search(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        _config: &GenerationConfig,
    ) -> Result<String> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.gate(prompt, system_prompt).await?;
        Ok(self.text_fixture.clone())
    }
}
