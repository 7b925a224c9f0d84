//! End-to-end workflow scenarios
//!
//! Drives the public surface the way a collaborator would: quota gate in
//! front, scripted providers behind the registry, real stores in between.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_core::error::{ProviderError, Result as ProviderResult};
use agent_core::provider::{GenerationConfig, LlmProvider, ProviderInfo};
use agent_core::registry::{ModelMap, PRIMARY, ProviderRegistry};
use agent_quota::{CreditCosts, CreditKind, MemoryUsageStore, QuotaService};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal_macros::dec;
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;

use options_advisor::research::{DEEP_RESEARCH_KIND, DeepResearchConfig, DeepResearchOrchestrator};
use options_advisor::{
    AdvisorService, HistoryEntry, LegSide, MemoryReportStore, MemoryTaskStore, OptionKind,
    OptionLeg, PortfolioGreeks, ProgressFn, ReportMode, ReportStore, StrategyMetrics,
    StrategySummary, Task, TaskDelta, TaskStatus, TaskStore, apply_with_retry,
};
use options_advisor::{MockFundamentalsClient, MockOptionsChainClient};

// ── Support ─────────────────────────────────────────────────────────────

const LONG_TEXT: &str = "The iron condor collects premium against a range-bound thesis; \
theta works for the position while both short strikes stay out of the money, and the \
defined wings cap the loss at the width minus credit. Implied volatility near the middle \
of its yearly range makes the premium fair rather than rich, and the position should be \
managed at half of maximum profit or three weeks before expiry, whichever comes first. \
A close beyond either short strike invalidates the thesis and warrants an immediate exit \
or a roll of the tested side to the following monthly cycle.";

fn fixture_json() -> Map<String, Value> {
    match json!({
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
        "tail_risk": "Gap risk through the put wing.",
        "mitigations": ["close at 21 DTE"],
        "overall_score": 6.8,
        "verdict": "consider",
        "key_insights": ["theta-positive", "short vega"],
        "final_recommendation": "Hold with a 50% profit target.",
        "memo_markdown": LONG_TEXT,
        "alternatives": [{"strategy_name": "Bull Put Spread", "est_pop": 72.0}],
        "questions": ["What is the confirmed next earnings date?",
                      "Any pending catalysts before expiry?",
                      "Has sell-side positioning shifted?",
                      "What does current IV term structure imply?"],
        "snapshot": "Neutral AAPL income trade, verdict: consider.",
        "deep_analysis": LONG_TEXT,
        "action_plan": "Enter at mid, manage at 50% profit, exit by 21 DTE.",
        "analysis_text": LONG_TEXT,
    }) {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Scripted provider: one rich fixture, substring-triggered failures,
/// call counting
struct TestProvider {
    fail_markers: Vec<String>,
    calls: AtomicUsize,
}

impl TestProvider {
    fn new() -> Self {
        Self {
            fail_markers: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing_when(mut self, marker: &str) -> Self {
        self.fail_markers.push(marker.to_string());
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn gate(&self, prompt: &str, system_prompt: Option<&str>) -> ProviderResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
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
impl LlmProvider for TestProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "test".into(),
            supports_search: true,
            supports_system_prompt: true,
        }
    }

    async fn healthcheck(&self) -> ProviderResult<bool> {
        Ok(true)
    }

    async fn generate_text(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        _config: &GenerationConfig,
    ) -> ProviderResult<String> {
        self.gate(prompt, system_prompt)?;
        Ok(LONG_TEXT.to_string())
    }

    async fn generate_json(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        _config: &GenerationConfig,
    ) -> ProviderResult<Map<String, Value>> {
        self.gate(prompt, system_prompt)?;
        Ok(fixture_json())
    }
}

fn registry_with(provider: Arc<TestProvider>) -> Arc<ProviderRegistry> {
    let shared: Arc<dyn LlmProvider> = provider;
    let mut registry = ProviderRegistry::new(ModelMap::default());
    registry.register("test", Box::new(move || Ok(Arc::clone(&shared))));
    registry.set_alias(PRIMARY, "test");
    Arc::new(registry)
}

fn quota_with(daily_limit: u32) -> Arc<QuotaService> {
    Arc::new(QuotaService::new(
        Arc::new(MemoryUsageStore::new(daily_limit)),
        CreditCosts::default(),
    ))
}

fn iron_condor() -> Arc<StrategySummary> {
    let expiry = NaiveDate::from_ymd_opt(2026, 9, 18).unwrap();
    let leg = |side, kind, strike, premium| OptionLeg {
        side,
        kind,
        strike,
        expiry,
        quantity: 1,
        premium,
    };
    Arc::new(StrategySummary {
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
    })
}

// ── Scenario 1: single-agent happy path ─────────────────────────────────

#[tokio::test]
async fn single_agent_happy_path() {
    let provider = Arc::new(TestProvider::new());
    let service = AdvisorService::new(registry_with(Arc::clone(&provider)), quota_with(50));

    let output = service
        .generate_report("u1", iron_condor(), ReportMode::Single, None)
        .await
        .unwrap();

    assert_eq!(provider.calls(), 1);
    assert_eq!(output.metadata.mode, "single-agent");
    assert_eq!(output.metadata.quota_used, 1);
    assert!(output.report_markdown.len() >= 500);
}

// ── Scenario 2: multi-agent happy path ──────────────────────────────────

#[tokio::test]
async fn multi_agent_happy_path() {
    let provider = Arc::new(TestProvider::new());
    let service = AdvisorService::new(registry_with(Arc::clone(&provider)), quota_with(50));

    let emitted: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&emitted);
    let progress: ProgressFn = Arc::new(move |percent, _message| {
        sink.lock().unwrap().push(percent);
        Ok(())
    });

    let output = service
        .generate_report("u1", iron_condor(), ReportMode::Multi, Some(progress))
        .await
        .unwrap();

    assert_eq!(provider.calls(), 5);
    assert_eq!(output.metadata.quota_used, 5);
    assert_eq!(
        output.metadata.agents_used,
        vec![
            "options_greeks_analyst",
            "iv_environment_analyst",
            "market_context_analyst",
            "risk_scenario_analyst",
            "options_synthesis_agent",
        ]
    );
    assert_eq!(*emitted.lock().unwrap(), vec![10, 40, 70, 100]);
}

// ── Scenario 3: quota-insufficient auto-downgrade ───────────────────────

#[tokio::test]
async fn quota_insufficient_auto_downgrade() {
    let provider = Arc::new(TestProvider::new());
    let quota = quota_with(50);
    // daily_used = 48 of 50
    for _ in 0..48 {
        quota.check_and_reserve("u1", CreditKind::SingleAgent).unwrap();
    }
    let service = AdvisorService::new(registry_with(Arc::clone(&provider)), Arc::clone(&quota));

    let output = service
        .generate_report("u1", iron_condor(), ReportMode::Multi, None)
        .await
        .unwrap();

    assert_eq!(output.metadata.mode, "single-agent");
    assert_eq!(
        output.metadata.downgrade_reason.as_deref(),
        Some("quota_insufficient")
    );
    assert_eq!(output.metadata.quota_used, 1);
    assert_eq!(quota.available("u1").unwrap(), 1);
}

// ── Scenario 4: partial agent failure ───────────────────────────────────

#[tokio::test]
async fn partial_agent_failure_degrades_with_confidence_block() {
    // Only the IV environment analyst fails
    let provider = Arc::new(TestProvider::new().failing_when("implied volatility environment"));
    let service = AdvisorService::new(registry_with(Arc::clone(&provider)), quota_with(50));

    let output = service
        .generate_report("u1", iron_condor(), ReportMode::Multi, None)
        .await
        .unwrap();

    assert!(output.report_markdown.contains("Confidence Adjustment"));
    assert!(output.report_markdown.contains("IV environment unavailable"));
    // The rest of the panel still ran and the memo rendered
    assert_eq!(provider.calls(), 5);
    assert!(output.report_markdown.contains(LONG_TEXT));
}

// ── Scenario 5: concurrent deep-research writers ────────────────────────

#[tokio::test]
async fn concurrent_task_writers_lose_nothing() {
    let store: Arc<dyn TaskStore> = Arc::new(MemoryTaskStore::new());
    let task = store.create(Task::new(DEEP_RESEARCH_KIND)).await.unwrap();
    let initial_len = task.execution_history.len();

    let mut handles = Vec::new();
    for i in 0..4 {
        let store = Arc::clone(&store);
        let id = task.id.clone();
        handles.push(tokio::spawn(async move {
            let delta = TaskDelta::new()
                .progress(65 + 6 * (i as u8 + 1))
                .note(HistoryEntry::new(
                    "research",
                    "question_answered",
                    format!("research_question_{}", i + 1),
                ));
            apply_with_retry(&store, &id, delta).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let final_task = store.get(&task.id).await.unwrap().unwrap();
    assert_eq!(final_task.execution_history.len(), initial_len + 4);
    assert!(final_task.progress >= 89);
}

// ── Scenario 6: cancellation mid-run ────────────────────────────────────

/// Provider that fires the cancel token on the first web-search call
struct CancelOnSearch {
    inner: TestProvider,
    cancel: CancellationToken,
}

#[async_trait]
impl LlmProvider for CancelOnSearch {
    fn info(&self) -> ProviderInfo {
        self.inner.info()
    }
    async fn healthcheck(&self) -> ProviderResult<bool> {
        Ok(true)
    }
    async fn generate_text(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        config: &GenerationConfig,
    ) -> ProviderResult<String> {
        self.inner.generate_text(prompt, system_prompt, config).await
    }
    async fn generate_json(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        config: &GenerationConfig,
    ) -> ProviderResult<Map<String, Value>> {
        self.inner.generate_json(prompt, system_prompt, config).await
    }
    async fn generate_with_search(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        config: &GenerationConfig,
    ) -> ProviderResult<String> {
        self.cancel.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.inner
            .generate_text(prompt, system_prompt, config)
            .await
    }
}

fn orchestrator_with(
    registry: Arc<ProviderRegistry>,
) -> (DeepResearchOrchestrator, Arc<MemoryReportStore>) {
    let reports = Arc::new(MemoryReportStore::new());
    let orchestrator = DeepResearchOrchestrator::new(
        registry,
        Arc::new(MockOptionsChainClient),
        Arc::new(MockFundamentalsClient),
        Arc::new(MemoryTaskStore::new()),
        Arc::clone(&reports) as Arc<dyn ReportStore>,
        DeepResearchConfig::default(),
    );
    (orchestrator, reports)
}

#[tokio::test]
async fn cancellation_freezes_progress_and_withholds_result() {
    let cancel = CancellationToken::new();
    let provider = Arc::new(CancelOnSearch {
        inner: TestProvider::new(),
        cancel: cancel.clone(),
    });

    let shared: Arc<dyn LlmProvider> = provider;
    let mut registry = ProviderRegistry::new(ModelMap::default());
    registry.register("test", Box::new(move || Ok(Arc::clone(&shared))));
    registry.set_alias(PRIMARY, "test");

    let (orchestrator, _reports) = orchestrator_with(Arc::new(registry));
    let task = orchestrator
        .tasks()
        .create(Task::new(DEEP_RESEARCH_KIND))
        .await
        .unwrap();

    let started = std::time::Instant::now();
    let final_task = orchestrator
        .run(&task.id, iron_condor(), cancel)
        .await
        .unwrap();

    assert_eq!(final_task.status, TaskStatus::Cancelled);
    assert_eq!(final_task.progress, 65);
    assert!(final_task.result_ref.is_none());
    // CANCELLED recorded promptly after the signal
    assert!(started.elapsed() < Duration::from_secs(2));
}

// ── Deep research end-to-end ────────────────────────────────────────────

#[tokio::test]
async fn deep_research_full_run() {
    let provider = Arc::new(TestProvider::new());
    let (orchestrator, reports) = orchestrator_with(registry_with(Arc::clone(&provider)));
    let quota = quota_with(50);

    let final_task = orchestrator
        .start(&quota, "u1", iron_condor(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(final_task.progress, 100);
    assert_eq!(quota.available("u1").unwrap(), 45);

    let report = reports
        .get(final_task.result_ref.as_deref().unwrap())
        .unwrap()
        .unwrap();
    assert!(report.report_content.contains("## Snapshot"));
    assert!(report.report_content.contains("## Deep Analysis"));
    assert!(report.report_content.contains("## Action Plan"));

    // Four questions planned by the fixture, each answered in parallel
    let answered: HashMap<&str, usize> =
        final_task
            .execution_history
            .iter()
            .fold(HashMap::new(), |mut acc, entry| {
                *acc.entry(entry.event.as_str()).or_default() += 1;
                acc
            });
    assert_eq!(answered.get("question_answered"), Some(&4));
    // Panel (5) + alternatives + planner + 4 questions + synthesis
    assert_eq!(provider.calls(), 12);
}
