//! Deep Research Orchestrator
//!
//! A deep-research run is a long-lived workflow over a persisted [`Task`]:
//!
//! - **Phase A** (0→40): the internal expert panel, fed with live chain
//!   and fundamentals data fetched from collaborators
//! - **Phase A+** (40→55): alternative-strategy proposals
//! - **Phase B1** (55→65): planning of 1-5 research questions
//! - **Phase B2** (65→90): one web-grounded agent per question, in
//!   parallel, each appending its own history entry concurrently
//! - **Phase B3** (90→99): the three-section executive memo; success
//!   stores the report and lands progress on 100
//!
//! Every task mutation goes through the atomic-merge rule; partial data
//! degrades to a confidence note instead of failing the run; the soft
//! deadline lets the current phase finish before failing; cancellation is
//! honored at every suspension point and never produces a `result_ref`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use agent_core::config::CoreConfig;
use agent_core::registry::ProviderRegistry;
use agent_core::trim;
use agent_quota::{CreditKind, QuotaService};
use futures::future::join_all;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::agents::{
    AltStrategyAgent, AnalysisAgent, ExecutiveSynthesisAgent, QuestionResearchAgent,
    ResearchPlanner, planned_questions,
};
use crate::coordinator::{Coordinator, Workflow};
use crate::error::{AdvisorError, Result};
use crate::executor::Executor;
use crate::market::{FundamentalsClient, OptionsChainClient};
use crate::memo::{self, ReportStore, StoredReport};
use crate::model::{AgentInput, StrategySummary};
use crate::task::{HistoryEntry, Task, TaskDelta, TaskStatus, TaskStore, apply_with_retry};

/// Task kind recorded on deep-research rows
pub const DEEP_RESEARCH_KIND: &str = "deep_research";

// Progress at the end of each phase span
const PROGRESS_PANEL: u8 = 40;
const PROGRESS_ALTERNATIVES: u8 = 55;
const PROGRESS_PLANNING: u8 = 65;
const PROGRESS_RESEARCH: u8 = 90;
const PROGRESS_SYNTHESIS: u8 = 99;

/// Deep-research tuning
#[derive(Clone, Debug)]
pub struct DeepResearchConfig {
    /// Soft deadline: the current phase finishes, then the run fails
    pub deadline: Duration,

    /// Serialized-context budget applied to chain + fundamentals
    pub token_budget_bytes: usize,
}

impl Default for DeepResearchConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(1800),
            token_budget_bytes: trim::DEFAULT_BUDGET_BYTES,
        }
    }
}

impl DeepResearchConfig {
    pub const fn from_core(config: &CoreConfig) -> Self {
        Self {
            deadline: Duration::from_secs(config.deep_research_deadline_secs),
            token_budget_bytes: config.token_budget_bytes,
        }
    }
}

/// Why a run stopped before reaching SUCCESS
enum Abort {
    Cancelled,
    Fatal {
        phase: &'static str,
        error: AdvisorError,
    },
}

/// The deep-research orchestrator
pub struct DeepResearchOrchestrator {
    registry: Arc<ProviderRegistry>,
    chain: Arc<dyn OptionsChainClient>,
    fundamentals: Arc<dyn FundamentalsClient>,
    tasks: Arc<dyn TaskStore>,
    reports: Arc<dyn ReportStore>,
    config: DeepResearchConfig,
}

impl DeepResearchOrchestrator {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        chain: Arc<dyn OptionsChainClient>,
        fundamentals: Arc<dyn FundamentalsClient>,
        tasks: Arc<dyn TaskStore>,
        reports: Arc<dyn ReportStore>,
        config: DeepResearchConfig,
    ) -> Self {
        Self {
            registry,
            chain,
            fundamentals,
            tasks,
            reports,
            config,
        }
    }

    /// The task store this orchestrator persists through
    pub fn tasks(&self) -> &Arc<dyn TaskStore> {
        &self.tasks
    }

    /// Reserve credits, create the task row, and run to completion
    pub async fn start(
        &self,
        quota: &QuotaService,
        user_id: &str,
        strategy: Arc<StrategySummary>,
        cancel: CancellationToken,
    ) -> Result<Task> {
        let reservation = quota.check_and_reserve(user_id, CreditKind::DeepResearch)?;
        let task = self
            .tasks
            .create(Task::new(DEEP_RESEARCH_KIND).with_user(user_id))
            .await?;

        match self.run(&task.id, strategy, cancel).await {
            Ok(task) => {
                quota.commit(&reservation)?;
                Ok(task)
            }
            Err(err) => {
                if let Err(refund_err) = quota.refund(&reservation, reservation.amount) {
                    tracing::error!(
                        user = user_id,
                        kind = refund_err.kind(),
                        "refund after failed deep research did not settle"
                    );
                }
                Err(err)
            }
        }
    }

    /// Run an existing PENDING task to a terminal state
    ///
    /// Cancellation yields `Ok` with a CANCELLED row; failures mark the
    /// row FAILED (with `metadata.error` and `metadata.failed_phase`) and
    /// return the error.
    pub async fn run(
        &self,
        task_id: &str,
        strategy: Arc<StrategySummary>,
        cancel: CancellationToken,
    ) -> Result<Task> {
        match self.drive(task_id, &strategy, &cancel).await {
            Ok(task) => Ok(task),
            Err(Abort::Cancelled) => self.finalize_cancelled(task_id).await,
            Err(Abort::Fatal { phase, error }) => {
                self.mark_failed(task_id, phase, &error).await;
                Err(error)
            }
        }
    }

    async fn drive(
        &self,
        task_id: &str,
        strategy: &Arc<StrategySummary>,
        cancel: &CancellationToken,
    ) -> std::result::Result<Task, Abort> {
        // A zero deadline fails before any agent is invoked
        if self.config.deadline.is_zero() {
            return Err(Abort::Fatal {
                phase: "init",
                error: AdvisorError::DeadlineExceeded,
            });
        }
        let started = Instant::now();
        let executor = Executor::new(Arc::clone(&self.registry));

        self.update(
            task_id,
            TaskDelta::new().status(TaskStatus::Running).note(HistoryEntry::new(
                "panel",
                "phase_started",
                "deep research run started",
            )),
        )
        .await
        .map_err(|error| Abort::Fatal {
            phase: "panel",
            error,
        })?;

        // ── Phase A: internal expert panel (0 → 40) ────────────────────
        self.ensure_live(started, cancel, "panel")?;

        let (enriched, mut missing) = self.enrich(strategy).await;
        let input = AgentInput::new(Arc::new(enriched));
        let workflow = Workflow::options_analysis();
        let coordinator = Coordinator::new(Executor::new(Arc::clone(&self.registry)));

        let run = tokio::select! {
            () = cancel.cancelled() => return Err(Abort::Cancelled),
            run = coordinator.run(&workflow, &input) => run,
        };
        let mut results = run.results;

        let mut delta = TaskDelta::new().progress(PROGRESS_PANEL);
        for agent_id in workflow.agent_ids() {
            let succeeded = results.get(&agent_id).is_some_and(|r| r.success);
            let event = if succeeded { "agent_succeeded" } else { "agent_failed" };
            delta = delta.note(HistoryEntry::new("panel", event, agent_id));
        }
        delta = delta.note(HistoryEntry::new("panel", "phase_complete", ""));
        self.update(task_id, delta).await.map_err(|error| Abort::Fatal {
            phase: "panel",
            error,
        })?;

        // ── Phase A+: alternative strategies (40 → 55) ─────────────────
        self.ensure_live(started, cancel, "alternatives")?;

        let alt_agent = AltStrategyAgent;
        let alt_input = input.clone().with_previous(results.clone());
        let alt_result = tokio::select! {
            () = cancel.cancelled() => return Err(Abort::Cancelled),
            result = executor.run_one(&alt_agent, &alt_input) => result,
        };
        let alt_event = if alt_result.success { "agent_succeeded" } else { "agent_failed" };
        results.insert(alt_result.agent_id.clone(), alt_result);
        self.update(
            task_id,
            TaskDelta::new()
                .progress(PROGRESS_ALTERNATIVES)
                .note(HistoryEntry::new("alternatives", alt_event, crate::agents::ALT_STRATEGY_AGENT))
                .note(HistoryEntry::new("alternatives", "phase_complete", "")),
        )
        .await
        .map_err(|error| Abort::Fatal {
            phase: "alternatives",
            error,
        })?;

        // ── Phase B1: research planning (55 → 65) ──────────────────────
        self.ensure_live(started, cancel, "planning")?;

        let planner = ResearchPlanner;
        let planner_input = input.clone().with_previous(results.clone());
        let planner_result = tokio::select! {
            () = cancel.cancelled() => return Err(Abort::Cancelled),
            result = executor.run_one(&planner, &planner_input) => result,
        };
        let questions = planned_questions(&planner_result);
        results.insert(planner_result.agent_id.clone(), planner_result);
        self.update(
            task_id,
            TaskDelta::new()
                .progress(PROGRESS_PLANNING)
                .meta("question_count", json!(questions.len()))
                .note(HistoryEntry::new(
                    "planning",
                    "phase_complete",
                    format!("{} questions planned", questions.len()),
                )),
        )
        .await
        .map_err(|error| Abort::Fatal {
            phase: "planning",
            error,
        })?;

        // ── Phase B2: web-grounded research (65 → 90) ──────────────────
        self.ensure_live(started, cancel, "research")?;

        let question_agents: Vec<QuestionResearchAgent> = questions
            .iter()
            .enumerate()
            .map(|(index, question)| QuestionResearchAgent::new(index, question.clone()))
            .collect();
        let total = question_agents.len().max(1);
        let completed = AtomicUsize::new(0);

        let research_input = input.clone().with_previous(results.clone());
        let span = usize::from(PROGRESS_RESEARCH - PROGRESS_PLANNING);
        let answer_futures = question_agents.iter().map(|agent| {
            let input = research_input.clone();
            let completed = &completed;
            let executor = &executor;
            async move {
                // No new provider calls after the cancel signal
                if cancel.is_cancelled() {
                    return None;
                }
                let result = tokio::select! {
                    () = cancel.cancelled() => return None,
                    result = executor.run_one(agent, &input) => result,
                };

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                let percent = usize::from(PROGRESS_PLANNING) + span * done / total;
                let event = if result.success { "question_answered" } else { "question_failed" };

                // Each answer is its own concurrent writer on the task row
                let delta = TaskDelta::new()
                    .progress(percent as u8)
                    .note(HistoryEntry::new("research", event, agent.id().to_string()));
                if let Err(err) = apply_with_retry(&self.tasks, task_id, delta).await {
                    tracing::warn!(task = task_id, kind = err.kind(), "progress update dropped");
                }
                Some(result)
            }
        });
        let answers = join_all(answer_futures).await;

        if cancel.is_cancelled() {
            // In-flight answers are discarded, not persisted
            return Err(Abort::Cancelled);
        }
        for answer in answers.into_iter().flatten() {
            // A failed question stays visible as an empty answer; the
            // phase itself never fails
            results.insert(answer.agent_id.clone(), answer);
        }

        // ── Phase B3: final synthesis (90 → 99) ────────────────────────
        self.ensure_live(started, cancel, "synthesis")?;

        let question_ids: Vec<String> = question_agents
            .iter()
            .map(|agent| agent.id().to_string())
            .collect();
        let synthesis_agent = ExecutiveSynthesisAgent::new(question_ids);
        let synthesis_input = input.clone().with_previous(results.clone());
        let synthesis_result = tokio::select! {
            () = cancel.cancelled() => return Err(Abort::Cancelled),
            result = executor.run_one(&synthesis_agent, &synthesis_input) => result,
        };
        let model_used = synthesis_result.model_used.clone();
        results.insert(synthesis_result.agent_id.clone(), synthesis_result);
        self.update(
            task_id,
            TaskDelta::new()
                .progress(PROGRESS_SYNTHESIS)
                .note(HistoryEntry::new("synthesis", "phase_complete", "")),
        )
        .await
        .map_err(|error| Abort::Fatal {
            phase: "synthesis",
            error,
        })?;

        // The memo always renders; missing inputs become the confidence
        // block rather than a failure
        missing.extend(memo::panel_failures(&results));
        let markdown = memo::render_executive_memo(&input.strategy, &results, &missing);

        let mut report = StoredReport::new(
            markdown,
            model_used.unwrap_or_else(|| "unavailable".into()),
        );
        report
            .metadata
            .insert("symbol".into(), json!(input.strategy.symbol));
        report
            .metadata
            .insert("strategy_name".into(), json!(input.strategy.strategy_name));
        self.reports.save(&report).map_err(|error| Abort::Fatal {
            phase: "synthesis",
            error,
        })?;

        let final_task = self
            .update(
                task_id,
                TaskDelta::new()
                    .status(TaskStatus::Success)
                    .progress(100)
                    .result_ref(report.id.clone())
                    .note(HistoryEntry::new("synthesis", "run_complete", report.id)),
            )
            .await
            .map_err(|error| Abort::Fatal {
                phase: "synthesis",
                error,
            })?;
        Ok(final_task)
    }

    /// Fetch chain and fundamentals; absence degrades to a confidence note
    async fn enrich(&self, strategy: &StrategySummary) -> (StrategySummary, Vec<String>) {
        let mut enriched = strategy.clone();
        let mut missing = Vec::new();

        match self.chain.get_chain(&strategy.symbol, None).await {
            Ok(chain) => enriched.option_chain_context = Some(chain.to_value()),
            Err(err) => {
                tracing::warn!(symbol = %strategy.symbol, "chain fetch failed: {err}");
                missing.push("option chain unavailable".to_string());
            }
        }

        match self.fundamentals.get_profile(&strategy.symbol).await {
            Ok(profile) if profile.as_object().is_some_and(|map| !map.is_empty()) => {
                enriched.fundamental_snapshot = Some(profile);
            }
            Ok(_) => missing.push("fundamentals unavailable".to_string()),
            Err(err) => {
                tracing::warn!(symbol = %strategy.symbol, "fundamentals fetch failed: {err}");
                missing.push("fundamentals unavailable".to_string());
            }
        }

        // Budget-trim the structured context before any prompt assembly
        let context = enriched.context_value();
        let trimmed = trim::trim_to_budget(
            &context,
            self.config.token_budget_bytes,
            trim::STRATEGY_CONTEXT_PRIORITY,
        );
        enriched.option_chain_context = trimmed.get("option_chain_context").cloned();
        enriched.fundamental_snapshot = trimmed.get("fundamental_snapshot").cloned();

        (enriched, missing)
    }

    /// Cancel and deadline checks between suspension points
    fn ensure_live(
        &self,
        started: Instant,
        cancel: &CancellationToken,
        phase: &'static str,
    ) -> std::result::Result<(), Abort> {
        if cancel.is_cancelled() {
            return Err(Abort::Cancelled);
        }
        if started.elapsed() >= self.config.deadline {
            return Err(Abort::Fatal {
                phase,
                error: AdvisorError::DeadlineExceeded,
            });
        }
        Ok(())
    }

    async fn update(&self, task_id: &str, delta: TaskDelta) -> Result<Task> {
        apply_with_retry(&self.tasks, task_id, delta).await
    }

    /// Record CANCELLED at the last known progress; never a `result_ref`
    async fn finalize_cancelled(&self, task_id: &str) -> Result<Task> {
        self.update(
            task_id,
            TaskDelta::new()
                .status(TaskStatus::Cancelled)
                .note(HistoryEntry::new("cancel", "cancelled", "cancel signal received")),
        )
        .await
    }

    async fn mark_failed(&self, task_id: &str, phase: &'static str, error: &AdvisorError) {
        let delta = TaskDelta::new()
            .status(TaskStatus::Failed)
            .meta("error", json!(error.to_string()))
            .meta("failed_phase", json!(phase))
            .note(HistoryEntry::new(phase, "run_failed", error.kind()));
        if let Err(apply_err) = self.update(task_id, delta).await {
            tracing::error!(
                task = task_id,
                kind = apply_err.kind(),
                "failed to record task failure"
            );
        }
    }
}
