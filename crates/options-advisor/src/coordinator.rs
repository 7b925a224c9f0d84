//! Workflow Coordinator
//!
//! Composes phases of agents into a workflow and reports progress at phase
//! boundaries. Telemetry never breaks the workflow: callback failures are
//! logged and swallowed, and emitted percentages are monotonically
//! non-decreasing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::agents::{
    AnalysisAgent, IvEnvironmentAnalyst, MarketContextAnalyst, OptionsGreeksAnalyst,
    OptionsSynthesisAgent, RiskScenarioAnalyst,
};
use crate::executor::Executor;
use crate::model::{AgentInput, AgentResult};

/// Progress reported at workflow start
const START_PROGRESS: u8 = 10;

/// How a phase schedules its agents
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseKind {
    /// No inter-agent dependencies; all scheduled concurrently
    Parallel,
    /// Accumulated results thread forward agent by agent
    Sequential,
}

/// A wave of agents scheduled together
pub struct Phase {
    pub kind: PhaseKind,
    pub agents: Vec<Arc<dyn AnalysisAgent>>,
}

impl Phase {
    pub fn parallel(agents: Vec<Arc<dyn AnalysisAgent>>) -> Self {
        Self {
            kind: PhaseKind::Parallel,
            agents,
        }
    }

    pub fn sequential(agents: Vec<Arc<dyn AnalysisAgent>>) -> Self {
        Self {
            kind: PhaseKind::Sequential,
            agents,
        }
    }
}

/// An ordered list of phases
pub struct Workflow {
    pub phases: Vec<Phase>,
}

impl Workflow {
    pub fn new(phases: Vec<Phase>) -> Self {
        Self { phases }
    }

    /// The canonical options-analysis workflow: a parallel specialist wave,
    /// then the risk-scenario pass over it, then synthesis over everything
    pub fn options_analysis() -> Self {
        Self::new(vec![
            Phase::parallel(vec![
                Arc::new(OptionsGreeksAnalyst),
                Arc::new(IvEnvironmentAnalyst),
                Arc::new(MarketContextAnalyst),
            ]),
            Phase::sequential(vec![Arc::new(RiskScenarioAnalyst)]),
            Phase::sequential(vec![Arc::new(OptionsSynthesisAgent)]),
        ])
    }

    /// Agent ids in scheduling order
    pub fn agent_ids(&self) -> Vec<String> {
        self.phases
            .iter()
            .flat_map(|phase| phase.agents.iter().map(|agent| agent.id().to_string()))
            .collect()
    }
}

/// Progress callback: `(percent, message)`
///
/// Runs on the workflow's task; must not block beyond ~1ms. Errors are
/// logged and swallowed.
pub type ProgressFn = Arc<dyn Fn(u8, &str) -> anyhow::Result<()> + Send + Sync>;

/// Outcome of a workflow run
pub struct WorkflowRun {
    /// All results, keyed by agent id (includes threaded-in priors)
    pub results: HashMap<String, AgentResult>,

    /// Agent ids in scheduling order
    pub agents_used: Vec<String>,

    pub duration_ms: u64,
}

/// Composes multi-phase workflows over the executor
pub struct Coordinator {
    executor: Executor,
    progress: Option<ProgressFn>,
}

impl Coordinator {
    pub fn new(executor: Executor) -> Self {
        Self {
            executor,
            progress: None,
        }
    }

    /// Attach a progress callback
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Emit progress, clamped monotonic, with callback errors swallowed
    fn emit(&self, last: &mut u8, percent: u8, message: &str) {
        let percent = percent.min(100).max(*last);
        *last = percent;

        if let Some(callback) = &self.progress {
            if let Err(err) = callback(percent, message) {
                tracing::warn!(percent, "progress callback failed: {err}");
            }
        }
    }

    /// Run every phase to completion
    ///
    /// Progress lands on `10` at start, then `10 + 90·(i+1)/n` after each
    /// phase (40/70/100 for the canonical three-phase workflow).
    pub async fn run(&self, workflow: &Workflow, input: &AgentInput) -> WorkflowRun {
        let started = Instant::now();
        let mut last_percent = 0u8;
        self.emit(&mut last_percent, START_PROGRESS, "analysis started");

        let phase_count = workflow.phases.len().max(1);
        let mut accumulated = input.previous_results.clone();
        let mut agents_used = Vec::new();

        for (index, phase) in workflow.phases.iter().enumerate() {
            let mut phase_input = input.clone();
            phase_input.previous_results = accumulated.clone();

            let produced = match phase.kind {
                PhaseKind::Parallel => {
                    self.executor.run_parallel(&phase.agents, &phase_input).await
                }
                PhaseKind::Sequential => {
                    self.executor
                        .run_sequential(&phase.agents, &phase_input)
                        .await
                }
            };

            for agent in &phase.agents {
                agents_used.push(agent.id().to_string());
            }
            accumulated.extend(produced);

            let span = 100 - u32::from(START_PROGRESS);
            let percent =
                u32::from(START_PROGRESS) + span * (index as u32 + 1) / phase_count as u32;
            self.emit(
                &mut last_percent,
                percent as u8,
                &format!("phase {} of {phase_count} complete", index + 1),
            );
        }

        WorkflowRun {
            results: accumulated,
            agents_used,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}
