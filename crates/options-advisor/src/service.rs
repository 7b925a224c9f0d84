//! Report Service
//!
//! Front door for synchronous report generation. A request enters through
//! the quota gate, which selects single- or multi-agent mode; an
//! unaffordable multi-agent request auto-downgrades to single-agent with
//! the reason logged and surfaced in the metadata.

use std::sync::Arc;
use std::time::Instant;

use agent_core::registry::{ProviderRegistry, ReportKind};
use agent_quota::{CreditKind, QuotaService, Reservation};
use serde::{Deserialize, Serialize};

use crate::agents;
use crate::coordinator::{Coordinator, ProgressFn, Workflow};
use crate::error::{AdvisorError, Result};
use crate::executor::Executor;
use crate::memo;
use crate::model::{AgentInput, StrategySummary};

/// Mode labels used in report metadata
const MODE_SINGLE: &str = "single-agent";
const MODE_MULTI: &str = "multi-agent";

/// Downgrade reason recorded when the quota gate forces single-agent mode
const DOWNGRADE_QUOTA: &str = "quota_insufficient";

/// System prompt for the single-call advisor
pub const OPTIONS_ADVISOR_PROMPT: &str = "You are an institutional options strategist \
writing a research memo on a client's multi-leg position. Cover Greeks exposure, the \
implied volatility environment, market context, stress scenarios, and management rules. \
Commit to a verdict; hedged non-answers are worse than a wrong call with stated \
invalidation levels.";

/// Requested analysis depth
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportMode {
    Single,
    Multi,
}

/// Metadata returned alongside every report
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub mode: String,
    pub quota_used: u32,
    pub agents_used: Vec<String>,
    pub duration_ms: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub downgrade_reason: Option<String>,
}

/// A finished report
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportOutput {
    pub report_markdown: String,
    pub metadata: ReportMetadata,
}

/// Synchronous report generation service
pub struct AdvisorService {
    registry: Arc<ProviderRegistry>,
    quota: Arc<QuotaService>,
    progress_enabled: bool,
}

impl AdvisorService {
    pub fn new(registry: Arc<ProviderRegistry>, quota: Arc<QuotaService>) -> Self {
        Self {
            registry,
            quota,
            progress_enabled: true,
        }
    }

    /// Honor the `progress_callback_enabled` startup setting; when false,
    /// caller-supplied callbacks are ignored
    #[must_use]
    pub fn with_progress_enabled(mut self, enabled: bool) -> Self {
        self.progress_enabled = enabled;
        self
    }

    /// Generate a report in the requested mode
    ///
    /// Credits are deducted before any provider call. A failed run refunds
    /// the reservation and returns a typed error, never an empty memo.
    pub async fn generate_report(
        &self,
        user_id: &str,
        strategy: Arc<StrategySummary>,
        mode: ReportMode,
        progress: Option<ProgressFn>,
    ) -> Result<ReportOutput> {
        let started = Instant::now();
        let (reservation, effective_mode, downgrade_reason) = self.reserve(user_id, mode)?;
        let progress = progress.filter(|_| self.progress_enabled);

        let outcome = match effective_mode {
            ReportMode::Single => self.single_agent_report(&strategy).await,
            ReportMode::Multi => self.multi_agent_report(&strategy, progress).await,
        };

        match outcome {
            Ok((report_markdown, agents_used)) => {
                self.quota.commit(&reservation)?;
                Ok(ReportOutput {
                    report_markdown,
                    metadata: ReportMetadata {
                        mode: match effective_mode {
                            ReportMode::Single => MODE_SINGLE.into(),
                            ReportMode::Multi => MODE_MULTI.into(),
                        },
                        quota_used: reservation.amount,
                        agents_used,
                        duration_ms: started.elapsed().as_millis() as u64,
                        downgrade_reason,
                    },
                })
            }
            Err(err) => {
                // Nothing was delivered; give the credits back
                if let Err(refund_err) = self.quota.refund(&reservation, reservation.amount) {
                    tracing::error!(
                        user = user_id,
                        kind = refund_err.kind(),
                        "refund after failed run did not settle"
                    );
                }
                Err(err)
            }
        }
    }

    /// Reserve credits for the requested mode, auto-downgrading an
    /// unaffordable multi-agent request to single-agent
    fn reserve(
        &self,
        user_id: &str,
        mode: ReportMode,
    ) -> Result<(Reservation, ReportMode, Option<String>)> {
        let kind = match mode {
            ReportMode::Single => CreditKind::SingleAgent,
            ReportMode::Multi => CreditKind::MultiAgent,
        };

        match self.quota.check_and_reserve(user_id, kind) {
            Ok(reservation) => Ok((reservation, mode, None)),
            Err(agent_quota::QuotaError::Insufficient { needed, available })
                if mode == ReportMode::Multi =>
            {
                tracing::warn!(
                    user = user_id,
                    needed,
                    available,
                    reason = DOWNGRADE_QUOTA,
                    "downgrading multi-agent request to single-agent"
                );
                let reservation = self
                    .quota
                    .check_and_reserve(user_id, CreditKind::SingleAgent)?;
                Ok((
                    reservation,
                    ReportMode::Single,
                    Some(DOWNGRADE_QUOTA.to_string()),
                ))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// One provider call, one memo
    async fn single_agent_report(
        &self,
        strategy: &Arc<StrategySummary>,
    ) -> Result<(String, Vec<String>)> {
        let (provider, model) = self.registry.get_for_report(ReportKind::Report);
        let config = agent_core::GenerationConfig::for_model(&model);

        let prompt = format!(
            "{}\nWrite the full research memo in markdown.",
            crate::agents::render_single_prompt(strategy)
        );
        let markdown = provider
            .generate_text(&prompt, Some(OPTIONS_ADVISOR_PROMPT), &config)
            .await?;

        Ok((markdown, vec!["options_advisor".to_string()]))
    }

    /// Canonical three-phase workflow, rendered through the panel memo
    async fn multi_agent_report(
        &self,
        strategy: &Arc<StrategySummary>,
        progress: Option<ProgressFn>,
    ) -> Result<(String, Vec<String>)> {
        let mut coordinator = Coordinator::new(Executor::new(Arc::clone(&self.registry)));
        if let Some(progress) = progress {
            coordinator = coordinator.with_progress(progress);
        }

        let workflow = Workflow::options_analysis();
        let input = AgentInput::new(Arc::clone(strategy));
        let run = coordinator.run(&workflow, &input).await;

        let any_success = workflow
            .agent_ids()
            .iter()
            .any(|agent_id| run.results.get(agent_id).is_some_and(|r| r.success));
        if !any_success {
            return Err(AdvisorError::AllAgentsFailed);
        }

        let markdown = memo::render_panel_memo(strategy, &run.results);
        Ok((markdown, run.agents_used))
    }
}

/// Convenience: the canonical panel ids, for metadata assertions and
/// collaborator displays
pub fn canonical_agents() -> Vec<&'static str> {
    vec![
        agents::GREEKS_ANALYST,
        agents::IV_ANALYST,
        agents::MARKET_ANALYST,
        agents::RISK_ANALYST,
        agents::SYNTHESIS_AGENT,
    ]
}

#[cfg(test)]
mod tests {
    use agent_core::registry::{ModelMap, PRIMARY};
    use agent_quota::{CreditCosts, MemoryUsageStore};

    use super::*;
    use crate::testutil::{ScriptedProvider, iron_condor};

    fn harness(daily_limit: u32) -> (AdvisorService, Arc<ScriptedProvider>) {
        let provider = Arc::new(ScriptedProvider::new());
        let shared: Arc<dyn agent_core::LlmProvider> = provider.clone();

        let mut registry = ProviderRegistry::new(ModelMap::default());
        registry.register("scripted", Box::new(move || Ok(Arc::clone(&shared))));
        registry.set_alias(PRIMARY, "scripted");

        let quota = Arc::new(QuotaService::new(
            Arc::new(MemoryUsageStore::new(daily_limit)),
            CreditCosts::default(),
        ));
        (
            AdvisorService::new(Arc::new(registry), quota),
            provider,
        )
    }

    #[tokio::test]
    async fn test_single_agent_happy_path() {
        let (service, provider) = harness(50);
        let output = service
            .generate_report("u1", Arc::new(iron_condor()), ReportMode::Single, None)
            .await
            .unwrap();

        assert_eq!(output.metadata.mode, "single-agent");
        assert_eq!(output.metadata.quota_used, 1);
        assert!(!output.report_markdown.is_empty());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_multi_agent_happy_path() {
        let (service, provider) = harness(50);
        let output = service
            .generate_report("u1", Arc::new(iron_condor()), ReportMode::Multi, None)
            .await
            .unwrap();

        assert_eq!(output.metadata.mode, "multi-agent");
        assert_eq!(output.metadata.quota_used, 5);
        assert_eq!(output.metadata.agents_used, canonical_agents());
        assert_eq!(provider.calls(), 5);
        assert!(output.metadata.downgrade_reason.is_none());
    }

    #[tokio::test]
    async fn test_quota_insufficient_auto_downgrade() {
        let (service, provider) = harness(50);
        // Burn 48 of 50 credits
        for _ in 0..48 {
            service
                .quota
                .check_and_reserve("u1", CreditKind::SingleAgent)
                .unwrap();
        }

        let output = service
            .generate_report("u1", Arc::new(iron_condor()), ReportMode::Multi, None)
            .await
            .unwrap();

        assert_eq!(output.metadata.mode, "single-agent");
        assert_eq!(
            output.metadata.downgrade_reason.as_deref(),
            Some("quota_insufficient")
        );
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_disabled_progress_suppresses_callbacks() {
        use std::sync::Mutex;

        let (service, _provider) = harness(50);
        let service = service.with_progress_enabled(false);

        let emitted: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&emitted);
        let progress: crate::coordinator::ProgressFn = Arc::new(move |percent, _message| {
            sink.lock().unwrap().push(percent);
            Ok(())
        });

        service
            .generate_report("u1", Arc::new(iron_condor()), ReportMode::Multi, Some(progress))
            .await
            .unwrap();
        assert!(emitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_single_mode_exhausted_is_an_error() {
        let (service, provider) = harness(0);
        let err = service
            .generate_report("u1", Arc::new(iron_condor()), ReportMode::Single, None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "quota_insufficient");
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_run_refunds_credits() {
        let (service, provider) = harness(50);
        drop(provider);

        // Replace registry provider with one that always fails
        let (failing_service, _keep) = {
            let provider = Arc::new(ScriptedProvider::new().failing_when("You are"));
            let shared: Arc<dyn agent_core::LlmProvider> = provider.clone();
            let mut registry = ProviderRegistry::new(ModelMap::default());
            registry.register("scripted", Box::new(move || Ok(Arc::clone(&shared))));
            registry.set_alias(PRIMARY, "scripted");
            (
                AdvisorService::new(Arc::new(registry), Arc::clone(&service.quota)),
                provider,
            )
        };

        let err = failing_service
            .generate_report("u1", Arc::new(iron_condor()), ReportMode::Multi, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "all_agents_failed");

        // The full reservation came back
        assert_eq!(failing_service.quota.available("u1").unwrap(), 50);
    }
}
