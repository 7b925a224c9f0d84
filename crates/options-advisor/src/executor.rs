//! Agent Executor
//!
//! The primitive that drives agents: one at a time, a parallel wave with a
//! shared input, or a sequential chain that threads results forward.
//! Agents never unwind through the executor: every failure is a
//! `success=false` result.

use std::collections::HashMap;
use std::sync::Arc;

use agent_core::registry::ProviderRegistry;
use futures::future::join_all;

use crate::agents::AnalysisAgent;
use crate::model::{AgentInput, AgentResult};

/// Drives agents against providers resolved through the registry
pub struct Executor {
    registry: Arc<ProviderRegistry>,
}

impl Executor {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    /// Run a single agent
    pub async fn run_one(&self, agent: &dyn AnalysisAgent, input: &AgentInput) -> AgentResult {
        let (provider, model) = self.registry.get_for_report(agent.report_kind());
        agent.run(provider, &model, input).await
    }

    /// Run a wave of agents concurrently against the same input
    ///
    /// Waits for every agent; a single failure never short-circuits the
    /// wave. Agents in a wave must not read each other's results.
    pub async fn run_parallel(
        &self,
        agents: &[Arc<dyn AnalysisAgent>],
        input: &AgentInput,
    ) -> HashMap<String, AgentResult> {
        let tasks = agents.iter().map(|agent| async move {
            let result = self.run_one(agent.as_ref(), input).await;
            (result.agent_id.clone(), result)
        });
        join_all(tasks).await.into_iter().collect()
    }

    /// Run agents in order, threading accumulated results forward
    ///
    /// An earlier failure stays visible to later agents as an entry with
    /// empty data; later agents still run.
    pub async fn run_sequential(
        &self,
        agents: &[Arc<dyn AnalysisAgent>],
        input: &AgentInput,
    ) -> HashMap<String, AgentResult> {
        let mut produced = HashMap::new();
        let mut current = input.clone();

        for agent in agents {
            let result = self.run_one(agent.as_ref(), &current).await;
            current
                .previous_results
                .insert(result.agent_id.clone(), result.clone());
            produced.insert(result.agent_id.clone(), result);
        }
        produced
    }
}
