//! Error Types for the Options Advisor

use thiserror::Error;

use crate::task::TaskStatus;

pub type Result<T> = std::result::Result<T, AdvisorError>;

#[derive(Error, Debug)]
pub enum AdvisorError {
    /// Quota gate rejected or mis-handled a reservation
    #[error("Quota error: {0}")]
    Quota(#[from] agent_quota::QuotaError),

    /// Provider failure that could not be absorbed as agent degradation
    #[error("Provider error: {0}")]
    Provider(#[from] agent_core::ProviderError),

    /// Every agent in the run failed; there is no memo to render
    #[error("All agents failed; no report produced")]
    AllAgentsFailed,

    /// Task row does not exist
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Illegal task state transition (terminal states are write-once)
    #[error("Invalid task transition: {from:?} -> {to:?}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    /// Atomic-merge contention that outlived the bounded retry
    #[error("Persistence conflict: {0}")]
    Conflict(String),

    /// Deep-research soft deadline elapsed
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// Run aborted by the caller; terminal but not a failure
    #[error("Cancelled")]
    Cancelled,

    /// Market-data collaborator failure
    #[error("Market data error: {0}")]
    MarketData(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AdvisorError {
    /// Short stable label for structured logs and task metadata
    pub const fn kind(&self) -> &'static str {
        match self {
            AdvisorError::Quota(_) => "quota_insufficient",
            AdvisorError::Provider(_) => "provider",
            AdvisorError::AllAgentsFailed => "all_agents_failed",
            AdvisorError::TaskNotFound(_) => "task_not_found",
            AdvisorError::InvalidTransition { .. } => "invalid_transition",
            AdvisorError::Conflict(_) => "persistence_conflict",
            AdvisorError::DeadlineExceeded => "deadline_exceeded",
            AdvisorError::Cancelled => "cancelled",
            AdvisorError::MarketData(_) => "market_data",
            AdvisorError::Serialization(_) => "serialization",
        }
    }
}
