//! # options-advisor
//!
//! Multi-agent orchestration core for institutional options-strategy
//! research memos.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ Quota Gate ── single (1 credit) ──▶ one advisor call ──▶ memo    │
//! │      │                                                           │
//! │      └────── multi (5 credits) ──▶ Coordinator                   │
//! │                                       │                          │
//! │   Phase 1 (parallel)   greeks ── iv ── market_context            │
//! │   Phase 2 (sequential) risk_scenario                             │
//! │   Phase 3 (sequential) synthesis ──▶ memo (10/40/70/100)         │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Deep research (5 credits) is a superset: the panel above (0→40),
//! alternative strategies (→55), research planning (→65), parallel
//! web-grounded questions (→90), and a three-section executive memo
//! (→99, then SUCCESS at 100). Every step persists to a Task row via
//! concurrency-safe atomic merges.
//!
//! ## Degradation over failure
//!
//! Agents never throw: a failed agent yields `success=false` with empty
//! data, later agents keep running, and the memo renders with a
//! *Confidence Adjustment* block naming whatever was unavailable. Only a
//! run in which every agent failed returns an error.

pub mod agents;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod market;
pub mod memo;
pub mod model;
pub mod research;
pub mod service;
pub mod task;

#[cfg(test)]
pub(crate) mod testutil;

pub use coordinator::{Coordinator, Phase, PhaseKind, ProgressFn, Workflow, WorkflowRun};
pub use error::{AdvisorError, Result};
pub use executor::Executor;
pub use market::{
    ChainSnapshot, ContractQuote, FundamentalsClient, MockFundamentalsClient,
    MockOptionsChainClient, OptionsChainClient,
};
pub use memo::{MemoryReportStore, ReportStore, StoredReport};
pub use model::{
    AgentInput, AgentResult, LegSide, OptionKind, OptionLeg, PortfolioGreeks, StrategyMetrics,
    StrategySummary,
};
pub use research::{DEEP_RESEARCH_KIND, DeepResearchConfig, DeepResearchOrchestrator};
pub use service::{
    AdvisorService, OPTIONS_ADVISOR_PROMPT, ReportMetadata, ReportMode, ReportOutput,
};
pub use task::{
    HistoryEntry, MemoryTaskStore, Task, TaskDelta, TaskStatus, TaskStore, apply_with_retry,
};
