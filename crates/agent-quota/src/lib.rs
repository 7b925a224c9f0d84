//! # agent-quota
//!
//! Credit accounting and daily usage quotas for the options research agent.
//!
//! ## Credit model
//!
//! Every report mode has a fixed price in credits, deducted **before** any
//! provider call is made:
//!
//! ```text
//! ┌─────────────────┬─────────┐
//! │ single_agent    │    1    │
//! │ multi_agent     │    5    │
//! │ deep_research   │    5    │
//! └─────────────────┴─────────┘
//! ```
//!
//! Counters reset at 00:00 UTC. Reservation and commit are a single
//! transactional unit on the usage row; a downgrade refunds the excess
//! atomically and keeps the lower cost deducted.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_quota::{CreditCosts, CreditKind, MemoryUsageStore, QuotaService};
//! use std::sync::Arc;
//!
//! let quota = QuotaService::new(Arc::new(MemoryUsageStore::default()), CreditCosts::default());
//!
//! let reservation = quota.check_and_reserve("user-42", CreditKind::MultiAgent)?;
//! // ... run the workflow ...
//! quota.commit(&reservation)?;
//! ```

mod error;
mod quota;
mod usage;

pub use error::{QuotaError, Result};
pub use quota::{CreditCosts, CreditKind, QuotaService, Reservation};
pub use usage::{DEFAULT_DAILY_LIMIT, MemoryUsageStore, UsageRecord, UsageStore};
