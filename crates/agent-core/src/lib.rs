//! # agent-core
//!
//! Provider-agnostic LLM abstraction for the options research pipeline.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     ProviderRegistry                         │
//! │   primary / secondary / vendor  →  ResilientProvider         │
//! │                                    ┌──────────────────────┐  │
//! │                                    │ breaker · retry ·    │  │
//! │                                    │ timeout · cancel     │  │
//! │                                    └──────────┬───────────┘  │
//! │                                               │              │
//! │                                    ┌──────────▼───────────┐  │
//! │                                    │ LlmProvider (vendor) │  │
//! │                                    └──────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait enables swapping between Gemini, OpenAI,
//! Anthropic, or a deterministic dummy without changing agent logic; the
//! registry degrades to a null provider on init failure so the process
//! starts in degraded mode instead of crashing.

pub mod breaker;
pub mod config;
pub mod error;
pub mod json;
pub mod provider;
pub mod registry;
pub mod resilient;
pub mod retry;
pub mod trim;

pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker};
pub use config::{CoreConfig, Vendor};
pub use error::{ProviderError, Result};
pub use provider::{GenerationConfig, LlmProvider, ProviderInfo, fold_system_prompt};
pub use registry::{ModelMap, NullProvider, ProviderRegistry, ReportKind};
pub use resilient::ResilientProvider;
pub use retry::RetryPolicy;
