//! Market Data Collaborators
//!
//! Abstractions over the external options-chain and fundamentals services.
//! Both are black boxes returning typed payloads; either may be partial or
//! unavailable, and the orchestrator degrades with a confidence note
//! instead of failing the run.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{AdvisorError, Result};

/// One quoted contract in a chain excerpt
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContractQuote {
    pub strike: Decimal,
    pub expiry: NaiveDate,
    pub bid: Decimal,
    pub ask: Decimal,
    pub implied_volatility: f64,
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub open_interest: u64,
}

/// Chain snapshot for one underlying
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub symbol: String,
    pub spot_price: Decimal,
    pub calls: Vec<ContractQuote>,
    pub puts: Vec<ContractQuote>,
}

impl ChainSnapshot {
    /// JSON shape injected into `StrategySummary.option_chain_context`
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({}))
    }
}

/// Options chain client (Strategy pattern)
#[async_trait]
pub trait OptionsChainClient: Send + Sync {
    /// Fetch the chain, optionally narrowed to one expiry
    async fn get_chain(&self, symbol: &str, expiry: Option<NaiveDate>) -> Result<ChainSnapshot>;

    /// Check if the service is available
    async fn health_check(&self) -> bool {
        true
    }

    /// Service name
    fn name(&self) -> &str;
}

/// Fundamentals client; profiles may be partial or empty
#[async_trait]
pub trait FundamentalsClient: Send + Sync {
    async fn get_profile(&self, symbol: &str) -> Result<Value>;

    fn name(&self) -> &str;
}

/// Mock chain client with static quotes for testing and demos
pub struct MockOptionsChainClient;

impl MockOptionsChainClient {
    fn base(symbol: &str) -> Option<(Decimal, f64)> {
        // (spot, at-the-money IV)
        match symbol.to_uppercase().as_str() {
            "AAPL" => Some((rust_decimal_macros::dec!(232.50), 0.29)),
            "SPY" => Some((rust_decimal_macros::dec!(585.00), 0.15)),
            "TSLA" => Some((rust_decimal_macros::dec!(265.00), 0.55)),
            "NVDA" => Some((rust_decimal_macros::dec!(128.00), 0.48)),
            _ => None,
        }
    }
}

#[async_trait]
impl OptionsChainClient for MockOptionsChainClient {
    async fn get_chain(&self, symbol: &str, expiry: Option<NaiveDate>) -> Result<ChainSnapshot> {
        let (spot, atm_iv) = Self::base(symbol)
            .ok_or_else(|| AdvisorError::MarketData(format!("no chain for {symbol}")))?;
        let expiry = expiry.unwrap_or_else(|| {
            chrono::Utc::now().date_naive() + chrono::Duration::days(45)
        });

        let strikes = [-2i32, -1, 0, 1, 2];
        let step = spot * rust_decimal_macros::dec!(0.025);

        let calls = strikes
            .iter()
            .map(|offset| {
                let strike = (spot + step * Decimal::from(*offset)).round_dp(2);
                ContractQuote {
                    strike,
                    expiry,
                    bid: (spot * rust_decimal_macros::dec!(0.012)).round_dp(2),
                    ask: (spot * rust_decimal_macros::dec!(0.013)).round_dp(2),
                    implied_volatility: atm_iv + 0.01 * f64::from(*offset),
                    delta: 0.5 - 0.12 * f64::from(*offset),
                    gamma: 0.02,
                    theta: -0.08,
                    vega: 0.25,
                    open_interest: 1500,
                }
            })
            .collect();
        let puts = strikes
            .iter()
            .map(|offset| {
                let strike = (spot + step * Decimal::from(*offset)).round_dp(2);
                ContractQuote {
                    strike,
                    expiry,
                    bid: (spot * rust_decimal_macros::dec!(0.011)).round_dp(2),
                    ask: (spot * rust_decimal_macros::dec!(0.012)).round_dp(2),
                    implied_volatility: atm_iv - 0.01 * f64::from(*offset),
                    delta: -0.5 - 0.12 * f64::from(*offset),
                    gamma: 0.02,
                    theta: -0.07,
                    vega: 0.24,
                    open_interest: 1100,
                }
            })
            .collect();

        Ok(ChainSnapshot {
            symbol: symbol.to_uppercase(),
            spot_price: spot,
            calls,
            puts,
        })
    }

    fn name(&self) -> &str {
        "MockChain"
    }
}

/// Mock fundamentals client; unknown symbols get an empty profile
pub struct MockFundamentalsClient;

#[async_trait]
impl FundamentalsClient for MockFundamentalsClient {
    async fn get_profile(&self, symbol: &str) -> Result<Value> {
        let profile = match symbol.to_uppercase().as_str() {
            "AAPL" => json!({
                "sector": "Technology",
                "market_cap": 3_550_000_000_000u64,
                "pe_ratio": 35.1,
                "next_earnings": "2026-10-29",
                "ratios": {"debt_to_equity": 1.45, "current_ratio": 0.95},
            }),
            "SPY" => json!({
                "sector": "Index ETF",
                "expense_ratio": 0.0945,
            }),
            // Partial data is a legitimate answer
            _ => json!({}),
        };
        Ok(profile)
    }

    fn name(&self) -> &str {
        "MockFundamentals"
    }
}
