//! Daily Usage Records
//!
//! Per-user credit counters with a 00:00 UTC reset. Stores must apply
//! consume/release as a single atomic unit on the row.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{QuotaError, Result};

/// Default credits per user per day
pub const DEFAULT_DAILY_LIMIT: u32 = 50;

/// A user's daily credit counter
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Owner
    pub user_id: String,

    /// Credits consumed since the last reset
    pub daily_used: u32,

    /// Credits available per day
    pub daily_limit: u32,

    /// Day (UTC) the counter was last reset
    pub last_reset_date: NaiveDate,
}

impl UsageRecord {
    pub fn new(user_id: impl Into<String>, daily_limit: u32) -> Self {
        Self {
            user_id: user_id.into(),
            daily_used: 0,
            daily_limit,
            last_reset_date: Utc::now().date_naive(),
        }
    }

    /// Reset the counter when a new UTC day has started
    pub fn roll_if_new_day(&mut self) {
        let today = Utc::now().date_naive();
        if self.last_reset_date != today {
            self.daily_used = 0;
            self.last_reset_date = today;
        }
    }

    /// Credits still available today
    pub const fn available(&self) -> u32 {
        self.daily_limit.saturating_sub(self.daily_used)
    }
}

/// Usage storage trait
///
/// `try_consume` and `release` are atomic on the row: reservation and
/// commit form a single transactional unit.
pub trait UsageStore: Send + Sync {
    /// Atomically deduct `amount` credits, rolling the day first;
    /// fails without deducting when not enough credits remain
    fn try_consume(&self, user_id: &str, amount: u32) -> Result<UsageRecord>;

    /// Atomically return `amount` credits to the user
    fn release(&self, user_id: &str, amount: u32) -> Result<UsageRecord>;

    /// Current record (after a day-roll check)
    fn get(&self, user_id: &str) -> Result<UsageRecord>;

    /// Override a user's daily limit
    fn set_limit(&self, user_id: &str, daily_limit: u32) -> Result<()>;
}

/// In-memory usage store (for development/testing)
pub struct MemoryUsageStore {
    records: RwLock<HashMap<String, UsageRecord>>,
    default_limit: u32,
}

impl Default for MemoryUsageStore {
    fn default() -> Self {
        Self::new(DEFAULT_DAILY_LIMIT)
    }
}

impl MemoryUsageStore {
    pub fn new(default_limit: u32) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            default_limit,
        }
    }
}

impl UsageStore for MemoryUsageStore {
    fn try_consume(&self, user_id: &str, amount: u32) -> Result<UsageRecord> {
        let mut records = self.records.write().unwrap();
        let record = records
            .entry(user_id.to_string())
            .or_insert_with(|| UsageRecord::new(user_id, self.default_limit));
        record.roll_if_new_day();

        if record.available() < amount {
            return Err(QuotaError::Insufficient {
                needed: amount,
                available: record.available(),
            });
        }

        record.daily_used += amount;
        Ok(record.clone())
    }

    fn release(&self, user_id: &str, amount: u32) -> Result<UsageRecord> {
        let mut records = self.records.write().unwrap();
        let record = records
            .entry(user_id.to_string())
            .or_insert_with(|| UsageRecord::new(user_id, self.default_limit));
        record.roll_if_new_day();
        record.daily_used = record.daily_used.saturating_sub(amount);
        Ok(record.clone())
    }

    fn get(&self, user_id: &str) -> Result<UsageRecord> {
        let mut records = self.records.write().unwrap();
        let record = records
            .entry(user_id.to_string())
            .or_insert_with(|| UsageRecord::new(user_id, self.default_limit));
        record.roll_if_new_day();
        Ok(record.clone())
    }

    fn set_limit(&self, user_id: &str, daily_limit: u32) -> Result<()> {
        let mut records = self.records.write().unwrap();
        let record = records
            .entry(user_id.to_string())
            .or_insert_with(|| UsageRecord::new(user_id, self.default_limit));
        record.daily_limit = daily_limit;
        Ok(())
    }
}
