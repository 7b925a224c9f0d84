//! Quota Gate
//!
//! Credit reservations against daily usage. Reserving deducts immediately
//! (deduction must precede any provider call) and a refund restores unused
//! credits when a run downgrades or fails before spending them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{QuotaError, Result};
use crate::usage::{UsageRecord, UsageStore};

/// What a caller is paying for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditKind {
    SingleAgent,
    MultiAgent,
    DeepResearch,
}

/// Credit price per operation kind
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreditCosts {
    pub single_agent: u32,
    pub multi_agent: u32,
    pub deep_research: u32,
}

impl Default for CreditCosts {
    fn default() -> Self {
        Self {
            single_agent: 1,
            multi_agent: 5,
            deep_research: 5,
        }
    }
}

impl CreditCosts {
    /// Cost of the given operation kind
    pub const fn cost(&self, kind: CreditKind) -> u32 {
        match kind {
            CreditKind::SingleAgent => self.single_agent,
            CreditKind::MultiAgent => self.multi_agent,
            CreditKind::DeepResearch => self.deep_research,
        }
    }

    /// Load overrides from the environment, keeping defaults otherwise
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let read = |var: &str, fallback: u32| {
            std::env::var(var)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(fallback)
        };
        Self {
            single_agent: read("QUOTA_COST_SINGLE_AGENT", defaults.single_agent),
            multi_agent: read("QUOTA_COST_MULTI_AGENT", defaults.multi_agent),
            deep_research: read("QUOTA_COST_DEEP_RESEARCH", defaults.deep_research),
        }
    }
}

/// A live credit reservation
///
/// Credits are already deducted; `commit` finalizes the spend, `refund`
/// returns part or all of it.
#[derive(Clone, Debug)]
pub struct Reservation {
    pub id: Uuid,
    pub user_id: String,
    pub amount: u32,
    pub kind: CreditKind,
}

/// The quota gate
pub struct QuotaService {
    store: Arc<dyn UsageStore>,
    costs: CreditCosts,
    open: Mutex<HashMap<Uuid, u32>>,
}

impl QuotaService {
    pub fn new(store: Arc<dyn UsageStore>, costs: CreditCosts) -> Self {
        Self {
            store,
            costs,
            open: Mutex::new(HashMap::new()),
        }
    }

    /// The configured cost table
    pub const fn costs(&self) -> &CreditCosts {
        &self.costs
    }

    /// Deduct credits for `kind` and hand back a reservation
    ///
    /// Fails with [`QuotaError::Insufficient`] without deducting anything
    /// when the user cannot afford the operation.
    pub fn check_and_reserve(&self, user_id: &str, kind: CreditKind) -> Result<Reservation> {
        let amount = self.costs.cost(kind);
        self.store.try_consume(user_id, amount)?;

        let reservation = Reservation {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            amount,
            kind,
        };
        self.open.lock().unwrap().insert(reservation.id, amount);
        tracing::debug!(
            user = user_id,
            kind = ?kind,
            amount,
            "credits reserved"
        );
        Ok(reservation)
    }

    /// Finalize the spend; the deduction stands
    pub fn commit(&self, reservation: &Reservation) -> Result<()> {
        let mut open = self.open.lock().unwrap();
        if open.remove(&reservation.id).is_none() {
            return Err(QuotaError::AlreadySettled(reservation.id));
        }
        Ok(())
    }

    /// Return `amount` credits from an open reservation
    ///
    /// Refunding the full amount settles the reservation; a partial refund
    /// leaves the remainder reserved (the downgrade path: the lower cost
    /// stands, the excess goes back atomically).
    pub fn refund(&self, reservation: &Reservation, amount: u32) -> Result<UsageRecord> {
        let mut open = self.open.lock().unwrap();
        let remaining = open
            .get(&reservation.id)
            .copied()
            .ok_or(QuotaError::UnknownReservation(reservation.id))?;

        if amount > remaining {
            return Err(QuotaError::RefundTooLarge {
                amount,
                reserved: remaining,
            });
        }

        let record = self.store.release(&reservation.user_id, amount)?;
        if remaining == amount {
            open.remove(&reservation.id);
        } else {
            open.insert(reservation.id, remaining - amount);
        }
        Ok(record)
    }

    /// Remaining credits for a user today
    pub fn available(&self, user_id: &str) -> Result<u32> {
        Ok(self.store.get(user_id)?.available())
    }
}
