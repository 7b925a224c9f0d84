//! Error Types for Quota Accounting

use thiserror::Error;

pub type Result<T> = std::result::Result<T, QuotaError>;

#[derive(Error, Debug)]
pub enum QuotaError {
    #[error("Insufficient credits: need {needed}, have {available}")]
    Insufficient { needed: u32, available: u32 },

    #[error("Unknown reservation: {0}")]
    UnknownReservation(uuid::Uuid),

    #[error("Reservation already settled: {0}")]
    AlreadySettled(uuid::Uuid),

    #[error("Refund exceeds reservation: {amount} > {reserved}")]
    RefundTooLarge { amount: u32, reserved: u32 },

    #[error("Store error: {0}")]
    Store(String),
}

impl QuotaError {
    /// Short stable label for structured logs
    pub const fn kind(&self) -> &'static str {
        match self {
            QuotaError::Insufficient { .. } => "insufficient",
            QuotaError::UnknownReservation(_) => "unknown_reservation",
            QuotaError::AlreadySettled(_) => "already_settled",
            QuotaError::RefundTooLarge { .. } => "refund_too_large",
            QuotaError::Store(_) => "store",
        }
    }
}
