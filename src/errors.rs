use crate::binding::BindingResult;
use crate::settlement::SettlementOrder;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Rejected before any computation took place.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Binding ran but produced an unusable result; the full result is kept
    /// so callers can tell which constraint failed.
    #[error("Deposit validation failed: {}", .0.describe_issues())]
    ValidationFailed(Box<BindingResult>),

    /// Binding succeeded, settlement did not confirm in time. `order` can be
    /// resubmitted as is; after a timeout the first submission may still land,
    /// so check for its late `[SETTLE]` reference before retrying.
    #[error("Settlement unavailable: {reason}")]
    SettlementUnavailable {
        reason: String,
        order: Box<SettlementOrder>,
    },

    #[error("Ratio unavailable: {0}")]
    RatioUnavailable(String),

    #[error("Ratio for {pair} is stale: {age_ms} ms old, tolerance {tolerance_ms} ms")]
    StaleRatio {
        pair: String,
        age_ms: u128,
        tolerance_ms: u128,
    },

    #[error("Balance lookup failed: {0}")]
    BalanceUnavailable(String),

    /// Failure reported by an external collaborator.
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
