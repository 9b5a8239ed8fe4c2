//! Error types for keeper-executor.

use keeper_chain::ChainError;
use thiserror::Error;

/// Failures inside one `start_auction` attempt that are not expressed as
/// a typed [`crate::AuctionOutcome`]. Callers never see these: the
/// manager catches them at its own boundary, logs, alerts, and returns a
/// `Failed` outcome.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("nonce refresh failed: {0}")]
    Nonce(ChainError),

    #[error("auction state read failed: {0}")]
    AuctionState(ChainError),

    #[error("fee estimation failed: {0}")]
    Fees(ChainError),

    #[error("receipt wait failed: {0}")]
    Receipt(ChainError),
}

/// Result type alias for executor operations.
pub type ExecutorResult<T> = std::result::Result<T, ExecutorError>;
