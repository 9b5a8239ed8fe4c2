//! Error types for keeper-strategy.

use keeper_chain::ChainError;
use thiserror::Error;

/// Per-entry processing failures. Caught inside the drain loop: the
/// entry is logged and dropped, the loop continues.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("fee estimation failed: {0}")]
    Fees(ChainError),
}

/// Result type alias for strategy operations.
pub type StrategyResult<T> = std::result::Result<T, StrategyError>;
