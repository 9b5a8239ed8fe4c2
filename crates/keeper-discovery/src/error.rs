//! Error types for keeper-discovery.

use keeper_chain::ChainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("backfill failed: {0}")]
    Backfill(ChainError),

    #[error("live subscription failed: {0}")]
    Subscribe(ChainError),

    #[error("discovery already started")]
    AlreadyStarted,
}

/// Result type alias for discovery operations.
pub type DiscoveryResult<T> = std::result::Result<T, DiscoveryError>;
