//! Error types for keeper-monitor.

use keeper_chain::ChainError;
use thiserror::Error;

/// Per-vault evaluation failures. Caught at the loop boundary: logged,
/// the vault is dropped until rediscovered, the loop continues.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("vault state read failed: {0}")]
    Read(ChainError),

    #[error("oracle price read failed: {0}")]
    Price(ChainError),
}

/// Result type alias for monitor operations.
pub type MonitorResult<T> = std::result::Result<T, MonitorError>;
