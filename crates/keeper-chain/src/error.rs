//! Error types for chain access.

use thiserror::Error;

/// Errors surfaced by chain clients.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// Transport or node-side RPC failure.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// A simulated call reverted.
    #[error("call reverted: {0}")]
    Revert(String),

    /// Returned bytes or log data did not decode.
    #[error("decode error: {0}")]
    Decode(String),

    /// Live subscription could not be established.
    #[error("subscription error: {0}")]
    Subscribe(String),

    /// Transaction signing failed.
    #[error("signer error: {0}")]
    Signer(String),

    /// The receipt wait elapsed without a confirmation.
    ///
    /// Distinguished from other errors: this variant is what triggers the
    /// replace-by-fee path in the transaction manager.
    #[error("timed out waiting for receipt")]
    ReceiptTimeout,
}

impl ChainError {
    /// Whether this is the receipt-wait timeout specifically.
    #[must_use]
    pub fn is_receipt_timeout(&self) -> bool {
        matches!(self, Self::ReceiptTimeout)
    }
}

/// Result type alias for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;
