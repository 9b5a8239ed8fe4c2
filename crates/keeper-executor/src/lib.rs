//! Transaction management for liquidation submissions.
//!
//! The [`TransactionManager`] is the only owner of the keeper account's
//! nonce. It runs the full submission protocol for one vault at a time:
//! idempotency check, simulate, submit, bounded confirmation wait, and a
//! one-shot fee-bumped replacement of stuck transactions.

pub mod error;
pub mod liquidator;
pub mod manager;

pub use error::{ExecutorError, ExecutorResult};
pub use liquidator::{AuctionOutcome, DynLiquidator, Liquidator, MockLiquidator};
pub use manager::{TransactionManager, TxManagerConfig};
