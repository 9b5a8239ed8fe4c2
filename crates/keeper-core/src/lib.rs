//! Core domain types for the vault liquidation keeper.
//!
//! This crate provides the fundamental types shared across the pipeline:
//! - `VaultRef`: a discovered vault and its owner
//! - `CollateralRatio`: integer fixed-point collateralization ratio
//! - `VaultHealth`: one monitoring pass's view of a vault
//! - `CandidateQueue`: deduplicating FIFO of vaults awaiting evaluation
//! - `UnhealthyVaultSink`: the monitor → strategy hand-off seam

pub mod queue;
pub mod ratio;
pub mod sink;
pub mod vault;

pub use queue::CandidateQueue;
pub use ratio::{CollateralRatio, RATIO_SCALE};
pub use sink::{BoxFuture, DynUnhealthySink, MockVaultSink, UnhealthyVaultSink};
pub use vault::{LiquidationCandidate, VaultHealth, VaultRef};
