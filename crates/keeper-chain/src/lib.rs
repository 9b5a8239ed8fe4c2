//! Chain access for the liquidation keeper.
//!
//! Everything the pipeline knows about the chain goes through the
//! [`ChainClient`] trait: historical and live vault-creation events, vault
//! state reads, oracle prices, fee estimation, and the
//! simulate/submit/confirm transaction path. The live [`EvmClient`] backs
//! the trait with alloy providers; tests inject [`MockChainClient`].

pub mod client;
pub mod contracts;
pub mod error;
pub mod evm;
pub mod retry;
pub mod types;

pub use client::{ChainClient, DynChainClient, MockChainClient, RecordedCall};
pub use error::{ChainError, ChainResult};
pub use evm::{EvmClient, EvmClientConfig};
pub use retry::{retry, RetryPolicy};
pub use types::{FeeEstimate, PreparedTx, TxReceipt, VaultState};
