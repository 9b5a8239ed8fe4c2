//! The keeper's brain: decides when a confirmed-unhealthy vault actually
//! gets liquidated.
//!
//! Holds an internal FIFO distinct from the candidate queue, gates each
//! entry on a gas-price profitability check, and processes entries
//! strictly one at a time so the transaction manager never sees two
//! liquidations in flight.

pub mod error;
pub mod strategy;

pub use error::{StrategyError, StrategyResult};
pub use strategy::{StrategyConfig, StrategyService};
