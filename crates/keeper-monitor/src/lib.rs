//! Vault health monitoring.
//!
//! Drains the candidate queue, converts each raw vault address into a
//! liquidation-worthiness decision, and forwards unhealthy vaults to the
//! strategy sink.

pub mod error;
pub mod monitor;

pub use error::{MonitorError, MonitorResult};
pub use monitor::{MonitorConfig, MonitorService};
