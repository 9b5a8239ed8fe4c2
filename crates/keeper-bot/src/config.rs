//! Application configuration.
//!
//! Loaded from a TOML file; every tuning knob carries a serde default so
//! a minimal config only needs the RPC endpoints and contract addresses.

use std::path::Path;
use std::time::Duration;

use alloy::primitives::{address, Address};
use serde::{Deserialize, Serialize};

use keeper_chain::{EvmClientConfig, RetryPolicy};
use keeper_executor::TxManagerConfig;
use keeper_monitor::MonitorConfig;
use keeper_strategy::StrategyConfig;

use crate::error::{AppError, AppResult};

/// RPC endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// HTTP endpoint for reads and submissions.
    pub http_url: String,
    /// WebSocket endpoint for the live event subscription.
    pub ws_url: String,
    pub chain_id: u64,
    /// Block span per backfill log page.
    #[serde(default = "default_backfill_chunk_blocks")]
    pub backfill_chunk_blocks: u64,
}

fn default_backfill_chunk_blocks() -> u64 {
    50_000
}

/// Protocol contract addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractConfig {
    /// Vault factory emitting `VaultCreated`.
    pub factory: Address,
    /// Block the factory was deployed at; backfill starts here.
    #[serde(default)]
    pub factory_deploy_block: u64,
    pub liquidation_manager: Address,
    pub oracle: Address,
    /// The protocol's debt asset.
    pub debt_token: Address,
    /// Multicall3 aggregator (canonical deployment by default).
    #[serde(default = "default_multicall3")]
    pub multicall3: Address,
}

fn default_multicall3() -> Address {
    address!("cA11bde05977b3631167028862bE2a173976CA11")
}

/// Monitoring settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringSettings {
    /// Minimum collateralization ratio in percent. Vaults strictly below
    /// are liquidation candidates.
    #[serde(default = "default_min_collateral_ratio_pct")]
    pub min_collateral_ratio_pct: u64,
    /// Sleep between polls when the candidate queue is empty (ms).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Use one aggregated read per vault batch instead of sequential
    /// reads.
    #[serde(default)]
    pub multicall: bool,
    /// Vaults per aggregated read.
    #[serde(default = "default_multicall_batch_size")]
    pub multicall_batch_size: usize,
}

fn default_min_collateral_ratio_pct() -> u64 {
    150
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_multicall_batch_size() -> usize {
    20
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        Self {
            min_collateral_ratio_pct: default_min_collateral_ratio_pct(),
            poll_interval_ms: default_poll_interval_ms(),
            multicall: false,
            multicall_batch_size: default_multicall_batch_size(),
        }
    }
}

/// Strategy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySettings {
    /// Liquidations are skipped while the fee estimate is at or above
    /// this ceiling (gwei).
    #[serde(default = "default_max_gas_price_gwei")]
    pub max_gas_price_gwei: u64,
}

fn default_max_gas_price_gwei() -> u64 {
    100
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            max_gas_price_gwei: default_max_gas_price_gwei(),
        }
    }
}

/// Transaction submission settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionSettings {
    /// Bound on each confirmation wait (ms).
    #[serde(default = "default_confirmation_timeout_ms")]
    pub confirmation_timeout_ms: u64,
    /// Fee bump applied to the replacement of a stuck transaction (%).
    #[serde(default = "default_fee_bump_percent")]
    pub fee_bump_percent: u64,
    /// Gas limit for `startAuction` submissions.
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
}

fn default_confirmation_timeout_ms() -> u64 {
    15_000
}

fn default_fee_bump_percent() -> u64 {
    20
}

fn default_gas_limit() -> u64 {
    500_000
}

impl Default for TransactionSettings {
    fn default() -> Self {
        Self {
            confirmation_timeout_ms: default_confirmation_timeout_ms(),
            fee_bump_percent: default_fee_bump_percent(),
            gas_limit: default_gas_limit(),
        }
    }
}

/// Remote-call retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_retry_attempts")]
    pub attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_retry_attempts() -> u32 {
    5
}

fn default_retry_base_delay_ms() -> u64 {
    1_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: default_retry_attempts(),
            base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

/// Telemetry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Optional webhook receiving alerts; log-only when unset.
    #[serde(default)]
    pub alert_webhook_url: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            alert_webhook_url: None,
        }
    }
}

/// Top-level keeper configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeeperConfig {
    /// Environment variable holding the signing key.
    #[serde(default = "default_signing_key_env")]
    pub signing_key_env: String,
    pub rpc: RpcConfig,
    pub contracts: ContractConfig,
    #[serde(default)]
    pub monitoring: MonitoringSettings,
    #[serde(default)]
    pub strategy: StrategySettings,
    #[serde(default)]
    pub transactions: TransactionSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

fn default_signing_key_env() -> String {
    "KEEPER_SIGNING_KEY".to_string()
}

impl KeeperConfig {
    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;
        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config {path}: {e}")))
    }

    /// Load from `path`, the `KEEPER_CONFIG` env var, or the default
    /// location, in that order.
    pub fn load(path: Option<String>) -> AppResult<Self> {
        let config_path = path
            .or_else(|| std::env::var("KEEPER_CONFIG").ok())
            .unwrap_or_else(|| "config/default.toml".to_string());

        if !Path::new(&config_path).exists() {
            return Err(AppError::Config(format!(
                "Config file not found: {config_path}"
            )));
        }
        Self::from_file(&config_path)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        if self.rpc.http_url.is_empty() {
            return Err(AppError::Config("rpc.http_url must be set".into()));
        }
        if self.rpc.ws_url.is_empty() {
            return Err(AppError::Config("rpc.ws_url must be set".into()));
        }
        if self.monitoring.min_collateral_ratio_pct == 0 {
            return Err(AppError::Config(
                "monitoring.min_collateral_ratio_pct must be positive".into(),
            ));
        }
        if self.monitoring.multicall && self.monitoring.multicall_batch_size == 0 {
            return Err(AppError::Config(
                "monitoring.multicall_batch_size must be positive".into(),
            ));
        }
        if self.retry.attempts == 0 {
            return Err(AppError::Config("retry.attempts must be at least 1".into()));
        }
        Ok(())
    }

    /// Minimum ratio converted to the monitor's hundredths-of-a-percent
    /// fixed point.
    #[must_use]
    pub fn min_ratio(&self) -> u64 {
        self.monitoring.min_collateral_ratio_pct * 100
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.attempts,
            Duration::from_millis(self.retry.base_delay_ms),
        )
    }

    #[must_use]
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            min_ratio: self.min_ratio(),
            poll_interval: Duration::from_millis(self.monitoring.poll_interval_ms),
            multicall: self.monitoring.multicall,
            multicall_batch: self.monitoring.multicall_batch_size,
            debt_token: self.contracts.debt_token,
        }
    }

    #[must_use]
    pub fn strategy_config(&self) -> StrategyConfig {
        StrategyConfig {
            max_gas_price_gwei: self.strategy.max_gas_price_gwei,
        }
    }

    #[must_use]
    pub fn tx_manager_config(&self, account: Address) -> TxManagerConfig {
        TxManagerConfig {
            account,
            confirmation_timeout: Duration::from_millis(self.transactions.confirmation_timeout_ms),
            fee_bump_percent: self.transactions.fee_bump_percent,
        }
    }

    #[must_use]
    pub fn evm_config(&self) -> EvmClientConfig {
        EvmClientConfig {
            chain_id: self.rpc.chain_id,
            factory: self.contracts.factory,
            liquidation_manager: self.contracts.liquidation_manager,
            oracle: self.contracts.oracle,
            multicall3: self.contracts.multicall3,
            gas_limit: self.transactions.gas_limit,
            backfill_chunk: self.rpc.backfill_chunk_blocks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [rpc]
        http_url = "http://localhost:8545"
        ws_url = "ws://localhost:8546"
        chain_id = 1

        [contracts]
        factory = "0x1111111111111111111111111111111111111111"
        liquidation_manager = "0x2222222222222222222222222222222222222222"
        oracle = "0x3333333333333333333333333333333333333333"
        debt_token = "0x4444444444444444444444444444444444444444"
    "#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config: KeeperConfig = toml::from_str(MINIMAL).unwrap();
        config.validate().unwrap();

        assert_eq!(config.monitoring.min_collateral_ratio_pct, 150);
        assert_eq!(config.min_ratio(), 15_000);
        assert_eq!(config.strategy.max_gas_price_gwei, 100);
        assert_eq!(config.transactions.confirmation_timeout_ms, 15_000);
        assert_eq!(config.transactions.fee_bump_percent, 20);
        assert_eq!(config.retry.attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 1_000);
        assert!(!config.monitoring.multicall);
        assert_eq!(config.signing_key_env, "KEEPER_SIGNING_KEY");
        assert_eq!(config.contracts.multicall3, default_multicall3());
    }

    #[test]
    fn zero_ratio_rejected() {
        let mut config: KeeperConfig = toml::from_str(MINIMAL).unwrap();
        config.monitoring.min_collateral_ratio_pct = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_retry_attempts_rejected() {
        let mut config: KeeperConfig = toml::from_str(MINIMAL).unwrap();
        config.retry.attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config: KeeperConfig = toml::from_str(MINIMAL).unwrap();
        let serialized = toml::to_string(&config).unwrap();
        let reparsed: KeeperConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(reparsed.min_ratio(), config.min_ratio());
        assert_eq!(reparsed.contracts.factory, config.contracts.factory);
    }

    #[test]
    fn derived_configs_convert_units() {
        let config: KeeperConfig = toml::from_str(MINIMAL).unwrap();

        let monitor = config.monitor_config();
        assert_eq!(monitor.min_ratio, 15_000);
        assert_eq!(monitor.poll_interval, Duration::from_secs(5));

        let policy = config.retry_policy();
        assert_eq!(policy.attempts, 5);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
    }
}
