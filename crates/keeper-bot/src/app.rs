//! Application wiring and lifecycle.

use std::sync::Arc;

use alloy::signers::local::PrivateKeySigner;
use tracing::info;
use zeroize::Zeroizing;

use keeper_chain::{DynChainClient, EvmClient};
use keeper_core::{CandidateQueue, DynUnhealthySink};
use keeper_discovery::DiscoveryService;
use keeper_executor::{DynLiquidator, TransactionManager};
use keeper_monitor::MonitorService;
use keeper_strategy::StrategyService;
use keeper_telemetry::{DynAlertSink, LogAlertSink, WebhookAlertSink};

use crate::config::KeeperConfig;
use crate::error::{AppError, AppResult};

/// The assembled keeper process.
///
/// Every service receives its chain client, sinks, and settings through
/// construction; nothing global. Startup failures (unreachable RPC,
/// missing key, failed backfill) propagate out of `run` and exit the
/// process non-zero.
pub struct Application {
    config: KeeperConfig,
}

impl Application {
    pub fn new(config: KeeperConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Connect, wire the pipeline, and run until SIGINT/SIGTERM.
    pub async fn run(self) -> AppResult<()> {
        let signer = self.load_signer()?;
        let account = signer.address();
        info!(account = %account, "keeper account loaded");

        let client = EvmClient::connect(
            &self.config.rpc.http_url,
            &self.config.rpc.ws_url,
            signer,
            self.config.evm_config(),
        )
        .await?;
        let client: DynChainClient = Arc::new(client);

        let retry_policy = self.config.retry_policy();
        let queue = Arc::new(CandidateQueue::new());

        let alerts: DynAlertSink = match &self.config.telemetry.alert_webhook_url {
            Some(url) => Arc::new(WebhookAlertSink::new(url.clone())),
            None => Arc::new(LogAlertSink),
        };

        let tx_manager = Arc::new(TransactionManager::new(
            client.clone(),
            alerts,
            self.config.tx_manager_config(account),
            retry_policy,
        ));
        tx_manager.initialize().await?;

        let liquidator: DynLiquidator = tx_manager;
        let strategy = Arc::new(StrategyService::new(
            client.clone(),
            liquidator,
            self.config.strategy_config(),
            retry_policy,
        ));
        let sink: DynUnhealthySink = strategy;

        let monitor = Arc::new(MonitorService::new(
            client.clone(),
            queue.clone(),
            sink,
            self.config.monitor_config(),
            retry_policy,
        ));

        let discovery = DiscoveryService::new(
            client,
            queue,
            self.config.contracts.factory_deploy_block,
            retry_policy,
        );
        discovery.start().await?;

        let monitor_task = {
            let monitor = monitor.clone();
            tokio::spawn(async move { monitor.run().await })
        };

        shutdown_signal().await;
        info!("shutdown signal received");

        discovery.stop().await;
        monitor.stop();
        let _ = monitor_task.await;

        info!("keeper exited cleanly");
        Ok(())
    }

    fn load_signer(&self) -> AppResult<PrivateKeySigner> {
        let env_var = &self.config.signing_key_env;
        let key = Zeroizing::new(std::env::var(env_var).map_err(|_| {
            AppError::Config(format!("signing key env var {env_var} is not set"))
        })?);
        key.trim()
            .parse::<PrivateKeySigner>()
            .map_err(|e| AppError::Config(format!("invalid signing key in {env_var}: {e}")))
    }
}

/// Resolves on SIGINT or SIGTERM.
///
/// # Panics
/// Panics if the signal handlers cannot be installed; that is a fatal
/// startup condition, not a runtime one.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
