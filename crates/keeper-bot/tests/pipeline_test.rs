//! End-to-end pipeline tests over the mock chain client: discovery feeds
//! the queue, the monitor evaluates, the strategy gates, and the
//! transaction manager submits.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use tokio::sync::mpsc;

use keeper_chain::{DynChainClient, FeeEstimate, MockChainClient, RecordedCall, RetryPolicy};
use keeper_core::{CandidateQueue, DynUnhealthySink, VaultRef};
use keeper_discovery::DiscoveryService;
use keeper_executor::{DynLiquidator, TransactionManager, TxManagerConfig};
use keeper_monitor::{MonitorConfig, MonitorService};
use keeper_strategy::{StrategyConfig, StrategyService};
use keeper_telemetry::MockAlertSink;

fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

/// An undercollateralized vault: 120 * 1 * 10000 / 100 = 120.00%.
fn set_unhealthy(chain: &MockChainClient, vault: Address) {
    let token = addr(0xee);
    chain.set_debt(vault, U256::from(100));
    chain.set_collateral(vault, U256::from(120));
    chain.set_collateral_token(vault, token);
    chain.set_price(token, U256::from(1));
}

/// A comfortably collateralized vault: 300.00%.
fn set_healthy(chain: &MockChainClient, vault: Address) {
    let token = addr(0xee);
    chain.set_debt(vault, U256::from(100));
    chain.set_collateral(vault, U256::from(300));
    chain.set_collateral_token(vault, token);
    chain.set_price(token, U256::from(1));
}

struct Pipeline {
    chain: Arc<MockChainClient>,
    alerts: Arc<MockAlertSink>,
    queue: Arc<CandidateQueue>,
    discovery: DiscoveryService,
    monitor: Arc<MonitorService>,
}

fn build_pipeline(chain: Arc<MockChainClient>) -> Pipeline {
    let retry = RetryPolicy::new(1, Duration::from_millis(1));
    let client: DynChainClient = chain.clone();
    let queue = Arc::new(CandidateQueue::new());
    let alerts = Arc::new(MockAlertSink::new());

    let tx_manager = Arc::new(TransactionManager::new(
        client.clone(),
        alerts.clone(),
        TxManagerConfig {
            account: addr(0xaa),
            confirmation_timeout: Duration::from_millis(100),
            fee_bump_percent: 20,
        },
        retry,
    ));
    let liquidator: DynLiquidator = tx_manager;

    let strategy = Arc::new(StrategyService::new(
        client.clone(),
        liquidator,
        StrategyConfig::default(),
        retry,
    ));
    let sink: DynUnhealthySink = strategy;

    let monitor = Arc::new(MonitorService::new(
        client.clone(),
        queue.clone(),
        sink,
        MonitorConfig {
            poll_interval: Duration::from_millis(10),
            ..MonitorConfig::default()
        },
        retry,
    ));

    let discovery = DiscoveryService::new(client, queue.clone(), 0, retry);

    Pipeline {
        chain,
        alerts,
        queue,
        discovery,
        monitor,
    }
}

async fn run_pipeline_for(pipeline: &Pipeline, duration: Duration) {
    pipeline.discovery.start().await.unwrap();
    let monitor_task = {
        let monitor = pipeline.monitor.clone();
        tokio::spawn(async move { monitor.run().await })
    };

    tokio::time::sleep(duration).await;

    pipeline.discovery.stop().await;
    pipeline.monitor.stop();
    monitor_task.await.unwrap();
}

fn submitted_vaults(chain: &MockChainClient) -> Vec<Address> {
    chain
        .calls()
        .iter()
        .filter_map(|c| match c {
            RecordedCall::Simulate { vault, .. } => Some(*vault),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn backfilled_unhealthy_vault_is_liquidated() {
    let chain = Arc::new(MockChainClient::new());
    set_unhealthy(&chain, addr(1));
    set_healthy(&chain, addr(2));
    chain.set_collateral(addr(3), U256::from(50)); // no debt
    chain.set_transaction_count(5);
    chain.set_default_fees(FeeEstimate::new(30_000_000_000, 1_000_000_000));
    chain.set_backfill(vec![
        VaultRef::new(addr(1), addr(0xf1)),
        VaultRef::new(addr(2), addr(0xf2)),
        VaultRef::new(addr(3), addr(0xf3)),
    ]);

    let pipeline = build_pipeline(chain.clone());
    run_pipeline_for(&pipeline, Duration::from_millis(150)).await;

    // Only the unhealthy vault reached the transaction manager, at the
    // chain-derived nonce, and it was confirmed without alerts.
    assert_eq!(submitted_vaults(&chain), vec![addr(1)]);
    let nonces: Vec<u64> = chain
        .calls()
        .iter()
        .filter_map(|c| match c {
            RecordedCall::Submit { nonce, .. } => Some(*nonce),
            _ => None,
        })
        .collect();
    assert_eq!(nonces, vec![5]);
    assert!(pipeline.alerts.alerts().is_empty());
    assert_eq!(pipeline.queue.len(), 0);
}

#[tokio::test]
async fn live_discovered_vault_is_liquidated() {
    let chain = Arc::new(MockChainClient::new());
    set_unhealthy(&chain, addr(7));
    let (tx, rx) = mpsc::channel(8);
    chain.set_subscription(rx);

    let pipeline = build_pipeline(chain.clone());
    pipeline.discovery.start().await.unwrap();
    let monitor_task = {
        let monitor = pipeline.monitor.clone();
        tokio::spawn(async move { monitor.run().await })
    };

    tx.send(VaultRef::new(addr(7), addr(0xf7))).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    pipeline.discovery.stop().await;
    pipeline.monitor.stop();
    monitor_task.await.unwrap();

    assert_eq!(submitted_vaults(&chain), vec![addr(7)]);
}

#[tokio::test]
async fn active_auction_short_circuits_submission() {
    let chain = Arc::new(MockChainClient::new());
    set_unhealthy(&chain, addr(1));
    chain.set_auction_id(addr(1), U256::from(9));
    chain.set_backfill(vec![VaultRef::new(addr(1), addr(0xf1))]);

    let pipeline = build_pipeline(chain.clone());
    run_pipeline_for(&pipeline, Duration::from_millis(150)).await;

    // The idempotency guard fired: no simulation, no submission.
    assert!(submitted_vaults(&chain).is_empty());
    assert!(!chain
        .calls()
        .iter()
        .any(|c| matches!(c, RecordedCall::Submit { .. })));
}

#[tokio::test]
async fn expensive_gas_blocks_the_whole_run() {
    let chain = Arc::new(MockChainClient::new());
    set_unhealthy(&chain, addr(1));
    chain.set_default_fees(FeeEstimate::new(150_000_000_000, 2_000_000_000));
    chain.set_backfill(vec![VaultRef::new(addr(1), addr(0xf1))]);

    let pipeline = build_pipeline(chain.clone());
    run_pipeline_for(&pipeline, Duration::from_millis(150)).await;

    // The strategy gate rejected the candidate before the transaction
    // manager ever saw it.
    assert!(submitted_vaults(&chain).is_empty());
    assert!(!chain
        .calls()
        .iter()
        .any(|c| matches!(c, RecordedCall::AuctionId(_))));
}
