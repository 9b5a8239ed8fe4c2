//! Prometheus counters for the keeper pipeline.
//!
//! One counter per observable pipeline event: discovery, health
//! detection, profitability analysis, and the transaction lifecycle.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally: a registration
//! failure means duplicate metric names, a fatal configuration error that
//! should crash at startup, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec,
};

/// Vaults inserted into the candidate queue, by discovery phase.
pub static VAULTS_DISCOVERED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "keeper_vaults_discovered_total",
        "Vaults discovered and enqueued for monitoring",
        &["phase"]
    )
    .unwrap()
});

/// Vaults found below the minimum collateralization ratio.
pub static UNHEALTHY_DETECTED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "keeper_unhealthy_vaults_total",
        "Vaults detected below the minimum collateralization ratio"
    )
    .unwrap()
});

/// Liquidation candidates analyzed, by profitability verdict.
pub static LIQUIDATIONS_ANALYZED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "keeper_liquidations_analyzed_total",
        "Liquidation candidates analyzed by the strategy gate",
        &["profitable"]
    )
    .unwrap()
});

/// Liquidations skipped because an auction was already active.
pub static AUCTIONS_SKIPPED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "keeper_auctions_skipped_total",
        "Liquidations skipped because the vault already has an active auction"
    )
    .unwrap()
});

/// Transactions submitted to the chain.
pub static TX_SENT: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "keeper_transactions_sent_total",
        "Liquidation transactions submitted"
    )
    .unwrap()
});

/// Transactions confirmed successful.
pub static TX_CONFIRMED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "keeper_transactions_confirmed_total",
        "Liquidation transactions confirmed successful"
    )
    .unwrap()
});

/// Transactions that failed (simulation, submission, on-chain, or
/// unresolved replacement).
pub static TX_FAILED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "keeper_transactions_failed_total",
        "Liquidation transactions that failed"
    )
    .unwrap()
});

/// Stuck transactions replaced via fee bump.
pub static TX_REPLACED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "keeper_transactions_replaced_total",
        "Stuck transactions replaced with a fee-bumped resubmission"
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record vaults discovered in the backfill phase.
    pub fn vaults_backfilled(count: u64) {
        VAULTS_DISCOVERED
            .with_label_values(&["backfill"])
            .inc_by(count);
    }

    /// Record a vault discovered by the live subscription.
    pub fn vault_watched() {
        VAULTS_DISCOVERED.with_label_values(&["watch"]).inc();
    }

    /// Record an unhealthy vault detection.
    pub fn unhealthy_detected() {
        UNHEALTHY_DETECTED.inc();
    }

    /// Record a profitability analysis verdict.
    pub fn liquidation_analyzed(profitable: bool) {
        let label = if profitable { "yes" } else { "no" };
        LIQUIDATIONS_ANALYZED.with_label_values(&[label]).inc();
    }

    /// Record an already-active auction skip.
    pub fn auction_skipped() {
        AUCTIONS_SKIPPED.inc();
    }

    /// Record a transaction submission.
    pub fn tx_sent() {
        TX_SENT.inc();
    }

    /// Record a confirmed transaction.
    pub fn tx_confirmed() {
        TX_CONFIRMED.inc();
    }

    /// Record a failed transaction.
    pub fn tx_failed() {
        TX_FAILED.inc();
    }

    /// Record a replace-by-fee resubmission.
    pub fn tx_replaced() {
        TX_REPLACED.inc();
    }
}
