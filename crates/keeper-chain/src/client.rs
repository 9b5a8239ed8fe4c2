//! The chain client trait and its recording test double.
//!
//! The trait carries exactly the call shapes the pipeline needs; services
//! receive it by `Arc<dyn ChainClient>` so tests can inject
//! [`MockChainClient`] and assert on call ordering and absence.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256, U256};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use keeper_core::{BoxFuture, VaultRef};

use crate::error::{ChainError, ChainResult};
use crate::types::{FeeEstimate, PreparedTx, TxReceipt, VaultState};

/// Everything the keeper asks of the chain.
///
/// Dyn-compatible: methods return [`BoxFuture`] so the trait can live
/// behind `Arc<dyn ChainClient>`.
pub trait ChainClient: Send + Sync {
    /// The account's current on-chain transaction count (pending tag).
    fn transaction_count(&self, account: Address) -> BoxFuture<'_, ChainResult<u64>>;

    /// Current EIP-1559 fee estimate.
    fn estimate_fees(&self) -> BoxFuture<'_, ChainResult<FeeEstimate>>;

    /// Historical `VaultCreated` events from the factory.
    ///
    /// `to_block = None` means the current head.
    fn vault_created_logs(
        &self,
        from_block: u64,
        to_block: Option<u64>,
    ) -> BoxFuture<'_, ChainResult<Vec<VaultRef>>>;

    /// Live `VaultCreated` subscription. Dropping the receiver
    /// unsubscribes.
    fn subscribe_vault_created(&self)
        -> BoxFuture<'_, ChainResult<mpsc::Receiver<VaultRef>>>;

    /// Vault debt amount.
    fn debt_amount(&self, vault: Address) -> BoxFuture<'_, ChainResult<U256>>;

    /// Vault collateral amount.
    fn collateral_amount(&self, vault: Address) -> BoxFuture<'_, ChainResult<U256>>;

    /// Vault collateral token address.
    fn collateral_token(&self, vault: Address) -> BoxFuture<'_, ChainResult<Address>>;

    /// Oracle price for a collateral token.
    fn oracle_price(&self, token: Address) -> BoxFuture<'_, ChainResult<U256>>;

    /// Batched vault-state read (multicall aggregate). Zero-debt vaults
    /// get no oracle read; their `collateral_price` is `None`.
    fn vault_states(&self, vaults: Vec<Address>) -> BoxFuture<'_, ChainResult<Vec<VaultState>>>;

    /// The liquidation manager's auction id for a vault; zero = none
    /// active.
    fn auction_id(&self, vault: Address) -> BoxFuture<'_, ChainResult<U256>>;

    /// Dry-run `startAuction` with the given nonce and fees; returns a
    /// submittable transaction or surfaces the revert.
    fn simulate_start_auction(
        &self,
        vault: Address,
        nonce: u64,
        fees: FeeEstimate,
    ) -> BoxFuture<'_, ChainResult<PreparedTx>>;

    /// Broadcast a prepared transaction; returns its hash.
    fn submit(&self, tx: PreparedTx) -> BoxFuture<'_, ChainResult<B256>>;

    /// Wait for the confirmation receipt, bounded by `timeout`.
    ///
    /// Elapsing the bound yields [`ChainError::ReceiptTimeout`]
    /// specifically; other failures keep their own variants.
    fn wait_for_receipt(
        &self,
        hash: B256,
        timeout: Duration,
    ) -> BoxFuture<'_, ChainResult<TxReceipt>>;
}

/// Arc wrapper for chain client trait objects.
pub type DynChainClient = Arc<dyn ChainClient>;

/// One recorded mock invocation, for ordering/absence assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    TransactionCount,
    EstimateFees,
    VaultCreatedLogs { from_block: u64 },
    Subscribe,
    DebtAmount(Address),
    CollateralAmount(Address),
    CollateralToken(Address),
    OraclePrice(Address),
    VaultStates(Vec<Address>),
    AuctionId(Address),
    Simulate {
        vault: Address,
        nonce: u64,
        fees: FeeEstimate,
    },
    Submit {
        nonce: u64,
        fees: FeeEstimate,
    },
    WaitForReceipt {
        hash: B256,
    },
}

/// Recording chain client for tests.
///
/// Reads resolve from configured maps (zero-valued defaults); failure
/// injection works by queueing errors for the simulate/submit/receipt
/// steps. Every invocation is recorded in order.
#[derive(Default)]
pub struct MockChainClient {
    calls: Mutex<Vec<RecordedCall>>,
    tx_count: AtomicU64,
    fees: Mutex<VecDeque<FeeEstimate>>,
    default_fees: Mutex<Option<FeeEstimate>>,
    debts: Mutex<HashMap<Address, U256>>,
    collaterals: Mutex<HashMap<Address, U256>>,
    tokens: Mutex<HashMap<Address, Address>>,
    prices: Mutex<HashMap<Address, U256>>,
    auction_ids: Mutex<HashMap<Address, U256>>,
    backfill: Mutex<Vec<VaultRef>>,
    subscription: Mutex<Option<mpsc::Receiver<VaultRef>>>,
    simulate_errors: Mutex<VecDeque<ChainError>>,
    submit_errors: Mutex<VecDeque<ChainError>>,
    receipts: Mutex<VecDeque<ChainResult<TxReceipt>>>,
    fee_errors: Mutex<VecDeque<ChainError>>,
    debt_errors: Mutex<HashMap<Address, ChainError>>,
}

impl MockChainClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded calls, in invocation order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn set_transaction_count(&self, count: u64) {
        self.tx_count.store(count, Ordering::SeqCst);
    }

    /// Queue a fee estimate; each `estimate_fees` pops one. When the
    /// queue is empty the default (1 gwei / 1 gwei unless overridden)
    /// is returned.
    pub fn push_fees(&self, fees: FeeEstimate) {
        self.fees.lock().push_back(fees);
    }

    pub fn set_default_fees(&self, fees: FeeEstimate) {
        *self.default_fees.lock() = Some(fees);
    }

    pub fn set_debt(&self, vault: Address, amount: U256) {
        self.debts.lock().insert(vault, amount);
    }

    pub fn set_collateral(&self, vault: Address, amount: U256) {
        self.collaterals.lock().insert(vault, amount);
    }

    pub fn set_collateral_token(&self, vault: Address, token: Address) {
        self.tokens.lock().insert(vault, token);
    }

    pub fn set_price(&self, token: Address, price: U256) {
        self.prices.lock().insert(token, price);
    }

    pub fn set_auction_id(&self, vault: Address, id: U256) {
        self.auction_ids.lock().insert(vault, id);
    }

    pub fn set_backfill(&self, vaults: Vec<VaultRef>) {
        *self.backfill.lock() = vaults;
    }

    /// Install the receiver handed out by the next
    /// `subscribe_vault_created` call.
    pub fn set_subscription(&self, receiver: mpsc::Receiver<VaultRef>) {
        *self.subscription.lock() = Some(receiver);
    }

    /// Queue a simulation failure for the next `simulate_start_auction`.
    pub fn push_simulate_error(&self, err: ChainError) {
        self.simulate_errors.lock().push_back(err);
    }

    /// Queue a submission failure for the next `submit`.
    pub fn push_submit_error(&self, err: ChainError) {
        self.submit_errors.lock().push_back(err);
    }

    /// Queue the next `wait_for_receipt` outcome. Default when empty:
    /// success.
    pub fn push_receipt(&self, receipt: ChainResult<TxReceipt>) {
        self.receipts.lock().push_back(receipt);
    }

    /// Queue a failure for the next `estimate_fees` call.
    pub fn push_fee_error(&self, err: ChainError) {
        self.fee_errors.lock().push_back(err);
    }

    /// Make every `debt_amount` read for `vault` fail.
    pub fn set_debt_error(&self, vault: Address, err: ChainError) {
        self.debt_errors.lock().insert(vault, err);
    }

    fn next_fees(&self) -> FeeEstimate {
        self.fees.lock().pop_front().unwrap_or_else(|| {
            (*self.default_fees.lock()).unwrap_or(FeeEstimate::new(1_000_000_000, 1_000_000_000))
        })
    }

    fn record(&self, call: RecordedCall) {
        self.calls.lock().push(call);
    }

    fn hash_for_nonce(nonce: u64) -> B256 {
        B256::from(U256::from(nonce).to_be_bytes::<32>())
    }
}

impl ChainClient for MockChainClient {
    fn transaction_count(&self, _account: Address) -> BoxFuture<'_, ChainResult<u64>> {
        Box::pin(async move {
            self.record(RecordedCall::TransactionCount);
            Ok(self.tx_count.load(Ordering::SeqCst))
        })
    }

    fn estimate_fees(&self) -> BoxFuture<'_, ChainResult<FeeEstimate>> {
        Box::pin(async move {
            self.record(RecordedCall::EstimateFees);
            if let Some(err) = self.fee_errors.lock().pop_front() {
                return Err(err);
            }
            Ok(self.next_fees())
        })
    }

    fn vault_created_logs(
        &self,
        from_block: u64,
        _to_block: Option<u64>,
    ) -> BoxFuture<'_, ChainResult<Vec<VaultRef>>> {
        Box::pin(async move {
            self.record(RecordedCall::VaultCreatedLogs { from_block });
            Ok(self.backfill.lock().clone())
        })
    }

    fn subscribe_vault_created(
        &self,
    ) -> BoxFuture<'_, ChainResult<mpsc::Receiver<VaultRef>>> {
        Box::pin(async move {
            self.record(RecordedCall::Subscribe);
            match self.subscription.lock().take() {
                Some(rx) => Ok(rx),
                None => {
                    // No sender installed: hand out an immediately-closed
                    // channel so the watcher sees end-of-stream.
                    let (_tx, rx) = mpsc::channel(1);
                    Ok(rx)
                }
            }
        })
    }

    fn debt_amount(&self, vault: Address) -> BoxFuture<'_, ChainResult<U256>> {
        Box::pin(async move {
            self.record(RecordedCall::DebtAmount(vault));
            if let Some(err) = self.debt_errors.lock().get(&vault) {
                return Err(err.clone());
            }
            Ok(self.debts.lock().get(&vault).copied().unwrap_or(U256::ZERO))
        })
    }

    fn collateral_amount(&self, vault: Address) -> BoxFuture<'_, ChainResult<U256>> {
        Box::pin(async move {
            self.record(RecordedCall::CollateralAmount(vault));
            Ok(self
                .collaterals
                .lock()
                .get(&vault)
                .copied()
                .unwrap_or(U256::ZERO))
        })
    }

    fn collateral_token(&self, vault: Address) -> BoxFuture<'_, ChainResult<Address>> {
        Box::pin(async move {
            self.record(RecordedCall::CollateralToken(vault));
            Ok(self
                .tokens
                .lock()
                .get(&vault)
                .copied()
                .unwrap_or(Address::ZERO))
        })
    }

    fn oracle_price(&self, token: Address) -> BoxFuture<'_, ChainResult<U256>> {
        Box::pin(async move {
            self.record(RecordedCall::OraclePrice(token));
            Ok(self.prices.lock().get(&token).copied().unwrap_or(U256::ZERO))
        })
    }

    fn vault_states(&self, vaults: Vec<Address>) -> BoxFuture<'_, ChainResult<Vec<VaultState>>> {
        Box::pin(async move {
            self.record(RecordedCall::VaultStates(vaults.clone()));
            let states = vaults
                .iter()
                .map(|vault| {
                    let debt = self.debts.lock().get(vault).copied().unwrap_or(U256::ZERO);
                    let collateral = self
                        .collaterals
                        .lock()
                        .get(vault)
                        .copied()
                        .unwrap_or(U256::ZERO);
                    let token = self
                        .tokens
                        .lock()
                        .get(vault)
                        .copied()
                        .unwrap_or(Address::ZERO);
                    let price = if debt.is_zero() {
                        None
                    } else {
                        Some(self.prices.lock().get(&token).copied().unwrap_or(U256::ZERO))
                    };
                    VaultState {
                        vault: *vault,
                        debt_amount: debt,
                        collateral_amount: collateral,
                        collateral_token: token,
                        collateral_price: price,
                    }
                })
                .collect();
            Ok(states)
        })
    }

    fn auction_id(&self, vault: Address) -> BoxFuture<'_, ChainResult<U256>> {
        Box::pin(async move {
            self.record(RecordedCall::AuctionId(vault));
            Ok(self
                .auction_ids
                .lock()
                .get(&vault)
                .copied()
                .unwrap_or(U256::ZERO))
        })
    }

    fn simulate_start_auction(
        &self,
        vault: Address,
        nonce: u64,
        fees: FeeEstimate,
    ) -> BoxFuture<'_, ChainResult<PreparedTx>> {
        Box::pin(async move {
            self.record(RecordedCall::Simulate { vault, nonce, fees });
            if let Some(err) = self.simulate_errors.lock().pop_front() {
                return Err(err);
            }
            Ok(PreparedTx {
                raw: Vec::new(),
                hash: Self::hash_for_nonce(nonce),
                nonce,
                fees,
            })
        })
    }

    fn submit(&self, tx: PreparedTx) -> BoxFuture<'_, ChainResult<B256>> {
        Box::pin(async move {
            self.record(RecordedCall::Submit {
                nonce: tx.nonce,
                fees: tx.fees,
            });
            if let Some(err) = self.submit_errors.lock().pop_front() {
                return Err(err);
            }
            Ok(tx.hash)
        })
    }

    fn wait_for_receipt(
        &self,
        hash: B256,
        _timeout: Duration,
    ) -> BoxFuture<'_, ChainResult<TxReceipt>> {
        Box::pin(async move {
            self.record(RecordedCall::WaitForReceipt { hash });
            self.receipts.lock().pop_front().unwrap_or(Ok(TxReceipt {
                success: true,
                block_number: Some(1),
            }))
        })
    }
}
