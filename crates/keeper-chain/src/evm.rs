//! Live EVM chain client backed by alloy providers.
//!
//! HTTP for reads and submission, WebSocket for the vault-creation
//! subscription. Transactions are signed locally and broadcast as raw
//! EIP-1559 payloads.

use std::time::Duration;

use alloy::consensus::{SignableTransaction, TxEnvelope, TxEip1559};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, Bytes, TxKind, B256, U256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::pubsub::PubSubFrontend;
use alloy::rpc::types::eth::{TransactionInput, TransactionRequest};
use alloy::rpc::types::{BlockNumberOrTag, Filter};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::{SolCall, SolEvent};
use alloy::transports::http::Http;
use alloy::transports::ws::WsConnect;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use keeper_core::{BoxFuture, VaultRef};

use crate::client::ChainClient;
use crate::contracts::{
    aggregate3Call, ILiquidationManager, IPriceOracle, IVault, IVaultFactory, Multicall3Call,
};
use crate::error::{ChainError, ChainResult};
use crate::types::{FeeEstimate, PreparedTx, TxReceipt, VaultState};

/// How often the receipt wait polls for inclusion.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Backoff before re-establishing a dropped log subscription.
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(2);
/// Fee history sample depth and reward percentile.
const FEE_HISTORY_BLOCKS: u64 = 5;
const FEE_HISTORY_PERCENTILE: f64 = 50.0;
/// Priority fee floor when the node returns no reward data (1.5 gwei).
const PRIORITY_FEE_FLOOR: u128 = 1_500_000_000;

/// Static configuration for the live client.
#[derive(Debug, Clone)]
pub struct EvmClientConfig {
    pub chain_id: u64,
    /// Vault factory emitting `VaultCreated`.
    pub factory: Address,
    pub liquidation_manager: Address,
    pub oracle: Address,
    /// Multicall3 aggregator for the batched read path.
    pub multicall3: Address,
    /// Gas limit for `startAuction` submissions.
    pub gas_limit: u64,
    /// Block span per backfill `getLogs` page.
    pub backfill_chunk: u64,
}

/// Alloy-backed [`ChainClient`].
pub struct EvmClient {
    http: RootProvider<Http<Client>>,
    ws: RootProvider<PubSubFrontend>,
    signer: PrivateKeySigner,
    cfg: EvmClientConfig,
}

impl EvmClient {
    /// Connect both transports. Fails fast when either endpoint is
    /// unreachable; startup treats that as fatal.
    pub async fn connect(
        http_url: &str,
        ws_url: &str,
        signer: PrivateKeySigner,
        cfg: EvmClientConfig,
    ) -> ChainResult<Self> {
        let url: reqwest::Url = http_url
            .parse()
            .map_err(|e| ChainError::Rpc(format!("invalid http url: {e}")))?;
        let http = ProviderBuilder::new().on_http(url);

        let ws = ProviderBuilder::new()
            .on_ws(WsConnect::new(ws_url))
            .await
            .map_err(|e| ChainError::Subscribe(format!("ws connect failed: {e}")))?;

        // Probe the HTTP endpoint so misconfiguration surfaces at startup.
        http.get_chain_id()
            .await
            .map_err(|e| ChainError::Rpc(format!("rpc unreachable: {e}")))?;

        info!(signer = %signer.address(), "chain client connected");
        Ok(Self {
            http,
            ws,
            signer,
            cfg,
        })
    }

    /// The signing account's address.
    #[must_use]
    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }

    fn creation_filter(&self) -> Filter {
        Filter::new()
            .address(self.cfg.factory)
            .event_signature(IVaultFactory::VaultCreated::SIGNATURE_HASH)
    }

    async fn eth_call(&self, to: Address, calldata: Vec<u8>) -> ChainResult<Bytes> {
        let req = TransactionRequest {
            to: Some(TxKind::Call(to)),
            input: TransactionInput::new(calldata.into()),
            ..Default::default()
        };
        self.http
            .call(&req)
            .await
            .map_err(|e| ChainError::Rpc(format!("eth_call failed: {e}")))
    }

    fn decode_creation(log: &alloy::rpc::types::Log) -> ChainResult<VaultRef> {
        let event = IVaultFactory::VaultCreated::decode_log(&log.inner, true)
            .map_err(|e| ChainError::Decode(format!("VaultCreated log: {e}")))?;
        Ok(VaultRef::new(event.data.vault, event.data.owner))
    }

    /// Aggregate a list of sub-calls through Multicall3.
    async fn aggregate(
        &self,
        calls: Vec<Multicall3Call>,
    ) -> ChainResult<Vec<crate::contracts::Multicall3Result>> {
        let calldata = aggregate3Call { calls }.abi_encode();
        let raw = self.eth_call(self.cfg.multicall3, calldata).await?;
        let decoded = aggregate3Call::abi_decode_returns(&raw, true)
            .map_err(|e| ChainError::Decode(format!("aggregate3 returns: {e}")))?;
        Ok(decoded.returnData)
    }
}

impl ChainClient for EvmClient {
    fn transaction_count(&self, account: Address) -> BoxFuture<'_, ChainResult<u64>> {
        Box::pin(async move {
            self.http
                .get_transaction_count(account)
                .pending()
                .await
                .map_err(|e| ChainError::Rpc(format!("transaction count: {e}")))
        })
    }

    fn estimate_fees(&self) -> BoxFuture<'_, ChainResult<FeeEstimate>> {
        Box::pin(async move {
            let history = self
                .http
                .get_fee_history(
                    FEE_HISTORY_BLOCKS,
                    BlockNumberOrTag::Latest,
                    &[FEE_HISTORY_PERCENTILE],
                )
                .await
                .map_err(|e| ChainError::Rpc(format!("fee history: {e}")))?;

            let latest_base = history
                .latest_block_base_fee()
                .ok_or_else(|| ChainError::Rpc("no base fee history".into()))?;
            // 12.5% headroom when the node does not report the next base fee.
            let next_base = match history.next_block_base_fee() {
                Some(fee) if fee > 0 => fee,
                _ => latest_base.saturating_mul(1125) / 1000,
            };

            let mut tip_sum = 0u128;
            let mut tip_count = 0u128;
            if let Some(rewards) = &history.reward {
                for block in rewards {
                    if let Some(r) = block.first() {
                        tip_sum = tip_sum.saturating_add(*r);
                        tip_count += 1;
                    }
                }
            }
            let tip = if tip_count > 0 {
                tip_sum / tip_count
            } else {
                PRIORITY_FEE_FLOOR
            };

            Ok(FeeEstimate::new(next_base.saturating_add(tip), tip))
        })
    }

    fn vault_created_logs(
        &self,
        from_block: u64,
        to_block: Option<u64>,
    ) -> BoxFuture<'_, ChainResult<Vec<VaultRef>>> {
        Box::pin(async move {
            let head = match to_block {
                Some(block) => block,
                None => self
                    .http
                    .get_block_number()
                    .await
                    .map_err(|e| ChainError::Rpc(format!("block number: {e}")))?,
            };

            let mut vaults = Vec::new();
            let mut start = from_block;
            while start <= head {
                let end = head.min(start.saturating_add(self.cfg.backfill_chunk.saturating_sub(1)));
                let filter = self.creation_filter().from_block(start).to_block(end);
                let logs = self
                    .http
                    .get_logs(&filter)
                    .await
                    .map_err(|e| ChainError::Rpc(format!("get_logs [{start}, {end}]: {e}")))?;

                for log in &logs {
                    match Self::decode_creation(log) {
                        Ok(vault) => vaults.push(vault),
                        Err(e) => warn!(error = %e, "skipping undecodable creation log"),
                    }
                }
                debug!(start, end, total = vaults.len(), "backfill page complete");
                start = end.saturating_add(1);
            }
            Ok(vaults)
        })
    }

    fn subscribe_vault_created(
        &self,
    ) -> BoxFuture<'_, ChainResult<mpsc::Receiver<VaultRef>>> {
        Box::pin(async move {
            let filter = self.creation_filter();
            let sub = self
                .ws
                .subscribe_logs(&filter)
                .await
                .map_err(|e| ChainError::Subscribe(format!("subscribe_logs: {e}")))?;

            let (tx, rx) = mpsc::channel(256);
            let ws = self.ws.clone();
            tokio::spawn(async move {
                let mut stream = sub.into_stream();
                loop {
                    match stream.next().await {
                        Some(log) => match Self::decode_creation(&log) {
                            Ok(vault) => {
                                if tx.send(vault).await.is_err() {
                                    // Receiver dropped: unsubscribe.
                                    return;
                                }
                            }
                            Err(e) => warn!(error = %e, "undecodable live creation log"),
                        },
                        None => {
                            if tx.is_closed() {
                                return;
                            }
                            warn!("creation subscription dropped, re-establishing");
                            sleep(RESUBSCRIBE_DELAY).await;
                            match ws.subscribe_logs(&filter).await {
                                Ok(sub) => stream = sub.into_stream(),
                                Err(e) => {
                                    warn!(error = %e, "resubscribe failed, backing off");
                                }
                            }
                        }
                    }
                }
            });
            Ok(rx)
        })
    }

    fn debt_amount(&self, vault: Address) -> BoxFuture<'_, ChainResult<U256>> {
        Box::pin(async move {
            let raw = self
                .eth_call(vault, IVault::debtAmountCall {}.abi_encode())
                .await?;
            let out = IVault::debtAmountCall::abi_decode_returns(&raw, true)
                .map_err(|e| ChainError::Decode(format!("debtAmount: {e}")))?;
            Ok(out._0)
        })
    }

    fn collateral_amount(&self, vault: Address) -> BoxFuture<'_, ChainResult<U256>> {
        Box::pin(async move {
            let raw = self
                .eth_call(vault, IVault::collateralAmountCall {}.abi_encode())
                .await?;
            let out = IVault::collateralAmountCall::abi_decode_returns(&raw, true)
                .map_err(|e| ChainError::Decode(format!("collateralAmount: {e}")))?;
            Ok(out._0)
        })
    }

    fn collateral_token(&self, vault: Address) -> BoxFuture<'_, ChainResult<Address>> {
        Box::pin(async move {
            let raw = self
                .eth_call(vault, IVault::collateralTokenCall {}.abi_encode())
                .await?;
            let out = IVault::collateralTokenCall::abi_decode_returns(&raw, true)
                .map_err(|e| ChainError::Decode(format!("collateralToken: {e}")))?;
            Ok(out._0)
        })
    }

    fn oracle_price(&self, token: Address) -> BoxFuture<'_, ChainResult<U256>> {
        Box::pin(async move {
            let raw = self
                .eth_call(self.cfg.oracle, IPriceOracle::getPriceCall { token }.abi_encode())
                .await?;
            let out = IPriceOracle::getPriceCall::abi_decode_returns(&raw, true)
                .map_err(|e| ChainError::Decode(format!("getPrice: {e}")))?;
            Ok(out._0)
        })
    }

    fn vault_states(&self, vaults: Vec<Address>) -> BoxFuture<'_, ChainResult<Vec<VaultState>>> {
        Box::pin(async move {
            if vaults.is_empty() {
                return Ok(Vec::new());
            }

            // Phase one: debt, collateral, token for every vault.
            let mut calls = Vec::with_capacity(vaults.len() * 3);
            for vault in &vaults {
                calls.push(Multicall3Call {
                    target: *vault,
                    allowFailure: true,
                    callData: IVault::debtAmountCall {}.abi_encode().into(),
                });
                calls.push(Multicall3Call {
                    target: *vault,
                    allowFailure: true,
                    callData: IVault::collateralAmountCall {}.abi_encode().into(),
                });
                calls.push(Multicall3Call {
                    target: *vault,
                    allowFailure: true,
                    callData: IVault::collateralTokenCall {}.abi_encode().into(),
                });
            }
            let results = self.aggregate(calls).await?;

            let mut states = Vec::with_capacity(vaults.len());
            for (i, vault) in vaults.iter().enumerate() {
                let chunk = &results[i * 3..i * 3 + 3];
                if chunk.iter().any(|r| !r.success) {
                    warn!(vault = %vault, "batched vault read failed, skipping");
                    continue;
                }
                let debt = IVault::debtAmountCall::abi_decode_returns(&chunk[0].returnData, true)
                    .map_err(|e| ChainError::Decode(format!("debtAmount: {e}")))?
                    ._0;
                let collateral =
                    IVault::collateralAmountCall::abi_decode_returns(&chunk[1].returnData, true)
                        .map_err(|e| ChainError::Decode(format!("collateralAmount: {e}")))?
                        ._0;
                let token =
                    IVault::collateralTokenCall::abi_decode_returns(&chunk[2].returnData, true)
                        .map_err(|e| ChainError::Decode(format!("collateralToken: {e}")))?
                        ._0;
                states.push(VaultState {
                    vault: *vault,
                    debt_amount: debt,
                    collateral_amount: collateral,
                    collateral_token: token,
                    collateral_price: None,
                });
            }

            // Phase two: oracle prices, only for vaults that carry debt.
            let indebted: Vec<usize> = states
                .iter()
                .enumerate()
                .filter(|(_, s)| !s.debt_amount.is_zero())
                .map(|(i, _)| i)
                .collect();
            if indebted.is_empty() {
                return Ok(states);
            }

            let price_calls = indebted
                .iter()
                .map(|&i| Multicall3Call {
                    target: self.cfg.oracle,
                    allowFailure: true,
                    callData: IPriceOracle::getPriceCall {
                        token: states[i].collateral_token,
                    }
                    .abi_encode()
                    .into(),
                })
                .collect();
            let price_results = self.aggregate(price_calls).await?;

            for (slot, result) in indebted.iter().zip(price_results.iter()) {
                if !result.success {
                    warn!(vault = %states[*slot].vault, "batched price read failed");
                    continue;
                }
                let price = IPriceOracle::getPriceCall::abi_decode_returns(&result.returnData, true)
                    .map_err(|e| ChainError::Decode(format!("getPrice: {e}")))?
                    ._0;
                states[*slot].collateral_price = Some(price);
            }
            Ok(states)
        })
    }

    fn auction_id(&self, vault: Address) -> BoxFuture<'_, ChainResult<U256>> {
        Box::pin(async move {
            let calldata = ILiquidationManager::vaultToAuctionIdCall { vault }.abi_encode();
            let raw = self.eth_call(self.cfg.liquidation_manager, calldata).await?;
            let out = ILiquidationManager::vaultToAuctionIdCall::abi_decode_returns(&raw, true)
                .map_err(|e| ChainError::Decode(format!("vaultToAuctionId: {e}")))?;
            Ok(out._0)
        })
    }

    fn simulate_start_auction(
        &self,
        vault: Address,
        nonce: u64,
        fees: FeeEstimate,
    ) -> BoxFuture<'_, ChainResult<PreparedTx>> {
        Box::pin(async move {
            let calldata = ILiquidationManager::startAuctionCall { vault }.abi_encode();

            // Dry-run with the exact nonce and fees the submission will
            // carry, so reverts surface without spending gas.
            let req = TransactionRequest {
                from: Some(self.signer.address()),
                to: Some(TxKind::Call(self.cfg.liquidation_manager)),
                nonce: Some(nonce),
                gas: Some(self.cfg.gas_limit),
                max_fee_per_gas: Some(fees.max_fee_per_gas),
                max_priority_fee_per_gas: Some(fees.max_priority_fee_per_gas),
                input: TransactionInput::new(calldata.clone().into()),
                ..Default::default()
            };
            self.http
                .call(&req)
                .await
                .map_err(|e| ChainError::Revert(format!("startAuction simulation: {e}")))?;

            let mut tx = TxEip1559 {
                chain_id: self.cfg.chain_id,
                nonce,
                gas_limit: self.cfg.gas_limit,
                max_fee_per_gas: fees.max_fee_per_gas,
                max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
                to: TxKind::Call(self.cfg.liquidation_manager),
                value: U256::ZERO,
                access_list: Default::default(),
                input: calldata.into(),
            };
            let sig = TxSignerSync::sign_transaction_sync(&self.signer, &mut tx)
                .map_err(|e| ChainError::Signer(format!("sign startAuction: {e}")))?;
            let signed: TxEnvelope = tx.into_signed(sig).into();
            let hash = *signed.tx_hash();
            Ok(PreparedTx {
                raw: signed.encoded_2718(),
                hash,
                nonce,
                fees,
            })
        })
    }

    fn submit(&self, tx: PreparedTx) -> BoxFuture<'_, ChainResult<B256>> {
        Box::pin(async move {
            self.http
                .send_raw_transaction(&tx.raw)
                .await
                .map_err(|e| ChainError::Rpc(format!("send_raw_transaction: {e}")))?;
            Ok(tx.hash)
        })
    }

    fn wait_for_receipt(
        &self,
        hash: B256,
        timeout: Duration,
    ) -> BoxFuture<'_, ChainResult<TxReceipt>> {
        Box::pin(async move {
            let poll = async {
                loop {
                    match self.http.get_transaction_receipt(hash).await {
                        Ok(Some(receipt)) => {
                            return Ok(TxReceipt {
                                success: receipt.status(),
                                block_number: receipt.block_number,
                            });
                        }
                        Ok(None) => sleep(RECEIPT_POLL_INTERVAL).await,
                        Err(e) => return Err(ChainError::Rpc(format!("receipt poll: {e}"))),
                    }
                }
            };
            match tokio::time::timeout(timeout, poll).await {
                Ok(result) => result,
                Err(_) => Err(ChainError::ReceiptTimeout),
            }
        })
    }
}
