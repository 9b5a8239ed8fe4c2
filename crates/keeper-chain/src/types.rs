//! Wire-facing value types shared by chain client implementations.

use alloy::primitives::{Address, B256, U256};

/// EIP-1559 fee estimate in wei.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeEstimate {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

impl FeeEstimate {
    #[must_use]
    pub fn new(max_fee_per_gas: u128, max_priority_fee_per_gas: u128) -> Self {
        Self {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        }
    }

    /// Both fee components scaled by `(100 + percent) / 100` in integer
    /// math. Used for the replace-by-fee bump.
    #[must_use]
    pub fn bumped(&self, percent: u64) -> Self {
        let factor = 100u128 + u128::from(percent);
        Self {
            max_fee_per_gas: self.max_fee_per_gas.saturating_mul(factor) / 100,
            max_priority_fee_per_gas: self.max_priority_fee_per_gas.saturating_mul(factor) / 100,
        }
    }
}

/// A simulated, signed transaction ready for submission.
///
/// Produced by a successful simulation; submitting it does not re-sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTx {
    /// EIP-2718 encoded raw transaction bytes.
    pub raw: Vec<u8>,
    /// Transaction hash.
    pub hash: B256,
    /// Nonce the transaction was built with.
    pub nonce: u64,
    /// Fees the transaction was built with.
    pub fees: FeeEstimate,
}

/// Confirmation receipt outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReceipt {
    /// Whether the transaction executed successfully on-chain.
    pub success: bool,
    /// Block of inclusion, when known.
    pub block_number: Option<u64>,
}

/// One vault's raw state from a batched (multicall) read.
///
/// `collateral_price` is `None` for zero-debt vaults: the aggregate never
/// issues an oracle call for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultState {
    pub vault: Address,
    pub debt_amount: U256,
    pub collateral_amount: U256,
    pub collateral_token: Address,
    pub collateral_price: Option<U256>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bump_scales_both_components() {
        let fees = FeeEstimate::new(100_000_000_000, 2_000_000_000);
        let bumped = fees.bumped(20);
        assert_eq!(bumped.max_fee_per_gas, 120_000_000_000);
        assert_eq!(bumped.max_priority_fee_per_gas, 2_400_000_000);
    }

    #[test]
    fn bump_truncates_integer_division() {
        let fees = FeeEstimate::new(5, 1);
        let bumped = fees.bumped(20);
        // 5 * 120 / 100 = 6, 1 * 120 / 100 = 1
        assert_eq!(bumped.max_fee_per_gas, 6);
        assert_eq!(bumped.max_priority_fee_per_gas, 1);
    }
}
