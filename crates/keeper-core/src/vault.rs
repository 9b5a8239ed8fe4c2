//! Vault identities and per-pass health snapshots.

use alloy::primitives::{Address, U256};

use crate::ratio::CollateralRatio;

/// A discovered vault. Created once by discovery on first sighting and
/// never deleted; a liquidated vault is simply re-evaluated as healthy on
/// its next monitoring pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VaultRef {
    /// The vault contract address.
    pub address: Address,
    /// The vault owner.
    pub owner: Address,
}

impl VaultRef {
    #[must_use]
    pub fn new(address: Address, owner: Address) -> Self {
        Self { address, owner }
    }
}

/// One monitoring pass's view of a vault. Ephemeral: recomputed every
/// pass, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultHealth {
    pub address: Address,
    pub collateral_token: Address,
    pub debt_token: Address,
    pub collateral_amount: U256,
    pub debt_amount: U256,
    pub collateral_price: U256,
    pub ratio: CollateralRatio,
}

impl VaultHealth {
    /// Whether the vault is below the given minimum ratio (hundredths of
    /// a percent) and therefore a liquidation candidate.
    #[must_use]
    pub fn is_unhealthy(&self, min_ratio: u64) -> bool {
        self.ratio.is_below(min_ratio)
    }
}

/// An entry in the strategy service's internal liquidation queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidationCandidate {
    pub address: Address,
    pub ratio: CollateralRatio,
}

impl LiquidationCandidate {
    #[must_use]
    pub fn new(address: Address, ratio: CollateralRatio) -> Self {
        Self { address, ratio }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_threshold_uses_ratio() {
        let health = VaultHealth {
            address: Address::ZERO,
            collateral_token: Address::ZERO,
            debt_token: Address::ZERO,
            collateral_amount: U256::from(100),
            debt_amount: U256::from(100),
            collateral_price: U256::from(1),
            ratio: CollateralRatio::Finite(10_000),
        };

        assert!(health.is_unhealthy(15_000));
        assert!(!health.is_unhealthy(10_000));
    }
}
