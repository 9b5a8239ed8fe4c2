//! Collateralization ratio as integer fixed-point.
//!
//! On-chain amounts are integer-denominated, so the ratio avoids floating
//! point entirely: `collateral * price * SCALE / debt` with truncating
//! division, interpreted as hundredths of a percent (15000 = 150.00%).

use std::fmt;

use alloy::primitives::U256;

/// Fixed-point scale factor: two decimal digits of percent precision.
pub const RATIO_SCALE: u64 = 10_000;

/// A vault's collateralization ratio.
///
/// A vault with no debt cannot be undercollateralized, so its ratio is
/// `Infinite`. Derived ordering places every finite ratio below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CollateralRatio {
    /// Ratio in hundredths of a percent (15000 = 150.00%).
    Finite(u128),
    /// No debt: healthy by definition.
    Infinite,
}

impl CollateralRatio {
    /// Compute the ratio from raw on-chain quantities.
    ///
    /// Returns `collateral * price * 10000 / debt` truncated toward zero,
    /// or `Infinite` when `debt` is zero. A product overflowing U256
    /// saturates to `Infinite`; that can only over-report health for
    /// collateral values beyond any real token supply.
    #[must_use]
    pub fn compute(collateral: U256, price: U256, debt: U256) -> Self {
        if debt.is_zero() {
            return Self::Infinite;
        }

        let scaled = collateral
            .checked_mul(price)
            .and_then(|v| v.checked_mul(U256::from(RATIO_SCALE)));

        match scaled {
            Some(value) => {
                let ratio = value / debt;
                match u128::try_from(ratio) {
                    Ok(r) => Self::Finite(r),
                    Err(_) => Self::Infinite,
                }
            }
            None => Self::Infinite,
        }
    }

    /// Whether this ratio is below the given threshold (hundredths of a
    /// percent). An infinite ratio is never below any threshold.
    #[must_use]
    pub fn is_below(&self, threshold: u64) -> bool {
        match self {
            Self::Finite(v) => *v < u128::from(threshold),
            Self::Infinite => false,
        }
    }

    /// The whole-percent part, truncated (150.75% -> 150).
    #[must_use]
    pub fn percent(&self) -> Option<u128> {
        match self {
            Self::Finite(v) => Some(v / 100),
            Self::Infinite => None,
        }
    }
}

impl fmt::Display for CollateralRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finite(v) => write!(f, "{}.{:02}%", v / 100, v % 100),
            Self::Infinite => write!(f, "inf"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_matches_scaled_integer_formula() {
        // collateral 3, price 1, debt 2 -> 3 * 1 * 10000 / 2 = 15000 = 150.00%
        let r = CollateralRatio::compute(U256::from(3), U256::from(1), U256::from(2));
        assert_eq!(r, CollateralRatio::Finite(15_000));
        assert_eq!(r.percent(), Some(150));
    }

    #[test]
    fn ratio_truncates_toward_zero() {
        // 1 * 1 * 10000 / 3 = 3333 (truncated) = 33.33%
        let r = CollateralRatio::compute(U256::from(1), U256::from(1), U256::from(3));
        assert_eq!(r, CollateralRatio::Finite(3_333));
        assert_eq!(r.to_string(), "33.33%");
    }

    #[test]
    fn zero_debt_is_infinite() {
        let r = CollateralRatio::compute(U256::from(100), U256::from(5), U256::ZERO);
        assert_eq!(r, CollateralRatio::Infinite);
        assert!(!r.is_below(u64::MAX));
    }

    #[test]
    fn threshold_comparison() {
        let below = CollateralRatio::Finite(14_999);
        let at = CollateralRatio::Finite(15_000);
        let above = CollateralRatio::Finite(15_001);

        assert!(below.is_below(15_000));
        assert!(!at.is_below(15_000));
        assert!(!above.is_below(15_000));
    }

    #[test]
    fn overflow_saturates_to_infinite() {
        let r = CollateralRatio::compute(U256::MAX, U256::MAX, U256::from(1));
        assert_eq!(r, CollateralRatio::Infinite);
    }

    #[test]
    fn finite_ratios_order_below_infinite() {
        assert!(CollateralRatio::Finite(u128::MAX) < CollateralRatio::Infinite);
        assert!(CollateralRatio::Finite(100) < CollateralRatio::Finite(200));
    }

    #[test]
    fn display_formats_two_decimals() {
        assert_eq!(CollateralRatio::Finite(15_000).to_string(), "150.00%");
        assert_eq!(CollateralRatio::Finite(12_305).to_string(), "123.05%");
        assert_eq!(CollateralRatio::Infinite.to_string(), "inf");
    }
}
