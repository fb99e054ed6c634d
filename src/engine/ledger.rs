//! Settlement shortfall and settlement ratio, validated on every write.

use alloy::primitives::U256;
use thiserror::Error;

use crate::model::amount::{Rounding, WAD, mul_div};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("SettlementShortfallTooHigh: shortfall {requested} exceeds gross assets {gross}")]
    SettlementShortfallTooHigh { requested: U256, gross: U256 },

    #[error("InvalidSettlementRatio: {0} exceeds 1e18")]
    InvalidSettlementRatio(U256),

    #[error("recorded shortfall {shortfall} exceeds gross assets {gross}; lower the shortfall")]
    ShortfallExceedsAssets { shortfall: U256, gross: U256 },

    #[error("net asset computation overflowed")]
    Overflow,
}

/// Old and new value of an applied ledger write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerUpdate {
    pub old: U256,
    pub new: U256,
}

/// Settlement shortfall and settlement ratio applied to gross managed assets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortfallLedger {
    shortfall: U256,
    settlement_ratio: U256,
}

impl Default for ShortfallLedger {
    fn default() -> Self {
        ShortfallLedger {
            shortfall: U256::ZERO,
            settlement_ratio: WAD,
        }
    }
}

impl ShortfallLedger {
    /// Rebuild a ledger from stored values. Only the ratio bound is checked
    /// here; the shortfall bound depends on live gross assets.
    pub fn from_parts(shortfall: U256, settlement_ratio: U256) -> Result<Self, LedgerError> {
        if settlement_ratio > WAD {
            return Err(LedgerError::InvalidSettlementRatio(settlement_ratio));
        }
        Ok(ShortfallLedger {
            shortfall,
            settlement_ratio,
        })
    }

    pub fn shortfall(&self) -> U256 {
        self.shortfall
    }

    pub fn settlement_ratio(&self) -> U256 {
        self.settlement_ratio
    }

    /// Ratio zero halts deposits.
    pub fn is_disabled(&self) -> bool {
        self.settlement_ratio.is_zero()
    }

    /// Record a new shortfall. `gross` must be read fresh by the caller.
    pub fn set_shortfall(&mut self, new: U256, gross: U256) -> Result<LedgerUpdate, LedgerError> {
        if new > gross {
            return Err(LedgerError::SettlementShortfallTooHigh {
                requested: new,
                gross,
            });
        }
        let old = std::mem::replace(&mut self.shortfall, new);
        Ok(LedgerUpdate { old, new })
    }

    pub fn set_settlement_ratio(&mut self, new: U256) -> Result<LedgerUpdate, LedgerError> {
        if new > WAD {
            return Err(LedgerError::InvalidSettlementRatio(new));
        }
        let old = std::mem::replace(&mut self.settlement_ratio, new);
        Ok(LedgerUpdate { old, new })
    }

    /// `(gross - shortfall) * ratio / 1e18`, rounded down.
    pub fn net_total_assets(&self, gross: U256) -> Result<U256, LedgerError> {
        let recoverable = gross
            .checked_sub(self.shortfall)
            .ok_or(LedgerError::ShortfallExceedsAssets {
                shortfall: self.shortfall,
                gross,
            })?;
        mul_div(recoverable, self.settlement_ratio, WAD, Rounding::Down).ok_or(LedgerError::Overflow)
    }

    /// Whether the write-time bound still holds against `gross`.
    pub fn is_consistent(&self, gross: U256) -> bool {
        self.shortfall <= gross
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(n: u64) -> U256 {
        U256::from(n) * WAD
    }

    #[test]
    fn test_default_is_neutral() {
        let ledger = ShortfallLedger::default();
        assert_eq!(ledger.shortfall(), U256::ZERO);
        assert_eq!(ledger.settlement_ratio(), WAD);
        assert_eq!(ledger.net_total_assets(units(100)).unwrap(), units(100));
    }

    #[test]
    fn test_shortfall_bound_is_inclusive() {
        let mut ledger = ShortfallLedger::default();
        let update = ledger.set_shortfall(units(100), units(100)).unwrap();
        assert_eq!(update.old, U256::ZERO);
        assert_eq!(update.new, units(100));
        assert_eq!(ledger.net_total_assets(units(100)).unwrap(), U256::ZERO);

        let err = ledger.set_shortfall(units(100) + U256::from(1u64), units(100)).unwrap_err();
        assert!(matches!(err, LedgerError::SettlementShortfallTooHigh { .. }));
        assert_eq!(ledger.shortfall(), units(100), "failed write must not change state");
    }

    #[test]
    fn test_ratio_bound() {
        let mut ledger = ShortfallLedger::default();
        assert!(ledger.set_settlement_ratio(WAD + U256::from(1u64)).is_err());
        assert_eq!(ledger.settlement_ratio(), WAD);
        ledger.set_settlement_ratio(U256::ZERO).unwrap();
        assert!(ledger.is_disabled());
        assert_eq!(ledger.net_total_assets(units(100)).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_subtract_then_scale() {
        let mut ledger = ShortfallLedger::default();
        ledger.set_shortfall(units(60), units(100)).unwrap();
        ledger.set_settlement_ratio(U256::from(800_000_000_000_000_000u64)).unwrap();
        // (100 - 60) * 0.8 = 32
        assert_eq!(ledger.net_total_assets(units(100)).unwrap(), units(32));
    }

    #[test]
    fn test_gross_drop_below_shortfall_is_detected() {
        let mut ledger = ShortfallLedger::default();
        ledger.set_shortfall(units(50), units(100)).unwrap();
        assert!(!ledger.is_consistent(units(40)));
        assert!(matches!(
            ledger.net_total_assets(units(40)),
            Err(LedgerError::ShortfallExceedsAssets { .. })
        ));
    }
}
