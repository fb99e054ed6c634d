//! Share ⇄ asset conversion against net managed assets.
//!
//! `S` is the share supply and `N` the net total assets. Both sides carry a
//! virtual unit (`S + 1`, `N + 1`) so the first deposit prices at 1:1 and an
//! empty vault cannot be inflated. Deposits round in favour of existing
//! holders; redemption of the entire supply returns exactly `N`.

use alloy::primitives::U256;
use thiserror::Error;

use crate::model::amount::{BPS_SCALE, Rounding, mul_div};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("MathOverflow: share conversion overflowed 256 bits")]
    MathOverflow,

    #[error("withdrawal fee of {fee_bps} bps leaves nothing to withdraw")]
    FeeConsumesWithdrawal { fee_bps: u32 },
}

const ONE: U256 = U256::from_limbs([1, 0, 0, 0]);

/// Conversion quotes for one token state. Cheap to build; rebuilt per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionEngine {
    pub total_supply: U256,
    pub net_total_assets: U256,
    pub fee_bps: u32,
}

impl ConversionEngine {
    pub fn new(total_supply: U256, net_total_assets: U256, fee_bps: u32) -> Self {
        ConversionEngine {
            total_supply,
            net_total_assets,
            fee_bps,
        }
    }

    fn supply_plus_one(&self) -> Result<U256, ConversionError> {
        self.total_supply
            .checked_add(ONE)
            .ok_or(ConversionError::MathOverflow)
    }

    fn assets_plus_one(&self) -> Result<U256, ConversionError> {
        self.net_total_assets
            .checked_add(ONE)
            .ok_or(ConversionError::MathOverflow)
    }

    /// `floor(assets * (S + 1) / (N + 1))`
    pub fn shares_for(&self, assets: U256) -> Result<U256, ConversionError> {
        mul_div(
            assets,
            self.supply_plus_one()?,
            self.assets_plus_one()?,
            Rounding::Down,
        )
        .ok_or(ConversionError::MathOverflow)
    }

    /// `floor(shares * (N + 1) / (S + 1))`, or exactly `N` for the full supply.
    pub fn assets_for(&self, shares: U256) -> Result<U256, ConversionError> {
        if shares == self.total_supply && !self.total_supply.is_zero() {
            return Ok(self.net_total_assets);
        }
        mul_div(
            shares,
            self.assets_plus_one()?,
            self.supply_plus_one()?,
            Rounding::Down,
        )
        .ok_or(ConversionError::MathOverflow)
    }

    /// Fee charged on a gross withdrawal, rounded down.
    pub fn fee_on(&self, gross: U256) -> Result<U256, ConversionError> {
        mul_div(
            gross,
            U256::from(self.fee_bps),
            U256::from(BPS_SCALE),
            Rounding::Down,
        )
        .ok_or(ConversionError::MathOverflow)
    }

    pub fn net_of_fee(&self, gross: U256) -> Result<U256, ConversionError> {
        Ok(gross - self.fee_on(gross)?)
    }

    /// Smallest gross amount whose net of fee is at least `net`.
    pub fn gross_for_net(&self, net: U256) -> Result<U256, ConversionError> {
        if net.is_zero() {
            return Ok(U256::ZERO);
        }
        if self.fee_bps >= BPS_SCALE {
            return Err(ConversionError::FeeConsumesWithdrawal {
                fee_bps: self.fee_bps,
            });
        }
        let kept = U256::from(BPS_SCALE - self.fee_bps);
        let base = mul_div(net - ONE, U256::from(BPS_SCALE), kept, Rounding::Down)
            .ok_or(ConversionError::MathOverflow)?;
        base.checked_add(ONE).ok_or(ConversionError::MathOverflow)
    }

    pub fn preview_deposit(&self, assets: U256) -> Result<U256, ConversionError> {
        self.shares_for(assets)
    }

    /// `ceil(shares * (N + 1) / (S + 1))`
    pub fn preview_mint(&self, shares: U256) -> Result<U256, ConversionError> {
        mul_div(
            shares,
            self.assets_plus_one()?,
            self.supply_plus_one()?,
            Rounding::Up,
        )
        .ok_or(ConversionError::MathOverflow)
    }

    /// Shares burned to receive `net` assets after the fee, rounded up.
    ///
    /// Returns the share count and the gross amount it must cover.
    pub fn preview_withdraw_gross(&self, net: U256) -> Result<(U256, U256), ConversionError> {
        let gross = self.gross_for_net(net)?;
        let shares = mul_div(
            gross,
            self.supply_plus_one()?,
            self.assets_plus_one()?,
            Rounding::Up,
        )
        .ok_or(ConversionError::MathOverflow)?;

        // The full supply redeems for exactly N, one share cheaper than the
        // formula when S < N.
        if shares > self.total_supply && gross <= self.net_total_assets && !self.total_supply.is_zero()
        {
            return Ok((self.total_supply, gross));
        }
        Ok((shares, gross))
    }

    pub fn preview_withdraw(&self, net: U256) -> Result<U256, ConversionError> {
        self.preview_withdraw_gross(net).map(|(shares, _)| shares)
    }

    pub fn preview_redeem(&self, shares: U256) -> Result<U256, ConversionError> {
        self.net_of_fee(self.assets_for(shares)?)
    }

    /// Net assets a holder of `balance` shares can withdraw.
    pub fn max_withdraw(&self, balance: U256) -> Result<U256, ConversionError> {
        self.preview_redeem(balance)
    }
}
