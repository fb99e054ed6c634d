use alloy::primitives::{Address, U256};

use crate::engine::adapter::{AdapterError, MarketEvent, VaultAdapter};
use crate::model::amount::{Rounding, mul_div};

use super::FailureSwitch;

const VIRTUAL_ASSETS: U256 = U256::from_limbs([1, 0, 0, 0]);

/// ERC4626-style share vault with the router as its only depositor.
///
/// Conversions use a virtual share offset of `10^decimals_offset` and one
/// virtual asset, so the router's position can read one unit below the
/// vault's assets after yield accrues.
#[derive(Debug, Clone)]
pub struct Erc4626Sim {
    vault: Address,
    total_assets: U256,
    total_shares: U256,
    decimals_offset: u8,
    liquidity_cap: Option<U256>,
    failure: FailureSwitch,
}

impl Erc4626Sim {
    pub fn new(vault: Address) -> Self {
        Self {
            vault,
            total_assets: U256::ZERO,
            total_shares: U256::ZERO,
            decimals_offset: 0,
            liquidity_cap: None,
            failure: FailureSwitch::default(),
        }
    }

    pub fn with_decimals_offset(mut self, offset: u8) -> Self {
        self.decimals_offset = offset;
        self
    }

    pub fn with_liquidity_cap(mut self, cap: Option<U256>) -> Self {
        self.liquidity_cap = cap;
        self
    }

    /// Handle for arming failures after the adapter is boxed.
    pub fn failure_switch(&self) -> FailureSwitch {
        self.failure.clone()
    }

    pub fn total_assets(&self) -> U256 {
        self.total_assets
    }

    pub fn total_shares(&self) -> U256 {
        self.total_shares
    }

    fn virtual_shares(&self) -> U256 {
        U256::from(10u64).pow(U256::from(self.decimals_offset))
    }

    fn to_assets(&self, shares: U256, rounding: Rounding) -> Result<U256, AdapterError> {
        mul_div(
            shares,
            self.total_assets + VIRTUAL_ASSETS,
            self.total_shares + self.virtual_shares(),
            rounding,
        )
        .ok_or(AdapterError::Overflow { vault: self.vault })
    }

    fn to_shares(&self, assets: U256, rounding: Rounding) -> Result<U256, AdapterError> {
        mul_div(
            assets,
            self.total_shares + self.virtual_shares(),
            self.total_assets + VIRTUAL_ASSETS,
            rounding,
        )
        .ok_or(AdapterError::Overflow { vault: self.vault })
    }

    fn check_failure(&self, operation: &str) -> Result<(), AdapterError> {
        if self.failure.fire() {
            return Err(AdapterError::Rejected {
                vault: self.vault,
                reason: format!("injected failure on {operation}"),
            });
        }
        Ok(())
    }
}

impl VaultAdapter for Erc4626Sim {
    fn vault(&self) -> Address {
        self.vault
    }

    fn balance(&self) -> U256 {
        self.to_assets(self.total_shares, Rounding::Down)
            .unwrap_or(self.total_assets)
            .min(self.total_assets)
    }

    fn max_withdrawable(&self) -> U256 {
        let balance = self.balance();
        match self.liquidity_cap {
            Some(cap) => balance.min(cap),
            None => balance,
        }
    }

    fn preview_deposit(&self, assets: U256) -> Result<U256, AdapterError> {
        self.to_shares(assets, Rounding::Down)
    }

    fn preview_withdraw(&self, assets: U256) -> Result<U256, AdapterError> {
        self.to_shares(assets, Rounding::Up)
    }

    fn deposit_assets(&mut self, assets: U256) -> Result<U256, AdapterError> {
        self.check_failure("deposit")?;
        let shares = self.to_shares(assets, Rounding::Down)?;
        if shares.is_zero() {
            return Err(AdapterError::Rejected {
                vault: self.vault,
                reason: format!("{assets} assets mint zero shares"),
            });
        }
        self.total_shares += shares;
        self.total_assets = self
            .total_assets
            .checked_add(assets)
            .ok_or(AdapterError::Overflow { vault: self.vault })?;
        Ok(assets)
    }

    fn withdraw_assets(&mut self, assets: U256) -> Result<U256, AdapterError> {
        self.check_failure("withdraw")?;
        let available = self.max_withdrawable();
        if assets > available {
            return Err(AdapterError::InsufficientLiquidity {
                vault: self.vault,
                requested: assets,
                available,
            });
        }
        let shares = self.to_shares(assets, Rounding::Up)?.min(self.total_shares);
        self.total_shares -= shares;
        self.total_assets -= assets;
        if let Some(cap) = self.liquidity_cap.as_mut() {
            *cap -= assets;
        }
        Ok(assets)
    }

    fn snapshot(&self) -> Box<dyn VaultAdapter> {
        Box::new(self.clone())
    }

    fn apply_market_event(&mut self, event: &MarketEvent) -> Result<(), AdapterError> {
        match event {
            MarketEvent::Accrue(assets) => {
                self.total_assets = self
                    .total_assets
                    .checked_add(*assets)
                    .ok_or(AdapterError::Overflow { vault: self.vault })?;
            }
            MarketEvent::RealizeLoss(assets) => {
                self.total_assets = self.total_assets.saturating_sub(*assets);
            }
            MarketEvent::SetLiquidity(cap) => self.liquidity_cap = *cap,
            MarketEvent::FailNext => self.failure.arm(),
        }
        Ok(())
    }
}
