use alloy::primitives::{Address, U256};

use crate::engine::adapter::{AdapterError, MarketEvent, VaultAdapter};

use super::FailureSwitch;

/// Idle asset buffer. Holds base assets 1:1, fully liquid unless capped.
#[derive(Debug, Clone)]
pub struct IdleBuffer {
    vault: Address,
    held: U256,
    liquidity_cap: Option<U256>,
    failure: FailureSwitch,
}

impl IdleBuffer {
    pub fn new(vault: Address) -> Self {
        Self {
            vault,
            held: U256::ZERO,
            liquidity_cap: None,
            failure: FailureSwitch::default(),
        }
    }

    pub fn failure_switch(&self) -> FailureSwitch {
        self.failure.clone()
    }
}

impl VaultAdapter for IdleBuffer {
    fn vault(&self) -> Address {
        self.vault
    }

    fn balance(&self) -> U256 {
        self.held
    }

    fn max_withdrawable(&self) -> U256 {
        self.liquidity_cap.map_or(self.held, |cap| cap.min(self.held))
    }

    fn preview_deposit(&self, assets: U256) -> Result<U256, AdapterError> {
        Ok(assets)
    }

    fn preview_withdraw(&self, assets: U256) -> Result<U256, AdapterError> {
        Ok(assets)
    }

    fn deposit_assets(&mut self, assets: U256) -> Result<U256, AdapterError> {
        if self.failure.fire() {
            return Err(AdapterError::Rejected {
                vault: self.vault,
                reason: "injected failure on deposit".to_string(),
            });
        }
        self.held = self
            .held
            .checked_add(assets)
            .ok_or(AdapterError::Overflow { vault: self.vault })?;
        Ok(assets)
    }

    fn withdraw_assets(&mut self, assets: U256) -> Result<U256, AdapterError> {
        if self.failure.fire() {
            return Err(AdapterError::Rejected {
                vault: self.vault,
                reason: "injected failure on withdraw".to_string(),
            });
        }
        let available = self.max_withdrawable();
        if assets > available {
            return Err(AdapterError::InsufficientLiquidity {
                vault: self.vault,
                requested: assets,
                available,
            });
        }
        self.held -= assets;
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
                self.held = self
                    .held
                    .checked_add(*assets)
                    .ok_or(AdapterError::Overflow { vault: self.vault })?;
            }
            MarketEvent::RealizeLoss(assets) => self.held = self.held.saturating_sub(*assets),
            MarketEvent::SetLiquidity(cap) => self.liquidity_cap = *cap,
            MarketEvent::FailNext => self.failure.arm(),
        }
        Ok(())
    }
}
