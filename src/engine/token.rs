use std::collections::BTreeMap;

use alloy::primitives::{Address, U256};
use thiserror::Error;
use tracing::{debug, info};

use crate::model::amount::BPS_SCALE;
use crate::model::vault::{AdapterId, VaultConfig};

use super::adapter::{MarketEvent, VaultAdapter};
use super::conversion::{ConversionEngine, ConversionError};
use super::events::Event;
use super::router::{Router, RouterError, Settlement};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    #[error(transparent)]
    Router(#[from] RouterError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("ZeroAmount: amount must be non-zero")]
    ZeroAmount,

    #[error("ZeroShares: {assets} assets convert to zero shares")]
    ZeroShares { assets: U256 },

    #[error("InsufficientShares: {owner} holds {balance}, {needed} needed")]
    InsufficientShares {
        owner: Address,
        balance: U256,
        needed: U256,
    },

    #[error("InsufficientAllowance: {spender} may spend {allowance} of {owner}'s shares, {needed} needed")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        allowance: U256,
        needed: U256,
    },

    #[error("SettlementRatioDisabled: settlement ratio is zero, deposits are halted")]
    SettlementRatioDisabled,

    #[error("SlippageExceeded: {minted} shares minted, at least {min_shares_out} required")]
    SlippageExceeded { minted: U256, min_shares_out: U256 },

    #[error("LengthMismatch: {vaults} vaults but {amounts} amounts")]
    LengthMismatch { vaults: usize, amounts: usize },

    #[error("InvalidFee: {0} bps exceeds 1,000,000")]
    InvalidFee(u32),

    #[error("MathOverflow: deposit total overflowed")]
    Overflow,
}

/// Yield-bearing pooled deposit token.
///
/// Holds the share ledger and the withdrawal fee, and owns the router that
/// places assets in strategy vaults. Every mutating call takes `&mut self`
/// and either completes or leaves shares, adapters and the event log as
/// they were.
pub struct ShareToken {
    router: Router,
    asset_decimals: u8,
    withdrawal_fee_bps: u32,
    total_supply: U256,
    balances: BTreeMap<Address, U256>,
    allowances: BTreeMap<(Address, Address), U256>,
    events: Vec<Event>,
}

/// Parts needed to rebuild a token from persisted state.
pub struct TokenParts {
    pub router: Router,
    pub asset_decimals: u8,
    pub withdrawal_fee_bps: u32,
    pub balances: BTreeMap<Address, U256>,
    pub allowances: BTreeMap<(Address, Address), U256>,
}

impl ShareToken {
    pub fn new(router: Router, asset_decimals: u8) -> Self {
        ShareToken {
            router,
            asset_decimals,
            withdrawal_fee_bps: 0,
            total_supply: U256::ZERO,
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    /// Rebuild a token. Supply is recomputed from the balances.
    pub fn from_parts(parts: TokenParts) -> Result<Self, VaultError> {
        if parts.withdrawal_fee_bps > BPS_SCALE {
            return Err(VaultError::InvalidFee(parts.withdrawal_fee_bps));
        }
        let total_supply = parts
            .balances
            .values()
            .try_fold(U256::ZERO, |acc, b| acc.checked_add(*b))
            .ok_or(VaultError::Overflow)?;
        Ok(ShareToken {
            router: parts.router,
            asset_decimals: parts.asset_decimals,
            withdrawal_fee_bps: parts.withdrawal_fee_bps,
            total_supply,
            balances: parts.balances,
            allowances: parts.allowances,
            events: Vec::new(),
        })
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    // ── ERC20 views ─────────────────────────────────────────────────

    pub fn asset_decimals(&self) -> u8 {
        self.asset_decimals
    }

    /// Shares carry the asset's decimals.
    pub fn decimals(&self) -> u8 {
        self.asset_decimals
    }

    pub fn total_supply(&self) -> U256 {
        self.total_supply
    }

    pub fn balance_of(&self, holder: Address) -> U256 {
        self.balances.get(&holder).copied().unwrap_or_default()
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn balances(&self) -> &BTreeMap<Address, U256> {
        &self.balances
    }

    pub fn allowances(&self) -> &BTreeMap<(Address, Address), U256> {
        &self.allowances
    }

    pub fn withdrawal_fee_bps(&self) -> u32 {
        self.withdrawal_fee_bps
    }

    // ── ERC4626 views ───────────────────────────────────────────────

    /// Net total assets backing the share supply.
    pub fn total_assets(&self) -> Result<U256, VaultError> {
        Ok(self.router.net_total_assets()?)
    }

    pub fn conversion(&self) -> Result<ConversionEngine, VaultError> {
        Ok(ConversionEngine::new(
            self.total_supply,
            self.total_assets()?,
            self.withdrawal_fee_bps,
        ))
    }

    pub fn convert_to_shares(&self, assets: U256) -> Result<U256, VaultError> {
        Ok(self.conversion()?.shares_for(assets)?)
    }

    pub fn convert_to_assets(&self, shares: U256) -> Result<U256, VaultError> {
        Ok(self.conversion()?.assets_for(shares)?)
    }

    pub fn max_deposit(&self, _receiver: Address) -> U256 {
        if self.router.ledger().is_disabled() {
            U256::ZERO
        } else {
            U256::MAX
        }
    }

    pub fn max_mint(&self, receiver: Address) -> U256 {
        self.max_deposit(receiver)
    }

    pub fn max_withdraw(&self, owner: Address) -> Result<U256, VaultError> {
        Ok(self.conversion()?.max_withdraw(self.balance_of(owner))?)
    }

    pub fn max_redeem(&self, owner: Address) -> U256 {
        self.balance_of(owner)
    }

    pub fn preview_deposit(&self, assets: U256) -> Result<U256, VaultError> {
        Ok(self.conversion()?.preview_deposit(assets)?)
    }

    pub fn preview_mint(&self, shares: U256) -> Result<U256, VaultError> {
        Ok(self.conversion()?.preview_mint(shares)?)
    }

    pub fn preview_withdraw(&self, assets: U256) -> Result<U256, VaultError> {
        Ok(self.conversion()?.preview_withdraw(assets)?)
    }

    pub fn preview_redeem(&self, shares: U256) -> Result<U256, VaultError> {
        Ok(self.conversion()?.preview_redeem(shares)?)
    }

    // ── User operations ─────────────────────────────────────────────

    /// Deposit `assets` through the default vault, minting shares to `receiver`.
    pub fn deposit(&mut self, caller: Address, assets: U256, receiver: Address) -> Result<U256, VaultError> {
        if assets.is_zero() {
            return Err(VaultError::ZeroAmount);
        }
        self.ensure_deposits_enabled()?;
        let shares = self.conversion()?.preview_deposit(assets)?;
        if shares.is_zero() {
            return Err(VaultError::ZeroShares { assets });
        }
        self.ensure_mintable(shares)?;

        self.router.deposit_auto(assets)?;
        self.mint_shares(receiver, shares)?;
        self.events.push(Event::Deposit {
            sender: caller,
            owner: receiver,
            assets,
            shares,
        });
        info!(caller = %caller, receiver = %receiver, assets = %assets, shares = %shares, "deposit");
        Ok(shares)
    }

    /// Mint exactly `shares` to `receiver`, pulling the assets they cost.
    pub fn mint(&mut self, caller: Address, shares: U256, receiver: Address) -> Result<U256, VaultError> {
        if shares.is_zero() {
            return Err(VaultError::ZeroAmount);
        }
        self.ensure_deposits_enabled()?;
        let assets = self.conversion()?.preview_mint(shares)?;
        self.ensure_mintable(shares)?;

        self.router.deposit_auto(assets)?;
        self.mint_shares(receiver, shares)?;
        self.events.push(Event::Deposit {
            sender: caller,
            owner: receiver,
            assets,
            shares,
        });
        info!(caller = %caller, receiver = %receiver, assets = %assets, shares = %shares, "mint");
        Ok(assets)
    }

    /// Deposit exact per-vault amounts chosen by the caller.
    pub fn solver_deposit_assets(
        &mut self,
        caller: Address,
        vaults: &[Address],
        amounts: &[U256],
        min_shares_out: U256,
        receiver: Address,
    ) -> Result<U256, VaultError> {
        if vaults.len() != amounts.len() {
            return Err(VaultError::LengthMismatch {
                vaults: vaults.len(),
                amounts: amounts.len(),
            });
        }
        self.ensure_deposits_enabled()?;
        let total = amounts
            .iter()
            .try_fold(U256::ZERO, |acc, a| acc.checked_add(*a))
            .ok_or(VaultError::Overflow)?;
        if total.is_zero() {
            return Err(VaultError::ZeroAmount);
        }

        let shares = self.conversion()?.preview_deposit(total)?;
        if shares.is_zero() {
            return Err(VaultError::ZeroShares { assets: total });
        }
        if shares < min_shares_out {
            return Err(VaultError::SlippageExceeded {
                minted: shares,
                min_shares_out,
            });
        }
        self.ensure_mintable(shares)?;

        let legs = vaults.iter().copied().zip(amounts.iter().copied()).collect();
        self.router.deposit_solver(legs)?;
        self.mint_shares(receiver, shares)?;
        self.events.push(Event::Deposit {
            sender: caller,
            owner: receiver,
            assets: total,
            shares,
        });
        info!(caller = %caller, legs = vaults.len(), assets = %total, shares = %shares, "solver deposit");
        Ok(shares)
    }

    /// Withdraw exactly `assets` net of fee. Returns the shares burned.
    pub fn withdraw(
        &mut self,
        caller: Address,
        assets: U256,
        receiver: Address,
        owner: Address,
    ) -> Result<U256, VaultError> {
        if assets.is_zero() {
            return Err(VaultError::ZeroAmount);
        }
        let engine = self.conversion()?;
        let shares = engine.preview_withdraw(assets)?;
        let gross = engine.assets_for(shares)?;
        self.exit(caller, receiver, owner, shares, gross, assets)?;
        Ok(shares)
    }

    /// Burn `shares` for their net asset value. Returns the assets paid out.
    pub fn redeem(
        &mut self,
        caller: Address,
        shares: U256,
        receiver: Address,
        owner: Address,
    ) -> Result<U256, VaultError> {
        if shares.is_zero() {
            return Err(VaultError::ZeroAmount);
        }
        let engine = self.conversion()?;
        let gross = engine.assets_for(shares)?;
        let assets = engine.net_of_fee(gross)?;
        self.exit(caller, receiver, owner, shares, gross, assets)?;
        Ok(assets)
    }

    /// Burn first, then settle. Restores the burn if settlement fails.
    ///
    /// `gross` is the pre-fee value of `shares`; only `assets` leaves the vaults.
    fn exit(
        &mut self,
        caller: Address,
        receiver: Address,
        owner: Address,
        shares: U256,
        gross: U256,
        assets: U256,
    ) -> Result<(), VaultError> {
        let balance = self.balance_of(owner);
        if balance < shares {
            return Err(VaultError::InsufficientShares {
                owner,
                balance,
                needed: shares,
            });
        }
        let prior_allowance = (caller != owner).then(|| self.allowance(owner, caller));
        if let Some(allowance) = prior_allowance {
            if allowance < shares {
                return Err(VaultError::InsufficientAllowance {
                    owner,
                    spender: caller,
                    allowance,
                    needed: shares,
                });
            }
            self.spend_allowance(owner, caller, shares);
        }
        self.balances.insert(owner, balance - shares);
        self.total_supply -= shares;

        let settled = if assets.is_zero() {
            Ok(Vec::new())
        } else {
            self.router.settle_withdrawal(gross, assets)
        };
        let settlements = match settled {
            Ok(settlements) => settlements,
            Err(err) => {
                self.balances.insert(owner, balance);
                self.total_supply += shares;
                if let Some(allowance) = prior_allowance {
                    self.allowances.insert((owner, caller), allowance);
                }
                return Err(err.into());
            }
        };

        self.prune(owner);
        self.events.push(Event::Transfer {
            from: owner,
            to: Address::ZERO,
            value: shares,
        });
        self.push_settlements(&settlements);
        self.events.push(Event::Withdraw {
            sender: caller,
            receiver,
            owner,
            assets,
            shares,
        });
        info!(
            caller = %caller,
            owner = %owner,
            receiver = %receiver,
            assets = %assets,
            shares = %shares,
            vaults = settlements.len(),
            "withdraw"
        );
        Ok(())
    }

    pub fn transfer(&mut self, caller: Address, to: Address, value: U256) -> Result<(), VaultError> {
        self.move_shares(caller, to, value)
    }

    pub fn transfer_from(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        value: U256,
    ) -> Result<(), VaultError> {
        let allowance = self.allowance(from, caller);
        if allowance < value {
            return Err(VaultError::InsufficientAllowance {
                owner: from,
                spender: caller,
                allowance,
                needed: value,
            });
        }
        let balance = self.balance_of(from);
        if balance < value {
            return Err(VaultError::InsufficientShares {
                owner: from,
                balance,
                needed: value,
            });
        }
        self.spend_allowance(from, caller, value);
        self.move_shares(from, to, value)
    }

    pub fn approve(&mut self, caller: Address, spender: Address, value: U256) {
        self.allowances.insert((caller, spender), value);
        self.events.push(Event::Approval {
            owner: caller,
            spender,
            value,
        });
    }

    // ── Administration ──────────────────────────────────────────────

    pub fn register_adapter(
        &mut self,
        id: impl Into<AdapterId>,
        adapter: Box<dyn VaultAdapter>,
    ) -> Result<(), VaultError> {
        Ok(self.router.register_adapter(id, adapter)?)
    }

    pub fn set_vault_configs(&mut self, configs: &[VaultConfig]) -> Result<(), VaultError> {
        self.router.set_vault_configs(configs)?;
        self.events.extend(configs.iter().map(|c| Event::VaultConfigured {
            vault: c.vault,
            target_bps: c.target_bps,
            status: c.status,
        }));
        Ok(())
    }

    pub fn set_default_vault(&mut self, vault: Address) -> Result<(), VaultError> {
        let old = self.router.set_default_vault(vault)?;
        self.events.push(Event::DefaultVaultUpdated { old, new: vault });
        Ok(())
    }

    pub fn set_settlement_shortfall(&mut self, shortfall: U256) -> Result<(), VaultError> {
        let update = self.router.set_settlement_shortfall(shortfall)?;
        self.events.push(Event::SettlementShortfallUpdated {
            old: update.old,
            new: update.new,
        });
        Ok(())
    }

    pub fn set_settlement_ratio(&mut self, ratio: U256) -> Result<(), VaultError> {
        let update = self.router.set_settlement_ratio(ratio)?;
        self.events.push(Event::SettlementRatioUpdated {
            old: update.old,
            new: update.new,
        });
        Ok(())
    }

    pub fn set_withdrawal_fee_bps(&mut self, fee_bps: u32) -> Result<(), VaultError> {
        if fee_bps > BPS_SCALE {
            return Err(VaultError::InvalidFee(fee_bps));
        }
        let old_bps = std::mem::replace(&mut self.withdrawal_fee_bps, fee_bps);
        self.events.push(Event::WithdrawalFeeUpdated {
            old_bps,
            new_bps: fee_bps,
        });
        info!(old = old_bps, new = fee_bps, "withdrawal fee updated");
        Ok(())
    }

    /// Forward an external venue condition to a vault's adapter.
    pub fn apply_market_event(&mut self, vault: Address, event: &MarketEvent) -> Result<(), VaultError> {
        Ok(self.router.apply_market_event(vault, event)?)
    }

    // ── Internals ───────────────────────────────────────────────────

    fn ensure_deposits_enabled(&self) -> Result<(), VaultError> {
        if self.router.ledger().is_disabled() {
            return Err(VaultError::SettlementRatioDisabled);
        }
        Ok(())
    }

    fn ensure_mintable(&self, shares: U256) -> Result<(), VaultError> {
        self.total_supply
            .checked_add(shares)
            .map(|_| ())
            .ok_or(VaultError::Overflow)
    }

    fn mint_shares(&mut self, to: Address, shares: U256) -> Result<(), VaultError> {
        let supply = self
            .total_supply
            .checked_add(shares)
            .ok_or(VaultError::Overflow)?;
        let balance = self.balance_of(to) + shares;
        self.total_supply = supply;
        self.balances.insert(to, balance);
        self.events.push(Event::Transfer {
            from: Address::ZERO,
            to,
            value: shares,
        });
        Ok(())
    }

    fn move_shares(&mut self, from: Address, to: Address, value: U256) -> Result<(), VaultError> {
        let from_balance = self.balance_of(from);
        if from_balance < value {
            return Err(VaultError::InsufficientShares {
                owner: from,
                balance: from_balance,
                needed: value,
            });
        }
        if from != to {
            self.balances.insert(from, from_balance - value);
            let to_balance = self.balance_of(to) + value;
            self.balances.insert(to, to_balance);
            self.prune(from);
            self.prune(to);
        }
        self.events.push(Event::Transfer { from, to, value });
        debug!(from = %from, to = %to, value = %value, "transfer");
        Ok(())
    }

    /// Unlimited allowances are never decremented.
    fn spend_allowance(&mut self, owner: Address, spender: Address, value: U256) {
        let current = self.allowance(owner, spender);
        if current != U256::MAX {
            self.allowances.insert((owner, spender), current - value);
        }
    }

    fn prune(&mut self, holder: Address) {
        if self.balances.get(&holder).is_some_and(|b| b.is_zero()) {
            self.balances.remove(&holder);
        }
    }

    fn push_settlements(&mut self, settlements: &[Settlement]) {
        self.events
            .extend(settlements.iter().map(|s| Event::RouterWithdrawSettled {
                vault: s.vault,
                gross_assets: s.gross_assets,
                net_assets: s.net_assets,
            }));
    }
}
