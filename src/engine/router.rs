use std::fmt;

use alloy::primitives::{Address, U256};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::amount::{Rounding, mul_div};
use crate::model::vault::{AdapterId, VaultConfig};

use super::adapter::{AdapterError, MarketEvent, VaultAdapter};
use super::ledger::{LedgerError, LedgerUpdate, ShortfallLedger};
use super::registry::{RegistryError, VaultRegistry};
use super::selector::{
    AllocationSnapshot, DepositPlan, DepositRequest, SelectionError, WithdrawalPlan,
    select_deposit_targets, select_withdrawal_sources,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("adapter for vault {vault} failed: {source}")]
    Adapter {
        vault: Address,
        #[source]
        source: AdapterError,
    },

    #[error("SettlementUnderfilled: requested {requested}, vaults returned {returned}")]
    SettlementUnderfilled { requested: U256, returned: U256 },

    #[error("DepositUnderfilled: vault {vault} accepted {accepted} of {requested}")]
    DepositUnderfilled {
        vault: Address,
        requested: U256,
        accepted: U256,
    },

    #[error("DepositRejected: vault {vault} would not accept {assets}")]
    DepositRejected { vault: Address, assets: U256 },

    #[error("MathOverflow: settlement split overflowed")]
    MathOverflow,
}

impl RouterError {
    fn adapter(vault: Address) -> impl FnOnce(AdapterError) -> RouterError {
        move |source| RouterError::Adapter { vault, source }
    }
}

/// Progress of one routed deposit or withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementPhase {
    Quoting,
    Selecting,
    Settling,
    Settled,
    Failed,
}

impl fmt::Display for SettlementPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SettlementPhase::Quoting => "quoting",
            SettlementPhase::Selecting => "selecting",
            SettlementPhase::Settling => "settling",
            SettlementPhase::Settled => "settled",
            SettlementPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One vault's contribution to a routed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub vault: Address,
    /// Pre-fee value attributed to this vault. Equals the amount moved for
    /// deposits.
    pub gross_assets: U256,
    /// Amount the vault actually moved.
    pub net_assets: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositReceipt {
    pub total: U256,
    pub settlements: Vec<Settlement>,
}

/// Adapter copies taken before each vault is touched.
#[derive(Default)]
struct Journal {
    saved: Vec<(Address, Box<dyn VaultAdapter>)>,
}

impl Journal {
    fn record(&mut self, registry: &VaultRegistry, vault: Address) {
        if self.saved.iter().any(|(v, _)| *v == vault) {
            return;
        }
        if let Some(adapter) = registry.adapter(vault) {
            self.saved.push((vault, adapter.snapshot()));
        }
    }

    fn rollback(self, registry: &mut VaultRegistry) {
        for (vault, adapter) in self.saved.into_iter().rev() {
            registry.restore_adapter(vault, adapter);
        }
    }
}

/// Moves base assets between the token and its strategy vaults.
///
/// Owns the vault registry and the shortfall ledger. Every routed call is
/// all-or-nothing: adapters touched by a failed call are restored from the
/// journal before the error is returned.
#[derive(Default)]
pub struct Router {
    registry: VaultRegistry,
    ledger: ShortfallLedger,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ledger(ledger: ShortfallLedger) -> Self {
        Router {
            registry: VaultRegistry::new(),
            ledger,
        }
    }

    pub fn registry(&self) -> &VaultRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &ShortfallLedger {
        &self.ledger
    }

    // ── Configuration ───────────────────────────────────────────────

    pub fn register_adapter(
        &mut self,
        id: impl Into<AdapterId>,
        adapter: Box<dyn VaultAdapter>,
    ) -> Result<(), RouterError> {
        Ok(self.registry.register_adapter(id.into(), adapter)?)
    }

    pub fn set_vault_configs(&mut self, configs: &[VaultConfig]) -> Result<(), RouterError> {
        Ok(self.registry.set_vault_configs(configs)?)
    }

    /// Returns the previous default vault.
    pub fn set_default_vault(&mut self, vault: Address) -> Result<Option<Address>, RouterError> {
        Ok(self.registry.set_default_vault(vault)?)
    }

    pub fn restore_default_vault(&mut self, vault: Address) -> Result<(), RouterError> {
        Ok(self.registry.restore_default_vault(vault)?)
    }

    pub fn set_settlement_shortfall(&mut self, shortfall: U256) -> Result<LedgerUpdate, RouterError> {
        let gross = self.total_managed_assets()?;
        let update = self.ledger.set_shortfall(shortfall, gross)?;
        info!(old = %update.old, new = %update.new, gross = %gross, "settlement shortfall updated");
        Ok(update)
    }

    pub fn set_settlement_ratio(&mut self, ratio: U256) -> Result<LedgerUpdate, RouterError> {
        let update = self.ledger.set_settlement_ratio(ratio)?;
        info!(old = %update.old, new = %update.new, "settlement ratio updated");
        Ok(update)
    }

    // ── Views ───────────────────────────────────────────────────────

    /// Gross assets across every configured vault, regardless of status.
    pub fn total_managed_assets(&self) -> Result<U256, RouterError> {
        Ok(self.registry.gross_total_assets()?)
    }

    pub fn current_shortfall(&self) -> U256 {
        self.ledger.shortfall()
    }

    pub fn settlement_ratio(&self) -> U256 {
        self.ledger.settlement_ratio()
    }

    pub fn net_total_assets(&self) -> Result<U256, RouterError> {
        let gross = self.total_managed_assets()?;
        Ok(self.ledger.net_total_assets(gross)?)
    }

    pub fn snapshot(&self) -> Result<AllocationSnapshot, RouterError> {
        Ok(AllocationSnapshot::new(self.registry.readings())?)
    }

    // ── Deposits ────────────────────────────────────────────────────

    /// Plan a deposit and confirm every target vault would accept its leg.
    pub fn quote_deposit(&self, request: &DepositRequest) -> Result<DepositPlan, RouterError> {
        debug!(phase = %SettlementPhase::Quoting, "deposit");
        let snapshot = self.snapshot()?;
        debug!(phase = %SettlementPhase::Selecting, "deposit");
        let plan = select_deposit_targets(&snapshot, self.registry.default_vault(), request)?;

        for target in &plan.targets {
            let adapter = self
                .registry
                .adapter(target.vault)
                .ok_or(SelectionError::UnknownVault(target.vault))?;
            let minted = adapter
                .preview_deposit(target.amount)
                .map_err(RouterError::adapter(target.vault))?;
            if minted.is_zero() {
                return Err(RouterError::DepositRejected {
                    vault: target.vault,
                    assets: target.amount,
                });
            }
        }
        Ok(plan)
    }

    pub fn deposit(&mut self, request: &DepositRequest) -> Result<DepositReceipt, RouterError> {
        let plan = self.quote_deposit(request)?;
        debug!(phase = %SettlementPhase::Settling, legs = plan.targets.len(), "deposit");

        let mut journal = Journal::default();
        match self.execute_deposit(&plan, &mut journal) {
            Ok(settlements) => {
                info!(
                    phase = %SettlementPhase::Settled,
                    total = %plan.total,
                    legs = settlements.len(),
                    "deposit routed"
                );
                Ok(DepositReceipt {
                    total: plan.total,
                    settlements,
                })
            }
            Err(err) => {
                journal.rollback(&mut self.registry);
                warn!(phase = %SettlementPhase::Failed, error = %err, "deposit rolled back");
                Err(err)
            }
        }
    }

    /// Route the whole amount to the default deposit vault.
    pub fn deposit_auto(&mut self, assets: U256) -> Result<DepositReceipt, RouterError> {
        self.deposit(&DepositRequest::Auto(assets))
    }

    pub fn deposit_solver(&mut self, legs: Vec<(Address, U256)>) -> Result<DepositReceipt, RouterError> {
        self.deposit(&DepositRequest::Solver(legs))
    }

    fn execute_deposit(
        &mut self,
        plan: &DepositPlan,
        journal: &mut Journal,
    ) -> Result<Vec<Settlement>, RouterError> {
        let mut settlements = Vec::with_capacity(plan.targets.len());
        for target in &plan.targets {
            journal.record(&self.registry, target.vault);
            let adapter = self
                .registry
                .adapter_mut(target.vault)
                .ok_or(SelectionError::UnknownVault(target.vault))?;
            let accepted = adapter
                .deposit_assets(target.amount)
                .map_err(RouterError::adapter(target.vault))?;
            if accepted < target.amount {
                return Err(RouterError::DepositUnderfilled {
                    vault: target.vault,
                    requested: target.amount,
                    accepted,
                });
            }
            debug!(vault = %target.vault, assets = %accepted, "vault deposit");
            settlements.push(Settlement {
                vault: target.vault,
                gross_assets: target.amount,
                net_assets: accepted,
            });
        }
        Ok(settlements)
    }

    // ── Withdrawals ─────────────────────────────────────────────────

    /// Side-effect free withdrawal plan against live adapter state.
    pub fn quote_withdrawal(&self, requested: U256) -> Result<WithdrawalPlan, RouterError> {
        debug!(phase = %SettlementPhase::Quoting, requested = %requested, "withdrawal");
        let snapshot = self.snapshot()?;
        debug!(phase = %SettlementPhase::Selecting, "withdrawal");
        Ok(select_withdrawal_sources(&snapshot, requested)?)
    }

    /// Pull `net` base assets out of the vaults for a withdrawal whose
    /// pre-fee value is `gross`.
    ///
    /// Only `net` leaves the vaults; the fee stays behind. Each settlement
    /// carries its vault's pro-rata part of `gross` (the last draw takes the
    /// remainder) and the amount that vault returned. Returns one settlement
    /// per vault drawn, in draw order.
    pub fn settle_withdrawal(&mut self, gross: U256, net: U256) -> Result<Vec<Settlement>, RouterError> {
        let plan = self.quote_withdrawal(net)?;
        debug!(phase = %SettlementPhase::Settling, draws = plan.draws.len(), "withdrawal");

        let mut journal = Journal::default();
        match self.execute_withdrawal(&plan, gross.max(net), &mut journal) {
            Ok(settlements) => {
                info!(
                    phase = %SettlementPhase::Settled,
                    gross = %gross,
                    net = %net,
                    vaults = settlements.len(),
                    "withdrawal settled"
                );
                Ok(settlements)
            }
            Err(err) => {
                journal.rollback(&mut self.registry);
                warn!(phase = %SettlementPhase::Failed, error = %err, "withdrawal rolled back");
                Err(err)
            }
        }
    }

    fn execute_withdrawal(
        &mut self,
        plan: &WithdrawalPlan,
        gross: U256,
        journal: &mut Journal,
    ) -> Result<Vec<Settlement>, RouterError> {
        let mut settlements = Vec::with_capacity(plan.draws.len());
        let mut returned = U256::ZERO;
        let mut gross_left = gross;
        for (i, draw) in plan.draws.iter().enumerate() {
            let gross_part = if i + 1 == plan.draws.len() {
                gross_left
            } else {
                mul_div(draw.amount, gross, plan.requested, Rounding::Down)
                    .ok_or(RouterError::MathOverflow)?
                    .min(gross_left)
            };
            gross_left -= gross_part;

            journal.record(&self.registry, draw.vault);
            let adapter = self
                .registry
                .adapter_mut(draw.vault)
                .ok_or(SelectionError::UnknownVault(draw.vault))?;
            let got = adapter
                .withdraw_assets(draw.amount)
                .map_err(RouterError::adapter(draw.vault))?;
            debug!(vault = %draw.vault, requested = %draw.amount, returned = %got, "vault draw");
            returned = returned.saturating_add(got);
            settlements.push(Settlement {
                vault: draw.vault,
                gross_assets: gross_part,
                net_assets: got,
            });
        }

        if returned < plan.requested {
            return Err(RouterError::SettlementUnderfilled {
                requested: plan.requested,
                returned,
            });
        }
        Ok(settlements)
    }

    // ── Venue conditions ────────────────────────────────────────────

    pub fn apply_market_event(&mut self, vault: Address, event: &MarketEvent) -> Result<(), RouterError> {
        let adapter = self
            .registry
            .adapter_mut(vault)
            .ok_or(RegistryError::UnknownVault(vault))?;
        adapter
            .apply_market_event(event)
            .map_err(RouterError::adapter(vault))?;
        debug!(vault = %vault, event = ?event, "market event applied");
        Ok(())
    }
}
