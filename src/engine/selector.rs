//! Vault selection for deposits and withdrawals.
//!
//! Everything here is a pure function of an [`AllocationSnapshot`], which the
//! router rebuilds from live adapter state on every call.

use std::cmp::Ordering;
use std::collections::HashSet;

use alloy::primitives::{Address, U256};
use thiserror::Error;

use crate::model::amount::{BPS_SCALE, Rounding, mul_div};
use crate::model::vault::VaultStatus;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("InsufficientLiquidity: {requested} requested, {available} withdrawable")]
    InsufficientLiquidity { requested: U256, available: U256 },

    #[error("vault {0} is not configured")]
    UnknownVault(Address),

    #[error("vault {vault} is {status}, deposits require an active vault")]
    VaultNotActive { vault: Address, status: VaultStatus },

    #[error("no default deposit vault configured")]
    NoDefaultVault,

    #[error("vault {0} appears more than once in the deposit")]
    DuplicateVault(Address),

    #[error("deposit amount is zero")]
    ZeroAmount,

    #[error("allocation arithmetic overflowed")]
    Overflow,
}

/// Raw per-vault readings taken from the registry and adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultReading {
    pub vault: Address,
    /// Registration order; final withdrawal tie-break.
    pub index: usize,
    pub status: VaultStatus,
    pub target_bps: u32,
    pub balance: U256,
    pub max_withdrawable: U256,
}

/// One vault's position relative to its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultSnapshot {
    pub vault: Address,
    pub index: usize,
    pub status: VaultStatus,
    pub target_bps: u32,
    pub balance: U256,
    pub max_withdrawable: U256,
    /// `balance * 1_000_000 / total_assets`, rounded down.
    pub current_bps: u32,
    /// `current_bps - target_bps`.
    pub deviation_bps: i64,
}

/// Allocation state across every configured vault at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationSnapshot {
    pub total_assets: U256,
    pub vaults: Vec<VaultSnapshot>,
}

impl AllocationSnapshot {
    pub fn new(readings: Vec<VaultReading>) -> Result<Self, SelectionError> {
        let total_assets = readings.iter().try_fold(U256::ZERO, |acc, r| {
            acc.checked_add(r.balance).ok_or(SelectionError::Overflow)
        })?;

        let scale = U256::from(BPS_SCALE);
        let mut vaults = Vec::with_capacity(readings.len());
        for r in readings {
            let current_bps = if total_assets.is_zero() {
                0
            } else {
                mul_div(r.balance, scale, total_assets, Rounding::Down)
                    .ok_or(SelectionError::Overflow)?
                    .saturating_to::<u32>()
            };
            vaults.push(VaultSnapshot {
                vault: r.vault,
                index: r.index,
                status: r.status,
                target_bps: r.target_bps,
                balance: r.balance,
                max_withdrawable: r.max_withdrawable,
                current_bps,
                deviation_bps: i64::from(current_bps) - i64::from(r.target_bps),
            });
        }

        Ok(AllocationSnapshot {
            total_assets,
            vaults,
        })
    }

    pub fn get(&self, vault: Address) -> Option<&VaultSnapshot> {
        self.vaults.iter().find(|v| v.vault == vault)
    }

    /// Largest absolute deviation from target across all vaults.
    pub fn max_drift_bps(&self) -> u64 {
        self.vaults
            .iter()
            .map(|v| v.deviation_bps.unsigned_abs())
            .max()
            .unwrap_or(0)
    }
}

/// A single vault movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Draw {
    pub vault: Address,
    pub amount: U256,
}

/// Ordered vault draws satisfying one withdrawal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalPlan {
    pub requested: U256,
    pub draws: Vec<Draw>,
}

/// Per-vault deposit amounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositPlan {
    pub total: U256,
    pub targets: Vec<Draw>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepositRequest {
    /// Route the full amount to the default deposit vault.
    Auto(U256),
    /// Caller-specified per-vault amounts.
    Solver(Vec<(Address, U256)>),
}

/// Withdrawal priority: most over-target first, then larger balance, then
/// earlier registration. No two distinct vaults compare equal.
fn withdrawal_priority(a: &VaultSnapshot, b: &VaultSnapshot) -> Ordering {
    b.deviation_bps
        .cmp(&a.deviation_bps)
        .then_with(|| b.balance.cmp(&a.balance))
        .then_with(|| a.index.cmp(&b.index))
}

/// Candidate vaults in draw order: active vaults by priority, followed by
/// suspended vaults by priority as a last resort. Impaired vaults never appear.
pub fn withdrawal_order(snapshot: &AllocationSnapshot) -> Vec<&VaultSnapshot> {
    let mut active: Vec<&VaultSnapshot> = snapshot
        .vaults
        .iter()
        .filter(|v| v.status == VaultStatus::Active)
        .collect();
    active.sort_by(|a, b| withdrawal_priority(a, b));

    let mut suspended: Vec<&VaultSnapshot> = snapshot
        .vaults
        .iter()
        .filter(|v| v.status == VaultStatus::Suspended)
        .collect();
    suspended.sort_by(|a, b| withdrawal_priority(a, b));

    active.extend(suspended);
    active
}

/// Plan the vault draws for a withdrawal of `requested` assets.
pub fn select_withdrawal_sources(
    snapshot: &AllocationSnapshot,
    requested: U256,
) -> Result<WithdrawalPlan, SelectionError> {
    let mut remaining = requested;
    let mut draws = Vec::new();

    for candidate in withdrawal_order(snapshot) {
        if remaining.is_zero() {
            break;
        }
        let amount = remaining.min(candidate.max_withdrawable);
        if amount.is_zero() {
            continue;
        }
        draws.push(Draw {
            vault: candidate.vault,
            amount,
        });
        remaining -= amount;
    }

    if !remaining.is_zero() {
        return Err(SelectionError::InsufficientLiquidity {
            requested,
            available: requested - remaining,
        });
    }

    Ok(WithdrawalPlan { requested, draws })
}

/// Resolve where a deposit goes. Every target must be a configured, active vault.
pub fn select_deposit_targets(
    snapshot: &AllocationSnapshot,
    default_vault: Option<Address>,
    request: &DepositRequest,
) -> Result<DepositPlan, SelectionError> {
    let targets: Vec<Draw> = match request {
        DepositRequest::Auto(amount) => {
            let vault = default_vault.ok_or(SelectionError::NoDefaultVault)?;
            vec![Draw {
                vault,
                amount: *amount,
            }]
        }
        DepositRequest::Solver(legs) => {
            let mut seen = HashSet::new();
            for (vault, _) in legs {
                if !seen.insert(*vault) {
                    return Err(SelectionError::DuplicateVault(*vault));
                }
            }
            legs.iter()
                .map(|(vault, amount)| Draw {
                    vault: *vault,
                    amount: *amount,
                })
                .collect()
        }
    };

    if targets.is_empty() {
        return Err(SelectionError::ZeroAmount);
    }

    let mut total = U256::ZERO;
    for target in &targets {
        if target.amount.is_zero() {
            return Err(SelectionError::ZeroAmount);
        }
        let entry = snapshot
            .get(target.vault)
            .ok_or(SelectionError::UnknownVault(target.vault))?;
        if !entry.status.accepts_deposits() {
            return Err(SelectionError::VaultNotActive {
                vault: target.vault,
                status: entry.status,
            });
        }
        total = total
            .checked_add(target.amount)
            .ok_or(SelectionError::Overflow)?;
    }

    Ok(DepositPlan { total, targets })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::repeat_byte(n)
    }

    fn reading(n: u8, target_bps: u32, balance: u64, status: VaultStatus) -> VaultReading {
        VaultReading {
            vault: addr(n),
            index: n as usize,
            status,
            target_bps,
            balance: U256::from(balance),
            max_withdrawable: U256::from(balance),
        }
    }

    #[test]
    fn test_deviation_signs() {
        let snap = AllocationSnapshot::new(vec![
            reading(1, 500_000, 700, VaultStatus::Active),
            reading(2, 500_000, 300, VaultStatus::Active),
        ])
        .unwrap();
        assert_eq!(snap.vaults[0].current_bps, 700_000);
        assert_eq!(snap.vaults[0].deviation_bps, 200_000);
        assert_eq!(snap.vaults[1].deviation_bps, -200_000);
        assert_eq!(snap.max_drift_bps(), 200_000);
    }

    #[test]
    fn test_empty_snapshot_has_zero_bps() {
        let snap = AllocationSnapshot::new(vec![reading(1, 1_000_000, 0, VaultStatus::Active)]).unwrap();
        assert_eq!(snap.total_assets, U256::ZERO);
        assert_eq!(snap.vaults[0].current_bps, 0);
        assert_eq!(snap.vaults[0].deviation_bps, -1_000_000);
        assert_eq!(snap.max_drift_bps(), 1_000_000);
    }

    #[test]
    fn test_ties_break_on_balance_then_index() {
        // Equal deviation (both on target), different balances.
        let snap = AllocationSnapshot::new(vec![
            reading(1, 250_000, 250, VaultStatus::Active),
            reading(2, 750_000, 750, VaultStatus::Active),
        ])
        .unwrap();
        let order: Vec<Address> = withdrawal_order(&snap).iter().map(|v| v.vault).collect();
        assert_eq!(order, vec![addr(2), addr(1)]);

        // Fully equal except registration index.
        let snap = AllocationSnapshot::new(vec![
            reading(3, 500_000, 500, VaultStatus::Active),
            reading(1, 500_000, 500, VaultStatus::Active),
        ])
        .unwrap();
        let order: Vec<Address> = withdrawal_order(&snap).iter().map(|v| v.vault).collect();
        assert_eq!(order, vec![addr(1), addr(3)]);
    }

    #[test]
    fn test_zero_request_is_empty_plan() {
        let snap = AllocationSnapshot::new(vec![reading(1, 0, 10, VaultStatus::Active)]).unwrap();
        let plan = select_withdrawal_sources(&snap, U256::ZERO).unwrap();
        assert!(plan.draws.is_empty());
    }

    #[test]
    fn test_solver_rejects_duplicates_and_zero() {
        let snap = AllocationSnapshot::new(vec![reading(1, 0, 10, VaultStatus::Active)]).unwrap();
        let dup = DepositRequest::Solver(vec![(addr(1), U256::from(1u64)), (addr(1), U256::from(2u64))]);
        assert_eq!(
            select_deposit_targets(&snap, None, &dup),
            Err(SelectionError::DuplicateVault(addr(1)))
        );
        let zero = DepositRequest::Solver(vec![(addr(1), U256::ZERO)]);
        assert_eq!(select_deposit_targets(&snap, None, &zero), Err(SelectionError::ZeroAmount));
        let empty = DepositRequest::Solver(vec![]);
        assert_eq!(select_deposit_targets(&snap, None, &empty), Err(SelectionError::ZeroAmount));
    }
}
