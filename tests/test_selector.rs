use alloy::primitives::{Address, U256};

use vault_router::engine::selector::{
    AllocationSnapshot, DepositRequest, SelectionError, VaultReading, select_deposit_targets,
    select_withdrawal_sources, withdrawal_order,
};
use vault_router::model::VaultStatus;

// ── Helpers ─────────────────────────────────────────────────────────

fn addr(n: u8) -> Address {
    Address::repeat_byte(n)
}

fn reading(index: usize, target_bps: u32, balance: u64, status: VaultStatus) -> VaultReading {
    VaultReading {
        vault: addr(index as u8 + 1),
        index,
        status,
        target_bps,
        balance: U256::from(balance),
        max_withdrawable: U256::from(balance),
    }
}

fn snapshot(readings: Vec<VaultReading>) -> AllocationSnapshot {
    AllocationSnapshot::new(readings).unwrap()
}

// ── Withdrawal ordering ─────────────────────────────────────────────

#[test]
fn test_overweight_vault_drawn_first() {
    // 10% / 90% targets, but the first vault holds 30%.
    let snap = snapshot(vec![
        reading(0, 100_000, 300, VaultStatus::Active),
        reading(1, 900_000, 700, VaultStatus::Active),
    ]);
    let order: Vec<Address> = withdrawal_order(&snap).iter().map(|v| v.vault).collect();
    assert_eq!(order, vec![addr(1), addr(2)]);

    let plan = select_withdrawal_sources(&snap, U256::from(250)).unwrap();
    assert_eq!(plan.draws.len(), 1);
    assert_eq!(plan.draws[0].vault, addr(1));
}

#[test]
fn test_on_target_split_draws_from_larger_vault() {
    let snap = snapshot(vec![
        reading(0, 100_000, 100, VaultStatus::Active),
        reading(1, 900_000, 900, VaultStatus::Active),
    ]);
    let plan = select_withdrawal_sources(&snap, U256::from(600)).unwrap();
    assert_eq!(plan.draws.len(), 1);
    assert_eq!(plan.draws[0].vault, addr(2));
    assert_eq!(plan.draws[0].amount, U256::from(600));
}

#[test]
fn test_withdrawal_spills_into_next_vault() {
    let snap = snapshot(vec![
        reading(0, 500_000, 500, VaultStatus::Active),
        reading(1, 500_000, 500, VaultStatus::Active),
    ]);
    let plan = select_withdrawal_sources(&snap, U256::from(700)).unwrap();
    // Equal deviation and balance: registration order decides.
    assert_eq!(plan.draws[0].vault, addr(1));
    assert_eq!(plan.draws[0].amount, U256::from(500));
    assert_eq!(plan.draws[1].vault, addr(2));
    assert_eq!(plan.draws[1].amount, U256::from(200));
}

#[test]
fn test_suspended_vault_is_last_resort() {
    let snap = snapshot(vec![
        reading(0, 0, 800, VaultStatus::Suspended),
        reading(1, 1_000_000, 200, VaultStatus::Active),
    ]);
    // The suspended vault is far over target but still drawn last.
    let plan = select_withdrawal_sources(&snap, U256::from(500)).unwrap();
    assert_eq!(plan.draws[0].vault, addr(2));
    assert_eq!(plan.draws[0].amount, U256::from(200));
    assert_eq!(plan.draws[1].vault, addr(1));
    assert_eq!(plan.draws[1].amount, U256::from(300));
}

#[test]
fn test_impaired_vault_never_drawn() {
    let snap = snapshot(vec![
        reading(0, 500_000, 900, VaultStatus::Impaired),
        reading(1, 500_000, 100, VaultStatus::Active),
    ]);
    assert_eq!(withdrawal_order(&snap).len(), 1);
    let err = select_withdrawal_sources(&snap, U256::from(150)).unwrap_err();
    assert_eq!(
        err,
        SelectionError::InsufficientLiquidity {
            requested: U256::from(150),
            available: U256::from(100),
        }
    );
}

#[test]
fn test_liquidity_cap_limits_draw() {
    let mut capped = reading(0, 500_000, 600, VaultStatus::Active);
    capped.max_withdrawable = U256::from(50);
    let snap = snapshot(vec![capped, reading(1, 500_000, 400, VaultStatus::Active)]);
    let plan = select_withdrawal_sources(&snap, U256::from(300)).unwrap();
    assert_eq!(plan.draws[0].vault, addr(1));
    assert_eq!(plan.draws[0].amount, U256::from(50));
    assert_eq!(plan.draws[1].vault, addr(2));
    assert_eq!(plan.draws[1].amount, U256::from(250));
}

#[test]
fn test_selection_is_deterministic() {
    let readings = vec![
        reading(0, 300_000, 250, VaultStatus::Active),
        reading(1, 300_000, 250, VaultStatus::Active),
        reading(2, 400_000, 500, VaultStatus::Suspended),
    ];
    let first = select_withdrawal_sources(&snapshot(readings.clone()), U256::from(900)).unwrap();
    for _ in 0..10 {
        let again = select_withdrawal_sources(&snapshot(readings.clone()), U256::from(900)).unwrap();
        assert_eq!(first, again);
    }
}

// ── Deposit targets ─────────────────────────────────────────────────

#[test]
fn test_auto_deposit_needs_default_vault() {
    let snap = snapshot(vec![reading(0, 1_000_000, 0, VaultStatus::Active)]);
    let err = select_deposit_targets(&snap, None, &DepositRequest::Auto(U256::from(10))).unwrap_err();
    assert_eq!(err, SelectionError::NoDefaultVault);

    let plan = select_deposit_targets(&snap, Some(addr(1)), &DepositRequest::Auto(U256::from(10))).unwrap();
    assert_eq!(plan.total, U256::from(10));
}

#[test]
fn test_solver_legs_must_target_active_vaults() {
    let snap = snapshot(vec![
        reading(0, 500_000, 0, VaultStatus::Active),
        reading(1, 500_000, 0, VaultStatus::Suspended),
    ]);
    let request = DepositRequest::Solver(vec![(addr(1), U256::from(5)), (addr(2), U256::from(5))]);
    assert!(matches!(
        select_deposit_targets(&snap, None, &request),
        Err(SelectionError::VaultNotActive { .. })
    ));

    let unknown = DepositRequest::Solver(vec![(addr(9), U256::from(5))]);
    assert_eq!(
        select_deposit_targets(&snap, None, &unknown).unwrap_err(),
        SelectionError::UnknownVault(addr(9))
    );
}
