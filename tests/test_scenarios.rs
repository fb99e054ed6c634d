use alloy::primitives::{Address, U256};

use vault_router::engine::adapter::MarketEvent;
use vault_router::engine::events::Event;
use vault_router::engine::ledger::LedgerError;
use vault_router::engine::router::{Router, RouterError};
use vault_router::engine::token::{ShareToken, VaultError};
use vault_router::example::example_scenario;
use vault_router::model::{Scenario, VaultConfig, VaultStatus, WAD};
use vault_router::sim::{Erc4626Sim, IdleBuffer};
use vault_router::simulate::report::StepOutcome;
use vault_router::simulate::{invariants, run_scenario};

// ── Helpers ─────────────────────────────────────────────────────────

const ALICE: Address = Address::repeat_byte(0x0a);
const BOB: Address = Address::repeat_byte(0x0b);

fn vault(n: u8) -> Address {
    Address::repeat_byte(n)
}

fn units(n: u64) -> U256 {
    U256::from(n) * WAD
}

/// Fraction of one unit, e.g. `frac(792, 10)` = 79.2 units.
fn frac(numerator: u64, denominator: u64) -> U256 {
    U256::from(numerator) * WAD / U256::from(denominator)
}

/// One idle buffer taking every deposit.
fn single_vault_token() -> ShareToken {
    let mut router = Router::new();
    router.register_adapter("buffer", Box::new(IdleBuffer::new(vault(1)))).unwrap();
    let mut token = ShareToken::new(router, 18);
    token
        .set_vault_configs(&[VaultConfig::new(vault(1), "buffer", 1_000_000, VaultStatus::Active)])
        .unwrap();
    token.set_default_vault(vault(1)).unwrap();
    token.drain_events();
    token
}

/// A 10% core vault and a 90% reserve vault.
fn split_token() -> ShareToken {
    let mut router = Router::new();
    router.register_adapter("core", Box::new(Erc4626Sim::new(vault(1)))).unwrap();
    router
        .register_adapter("reserve", Box::new(Erc4626Sim::new(vault(2)).with_decimals_offset(6)))
        .unwrap();
    let mut token = ShareToken::new(router, 18);
    token
        .set_vault_configs(&[
            VaultConfig::new(vault(1), "core", 100_000, VaultStatus::Active),
            VaultConfig::new(vault(2), "reserve", 900_000, VaultStatus::Active),
        ])
        .unwrap();
    token.set_default_vault(vault(1)).unwrap();
    token.drain_events();
    token
}

fn vault_balance(token: &ShareToken, v: Address) -> U256 {
    token.router().registry().adapter(v).unwrap().balance()
}

fn assert_clean(token: &ShareToken) {
    let violations = invariants::check(token);
    assert!(violations.is_empty(), "invariant violations: {violations:?}");
}

// ── Routing ─────────────────────────────────────────────────────────

#[test]
fn test_withdrawal_draws_from_largest_vault_only() {
    let mut token = split_token();
    token
        .solver_deposit_assets(ALICE, &[vault(1), vault(2)], &[units(100), units(900)], U256::ZERO, ALICE)
        .unwrap();
    token.withdraw(ALICE, units(600), ALICE, ALICE).unwrap();

    assert_eq!(vault_balance(&token, vault(1)), units(100));
    assert_eq!(vault_balance(&token, vault(2)), units(300));
    assert_eq!(token.total_assets().unwrap(), units(400));
    assert_clean(&token);
}

#[test]
fn test_withdraw_events_in_settlement_order() {
    let mut token = split_token();
    token
        .solver_deposit_assets(ALICE, &[vault(1), vault(2)], &[units(100), units(900)], U256::ZERO, ALICE)
        .unwrap();
    token.drain_events();

    let burned = token.withdraw(ALICE, units(600), ALICE, ALICE).unwrap();
    let events = token.drain_events();
    assert_eq!(events.len(), 3);
    assert_eq!(
        events[0],
        Event::Transfer {
            from: ALICE,
            to: Address::ZERO,
            value: burned,
        }
    );
    assert_eq!(
        events[1],
        Event::RouterWithdrawSettled {
            vault: vault(2),
            gross_assets: units(600),
            net_assets: units(600),
        }
    );
    assert!(matches!(events[2], Event::Withdraw { assets, .. } if assets == units(600)));
}

// ── Shortfall and settlement ratio ──────────────────────────────────

#[test]
fn test_shortfall_reduces_total_assets() {
    let mut token = single_vault_token();
    token.deposit(ALICE, units(100), ALICE).unwrap();
    token.set_settlement_shortfall(units(20)).unwrap();

    assert_eq!(token.total_assets().unwrap(), units(80));
    assert_eq!(token.max_withdraw(ALICE).unwrap(), units(80));

    // 1% fee on the haircut value.
    token.set_withdrawal_fee_bps(10_000).unwrap();
    assert_eq!(token.max_withdraw(ALICE).unwrap(), frac(792, 10));
    assert_clean(&token);
}

#[test]
fn test_ratio_applies_after_shortfall() {
    let mut token = single_vault_token();
    token.deposit(ALICE, units(100), ALICE).unwrap();
    token.set_settlement_shortfall(units(60)).unwrap();
    token.set_settlement_ratio(frac(8, 10)).unwrap();

    assert_eq!(token.total_assets().unwrap(), units(32));
    assert_eq!(token.max_withdraw(ALICE).unwrap(), units(32));
    assert_clean(&token);
}

#[test]
fn test_shortfall_above_gross_reverts_unchanged() {
    let mut token = single_vault_token();
    token.deposit(ALICE, units(100), ALICE).unwrap();
    token.set_settlement_shortfall(units(10)).unwrap();
    token.drain_events();

    let err = token.set_settlement_shortfall(units(101)).unwrap_err();
    assert_eq!(
        err,
        VaultError::Router(RouterError::Ledger(LedgerError::SettlementShortfallTooHigh {
            requested: units(101),
            gross: units(100),
        }))
    );
    assert_eq!(token.router().current_shortfall(), units(10));
    assert_eq!(token.total_assets().unwrap(), units(90));
    assert!(token.events().is_empty());

    // Exactly the gross amount is allowed.
    token.set_settlement_shortfall(units(100)).unwrap();
    assert_eq!(token.total_assets().unwrap(), U256::ZERO);
}

#[test]
fn test_ratio_above_one_is_rejected() {
    let mut token = single_vault_token();
    let err = token.set_settlement_ratio(WAD + U256::from(1)).unwrap_err();
    assert!(matches!(
        err,
        VaultError::Router(RouterError::Ledger(LedgerError::InvalidSettlementRatio(_)))
    ));
    assert_eq!(token.router().settlement_ratio(), WAD);
}

#[test]
fn test_zero_ratio_halts_deposits() {
    let mut token = single_vault_token();
    token.deposit(ALICE, units(100), ALICE).unwrap();
    token.set_settlement_ratio(U256::ZERO).unwrap();

    assert_eq!(token.max_deposit(BOB), U256::ZERO);
    assert_eq!(
        token.deposit(BOB, units(10), BOB).unwrap_err(),
        VaultError::SettlementRatioDisabled
    );
    assert_eq!(
        token.mint(BOB, units(10), BOB).unwrap_err(),
        VaultError::SettlementRatioDisabled
    );
    assert_eq!(
        token
            .solver_deposit_assets(BOB, &[vault(1)], &[units(10)], U256::ZERO, BOB)
            .unwrap_err(),
        VaultError::SettlementRatioDisabled
    );

    token.set_settlement_ratio(WAD).unwrap();
    token.deposit(BOB, units(10), BOB).unwrap();
    assert_clean(&token);
}

#[test]
fn test_recovery_accrues_to_remaining_holders() {
    let mut token = single_vault_token();
    token.deposit(ALICE, units(100), ALICE).unwrap();
    token.deposit(BOB, units(100), BOB).unwrap();
    token.set_settlement_shortfall(units(50)).unwrap();

    // Both holders bear the shortfall pro rata.
    let alice_shares = token.balance_of(ALICE);
    let paid = token.redeem(ALICE, alice_shares, ALICE, ALICE).unwrap();
    assert_eq!(paid, units(75));
    assert_eq!(token.max_withdraw(BOB).unwrap(), units(75));

    token.set_settlement_shortfall(U256::ZERO).unwrap();
    assert_eq!(token.max_withdraw(BOB).unwrap(), units(125));
    assert_clean(&token);
}

#[test]
fn test_recovery_is_pro_rata_for_late_entrants() {
    let mut token = single_vault_token();
    token.deposit(ALICE, units(100), ALICE).unwrap();
    token.set_settlement_shortfall(units(50)).unwrap();
    // Bob enters at the haircut price.
    token.deposit(BOB, units(50), BOB).unwrap();

    let bob_shares = token.balance_of(BOB);
    let supply = token.total_supply();
    let before = token.max_withdraw(BOB).unwrap();
    token.set_settlement_shortfall(U256::ZERO).unwrap();
    let gain = token.max_withdraw(BOB).unwrap() - before;

    let expected = units(50) * bob_shares / supply;
    let diff = if gain > expected { gain - expected } else { expected - gain };
    assert!(diff <= U256::from(1u64), "gain {gain}, expected {expected}");
    assert_clean(&token);
}

#[test]
fn test_settlement_event_reports_pre_fee_value() {
    let mut token = single_vault_token();
    token.deposit(ALICE, units(100), ALICE).unwrap();
    token.deposit(BOB, units(100), BOB).unwrap();
    token.set_withdrawal_fee_bps(100_000).unwrap();
    token.drain_events();

    let alice_shares = token.balance_of(ALICE);
    let paid = token.redeem(ALICE, alice_shares, ALICE, ALICE).unwrap();
    assert_eq!(paid, units(90));

    let events = token.drain_events();
    assert_eq!(
        events[1],
        Event::RouterWithdrawSettled {
            vault: vault(1),
            gross_assets: units(100),
            net_assets: units(90),
        }
    );
    assert_eq!(vault_balance(&token, vault(1)), units(110));
}

#[test]
fn test_withdrawal_fee_stays_with_remaining_holders() {
    let mut token = single_vault_token();
    token.deposit(ALICE, units(100), ALICE).unwrap();
    token.deposit(BOB, units(100), BOB).unwrap();
    token.set_withdrawal_fee_bps(100_000).unwrap();

    let alice_shares = token.balance_of(ALICE);
    let paid = token.redeem(ALICE, alice_shares, ALICE, ALICE).unwrap();
    assert_eq!(paid, units(90));
    assert_eq!(token.total_assets().unwrap(), units(110));
    assert_eq!(token.max_withdraw(BOB).unwrap(), units(99));
    assert_clean(&token);
}

#[test]
fn test_fee_above_scale_is_rejected() {
    let mut token = single_vault_token();
    assert_eq!(
        token.set_withdrawal_fee_bps(1_000_001).unwrap_err(),
        VaultError::InvalidFee(1_000_001)
    );
    token.set_withdrawal_fee_bps(1_000_000).unwrap();
}

// ── Failure handling ────────────────────────────────────────────────

#[test]
fn test_failed_withdrawal_restores_shares_and_emits_nothing() {
    let mut token = single_vault_token();
    token.deposit(ALICE, units(100), ALICE).unwrap();
    token.apply_market_event(vault(1), &MarketEvent::FailNext).unwrap();
    token.drain_events();

    let err = token.withdraw(ALICE, units(40), ALICE, ALICE).unwrap_err();
    assert!(matches!(err, VaultError::Router(RouterError::Adapter { .. })));
    assert_eq!(token.balance_of(ALICE), units(100));
    assert_eq!(token.total_supply(), units(100));
    assert_eq!(token.total_assets().unwrap(), units(100));
    assert!(token.events().is_empty());

    token.withdraw(ALICE, units(40), ALICE, ALICE).unwrap();
    assert_eq!(token.balance_of(ALICE), units(60));
}

#[test]
fn test_allowance_spent_and_restored() {
    let mut token = single_vault_token();
    token.deposit(ALICE, units(100), ALICE).unwrap();
    token.approve(ALICE, BOB, units(30));

    let err = token.redeem(BOB, units(40), BOB, ALICE).unwrap_err();
    assert!(matches!(err, VaultError::InsufficientAllowance { .. }));

    token.apply_market_event(vault(1), &MarketEvent::FailNext).unwrap();
    token.redeem(BOB, units(20), BOB, ALICE).unwrap_err();
    assert_eq!(token.allowance(ALICE, BOB), units(30));

    token.redeem(BOB, units(20), BOB, ALICE).unwrap();
    assert_eq!(token.allowance(ALICE, BOB), units(10));
    assert_eq!(token.balance_of(ALICE), units(80));

    token.approve(ALICE, BOB, U256::MAX);
    token.transfer_from(BOB, ALICE, BOB, units(5)).unwrap();
    assert_eq!(token.allowance(ALICE, BOB), U256::MAX);
    assert_eq!(token.balance_of(BOB), units(5));
}

#[test]
fn test_impaired_vault_is_skipped_on_withdrawal() {
    let mut token = split_token();
    token
        .solver_deposit_assets(ALICE, &[vault(1), vault(2)], &[units(100), units(900)], U256::ZERO, ALICE)
        .unwrap();
    token
        .set_vault_configs(&[VaultConfig::new(vault(2), "reserve", 900_000, VaultStatus::Impaired)])
        .unwrap();

    token.withdraw(ALICE, units(50), ALICE, ALICE).unwrap();
    assert_eq!(vault_balance(&token, vault(1)), units(50));
    assert!(token.withdraw(ALICE, units(100), ALICE, ALICE).is_err());
    assert_eq!(vault_balance(&token, vault(2)), units(900));
}

// ── Scripted scenario ───────────────────────────────────────────────

#[test]
fn test_example_scenario_runs_clean() {
    let outcome = run_scenario(&example_scenario()).unwrap();
    let report = &outcome.report;
    assert_eq!(report.failures(), 0, "{:#?}", report.steps);
    assert_eq!(outcome.token.total_supply(), units(400));
}

#[test]
fn test_expected_errors_leave_state_untouched() {
    let scenario: Scenario = serde_json::from_str(
        r#"{
        "name": "rejected withdrawals",
        "default_vault": "a",
        "vaults": [
            { "name": "a", "address": "0x00000000000000000000000000000000000000a1",
              "target_bps": 1000000, "kind": { "type": "buffer" } }
        ],
        "steps": [
            { "action": "deposit", "user": "alice", "assets": "100e18" },
            { "action": "fail_next", "vault": "a" },
            { "action": "withdraw", "user": "alice", "assets": "40e18", "expect_error": "failed" },
            { "action": "withdraw", "user": "alice", "assets": "500e18", "expect_error": "Insufficient" },
            { "action": "set_shortfall", "value": "101e18", "expect_error": "SettlementShortfallTooHigh" },
            { "action": "expect", "total_assets": "100e18", "total_supply": "100e18" }
        ]
    }"#,
    )
    .unwrap();

    let outcome = run_scenario(&scenario).unwrap();
    let steps = &outcome.report.steps;
    assert_eq!(outcome.report.failures(), 0, "{steps:#?}");
    for step in &steps[2..5] {
        assert!(matches!(step.outcome, StepOutcome::ExpectedError { .. }), "{step:#?}");
        assert!(step.events.is_empty());
        assert!(step.violations.is_empty());
    }
}

#[test]
fn test_fingerprint_tracks_rejected_calls() {
    let mut token = single_vault_token();
    token.deposit(ALICE, units(100), ALICE).unwrap();
    token.approve(ALICE, BOB, units(10));

    let before = invariants::fingerprint(&token);
    token.redeem(BOB, units(20), BOB, ALICE).unwrap_err();
    assert_eq!(invariants::fingerprint(&token), before);

    token.redeem(BOB, units(5), BOB, ALICE).unwrap();
    assert_ne!(invariants::fingerprint(&token), before);
}
