use alloy::primitives::{Address, U256};

use vault_router::engine::adapter::{AdapterError, MarketEvent, VaultAdapter};
use vault_router::engine::router::{Router, RouterError};
use vault_router::engine::selector::SelectionError;
use vault_router::engine::token::{ShareToken, VaultError};
use vault_router::model::{VaultConfig, VaultStatus, WAD};
use vault_router::sim::IdleBuffer;

// ── Mock adapter ────────────────────────────────────────────────────

/// Holds assets 1:1 but may short-change withdrawals or deposits.
#[derive(Clone)]
struct ShortChanging {
    vault: Address,
    held: U256,
    /// Percentage of each withdrawal actually returned.
    withdraw_pct: u64,
    /// Percentage of each deposit actually accepted.
    deposit_pct: u64,
    /// Reports zero vault shares for any deposit.
    rejects_previews: bool,
}

impl ShortChanging {
    fn new(vault: Address) -> Self {
        ShortChanging {
            vault,
            held: U256::ZERO,
            withdraw_pct: 100,
            deposit_pct: 100,
            rejects_previews: false,
        }
    }
}

impl VaultAdapter for ShortChanging {
    fn vault(&self) -> Address {
        self.vault
    }

    fn balance(&self) -> U256 {
        self.held
    }

    fn max_withdrawable(&self) -> U256 {
        self.held
    }

    fn preview_deposit(&self, assets: U256) -> Result<U256, AdapterError> {
        Ok(if self.rejects_previews { U256::ZERO } else { assets })
    }

    fn preview_withdraw(&self, assets: U256) -> Result<U256, AdapterError> {
        Ok(assets)
    }

    fn deposit_assets(&mut self, assets: U256) -> Result<U256, AdapterError> {
        let accepted = assets * U256::from(self.deposit_pct) / U256::from(100);
        self.held += accepted;
        Ok(accepted)
    }

    fn withdraw_assets(&mut self, assets: U256) -> Result<U256, AdapterError> {
        let returned = assets * U256::from(self.withdraw_pct) / U256::from(100);
        self.held -= assets;
        Ok(returned)
    }

    fn snapshot(&self) -> Box<dyn VaultAdapter> {
        Box::new(self.clone())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn vault(n: u8) -> Address {
    Address::repeat_byte(n)
}

fn units(n: u64) -> U256 {
    U256::from(n) * WAD
}

/// Two idle buffers at 50/50 holding 500 each.
fn funded_router() -> Router {
    let mut router = Router::new();
    router.register_adapter("a", Box::new(IdleBuffer::new(vault(1)))).unwrap();
    router.register_adapter("b", Box::new(IdleBuffer::new(vault(2)))).unwrap();
    router
        .set_vault_configs(&[
            VaultConfig::new(vault(1), "a", 500_000, VaultStatus::Active),
            VaultConfig::new(vault(2), "b", 500_000, VaultStatus::Active),
        ])
        .unwrap();
    router
        .deposit_solver(vec![(vault(1), units(500)), (vault(2), units(500))])
        .unwrap();
    router
}

fn balance(router: &Router, v: Address) -> U256 {
    router.registry().adapter(v).unwrap().balance()
}

// ── Settlement ──────────────────────────────────────────────────────

#[test]
fn test_settlement_spans_vaults_in_order() {
    let mut router = funded_router();
    let settlements = router.settle_withdrawal(units(700), units(700)).unwrap();
    assert_eq!(settlements.len(), 2);
    assert_eq!(settlements[0].vault, vault(1));
    assert_eq!(settlements[0].net_assets, units(500));
    assert_eq!(settlements[1].vault, vault(2));
    assert_eq!(settlements[1].net_assets, units(200));
    assert_eq!(router.total_managed_assets().unwrap(), units(300));
}

#[test]
fn test_pre_fee_value_splits_across_draws() {
    let mut router = funded_router();
    // Net 700 leaves the vaults; the 1400 pre-fee value is attributed pro rata.
    let settlements = router.settle_withdrawal(units(1400), units(700)).unwrap();
    assert_eq!(settlements[0].gross_assets, units(1000));
    assert_eq!(settlements[0].net_assets, units(500));
    assert_eq!(settlements[1].gross_assets, units(400));
    assert_eq!(settlements[1].net_assets, units(200));
    assert_eq!(router.total_managed_assets().unwrap(), units(300));
}

#[test]
fn test_mid_settlement_failure_rolls_back_every_vault() {
    let mut router = funded_router();
    router.apply_market_event(vault(2), &MarketEvent::FailNext).unwrap();

    // The first vault is fully drained before the second one fails.
    let err = router.settle_withdrawal(units(700), units(700)).unwrap_err();
    assert!(matches!(err, RouterError::Adapter { vault: v, .. } if v == vault(2)));
    assert_eq!(balance(&router, vault(1)), units(500));
    assert_eq!(balance(&router, vault(2)), units(500));

    // The injected failure fired once and stays disarmed after rollback.
    router.settle_withdrawal(units(700), units(700)).unwrap();
    assert_eq!(router.total_managed_assets().unwrap(), units(300));
}

#[test]
fn test_underfilled_settlement_reverts() {
    let mut router = Router::new();
    let mut stingy = ShortChanging::new(vault(1));
    stingy.withdraw_pct = 90;
    router.register_adapter("stingy", Box::new(stingy)).unwrap();
    router
        .set_vault_configs(&[VaultConfig::new(vault(1), "stingy", 1_000_000, VaultStatus::Active)])
        .unwrap();
    router.deposit_solver(vec![(vault(1), units(100))]).unwrap();

    let err = router.settle_withdrawal(units(50), units(50)).unwrap_err();
    assert_eq!(
        err,
        RouterError::SettlementUnderfilled {
            requested: units(50),
            returned: units(45),
        }
    );
    assert_eq!(balance(&router, vault(1)), units(100));
}

#[test]
fn test_withdrawal_beyond_liquidity_is_rejected() {
    let mut router = funded_router();
    router
        .apply_market_event(vault(1), &MarketEvent::SetLiquidity(Some(units(100))))
        .unwrap();
    let err = router.settle_withdrawal(units(700), units(700)).unwrap_err();
    assert!(matches!(
        err,
        RouterError::Selection(SelectionError::InsufficientLiquidity { .. })
    ));
    assert_eq!(router.total_managed_assets().unwrap(), units(1000));
}

// ── Deposits ────────────────────────────────────────────────────────

#[test]
fn test_partially_accepted_deposit_reverts() {
    let mut router = Router::new();
    let mut leaky = ShortChanging::new(vault(1));
    leaky.deposit_pct = 99;
    router.register_adapter("leaky", Box::new(leaky)).unwrap();
    router
        .set_vault_configs(&[VaultConfig::new(vault(1), "leaky", 1_000_000, VaultStatus::Active)])
        .unwrap();
    router.set_default_vault(vault(1)).unwrap();

    let err = router.deposit_auto(units(100)).unwrap_err();
    assert!(matches!(err, RouterError::DepositUnderfilled { .. }));
    assert_eq!(router.total_managed_assets().unwrap(), U256::ZERO);
}

#[test]
fn test_zero_share_preview_rejects_deposit() {
    let mut router = Router::new();
    let mut closed = ShortChanging::new(vault(1));
    closed.rejects_previews = true;
    router.register_adapter("closed", Box::new(closed)).unwrap();
    router
        .set_vault_configs(&[VaultConfig::new(vault(1), "closed", 1_000_000, VaultStatus::Active)])
        .unwrap();

    let err = router.deposit_solver(vec![(vault(1), units(1))]).unwrap_err();
    assert!(matches!(err, RouterError::DepositRejected { .. }));
}

#[test]
fn test_solver_deposit_failure_rolls_back_earlier_legs() {
    let mut router = funded_router();
    router.apply_market_event(vault(2), &MarketEvent::FailNext).unwrap();
    let err = router
        .deposit_solver(vec![(vault(1), units(10)), (vault(2), units(10))])
        .unwrap_err();
    assert!(matches!(err, RouterError::Adapter { .. }));
    assert_eq!(balance(&router, vault(1)), units(500));
}

// ── Solver deposits through the token ───────────────────────────────

fn token() -> ShareToken {
    let mut router = Router::new();
    router.register_adapter("a", Box::new(IdleBuffer::new(vault(1)))).unwrap();
    router.register_adapter("b", Box::new(IdleBuffer::new(vault(2)))).unwrap();
    router.register_adapter("c", Box::new(IdleBuffer::new(vault(3)))).unwrap();
    router
        .set_vault_configs(&[
            VaultConfig::new(vault(1), "a", 400_000, VaultStatus::Active),
            VaultConfig::new(vault(2), "b", 400_000, VaultStatus::Active),
            VaultConfig::new(vault(3), "c", 200_000, VaultStatus::Suspended),
        ])
        .unwrap();
    ShareToken::new(router, 18)
}

#[test]
fn test_solver_deposit_validation() {
    let user = Address::repeat_byte(0x11);
    let mut token = token();

    let err = token
        .solver_deposit_assets(user, &[vault(1), vault(2)], &[units(1)], U256::ZERO, user)
        .unwrap_err();
    assert_eq!(err, VaultError::LengthMismatch { vaults: 2, amounts: 1 });

    let err = token
        .solver_deposit_assets(user, &[vault(1), vault(1)], &[units(1), units(1)], U256::ZERO, user)
        .unwrap_err();
    assert_eq!(
        err,
        VaultError::Router(RouterError::Selection(SelectionError::DuplicateVault(vault(1))))
    );

    let err = token
        .solver_deposit_assets(user, &[vault(1), vault(2)], &[units(1), U256::ZERO], U256::ZERO, user)
        .unwrap_err();
    assert_eq!(
        err,
        VaultError::Router(RouterError::Selection(SelectionError::ZeroAmount))
    );

    let err = token
        .solver_deposit_assets(user, &[vault(9)], &[units(1)], U256::ZERO, user)
        .unwrap_err();
    assert_eq!(
        err,
        VaultError::Router(RouterError::Selection(SelectionError::UnknownVault(vault(9))))
    );

    let err = token
        .solver_deposit_assets(user, &[vault(3)], &[units(1)], U256::ZERO, user)
        .unwrap_err();
    assert!(matches!(
        err,
        VaultError::Router(RouterError::Selection(SelectionError::VaultNotActive { .. }))
    ));

    let err = token
        .solver_deposit_assets(user, &[vault(1)], &[units(1)], units(2), user)
        .unwrap_err();
    assert_eq!(
        err,
        VaultError::SlippageExceeded {
            minted: units(1),
            min_shares_out: units(2),
        }
    );

    // Nothing above touched state or emitted events.
    assert_eq!(token.total_supply(), U256::ZERO);
    assert!(token.events().is_empty());

    let shares = token
        .solver_deposit_assets(user, &[vault(1), vault(2)], &[units(30), units(70)], units(100), user)
        .unwrap();
    assert_eq!(shares, units(100));
    assert_eq!(token.router().total_managed_assets().unwrap(), units(100));
}
