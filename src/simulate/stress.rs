//! Seeded random operation sequences against a three-vault token, checking
//! invariants after every operation and state preservation after every
//! rejected one.

use alloy::primitives::{Address, U256};
use anyhow::{Result, bail};
use rand::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::engine::adapter::MarketEvent;
use crate::engine::router::Router;
use crate::engine::token::{ShareToken, VaultError};
use crate::model::amount::{BPS_SCALE, WAD};
use crate::model::vault::{VaultConfig, VaultStatus};
use crate::sim::{Erc4626Sim, IdleBuffer};

use super::invariants;

/// Configuration for a stress run.
pub struct StressConfig {
    pub runs: u32,
    pub steps: u32,
    pub seed: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StressOutcome {
    pub runs: u32,
    pub operations: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub violations: Vec<String>,
}

/// Run the stress test from the CLI.
pub fn run(config: &StressConfig) -> Result<()> {
    let outcome = run_stress(config);

    println!("\n{}", "═".repeat(72));
    println!("  Stress run: {} runs × {} steps (seed {})", config.runs, config.steps, config.seed);
    println!("{}", "═".repeat(72));
    println!("  {:<20} {:>12}", "Operations", outcome.operations);
    println!("  {:<20} {:>12}", "Accepted", outcome.accepted);
    println!("  {:<20} {:>12}", "Rejected", outcome.rejected);
    println!("  {:<20} {:>12}", "Violations", outcome.violations.len());
    println!("{}", "═".repeat(72));
    for v in outcome.violations.iter().take(20) {
        println!("  !! {v}");
    }

    if !outcome.violations.is_empty() {
        bail!("{} invariant violation(s)", outcome.violations.len());
    }
    Ok(())
}

pub fn run_stress(config: &StressConfig) -> StressOutcome {
    let mut outcome = StressOutcome {
        runs: config.runs,
        ..Default::default()
    };
    for i in 0..config.runs {
        let seed = config.seed.wrapping_add(u64::from(i));
        let mut rng = StdRng::seed_from_u64(seed);
        if let Err(e) = random_run(&mut rng, config.steps, &mut outcome) {
            outcome.violations.push(format!("run {i} (seed {seed}): setup failed: {e}"));
        }
    }
    info!(
        runs = outcome.runs,
        operations = outcome.operations,
        violations = outcome.violations.len(),
        "stress run finished"
    );
    outcome
}

const VAULTS: [u8; 3] = [0xa1, 0xa2, 0xa3];
const USERS: [u8; 4] = [0x01, 0x02, 0x03, 0x04];

fn vault(i: usize) -> Address {
    Address::repeat_byte(VAULTS[i])
}

fn user(i: usize) -> Address {
    Address::repeat_byte(USERS[i])
}

fn build() -> Result<ShareToken, VaultError> {
    let mut router = Router::new();
    router.register_adapter("deep", Box::new(Erc4626Sim::new(vault(0))))?;
    router.register_adapter(
        "offset",
        Box::new(Erc4626Sim::new(vault(1)).with_decimals_offset(6)),
    )?;
    router.register_adapter("buffer", Box::new(IdleBuffer::new(vault(2))))?;

    let mut token = ShareToken::new(router, 18);
    token.set_vault_configs(&[
        VaultConfig::new(vault(0), "deep", 500_000, VaultStatus::Active),
        VaultConfig::new(vault(1), "offset", 300_000, VaultStatus::Active),
        VaultConfig::new(vault(2), "buffer", 200_000, VaultStatus::Active),
    ])?;
    token.set_default_vault(vault(0))?;
    Ok(token)
}

/// Random amount between 1e-6 and 10,000 units.
fn random_amount(rng: &mut impl Rng) -> U256 {
    let whole = U256::from(rng.random_range(1..=10_000u64));
    let divisor = U256::from(10u64).pow(U256::from(rng.random_range(0..=6u64)));
    (whole * WAD / divisor).max(U256::from(1u64))
}

/// Random fraction of `value`, in parts per 1,000,000.
fn fraction_of(rng: &mut impl Rng, value: U256) -> U256 {
    value * U256::from(rng.random_range(1..=BPS_SCALE)) / U256::from(BPS_SCALE)
}

fn random_run(rng: &mut StdRng, steps: u32, outcome: &mut StressOutcome) -> Result<(), VaultError> {
    let mut token = build()?;
    token.drain_events();

    for step in 0..steps {
        let before = invariants::fingerprint(&token);
        let (label, result) = random_operation(rng, &mut token);
        let events = token.drain_events();
        outcome.operations += 1;

        match result {
            Ok(()) => outcome.accepted += 1,
            Err(e) => {
                outcome.rejected += 1;
                debug!(step, op = label, error = %e, "operation rejected");
                if invariants::fingerprint(&token) != before {
                    outcome
                        .violations
                        .push(format!("step {step} ({label}): rejected call changed state: {e}"));
                }
                if !events.is_empty() {
                    outcome
                        .violations
                        .push(format!("step {step} ({label}): rejected call emitted events"));
                }
            }
        }

        for v in invariants::check(&token) {
            outcome.violations.push(format!("step {step} ({label}): {v}"));
        }
    }
    Ok(())
}

fn random_operation(rng: &mut StdRng, token: &mut ShareToken) -> (&'static str, Result<(), VaultError>) {
    let who = user(rng.random_range(0..USERS.len()));
    let target = vault(rng.random_range(0..VAULTS.len()));

    match rng.random_range(0..100u32) {
        0..=24 => ("deposit", token.deposit(who, random_amount(rng), who).map(drop)),
        25..=29 => ("mint", token.mint(who, random_amount(rng), who).map(drop)),
        30..=44 => {
            let max = token.max_withdraw(who).unwrap_or_default();
            let assets = if max.is_zero() { random_amount(rng) } else { fraction_of(rng, max) };
            ("withdraw", token.withdraw(who, assets, who, who).map(drop))
        }
        45..=59 => {
            let balance = token.balance_of(who);
            let shares = if rng.random_bool(0.2) { balance } else { fraction_of(rng, balance) };
            ("redeem", token.redeem(who, shares, who, who).map(drop))
        }
        60..=64 => {
            let legs = rng.random_range(1..=VAULTS.len());
            let vaults: Vec<Address> = (0..legs).map(vault).collect();
            let amounts: Vec<U256> = (0..legs).map(|_| random_amount(rng)).collect();
            (
                "solver_deposit",
                token
                    .solver_deposit_assets(who, &vaults, &amounts, U256::ZERO, who)
                    .map(drop),
            )
        }
        65..=69 => {
            let to = user(rng.random_range(0..USERS.len()));
            let shares = fraction_of(rng, token.balance_of(who));
            ("transfer", token.transfer(who, to, shares))
        }
        70..=74 => {
            let gross = token.router().total_managed_assets().unwrap_or_default();
            let shortfall = match rng.random_range(0..4u32) {
                0 => U256::ZERO,
                1 => gross + U256::from(1u64),
                _ => fraction_of(rng, gross / U256::from(4u64)),
            };
            ("set_shortfall", token.set_settlement_shortfall(shortfall))
        }
        75..=78 => {
            let ratio = match rng.random_range(0..5u32) {
                0 => U256::ZERO,
                1 => WAD + U256::from(1u64),
                2 | 3 => WAD,
                _ => fraction_of(rng, WAD),
            };
            ("set_ratio", token.set_settlement_ratio(ratio))
        }
        79..=83 => {
            let gross = token
                .router()
                .registry()
                .adapter(target)
                .map(|a| a.balance())
                .unwrap_or_default();
            let event = if rng.random_bool(0.7) {
                MarketEvent::Accrue(fraction_of(rng, gross / U256::from(20u64)))
            } else {
                MarketEvent::RealizeLoss(fraction_of(rng, gross / U256::from(20u64)))
            };
            ("market", token.apply_market_event(target, &event))
        }
        84..=86 => {
            let cap = rng.random_bool(0.5).then(|| random_amount(rng));
            ("set_liquidity", token.apply_market_event(target, &MarketEvent::SetLiquidity(cap)))
        }
        87..=89 => ("fail_next", token.apply_market_event(target, &MarketEvent::FailNext)),
        90..=94 => {
            let status = match rng.random_range(0..4u32) {
                0 => VaultStatus::Suspended,
                1 => VaultStatus::Impaired,
                _ => VaultStatus::Active,
            };
            let current = token.router().registry().get(target).map(|e| e.config.clone());
            let result = match current {
                Some(mut config) => {
                    config.status = status;
                    token.set_vault_configs(&[config])
                }
                None => Ok(()),
            };
            ("configure", result)
        }
        95..=97 => ("set_default_vault", token.set_default_vault(target)),
        _ => (
            "set_fee",
            token.set_withdrawal_fee_bps(rng.random_range(0..=10_000u32)),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stress_is_deterministic_per_seed() {
        let config = StressConfig {
            runs: 2,
            steps: 60,
            seed: 7,
        };
        let a = run_stress(&config);
        let b = run_stress(&config);
        assert_eq!(a.accepted, b.accepted);
        assert_eq!(a.rejected, b.rejected);
        assert_eq!(a.operations, 120);
    }
}
