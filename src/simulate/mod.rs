pub mod invariants;
pub mod report;
pub mod stress;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use alloy::primitives::{Address, U256, keccak256};
use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, info};

use crate::engine::adapter::{MarketEvent, VaultAdapter};
use crate::engine::router::Router;
use crate::engine::token::ShareToken;
use crate::model::Scenario;
use crate::model::amount::{format_units, parse_amount};
use crate::model::scenario::{Expectation, StepAction, VaultKind};
use crate::model::vault::VaultConfig;
use crate::run::state::PersistedState;
use crate::sim::{Erc4626Sim, IdleBuffer};
use crate::validate;

use report::{SimulationReport, StepOutcome, StepRecord};

/// Configuration for a scenario run.
pub struct SimulateConfig {
    pub scenario_path: PathBuf,
    pub state_file: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub verbose: bool,
}

/// Run a scenario from the CLI.
pub fn run(config: &SimulateConfig) -> Result<()> {
    let scenario = validate::load_and_validate(&config.scenario_path).map_err(|errors| {
        let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        anyhow!("Scenario validation failed:\n  {}", msgs.join("\n  "))
    })?;

    let outcome = run_scenario(&scenario)?;
    outcome.report.print_table();
    if config.verbose {
        outcome.report.print_events();
    }

    if let Some(ref output_path) = config.output {
        let json = serde_json::to_string_pretty(&outcome.report)?;
        std::fs::write(output_path, json)
            .with_context(|| format!("writing report to {}", output_path.display()))?;
        println!("  Report written to {}", output_path.display());
    }

    if let Some(ref state_path) = config.state_file {
        PersistedState::capture(&outcome.token).save(state_path)?;
        println!("  State saved to {}", state_path.display());
    }

    let failures = outcome.report.failures();
    if failures > 0 {
        bail!("{failures} step(s) failed");
    }
    Ok(())
}

/// Deterministic address for a scenario user name.
pub fn user_address(name: &str) -> Address {
    Address::from_word(keccak256(name.as_bytes()))
}

/// Vault name → address lookup for a built scenario.
#[derive(Debug, Clone, Default)]
pub struct VaultDirectory {
    by_name: BTreeMap<String, Address>,
}

impl VaultDirectory {
    pub fn resolve(&self, name: &str) -> Result<Address> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("unknown vault `{name}`"))
    }

    pub fn name_of(&self, vault: Address) -> Option<&str> {
        self.by_name
            .iter()
            .find(|(_, a)| **a == vault)
            .map(|(n, _)| n.as_str())
    }
}

/// Register a simulated venue per vault and apply the initial configuration.
pub fn build_token(scenario: &Scenario) -> Result<(ShareToken, VaultDirectory)> {
    let mut router = Router::new();
    let mut directory = VaultDirectory::default();
    let mut configs = Vec::with_capacity(scenario.vaults.len());

    for spec in &scenario.vaults {
        let address = Address::from_str(spec.address.trim())
            .with_context(|| format!("vault `{}` address", spec.name))?;
        let adapter: Box<dyn VaultAdapter> = match &spec.kind {
            VaultKind::Erc4626 {
                liquidity_cap,
                decimals_offset,
            } => {
                let cap = liquidity_cap
                    .as_deref()
                    .map(parse_amount)
                    .transpose()
                    .with_context(|| format!("vault `{}` liquidity_cap", spec.name))?;
                Box::new(
                    Erc4626Sim::new(address)
                        .with_decimals_offset(*decimals_offset)
                        .with_liquidity_cap(cap),
                )
            }
            VaultKind::Buffer => Box::new(IdleBuffer::new(address)),
        };
        let adapter_id = spec.adapter_id();
        router.register_adapter(adapter_id.as_str(), adapter)?;
        configs.push(VaultConfig::new(address, adapter_id, spec.target_bps, spec.status));
        directory.by_name.insert(spec.name.clone(), address);
    }

    let mut token = ShareToken::new(router, scenario.asset_decimals);
    token.set_vault_configs(&configs)?;
    if scenario.withdrawal_fee_bps != 0 {
        token.set_withdrawal_fee_bps(scenario.withdrawal_fee_bps)?;
    }
    if let Some(name) = &scenario.default_vault {
        token.set_default_vault(directory.resolve(name)?)?;
    }
    info!(scenario = %scenario.name, vaults = configs.len(), "scenario built");
    Ok((token, directory))
}

/// Final token plus the per-step report.
pub struct ScenarioOutcome {
    pub token: ShareToken,
    pub directory: VaultDirectory,
    pub report: SimulationReport,
}

/// Execute every step, checking invariants after each one.
pub fn run_scenario(scenario: &Scenario) -> Result<ScenarioOutcome> {
    let (mut token, directory) = build_token(scenario)?;
    let decimals = scenario.asset_decimals;
    let setup_events = token.drain_events().iter().map(|e| e.to_string()).collect();
    let mut records = Vec::with_capacity(scenario.steps.len());

    for (i, step) in scenario.steps.iter().enumerate() {
        let index = i + 1;
        let before = invariants::fingerprint(&token);
        let result = apply_step(&mut token, &directory, &step.action);
        let events = token.drain_events();
        let rejected = result.is_err();

        let (outcome, detail) = match (result, &step.expect_error) {
            (Ok(detail), None) => (StepOutcome::Ok, detail),
            (Ok(detail), Some(expected)) => (
                StepOutcome::Failed {
                    message: format!("expected an error containing `{expected}`, step succeeded"),
                },
                detail,
            ),
            (Err(err), Some(expected)) if format!("{err:#}").contains(expected.as_str()) => (
                StepOutcome::ExpectedError {
                    message: format!("{err:#}"),
                },
                String::new(),
            ),
            (Err(err), expected) => {
                let message = match expected {
                    Some(expected) => format!("expected `{expected}`, got: {err:#}"),
                    None => format!("{err:#}"),
                };
                (StepOutcome::Failed { message }, String::new())
            }
        };

        let mut violations: Vec<String> = invariants::check(&token)
            .into_iter()
            .map(|v| v.to_string())
            .collect();
        if rejected {
            if !events.is_empty() {
                violations.push(format!("failed step emitted {} event(s)", events.len()));
            }
            if invariants::fingerprint(&token) != before {
                violations.push("failed step changed token or vault state".to_string());
            }
        }
        debug!(step = index, action = step.action.label(), ?outcome, "step executed");

        records.push(StepRecord {
            index,
            action: step.action.label().to_string(),
            detail,
            outcome,
            total_assets: token
                .total_assets()
                .map(|v| format_units(v, decimals))
                .unwrap_or_else(|e| format!("blocked ({e})")),
            total_supply: format_units(token.total_supply(), decimals),
            events: events.iter().map(|e| e.to_string()).collect(),
            violations,
        });
    }

    let report = SimulationReport::build(scenario, &token, &directory, setup_events, records);
    Ok(ScenarioOutcome {
        token,
        directory,
        report,
    })
}

fn amount(value: &str) -> Result<U256> {
    parse_amount(value).with_context(|| format!("amount `{value}`"))
}

/// Apply one step. Returns a short description of what happened.
pub fn apply_step(token: &mut ShareToken, directory: &VaultDirectory, action: &StepAction) -> Result<String> {
    let decimals = token.asset_decimals();
    let fmt = |v: U256| format_units(v, decimals);

    match action {
        StepAction::Deposit { user, assets } => {
            let who = user_address(user);
            let shares = token.deposit(who, amount(assets)?, who)?;
            Ok(format!("{user} minted {}", fmt(shares)))
        }
        StepAction::Mint { user, shares } => {
            let who = user_address(user);
            let paid = token.mint(who, amount(shares)?, who)?;
            Ok(format!("{user} paid {}", fmt(paid)))
        }
        StepAction::Withdraw { user, assets } => {
            let who = user_address(user);
            let burned = token.withdraw(who, amount(assets)?, who, who)?;
            Ok(format!("{user} burned {}", fmt(burned)))
        }
        StepAction::Redeem { user, shares } => {
            let who = user_address(user);
            let shares = if shares == "all" {
                token.balance_of(who)
            } else {
                amount(shares)?
            };
            let paid = token.redeem(who, shares, who, who)?;
            Ok(format!("{user} received {}", fmt(paid)))
        }
        StepAction::SolverDeposit {
            user,
            legs,
            min_shares_out,
        } => {
            let who = user_address(user);
            let mut vaults = Vec::with_capacity(legs.len());
            let mut amounts = Vec::with_capacity(legs.len());
            for leg in legs {
                vaults.push(directory.resolve(&leg.vault)?);
                amounts.push(amount(&leg.assets)?);
            }
            let min = min_shares_out.as_deref().map(amount).transpose()?.unwrap_or_default();
            let shares = token.solver_deposit_assets(who, &vaults, &amounts, min, who)?;
            Ok(format!("{user} minted {} over {} vault(s)", fmt(shares), legs.len()))
        }
        StepAction::Transfer { from, to, shares } => {
            let value = amount(shares)?;
            token.transfer(user_address(from), user_address(to), value)?;
            Ok(format!("{from} → {to} {}", fmt(value)))
        }
        StepAction::SetShortfall { value } => {
            let value = amount(value)?;
            token.set_settlement_shortfall(value)?;
            Ok(format!("shortfall {}", fmt(value)))
        }
        StepAction::SetRatio { value } => {
            let value = amount(value)?;
            token.set_settlement_ratio(value)?;
            Ok(format!("ratio {}", format_units(value, 18)))
        }
        StepAction::Configure {
            vault,
            target_bps,
            status,
        } => {
            let address = directory.resolve(vault)?;
            let mut config = token
                .router()
                .registry()
                .get(address)
                .map(|e| e.config.clone())
                .ok_or_else(|| anyhow!("vault `{vault}` is not configured"))?;
            if let Some(target) = target_bps {
                config.target_bps = *target;
            }
            if let Some(status) = status {
                config.status = *status;
            }
            let summary = format!("{vault} {} {} bps", config.status, config.target_bps);
            token.set_vault_configs(&[config])?;
            Ok(summary)
        }
        StepAction::SetDefaultVault { vault } => {
            token.set_default_vault(directory.resolve(vault)?)?;
            Ok(format!("default → {vault}"))
        }
        StepAction::SetFee { bps } => {
            token.set_withdrawal_fee_bps(*bps)?;
            Ok(format!("fee {bps} bps"))
        }
        StepAction::Accrue { vault, assets } => {
            let value = amount(assets)?;
            token.apply_market_event(directory.resolve(vault)?, &MarketEvent::Accrue(value))?;
            Ok(format!("{vault} +{}", fmt(value)))
        }
        StepAction::RealizeLoss { vault, assets } => {
            let value = amount(assets)?;
            token.apply_market_event(directory.resolve(vault)?, &MarketEvent::RealizeLoss(value))?;
            Ok(format!("{vault} -{}", fmt(value)))
        }
        StepAction::SetLiquidity { vault, cap } => {
            let cap = cap.as_deref().map(amount).transpose()?;
            token.apply_market_event(directory.resolve(vault)?, &MarketEvent::SetLiquidity(cap))?;
            Ok(match cap {
                Some(cap) => format!("{vault} liquidity {}", fmt(cap)),
                None => format!("{vault} fully liquid"),
            })
        }
        StepAction::FailNext { vault } => {
            token.apply_market_event(directory.resolve(vault)?, &MarketEvent::FailNext)?;
            Ok(format!("{vault} fails next call"))
        }
        StepAction::Expect(expectation) => check_expectation(token, directory, expectation),
    }
}

fn within(actual: U256, expected: U256, tolerance: U256) -> bool {
    actual.abs_diff(expected) <= tolerance
}

fn check_expectation(token: &ShareToken, directory: &VaultDirectory, e: &Expectation) -> Result<String> {
    let decimals = token.asset_decimals();
    let tolerance = e.tolerance.as_deref().map(amount).transpose()?.unwrap_or_default();
    let mut checked = Vec::new();

    let mut compare = |label: String, actual: U256, expected: &str| -> Result<()> {
        let expected = amount(expected)?;
        if !within(actual, expected, tolerance) {
            bail!(
                "expected {label} = {}, got {}",
                format_units(expected, decimals),
                format_units(actual, decimals)
            );
        }
        checked.push(label);
        Ok(())
    };

    if let Some(v) = &e.total_assets {
        compare("total_assets".to_string(), token.total_assets()?, v)?;
    }
    if let Some(v) = &e.total_supply {
        compare("total_supply".to_string(), token.total_supply(), v)?;
    }
    if let Some(c) = &e.vault_balance {
        let vault = directory.resolve(&c.vault)?;
        let balance = token
            .router()
            .registry()
            .adapter(vault)
            .map(|a| a.balance())
            .ok_or_else(|| anyhow!("vault `{}` is not configured", c.vault))?;
        compare(format!("balance({})", c.vault), balance, &c.value)?;
    }
    if let Some(c) = &e.max_withdraw {
        compare(
            format!("max_withdraw({})", c.user),
            token.max_withdraw(user_address(&c.user))?,
            &c.value,
        )?;
    }

    Ok(format!("ok: {}", checked.join(", ")))
}
