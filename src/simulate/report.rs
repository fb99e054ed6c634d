use alloy::primitives::U256;
use serde::Serialize;

use crate::engine::token::ShareToken;
use crate::model::Scenario;
use crate::model::amount::format_units;
use crate::model::scenario::StepAction;

use super::{VaultDirectory, user_address};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Ok,
    ExpectedError { message: String },
    Failed { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub index: usize,
    pub action: String,
    pub detail: String,
    pub outcome: StepOutcome,
    pub total_assets: String,
    pub total_supply: String,
    pub events: Vec<String>,
    pub violations: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VaultLine {
    pub name: String,
    pub address: String,
    pub status: String,
    pub target_bps: u32,
    pub current_bps: u32,
    pub balance: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HolderLine {
    pub user: String,
    pub address: String,
    pub shares: String,
    pub max_withdraw: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinalState {
    pub gross_assets: String,
    pub shortfall: String,
    pub settlement_ratio: String,
    pub net_assets: String,
    pub total_supply: String,
    pub withdrawal_fee_bps: u32,
    pub max_drift_bps: u64,
    pub vaults: Vec<VaultLine>,
    pub holders: Vec<HolderLine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub scenario: String,
    pub asset_decimals: u8,
    pub setup_events: Vec<String>,
    pub steps: Vec<StepRecord>,
    pub final_state: FinalState,
}

impl SimulationReport {
    pub fn build(
        scenario: &Scenario,
        token: &ShareToken,
        directory: &VaultDirectory,
        setup_events: Vec<String>,
        steps: Vec<StepRecord>,
    ) -> Self {
        let decimals = scenario.asset_decimals;
        let fmt = |v: U256| format_units(v, decimals);
        let router = token.router();

        let snapshot = router.snapshot().ok();
        let vaults = router
            .registry()
            .entries()
            .map(|e| {
                let vault = e.config.vault;
                VaultLine {
                    name: directory.name_of(vault).unwrap_or("?").to_string(),
                    address: vault.to_checksum(None),
                    status: e.config.status.to_string(),
                    target_bps: e.config.target_bps,
                    current_bps: snapshot
                        .as_ref()
                        .and_then(|s| s.get(vault))
                        .map_or(0, |v| v.current_bps),
                    balance: fmt(e.adapter().balance()),
                }
            })
            .collect();

        // Users are only known by name through the scenario steps.
        let mut names: Vec<&str> = scenario
            .steps
            .iter()
            .filter_map(|s| step_user(&s.action))
            .collect();
        names.sort_unstable();
        names.dedup();
        let holders = names
            .into_iter()
            .map(|user| {
                let address = user_address(user);
                HolderLine {
                    user: user.to_string(),
                    address: address.to_checksum(None),
                    shares: fmt(token.balance_of(address)),
                    max_withdraw: token
                        .max_withdraw(address)
                        .map(fmt)
                        .unwrap_or_else(|_| "blocked".to_string()),
                }
            })
            .collect();

        let final_state = FinalState {
            gross_assets: router
                .total_managed_assets()
                .map(fmt)
                .unwrap_or_else(|e| e.to_string()),
            shortfall: fmt(router.current_shortfall()),
            settlement_ratio: format_units(router.settlement_ratio(), 18),
            net_assets: token
                .total_assets()
                .map(fmt)
                .unwrap_or_else(|e| format!("blocked ({e})")),
            total_supply: fmt(token.total_supply()),
            withdrawal_fee_bps: token.withdrawal_fee_bps(),
            max_drift_bps: snapshot.as_ref().map_or(0, |s| s.max_drift_bps()),
            vaults,
            holders,
        };

        SimulationReport {
            scenario: scenario.name.clone(),
            asset_decimals: decimals,
            setup_events,
            steps,
            final_state,
        }
    }

    /// Steps that failed or broke an invariant.
    pub fn failures(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Failed { .. }) || !s.violations.is_empty())
            .count()
    }

    pub fn print_table(&self) {
        println!("\n{}", "═".repeat(110));
        println!("  Scenario: {}", self.scenario);
        println!("{}", "═".repeat(110));
        println!(
            "  {:>4} {:<18} {:<8} {:>22} {:>22}  {}",
            "Step", "Action", "Result", "Total assets", "Total supply", "Detail"
        );
        println!("  {}", "-".repeat(104));
        for s in &self.steps {
            let (status, detail) = match &s.outcome {
                StepOutcome::Ok => ("ok", s.detail.as_str()),
                StepOutcome::ExpectedError { message } => ("reverted", message.as_str()),
                StepOutcome::Failed { message } => ("FAILED", message.as_str()),
            };
            println!(
                "  {:>4} {:<18} {:<8} {:>22} {:>22}  {}",
                s.index, s.action, status, s.total_assets, s.total_supply, detail
            );
            for v in &s.violations {
                println!("       !! {v}");
            }
        }
        println!("{}", "═".repeat(110));

        let f = &self.final_state;
        println!(
            "  gross {}  shortfall {}  ratio {}  net {}  supply {}  fee {} bps  drift {} bps",
            f.gross_assets,
            f.shortfall,
            f.settlement_ratio,
            f.net_assets,
            f.total_supply,
            f.withdrawal_fee_bps,
            f.max_drift_bps
        );
        println!();
        println!(
            "  {:<14} {:<10} {:>9} {:>9} {:>22}",
            "Vault", "Status", "Target", "Current", "Balance"
        );
        for v in &f.vaults {
            println!(
                "  {:<14} {:<10} {:>9} {:>9} {:>22}",
                v.name, v.status, v.target_bps, v.current_bps, v.balance
            );
        }
        if !f.holders.is_empty() {
            println!();
            println!("  {:<14} {:>22} {:>22}", "Holder", "Shares", "Max withdraw");
            for h in &f.holders {
                println!("  {:<14} {:>22} {:>22}", h.user, h.shares, h.max_withdraw);
            }
        }

        let failures = self.failures();
        if failures > 0 {
            println!("\n  {failures} step(s) failed");
        }
    }

    pub fn print_events(&self) {
        println!("\n  Events");
        println!("  {}", "-".repeat(104));
        for e in &self.setup_events {
            println!("  [setup] {e}");
        }
        for s in &self.steps {
            for e in &s.events {
                println!("  [{:>4}] {e}", s.index);
            }
        }
    }
}

fn step_user(action: &StepAction) -> Option<&str> {
    match action {
        StepAction::Deposit { user, .. }
        | StepAction::Mint { user, .. }
        | StepAction::Withdraw { user, .. }
        | StepAction::Redeem { user, .. }
        | StepAction::SolverDeposit { user, .. } => Some(user.as_str()),
        StepAction::Transfer { to, .. } => Some(to.as_str()),
        _ => None,
    }
}
