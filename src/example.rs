use crate::model::scenario::*;
use crate::model::vault::VaultStatus;

/// Print an example scenario JSON to stdout.
pub fn run() -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&example_scenario())?;
    println!("{json}");
    Ok(())
}

fn step(action: StepAction) -> ScenarioStep {
    ScenarioStep {
        action,
        expect_error: None,
    }
}

fn failing(action: StepAction, expect_error: &str) -> ScenarioStep {
    ScenarioStep {
        action,
        expect_error: Some(expect_error.to_string()),
    }
}

fn expect(expectation: Expectation) -> ScenarioStep {
    step(StepAction::Expect(expectation))
}

/// Two vaults at 10% / 90%, a solver deposit, an overweight-first
/// withdrawal, then a shortfall and a settlement ratio applied on top.
pub fn example_scenario() -> Scenario {
    Scenario {
        name: "Core / reserve split with settlement haircut".to_string(),
        description: Some(
            "Solver deposits 1,000 across a 10% core vault and a 90% reserve vault, \
             withdraws 600 (served entirely by the reserve), then a second user deposits \
             through the default vault. A 20 shortfall and a 0.8 settlement ratio are \
             recorded, deposits are halted at ratio 0, and the reserve vault is suspended \
             before normal settlement resumes."
                .to_string(),
        ),
        asset_decimals: 18,
        withdrawal_fee_bps: 0,
        default_vault: Some("core".to_string()),
        vaults: vec![
            VaultSpec {
                name: "core".into(),
                address: "0x00000000000000000000000000000000000000c0".into(),
                adapter: None,
                target_bps: 100_000,
                status: VaultStatus::Active,
                kind: VaultKind::Erc4626 {
                    liquidity_cap: None,
                    decimals_offset: 0,
                },
            },
            VaultSpec {
                name: "reserve".into(),
                address: "0x00000000000000000000000000000000000000e5".into(),
                adapter: None,
                target_bps: 900_000,
                status: VaultStatus::Active,
                kind: VaultKind::Erc4626 {
                    liquidity_cap: None,
                    decimals_offset: 6,
                },
            },
        ],
        steps: vec![
            // ── Deposits and a routed withdrawal ─────────────────
            step(StepAction::SolverDeposit {
                user: "alice".into(),
                legs: vec![
                    SolverLeg {
                        vault: "core".into(),
                        assets: "100e18".into(),
                    },
                    SolverLeg {
                        vault: "reserve".into(),
                        assets: "900e18".into(),
                    },
                ],
                min_shares_out: Some("1000e18".into()),
            }),
            step(StepAction::Withdraw {
                user: "alice".into(),
                assets: "600e18".into(),
            }),
            expect(Expectation {
                total_assets: Some("400e18".into()),
                vault_balance: Some(VaultBalanceCheck {
                    vault: "core".into(),
                    value: "100e18".into(),
                }),
                ..Default::default()
            }),
            step(StepAction::Deposit {
                user: "bob".into(),
                assets: "100e18".into(),
            }),
            expect(Expectation {
                total_supply: Some("500e18".into()),
                vault_balance: Some(VaultBalanceCheck {
                    vault: "core".into(),
                    value: "200e18".into(),
                }),
                ..Default::default()
            }),
            // ── Settlement haircut ───────────────────────────────
            step(StepAction::SetShortfall {
                value: "20e18".into(),
            }),
            expect(Expectation {
                total_assets: Some("480e18".into()),
                ..Default::default()
            }),
            step(StepAction::SetRatio {
                value: "0.8e18".into(),
            }),
            expect(Expectation {
                total_assets: Some("384e18".into()),
                max_withdraw: Some(UserAmountCheck {
                    user: "bob".into(),
                    value: "76.8e18".into(),
                }),
                tolerance: Some("1".into()),
                ..Default::default()
            }),
            step(StepAction::SetRatio { value: "0".into() }),
            failing(
                StepAction::Deposit {
                    user: "carol".into(),
                    assets: "10e18".into(),
                },
                "SettlementRatioDisabled",
            ),
            failing(
                StepAction::SetShortfall {
                    value: "501e18".into(),
                },
                "SettlementShortfallTooHigh",
            ),
            // ── Recovery ─────────────────────────────────────────
            step(StepAction::SetRatio {
                value: "1e18".into(),
            }),
            step(StepAction::SetShortfall { value: "0".into() }),
            step(StepAction::Configure {
                vault: "reserve".into(),
                target_bps: None,
                status: Some(VaultStatus::Suspended),
            }),
            step(StepAction::Redeem {
                user: "bob".into(),
                shares: "all".into(),
            }),
            expect(Expectation {
                total_assets: Some("400e18".into()),
                total_supply: Some("400e18".into()),
                ..Default::default()
            }),
        ],
    }
}
