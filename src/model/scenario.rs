use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::vault::VaultStatus;

/// A scripted run against the router: the vault set, the token parameters, and
/// an ordered list of user and administrative steps.
///
/// Amounts are decimal strings in base units of the deposit asset. Scientific
/// notation is accepted (`"600e18"`, `"0.8e18"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Scenario {
    /// Human-readable name for this scenario.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Decimals of the deposit asset (display only). Default: 18.
    #[serde(default = "default_asset_decimals")]
    pub asset_decimals: u8,
    /// Withdrawal fee, parts per 1,000,000. Default: 0.
    #[serde(default)]
    pub withdrawal_fee_bps: u32,
    /// Name of the vault receiving automatic deposits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_vault: Option<String>,
    /// Strategy vaults, in registration order.
    pub vaults: Vec<VaultSpec>,
    /// Steps executed in order.
    #[serde(default)]
    pub steps: Vec<ScenarioStep>,
}

fn default_asset_decimals() -> u8 {
    18
}

/// One strategy vault and the simulated venue backing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VaultSpec {
    /// Name used by steps to refer to this vault.
    pub name: String,
    /// Vault address (hex).
    pub address: String,
    /// Adapter key. Default: `<name>-adapter`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter: Option<String>,
    /// Target allocation, parts per 1,000,000.
    pub target_bps: u32,
    #[serde(default)]
    pub status: VaultStatus,
    #[serde(default)]
    pub kind: VaultKind,
}

impl VaultSpec {
    pub fn adapter_id(&self) -> String {
        self.adapter
            .clone()
            .unwrap_or_else(|| format!("{}-adapter", self.name))
    }
}

/// Simulated venue type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VaultKind {
    /// ERC4626-style share vault.
    Erc4626 {
        /// Assets withdrawable at once. Omitted = fully liquid.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        liquidity_cap: Option<String>,
        /// Virtual share decimals offset. Default: 0.
        #[serde(default)]
        decimals_offset: u8,
    },
    /// Idle 1:1 asset buffer.
    Buffer,
}

impl Default for VaultKind {
    fn default() -> Self {
        VaultKind::Erc4626 {
            liquidity_cap: None,
            decimals_offset: 0,
        }
    }
}

/// A step plus an optional expected failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScenarioStep {
    #[serde(flatten)]
    pub action: StepAction,
    /// When set, the step must fail with an error whose message contains
    /// this text; the run continues afterwards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_error: Option<String>,
}

/// A single solver deposit leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SolverLeg {
    pub vault: String,
    pub assets: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StepAction {
    /// Deposit assets through the default vault.
    Deposit { user: String, assets: String },
    /// Mint an exact share amount.
    Mint { user: String, shares: String },
    /// Withdraw a net asset amount.
    Withdraw { user: String, assets: String },
    /// Redeem shares; `"all"` redeems the full balance.
    Redeem { user: String, shares: String },
    /// Caller-directed per-vault deposit.
    SolverDeposit {
        user: String,
        legs: Vec<SolverLeg>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_shares_out: Option<String>,
    },
    /// Move shares between users.
    Transfer { from: String, to: String, shares: String },
    /// Record a settlement shortfall.
    SetShortfall { value: String },
    /// Set the settlement ratio (1e18 = 1.0).
    SetRatio { value: String },
    /// Change a vault's target and/or status.
    Configure {
        vault: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_bps: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<VaultStatus>,
    },
    /// Point automatic deposits at another vault.
    SetDefaultVault { vault: String },
    /// Change the withdrawal fee.
    SetFee { bps: u32 },
    /// Venue earns yield.
    Accrue { vault: String, assets: String },
    /// Venue loses assets.
    RealizeLoss { vault: String, assets: String },
    /// Cap the venue's immediately withdrawable assets (`null` = uncapped).
    SetLiquidity {
        vault: String,
        #[serde(default)]
        cap: Option<String>,
    },
    /// The venue's next deposit or withdrawal call fails.
    FailNext { vault: String },
    /// Assert on the current state.
    Expect(Expectation),
}

/// State assertions. Every provided field is checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Expectation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_assets: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_supply: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_balance: Option<VaultBalanceCheck>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_withdraw: Option<UserAmountCheck>,
    /// Allowed absolute difference for every check. Default: exact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VaultBalanceCheck {
    pub vault: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UserAmountCheck {
    pub user: String,
    pub value: String,
}

impl StepAction {
    /// Short label for tables and logs.
    pub fn label(&self) -> &'static str {
        match self {
            StepAction::Deposit { .. } => "deposit",
            StepAction::Mint { .. } => "mint",
            StepAction::Withdraw { .. } => "withdraw",
            StepAction::Redeem { .. } => "redeem",
            StepAction::SolverDeposit { .. } => "solver_deposit",
            StepAction::Transfer { .. } => "transfer",
            StepAction::SetShortfall { .. } => "set_shortfall",
            StepAction::SetRatio { .. } => "set_ratio",
            StepAction::Configure { .. } => "configure",
            StepAction::SetDefaultVault { .. } => "set_default_vault",
            StepAction::SetFee { .. } => "set_fee",
            StepAction::Accrue { .. } => "accrue",
            StepAction::RealizeLoss { .. } => "realize_loss",
            StepAction::SetLiquidity { .. } => "set_liquidity",
            StepAction::FailNext { .. } => "fail_next",
            StepAction::Expect(_) => "expect",
        }
    }

    /// Vault names referenced by this step.
    pub fn vault_refs(&self) -> Vec<&str> {
        match self {
            StepAction::SolverDeposit { legs, .. } => legs.iter().map(|l| l.vault.as_str()).collect(),
            StepAction::Configure { vault, .. }
            | StepAction::SetDefaultVault { vault }
            | StepAction::Accrue { vault, .. }
            | StepAction::RealizeLoss { vault, .. }
            | StepAction::SetLiquidity { vault, .. }
            | StepAction::FailNext { vault } => vec![vault.as_str()],
            StepAction::Expect(e) => e
                .vault_balance
                .as_ref()
                .map(|c| vec![c.vault.as_str()])
                .unwrap_or_default(),
            _ => vec![],
        }
    }

    /// Amount strings carried by this step, with a field label.
    pub fn amount_fields(&self) -> Vec<(&'static str, &str)> {
        match self {
            StepAction::Deposit { assets, .. } | StepAction::Withdraw { assets, .. } => {
                vec![("assets", assets.as_str())]
            }
            StepAction::Mint { shares, .. } | StepAction::Transfer { shares, .. } => {
                vec![("shares", shares.as_str())]
            }
            StepAction::Redeem { shares, .. } if shares == "all" => vec![],
            StepAction::Redeem { shares, .. } => vec![("shares", shares.as_str())],
            StepAction::SolverDeposit {
                legs,
                min_shares_out,
                ..
            } => {
                let mut fields: Vec<(&'static str, &str)> =
                    legs.iter().map(|l| ("assets", l.assets.as_str())).collect();
                if let Some(min) = min_shares_out {
                    fields.push(("min_shares_out", min.as_str()));
                }
                fields
            }
            StepAction::SetShortfall { value } | StepAction::SetRatio { value } => {
                vec![("value", value.as_str())]
            }
            StepAction::Accrue { assets, .. } | StepAction::RealizeLoss { assets, .. } => {
                vec![("assets", assets.as_str())]
            }
            StepAction::SetLiquidity { cap, .. } => {
                cap.iter().map(|c| ("cap", c.as_str())).collect()
            }
            StepAction::Expect(e) => {
                let mut fields = Vec::new();
                if let Some(v) = &e.total_assets {
                    fields.push(("total_assets", v.as_str()));
                }
                if let Some(v) = &e.total_supply {
                    fields.push(("total_supply", v.as_str()));
                }
                if let Some(c) = &e.vault_balance {
                    fields.push(("vault_balance", c.value.as_str()));
                }
                if let Some(c) = &e.max_withdraw {
                    fields.push(("max_withdraw", c.value.as_str()));
                }
                if let Some(t) = &e.tolerance {
                    fields.push(("tolerance", t.as_str()));
                }
                fields
            }
            StepAction::Configure { .. }
            | StepAction::SetDefaultVault { .. }
            | StepAction::SetFee { .. }
            | StepAction::FailNext { .. } => vec![],
        }
    }
}
