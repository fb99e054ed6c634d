mod amounts;
mod references;

use std::path::Path;

use thiserror::Error;

use crate::model::Scenario;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Scenario has no vaults")]
    NoVaults,

    #[error("Duplicate vault name `{name}`")]
    DuplicateVaultName { name: String },

    #[error("Duplicate vault address {address} (vault `{name}`)")]
    DuplicateVaultAddress { name: String, address: String },

    #[error("Duplicate adapter `{adapter}` (vault `{name}`)")]
    DuplicateAdapter { name: String, adapter: String },

    #[error("Vault `{name}` has invalid address `{value}`")]
    InvalidAddress { name: String, value: String },

    #[error("Vault `{name}` has target_bps {target_bps} above 1,000,000")]
    TargetOutOfRange { name: String, target_bps: u32 },

    #[error("Vault targets sum to {total} bps, above 1,000,000")]
    TargetsExceedScale { total: u64 },

    #[error("default_vault references unknown vault `{vault}`")]
    UnknownDefaultVault { vault: String },

    #[error("default_vault `{vault}` is not active")]
    DefaultVaultNotActive { vault: String },

    #[error("Step {step} ({action}) references unknown vault `{vault}`")]
    UnknownVault {
        step: usize,
        action: &'static str,
        vault: String,
    },

    #[error("Step {step} ({action}) deposits but no default vault is set")]
    MissingDefaultVault { step: usize, action: &'static str },

    #[error("Step {step} (solver_deposit) has no legs")]
    EmptySolverLegs { step: usize },

    #[error("{location}: invalid {field} `{value}`: {reason}")]
    InvalidAmount {
        location: String,
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("{location}: withdrawal fee {bps} bps above 1,000,000")]
    InvalidFee { location: String, bps: u32 },

    #[error("Step {step} (set_ratio): ratio {value} above 1e18")]
    RatioOutOfRange { step: usize, value: String },
}

/// Load and fully validate a scenario from a JSON file.
pub fn load_and_validate(path: &Path) -> Result<Scenario, Vec<ValidationError>> {
    let contents = std::fs::read_to_string(path).map_err(|e| vec![ValidationError::Io(e)])?;
    let scenario: Scenario =
        serde_json::from_str(&contents).map_err(|e| vec![ValidationError::Json(e)])?;
    validate(&scenario)?;
    Ok(scenario)
}

/// Validate a scenario, collecting all errors.
pub fn validate(scenario: &Scenario) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    errors.extend(references::check_vaults(scenario));
    errors.extend(references::check_default_vault(scenario));
    errors.extend(references::check_step_references(scenario));
    errors.extend(amounts::check_targets(scenario));
    errors.extend(amounts::check_fees(scenario));
    errors.extend(amounts::check_step_amounts(scenario));

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// CLI entry point for the `validate` subcommand.
pub fn run(path: &Path) -> anyhow::Result<()> {
    match load_and_validate(path) {
        Ok(scenario) => {
            println!(
                "Scenario '{}' is valid. {} vaults, {} steps.",
                scenario.name,
                scenario.vaults.len(),
                scenario.steps.len()
            );
            Ok(())
        }
        Err(errors) => {
            eprintln!("Validation failed with {} error(s):", errors.len());
            for (i, e) in errors.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, e);
            }
            std::process::exit(1);
        }
    }
}
