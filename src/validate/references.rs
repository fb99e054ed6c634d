use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use alloy::primitives::Address;

use crate::model::Scenario;
use crate::model::scenario::StepAction;
use crate::model::vault::VaultStatus;

use super::ValidationError;

/// Vault names, addresses and adapter keys must be unique and well-formed.
pub fn check_vaults(scenario: &Scenario) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if scenario.vaults.is_empty() {
        errors.push(ValidationError::NoVaults);
    }

    let mut names = HashSet::new();
    let mut addresses = HashSet::new();
    let mut adapters = HashSet::new();

    for vault in &scenario.vaults {
        if !names.insert(vault.name.as_str()) {
            errors.push(ValidationError::DuplicateVaultName {
                name: vault.name.clone(),
            });
        }
        match Address::from_str(vault.address.trim()) {
            Ok(address) => {
                if !addresses.insert(address) {
                    errors.push(ValidationError::DuplicateVaultAddress {
                        name: vault.name.clone(),
                        address: vault.address.clone(),
                    });
                }
            }
            Err(_) => errors.push(ValidationError::InvalidAddress {
                name: vault.name.clone(),
                value: vault.address.clone(),
            }),
        }
        let adapter = vault.adapter_id();
        if !adapters.insert(adapter.clone()) {
            errors.push(ValidationError::DuplicateAdapter {
                name: vault.name.clone(),
                adapter,
            });
        }
    }

    errors
}

pub fn check_default_vault(scenario: &Scenario) -> Vec<ValidationError> {
    let Some(default) = &scenario.default_vault else {
        return vec![];
    };
    match scenario.vaults.iter().find(|v| &v.name == default) {
        None => vec![ValidationError::UnknownDefaultVault {
            vault: default.clone(),
        }],
        Some(v) if v.status != VaultStatus::Active => vec![ValidationError::DefaultVaultNotActive {
            vault: default.clone(),
        }],
        Some(_) => vec![],
    }
}

/// Steps may only name declared vaults, and automatic deposits need a
/// default vault set before them.
pub fn check_step_references(scenario: &Scenario) -> Vec<ValidationError> {
    let statuses: HashMap<&str, VaultStatus> = scenario
        .vaults
        .iter()
        .map(|v| (v.name.as_str(), v.status))
        .collect();
    let mut has_default = scenario.default_vault.is_some();
    let mut errors = Vec::new();

    for (i, step) in scenario.steps.iter().enumerate() {
        let index = i + 1;
        let action = step.action.label();

        for vault in step.action.vault_refs() {
            if !statuses.contains_key(vault) {
                errors.push(ValidationError::UnknownVault {
                    step: index,
                    action,
                    vault: vault.to_string(),
                });
            }
        }

        match &step.action {
            StepAction::SetDefaultVault { .. } => has_default = true,
            StepAction::Deposit { .. } | StepAction::Mint { .. }
                if !has_default && step.expect_error.is_none() =>
            {
                errors.push(ValidationError::MissingDefaultVault {
                    step: index,
                    action,
                });
            }
            StepAction::SolverDeposit { legs, .. } if legs.is_empty() => {
                errors.push(ValidationError::EmptySolverLegs { step: index });
            }
            _ => {}
        }
    }

    errors
}
