use crate::model::Scenario;
use crate::model::amount::{BPS_SCALE, WAD, parse_amount};
use crate::model::scenario::{StepAction, VaultKind};

use super::ValidationError;

pub fn check_targets(scenario: &Scenario) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut total: u64 = 0;

    for vault in &scenario.vaults {
        if vault.target_bps > BPS_SCALE {
            errors.push(ValidationError::TargetOutOfRange {
                name: vault.name.clone(),
                target_bps: vault.target_bps,
            });
        }
        total += u64::from(vault.target_bps);

        if let VaultKind::Erc4626 {
            liquidity_cap: Some(cap),
            ..
        } = &vault.kind
        {
            if let Err(e) = parse_amount(cap) {
                errors.push(ValidationError::InvalidAmount {
                    location: format!("Vault `{}`", vault.name),
                    field: "liquidity_cap",
                    value: cap.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    if total > u64::from(BPS_SCALE) {
        errors.push(ValidationError::TargetsExceedScale { total });
    }
    errors
}

pub fn check_fees(scenario: &Scenario) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if scenario.withdrawal_fee_bps > BPS_SCALE {
        errors.push(ValidationError::InvalidFee {
            location: "Scenario".to_string(),
            bps: scenario.withdrawal_fee_bps,
        });
    }
    for (i, step) in scenario.steps.iter().enumerate() {
        if let StepAction::SetFee { bps } = step.action {
            if bps > BPS_SCALE && step.expect_error.is_none() {
                errors.push(ValidationError::InvalidFee {
                    location: format!("Step {}", i + 1),
                    bps,
                });
            }
        }
    }
    errors
}

/// Every amount string must parse. Ratios above 1e18 are flagged unless the
/// step expects the failure.
pub fn check_step_amounts(scenario: &Scenario) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for (i, step) in scenario.steps.iter().enumerate() {
        let index = i + 1;
        for (field, value) in step.action.amount_fields() {
            if let Err(e) = parse_amount(value) {
                errors.push(ValidationError::InvalidAmount {
                    location: format!("Step {index} ({})", step.action.label()),
                    field,
                    value: value.to_string(),
                    reason: e.to_string(),
                });
            }
        }

        if let StepAction::SetRatio { value } = &step.action {
            if step.expect_error.is_none() && parse_amount(value).is_ok_and(|v| v > WAD) {
                errors.push(ValidationError::RatioOutOfRange {
                    step: index,
                    value: value.clone(),
                });
            }
        }
    }

    errors
}
