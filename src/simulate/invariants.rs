use std::fmt;

use alloy::primitives::{Address, U256};

use crate::engine::token::ShareToken;
use crate::model::amount::WAD;
use crate::model::vault::VaultStatus;

/// A broken accounting invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub invariant: &'static str,
    pub detail: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.invariant, self.detail)
    }
}

fn violation(invariant: &'static str, detail: String) -> Violation {
    Violation { invariant, detail }
}

/// State that must survive a rejected call untouched.
#[derive(Debug, PartialEq, Eq)]
pub struct Fingerprint {
    supply: U256,
    total_assets: Option<U256>,
    balances: Vec<(Address, U256)>,
    allowances: Vec<((Address, Address), U256)>,
    vaults: Vec<(Address, U256, VaultStatus, u32)>,
    default_vault: Option<Address>,
    shortfall: U256,
    ratio: U256,
    fee: u32,
}

pub fn fingerprint(token: &ShareToken) -> Fingerprint {
    let router = token.router();
    Fingerprint {
        supply: token.total_supply(),
        total_assets: token.total_assets().ok(),
        balances: token.balances().iter().map(|(a, b)| (*a, *b)).collect(),
        allowances: token.allowances().iter().map(|(k, v)| (*k, *v)).collect(),
        vaults: router
            .registry()
            .entries()
            .map(|e| (e.config.vault, e.adapter().balance(), e.config.status, e.config.target_bps))
            .collect(),
        default_vault: router.registry().default_vault(),
        shortfall: router.current_shortfall(),
        ratio: router.settlement_ratio(),
        fee: token.withdrawal_fee_bps(),
    }
}

/// Check the global accounting invariants of a token.
///
/// A recorded shortfall above gross assets is a detected, blocking state and
/// not reported here; conversion-dependent checks are skipped while it lasts.
pub fn check(token: &ShareToken) -> Vec<Violation> {
    let mut out = Vec::new();
    let supply = token.total_supply();

    let summed = token
        .balances()
        .values()
        .try_fold(U256::ZERO, |acc, b| acc.checked_add(*b));
    if summed != Some(supply) {
        out.push(violation(
            "supply-balances",
            format!("total supply {supply}, balances sum to {summed:?}"),
        ));
    }

    let router = token.router();
    if router.settlement_ratio() > WAD {
        out.push(violation(
            "ratio-bound",
            format!("settlement ratio {} above 1e18", router.settlement_ratio()),
        ));
    }

    let gross = match router.total_managed_assets() {
        Ok(gross) => gross,
        Err(e) => {
            out.push(violation("gross-assets", e.to_string()));
            return out;
        }
    };
    match router.snapshot() {
        Ok(snapshot) if snapshot.total_assets != gross => out.push(violation(
            "snapshot-total",
            format!("snapshot total {} differs from gross {gross}", snapshot.total_assets),
        )),
        Ok(_) => {}
        Err(e) => out.push(violation("snapshot-total", e.to_string())),
    }

    if !router.ledger().is_consistent(gross) {
        return out;
    }
    let engine = match token.conversion() {
        Ok(engine) => engine,
        Err(e) => {
            out.push(violation("net-assets", e.to_string()));
            return out;
        }
    };
    let net = engine.net_total_assets;
    if net > gross {
        out.push(violation("net-below-gross", format!("net {net} above gross {gross}")));
    }

    // With no shares outstanding, any remaining assets are unclaimed.
    if !supply.is_zero() {
        match engine.assets_for(supply) {
            Ok(assets) if assets != net => out.push(violation(
                "share-price",
                format!("assets_for(total_supply) = {assets}, net total assets = {net}"),
            )),
            Ok(_) => {}
            Err(e) => out.push(violation("share-price", e.to_string())),
        }
    }

    let mut redeemable = U256::ZERO;
    for (holder, shares) in token.balances() {
        match engine.assets_for(*shares) {
            Ok(assets) => redeemable = redeemable.saturating_add(assets),
            Err(e) => out.push(violation("holder-value", format!("{holder}: {e}"))),
        }
    }
    if redeemable > net {
        out.push(violation(
            "holder-value",
            format!("holders can redeem {redeemable}, only {net} backs the supply"),
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::router::Router;

    #[test]
    fn test_empty_token_is_clean() {
        let token = ShareToken::new(Router::new(), 18);
        assert!(check(&token).is_empty());
    }
}
