pub mod state;

use std::path::Path;

use anyhow::{Result, bail};

use crate::model::amount::{WAD, format_units};

use state::PersistedState;

/// Entry point for the `state` command: summarize a saved state file.
pub fn show(path: &Path) -> Result<()> {
    let Some(state) = PersistedState::load(path)? else {
        bail!("no state file at {}", path.display());
    };
    let decimals = state.asset_decimals;

    println!("=== vault-router state ===");
    println!("File:         {}", path.display());
    match chrono::DateTime::from_timestamp(state.updated_at as i64, 0) {
        Some(ts) => println!("Updated:      {}", ts.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("Updated:      unknown"),
    }
    println!("Total supply: {}", format_units(state.total_supply, decimals));
    println!("Shortfall:    {}", format_units(state.shortfall, decimals));
    println!("Ratio:        {}", format_units(state.settlement_ratio, 18));
    println!("Fee:          {} bps (of 1,000,000)", state.withdrawal_fee_bps);
    if state.settlement_ratio.is_zero() {
        println!("Deposits:     halted (ratio 0)");
    } else if state.settlement_ratio < WAD {
        println!("Deposits:     open (haircut applied)");
    }
    println!();

    println!("Vaults ({}):", state.vaults.len());
    for (i, v) in state.vaults.iter().enumerate() {
        let marker = if state.default_vault == Some(v.config.vault) {
            " *"
        } else {
            ""
        };
        println!(
            "  {:>2}. {} {:<10} target {:>7} bps  balance {}{}",
            i + 1,
            v.config.vault,
            v.config.status.to_string(),
            v.config.target_bps,
            format_units(v.balance, decimals),
            marker
        );
    }
    println!();

    println!("Holders ({}):", state.balances.len());
    for b in &state.balances {
        println!("  {} {}", b.holder, format_units(b.shares, decimals));
    }
    Ok(())
}
