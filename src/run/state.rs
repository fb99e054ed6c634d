use std::collections::BTreeMap;
use std::path::Path;

use alloy::primitives::{Address, U256};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::engine::ledger::ShortfallLedger;
use crate::engine::registry::AdapterBook;
use crate::engine::router::Router;
use crate::engine::token::{ShareToken, TokenParts};
use crate::model::amount::{WAD, u256_dec};
use crate::model::vault::{VaultConfig, address_hex};

/// Durable router and token state, saved as JSON between runs.
///
/// Adapter positions live in the external vaults; `balance` is recorded for
/// inspection only and is not used when restoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Vault configurations in registration order.
    pub vaults: Vec<PersistedVault>,
    #[serde(default, with = "address_hex::option", skip_serializing_if = "Option::is_none")]
    pub default_vault: Option<Address>,
    #[serde(with = "u256_dec")]
    pub shortfall: U256,
    #[serde(with = "u256_dec", default = "default_ratio")]
    pub settlement_ratio: U256,
    #[serde(default)]
    pub withdrawal_fee_bps: u32,
    #[serde(default = "default_decimals")]
    pub asset_decimals: u8,
    #[serde(with = "u256_dec")]
    pub total_supply: U256,
    #[serde(default)]
    pub balances: Vec<HolderBalance>,
    #[serde(default)]
    pub allowances: Vec<AllowanceEntry>,
    /// Unix timestamp of the last save.
    #[serde(default)]
    pub updated_at: u64,
}

fn default_ratio() -> U256 {
    WAD
}

fn default_decimals() -> u8 {
    18
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedVault {
    #[serde(flatten)]
    pub config: VaultConfig,
    #[serde(with = "u256_dec")]
    pub balance: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolderBalance {
    #[serde(with = "address_hex")]
    pub holder: Address,
    #[serde(with = "u256_dec")]
    pub shares: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceEntry {
    #[serde(with = "address_hex")]
    pub owner: Address,
    #[serde(with = "address_hex")]
    pub spender: Address,
    #[serde(with = "u256_dec")]
    pub value: U256,
}

impl PersistedState {
    /// Capture the current state of a token.
    pub fn capture(token: &ShareToken) -> Self {
        let router = token.router();
        let vaults = router
            .registry()
            .entries()
            .map(|e| PersistedVault {
                config: e.config.clone(),
                balance: e.adapter().balance(),
            })
            .collect();

        PersistedState {
            vaults,
            default_vault: router.registry().default_vault(),
            shortfall: router.current_shortfall(),
            settlement_ratio: router.settlement_ratio(),
            withdrawal_fee_bps: token.withdrawal_fee_bps(),
            asset_decimals: token.asset_decimals(),
            total_supply: token.total_supply(),
            balances: token
                .balances()
                .iter()
                .map(|(holder, shares)| HolderBalance {
                    holder: *holder,
                    shares: *shares,
                })
                .collect(),
            allowances: token
                .allowances()
                .iter()
                .map(|((owner, spender), value)| AllowanceEntry {
                    owner: *owner,
                    spender: *spender,
                    value: *value,
                })
                .collect(),
            updated_at: chrono::Utc::now().timestamp() as u64,
        }
    }

    /// Rebuild a token on top of live adapters.
    ///
    /// Every adapter referenced by a vault config must be in `adapters`.
    pub fn restore(&self, adapters: AdapterBook) -> Result<ShareToken> {
        let ledger = ShortfallLedger::from_parts(self.shortfall, self.settlement_ratio)
            .context("restoring settlement ledger")?;
        let mut router = Router::with_ledger(ledger);
        for (id, adapter) in adapters {
            router
                .register_adapter(id.clone(), adapter)
                .with_context(|| format!("registering adapter `{id}`"))?;
        }

        let configs: Vec<VaultConfig> = self.vaults.iter().map(|v| v.config.clone()).collect();
        router
            .set_vault_configs(&configs)
            .context("restoring vault configs")?;
        if let Some(vault) = self.default_vault {
            router
                .restore_default_vault(vault)
                .context("restoring default vault")?;
        }

        let balances: BTreeMap<Address, U256> = self
            .balances
            .iter()
            .filter(|b| !b.shares.is_zero())
            .map(|b| (b.holder, b.shares))
            .collect();
        let allowances = self
            .allowances
            .iter()
            .map(|a| ((a.owner, a.spender), a.value))
            .collect();

        let token = ShareToken::from_parts(TokenParts {
            router,
            asset_decimals: self.asset_decimals,
            withdrawal_fee_bps: self.withdrawal_fee_bps,
            balances,
            allowances,
        })
        .context("restoring share token")?;

        if token.total_supply() != self.total_supply {
            bail!(
                "state file total_supply {} does not match summed balances {}",
                self.total_supply,
                token.total_supply()
            );
        }
        Ok(token)
    }

    /// Load state from file, or `None` if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path).context("reading state file")?;
        let state: PersistedState = serde_json::from_str(&contents).context("parsing state file")?;
        Ok(Some(state))
    }

    /// Save state to file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).context("writing state file")?;
        Ok(())
    }
}
