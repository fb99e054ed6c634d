use std::collections::{HashMap, HashSet};

use alloy::primitives::{Address, U256};
use thiserror::Error;
use tracing::info;

use crate::model::amount::BPS_SCALE;
use crate::model::vault::{AdapterId, VaultConfig, VaultStatus};

use super::adapter::VaultAdapter;
use super::selector::VaultReading;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("InvalidVaultConfig: vault {vault}: {reason}")]
    InvalidVaultConfig { vault: Address, reason: String },

    #[error("adapter `{0}` is not registered")]
    UnknownAdapter(AdapterId),

    #[error("adapter `{0}` is already registered")]
    DuplicateAdapter(AdapterId),

    #[error("adapter `{adapter}` fronts vault {actual}, not {expected}")]
    AdapterMismatch {
        adapter: AdapterId,
        expected: Address,
        actual: Address,
    },

    #[error("target allocations sum to {total} bps, above 1,000,000")]
    TargetsExceedScale { total: u64 },

    #[error("vault {0} is not configured")]
    UnknownVault(Address),

    #[error("default deposit vault {vault} must be active, is {status}")]
    DefaultVaultNotActive { vault: Address, status: VaultStatus },

    #[error("managed asset total overflowed")]
    Overflow,
}

/// Adapter implementations keyed by id, handed to the registry at startup.
pub type AdapterBook = Vec<(AdapterId, Box<dyn VaultAdapter>)>;

/// A configured vault with its bound adapter.
pub struct VaultEntry {
    pub config: VaultConfig,
    /// Position in registration order. Never changes.
    pub index: usize,
    adapter: Box<dyn VaultAdapter>,
}

impl VaultEntry {
    pub fn adapter(&self) -> &dyn VaultAdapter {
        self.adapter.as_ref()
    }
}

/// Configured strategy vaults, their adapters, targets and status.
///
/// Adapters are registered unbound under an [`AdapterId`]; configuring a
/// vault binds the adapter to it. Entries are never removed.
#[derive(Default)]
pub struct VaultRegistry {
    entries: Vec<VaultEntry>,
    unbound: HashMap<AdapterId, Box<dyn VaultAdapter>>,
    default_vault: Option<Address>,
}

impl VaultRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make an adapter implementation available for binding.
    pub fn register_adapter(
        &mut self,
        id: AdapterId,
        adapter: Box<dyn VaultAdapter>,
    ) -> Result<(), RegistryError> {
        let bound = self.entries.iter().any(|e| e.config.adapter == id);
        if bound || self.unbound.contains_key(&id) {
            return Err(RegistryError::DuplicateAdapter(id));
        }
        self.unbound.insert(id, adapter);
        Ok(())
    }

    /// Create or update vault configurations as one batch.
    ///
    /// The whole batch is validated before anything is applied. An existing
    /// vault may switch adapters only while its current adapter holds no
    /// balance; the released adapter returns to the unbound set.
    pub fn set_vault_configs(&mut self, configs: &[VaultConfig]) -> Result<(), RegistryError> {
        self.validate_batch(configs)?;

        for config in configs {
            match self.position(config.vault) {
                Some(pos) => {
                    let entry = &mut self.entries[pos];
                    if entry.config.adapter != config.adapter {
                        let Some(next) = self.unbound.remove(&config.adapter) else {
                            return Err(RegistryError::UnknownAdapter(config.adapter.clone()));
                        };
                        let previous = std::mem::replace(&mut entry.adapter, next);
                        self.unbound.insert(entry.config.adapter.clone(), previous);
                    }
                    entry.config = config.clone();
                }
                None => {
                    let Some(adapter) = self.unbound.remove(&config.adapter) else {
                        return Err(RegistryError::UnknownAdapter(config.adapter.clone()));
                    };
                    let index = self.entries.len();
                    self.entries.push(VaultEntry {
                        config: config.clone(),
                        index,
                        adapter,
                    });
                }
            }
            info!(
                vault = %config.vault,
                adapter = %config.adapter,
                target_bps = config.target_bps,
                status = %config.status,
                "vault configured"
            );
        }
        Ok(())
    }

    fn validate_batch(&self, configs: &[VaultConfig]) -> Result<(), RegistryError> {
        let mut seen_vaults = HashSet::new();
        let mut seen_adapters = HashSet::new();

        for config in configs {
            if config.target_bps > BPS_SCALE {
                return Err(RegistryError::InvalidVaultConfig {
                    vault: config.vault,
                    reason: format!("target {} bps above 1,000,000", config.target_bps),
                });
            }
            if !seen_vaults.insert(config.vault) {
                return Err(RegistryError::InvalidVaultConfig {
                    vault: config.vault,
                    reason: "configured twice in one batch".to_string(),
                });
            }
            if !seen_adapters.insert(config.adapter.clone()) {
                return Err(RegistryError::InvalidVaultConfig {
                    vault: config.vault,
                    reason: format!("adapter `{}` used twice in one batch", config.adapter),
                });
            }

            let existing = self.get(config.vault);
            let keeps_adapter = existing.is_some_and(|e| e.config.adapter == config.adapter);
            if keeps_adapter {
                continue;
            }

            // Adapters are released by rebinding their vault in an earlier batch.
            if let Some(other) = self
                .entries
                .iter()
                .find(|e| e.config.adapter == config.adapter)
            {
                return Err(RegistryError::InvalidVaultConfig {
                    vault: config.vault,
                    reason: format!(
                        "adapter `{}` is bound to vault {}",
                        config.adapter, other.config.vault
                    ),
                });
            }

            let adapter = self
                .unbound
                .get(&config.adapter)
                .ok_or_else(|| RegistryError::UnknownAdapter(config.adapter.clone()))?;
            if adapter.vault() != config.vault {
                return Err(RegistryError::AdapterMismatch {
                    adapter: config.adapter.clone(),
                    expected: config.vault,
                    actual: adapter.vault(),
                });
            }

            if let Some(entry) = existing {
                let held = entry.adapter.balance();
                if !held.is_zero() {
                    return Err(RegistryError::InvalidVaultConfig {
                        vault: config.vault,
                        reason: format!("cannot switch adapters while holding {held}"),
                    });
                }
            }
        }

        let total: u64 = self
            .entries
            .iter()
            .filter(|e| !seen_vaults.contains(&e.config.vault))
            .map(|e| u64::from(e.config.target_bps))
            .chain(configs.iter().map(|c| u64::from(c.target_bps)))
            .sum();
        if total > u64::from(BPS_SCALE) {
            return Err(RegistryError::TargetsExceedScale { total });
        }

        Ok(())
    }

    pub fn set_default_vault(&mut self, vault: Address) -> Result<Option<Address>, RegistryError> {
        let entry = self.get(vault).ok_or(RegistryError::UnknownVault(vault))?;
        if !entry.config.status.accepts_deposits() {
            return Err(RegistryError::DefaultVaultNotActive {
                vault,
                status: entry.config.status,
            });
        }
        Ok(self.default_vault.replace(vault))
    }

    /// Reinstate a persisted default vault. Only existence is checked; the
    /// vault may have been suspended after it became the default.
    pub(crate) fn restore_default_vault(&mut self, vault: Address) -> Result<(), RegistryError> {
        self.get(vault).ok_or(RegistryError::UnknownVault(vault))?;
        self.default_vault = Some(vault);
        Ok(())
    }

    pub fn default_vault(&self) -> Option<Address> {
        self.default_vault
    }

    pub fn entries(&self) -> impl Iterator<Item = &VaultEntry> {
        self.entries.iter()
    }

    pub fn get(&self, vault: Address) -> Option<&VaultEntry> {
        self.entries.iter().find(|e| e.config.vault == vault)
    }

    fn position(&self, vault: Address) -> Option<usize> {
        self.entries.iter().position(|e| e.config.vault == vault)
    }

    pub fn adapter(&self, vault: Address) -> Option<&dyn VaultAdapter> {
        self.get(vault).map(|e| e.adapter.as_ref())
    }

    pub fn adapter_mut(&mut self, vault: Address) -> Option<&mut (dyn VaultAdapter + 'static)> {
        self.entries
            .iter_mut()
            .find(|e| e.config.vault == vault)
            .map(|e| e.adapter.as_mut())
    }

    /// Swap in a previously saved adapter state.
    pub(crate) fn restore_adapter(&mut self, vault: Address, adapter: Box<dyn VaultAdapter>) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.config.vault == vault) {
            entry.adapter = adapter;
        }
    }

    /// Sum of adapter-reported balances across every configured vault.
    pub fn gross_total_assets(&self) -> Result<U256, RegistryError> {
        self.entries.iter().try_fold(U256::ZERO, |acc, e| {
            acc.checked_add(e.adapter.balance())
                .ok_or(RegistryError::Overflow)
        })
    }

    /// Live readings for building an allocation snapshot.
    pub fn readings(&self) -> Vec<VaultReading> {
        self.entries
            .iter()
            .map(|e| VaultReading {
                vault: e.config.vault,
                index: e.index,
                status: e.config.status,
                target_bps: e.config.target_bps,
                balance: e.adapter.balance(),
                max_withdrawable: e.adapter.max_withdrawable(),
            })
            .collect()
    }
}
