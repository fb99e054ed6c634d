use alloy::primitives::{Address, U256};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("vault {vault} rejected the call: {reason}")]
    Rejected { vault: Address, reason: String },

    #[error("vault {vault} can release {available}, {requested} requested")]
    InsufficientLiquidity {
        vault: Address,
        requested: U256,
        available: U256,
    },

    #[error("vault {vault} arithmetic overflow")]
    Overflow { vault: Address },

    #[error("vault {vault} does not support {operation}")]
    Unsupported {
        vault: Address,
        operation: &'static str,
    },
}

/// Out-of-band venue conditions. Live adapters observe these on-chain; the
/// simulated venues accept them directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketEvent {
    /// The venue earned `assets` of yield.
    Accrue(U256),
    /// The venue lost up to `assets`.
    RealizeLoss(U256),
    /// Liquid assets the venue can release, drawn down by withdrawals
    /// (`None` = fully liquid).
    SetLiquidity(Option<U256>),
    /// The next deposit or withdrawal call fails.
    FailNext,
}

/// Capability interface between the router and one external strategy vault.
///
/// One implementation per vault type. All amounts are in base-asset units
/// except the share-equivalents returned by the previews.
pub trait VaultAdapter: Send + Sync {
    /// The vault this adapter fronts.
    fn vault(&self) -> Address;

    /// Base-asset value of the router's position.
    fn balance(&self) -> U256;

    /// Base-asset amount that can be withdrawn right now.
    fn max_withdrawable(&self) -> U256;

    /// Vault shares minted for depositing `assets`.
    fn preview_deposit(&self, assets: U256) -> Result<U256, AdapterError>;

    /// Vault shares burned to withdraw exactly `assets`.
    fn preview_withdraw(&self, assets: U256) -> Result<U256, AdapterError>;

    /// Move `assets` into the vault. Returns the amount actually accepted.
    fn deposit_assets(&mut self, assets: U256) -> Result<U256, AdapterError>;

    /// Pull `assets` out of the vault. Returns the amount actually returned.
    fn withdraw_assets(&mut self, assets: U256) -> Result<U256, AdapterError>;

    /// Copy of the adapter's current state, restored if a settlement fails.
    fn snapshot(&self) -> Box<dyn VaultAdapter>;

    /// Apply an external venue condition. Default: unsupported.
    fn apply_market_event(&mut self, _event: &MarketEvent) -> Result<(), AdapterError> {
        Err(AdapterError::Unsupported {
            vault: self.vault(),
            operation: "market events",
        })
    }
}
