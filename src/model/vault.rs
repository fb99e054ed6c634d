use std::fmt;

use alloy::primitives::Address;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Strategy vault identity.
pub type VaultId = Address;

/// Key under which an adapter implementation is registered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct AdapterId(pub String);

impl AdapterId {
    pub fn new(id: impl Into<String>) -> Self {
        AdapterId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AdapterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AdapterId {
    fn from(value: &str) -> Self {
        AdapterId(value.to_string())
    }
}

/// Operational status of a configured vault.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VaultStatus {
    /// Receives deposits and is drawn from on withdrawals.
    #[default]
    Active,
    /// No new deposits; drawn only after every active vault is exhausted.
    Suspended,
    /// Balance treated as unrecoverable; never drawn until re-activated.
    Impaired,
}

impl VaultStatus {
    pub fn accepts_deposits(self) -> bool {
        matches!(self, VaultStatus::Active)
    }

    pub fn as_u8(self) -> u8 {
        match self {
            VaultStatus::Active => 0,
            VaultStatus::Suspended => 1,
            VaultStatus::Impaired => 2,
        }
    }
}

impl fmt::Display for VaultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VaultStatus::Active => "active",
            VaultStatus::Suspended => "suspended",
            VaultStatus::Impaired => "impaired",
        };
        f.write_str(s)
    }
}

/// Configuration of one strategy vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    #[serde(with = "address_hex")]
    pub vault: VaultId,
    pub adapter: AdapterId,
    /// Target share of total managed assets, parts per 1,000,000.
    pub target_bps: u32,
    #[serde(default)]
    pub status: VaultStatus,
}

impl VaultConfig {
    pub fn new(vault: VaultId, adapter: impl Into<String>, target_bps: u32, status: VaultStatus) -> Self {
        VaultConfig {
            vault,
            adapter: AdapterId::new(adapter),
            target_bps,
            status,
        }
    }
}

/// Serde adapter storing an `Address` as a checksummed hex string.
pub mod address_hex {
    use std::str::FromStr;

    use alloy::primitives::Address;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Address, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_checksum(None))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Address, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Address::from_str(raw.trim()).map_err(serde::de::Error::custom)
    }

    /// Same encoding for `Option<Address>`.
    pub mod option {
        use std::str::FromStr;

        use alloy::primitives::Address;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<Address>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(addr) => serializer.serialize_some(&addr.to_checksum(None)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Address>, D::Error> {
            let raw = Option::<String>::deserialize(deserializer)?;
            raw.map(|s| Address::from_str(s.trim()).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
