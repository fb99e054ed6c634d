pub mod amount;
pub mod scenario;
pub mod vault;

pub use amount::{BPS_SCALE, Rounding, WAD};
pub use scenario::Scenario;
pub use vault::{AdapterId, VaultConfig, VaultId, VaultStatus};
