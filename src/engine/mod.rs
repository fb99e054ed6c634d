//! Routing and share accounting.
//!
//! [`token::ShareToken`] is the entry point. It owns a [`router::Router`],
//! which owns the vault registry, the shortfall ledger and every adapter.

pub mod adapter;
pub mod conversion;
pub mod events;
pub mod ledger;
pub mod registry;
pub mod router;
pub mod selector;
pub mod token;

pub use adapter::{AdapterError, MarketEvent, VaultAdapter};
pub use conversion::{ConversionEngine, ConversionError};
pub use events::Event;
pub use ledger::{LedgerError, ShortfallLedger};
pub use registry::{AdapterBook, RegistryError, VaultRegistry};
pub use router::{Router, RouterError, Settlement, SettlementPhase};
pub use selector::{AllocationSnapshot, DepositRequest, SelectionError, WithdrawalPlan};
pub use token::{ShareToken, TokenParts, VaultError};
