//! In-process strategy vaults used by the scenario runner and tests.

pub mod buffer;
pub mod erc4626;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub use buffer::IdleBuffer;
pub use erc4626::Erc4626Sim;

/// One-shot failure injector.
///
/// Shared between an adapter and its journal copies, so a rollback does not
/// re-arm a failure that already fired.
#[derive(Debug, Clone, Default)]
pub struct FailureSwitch(Arc<AtomicBool>);

impl FailureSwitch {
    pub fn arm(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_armed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns true, and disarms, if a failure was pending.
    pub fn fire(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}
