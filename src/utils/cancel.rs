//! Cooperative cancellation shared between a caller and long-running fits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A flag that long loops (optimiser iterations, tree building, rollouts)
/// poll between units of work. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder of this flag to stop.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
