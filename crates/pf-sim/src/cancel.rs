//! Cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cheap, clonable flag checked by the loop at phase boundaries.
///
/// Tripping it (typically from a Ctrl-C handler) makes the run discard the
/// current step's staged writes, flush statistics from the last committed
/// state, and return [`SimError::Cancelled`][crate::SimError::Cancelled].
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request graceful termination at the next phase boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
