use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

/// Edge-triggered latch recording that the gateway session reached ready.
///
/// Flips false -> true at most once and never reverts. There are no
/// suspension semantics here; pollers pick their own retry cadence.
#[derive(Debug, Default)]
pub struct ReadinessGate {
    ready: AtomicBool,
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the session ready. Subsequent calls are no-ops.
    pub fn mark_ready(&self) {
        if self.ready.swap(true, Ordering::SeqCst) {
            debug!("readiness gate already open");
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}
