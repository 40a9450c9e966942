use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation for a running evolution.
///
/// Clones share the same flag. The orchestrating thread polls it between mating
/// couples; once raised, the current generation's rendezvous is completed, the
/// worker pool is stopped and the run returns `GeneticError::Interrupted`.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag {
    raised: Arc<AtomicBool>,
}

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the run to stop.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Lowers the flag so the owner can start another run.
    pub fn clear(&self) {
        self.raised.store(false, Ordering::SeqCst);
    }
}
