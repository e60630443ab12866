//! Cooperative cancellation for a single query run.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared abort flag.
///
/// The caller sets it, the run polls it at block boundaries. Once set it
/// stays set; the run itself never writes to it. Clones share the same
/// flag.
#[derive(Clone, Debug, Default)]
pub struct AbortController {
    flag: Arc<AtomicBool>,
}

impl AbortController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the run to stop. Idempotent.
    pub fn abort(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Non-blocking poll of the flag.
    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
