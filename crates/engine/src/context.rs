//! Per-invocation context threaded through diff and executor calls.

use concord_state::EnvFile;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Explicit invocation state, constructed once per CLI run and passed down
/// the call chain. There is no global singleton to reset behind the
/// engine's back; `reset` is the one explicit re-arm point.
#[derive(Debug, Clone, Default)]
pub struct SyncContext {
    /// Secrets available to optional MCP servers.
    pub env: EnvFile,
    cancel: Arc<AtomicBool>,
}

impl SyncContext {
    pub fn new(env: EnvFile) -> Self {
        Self {
            env,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Requests cancellation. The executor honors this between artifacts,
    /// never mid-write.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Clears a previous cancellation so the context can drive another
    /// operation.
    pub fn reset(&self) {
        self.cancel.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_and_reset() {
        let ctx = SyncContext::default();
        assert!(!ctx.is_cancelled());
        ctx.cancel();
        assert!(ctx.is_cancelled());
        ctx.reset();
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn clones_share_the_cancel_flag() {
        let ctx = SyncContext::default();
        let clone = ctx.clone();
        ctx.cancel();
        assert!(clone.is_cancelled());
    }
}
