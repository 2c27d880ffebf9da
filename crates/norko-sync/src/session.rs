//! # Sync Session Guard
//!
//! Enforces at most one active sync pass and lets a `lost` connectivity event
//! abandon the running pass without cancelling its in-flight calls.
//!
//! ## State Word
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   AtomicU64:   [ epoch ........................................ | busy ] │
//! │                                                                  bit 0  │
//! │                                                                         │
//! │   try_begin   (e, 0) ──CAS──► (e, 1)      returns ActivePass{epoch: e}  │
//! │   drop pass   (e, 1) ──CAS──► (e, 0)      no-op if epoch moved on       │
//! │   abandon     (e, *) ───────► (e+1, 0)    old pass becomes stale        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A stale pass can never clear the flag of a newer pass because its release
//! CAS expects its own epoch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const BUSY: u64 = 1;

/// Process-wide single-pass guard.
#[derive(Debug, Default)]
pub struct SyncSession {
    state: AtomicU64,
}

impl SyncSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a current (non-abandoned) pass holds the session.
    pub fn in_progress(&self) -> bool {
        self.state.load(Ordering::Acquire) & BUSY == BUSY
    }

    /// Current epoch; bumps on every abandon.
    pub fn epoch(&self) -> u64 {
        self.state.load(Ordering::Acquire) >> 1
    }

    /// Starts a pass unless one is already running.
    pub fn try_begin(self: &Arc<Self>) -> Option<ActivePass> {
        let idle = self.state.load(Ordering::Acquire) & !BUSY;
        self.state
            .compare_exchange(idle, idle | BUSY, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ActivePass {
                session: Arc::clone(self),
                epoch: idle >> 1,
            })
    }

    /// Forces the session idle and makes any running pass stale.
    ///
    /// Returns true when a pass was running.
    pub fn abandon(&self) -> bool {
        let previous = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
                Some(((s >> 1) + 1) << 1)
            })
            .unwrap_or_else(|s| s);
        previous & BUSY == BUSY
    }
}

/// Ownership of the session for one pass. Dropping it releases the session.
#[derive(Debug)]
pub struct ActivePass {
    session: Arc<SyncSession>,
    epoch: u64,
}

impl ActivePass {
    /// False once the pass has been abandoned.
    pub fn is_current(&self) -> bool {
        self.session.epoch() == self.epoch
    }

    /// Releases the session; returns whether the pass was still current.
    pub fn finish(self) -> bool {
        self.is_current()
    }
}

impl Drop for ActivePass {
    fn drop(&mut self) {
        let busy = (self.epoch << 1) | BUSY;
        let _ = self.session.state.compare_exchange(
            busy,
            self.epoch << 1,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_pass_at_a_time() {
        let session = Arc::new(SyncSession::new());
        let pass = session.try_begin().unwrap();
        assert!(session.in_progress());
        assert!(session.try_begin().is_none());

        assert!(pass.finish());
        assert!(!session.in_progress());
        assert!(session.try_begin().is_some());
    }

    #[test]
    fn test_abandon_frees_session_and_marks_stale() {
        let session = Arc::new(SyncSession::new());
        let stale = session.try_begin().unwrap();

        assert!(session.abandon());
        assert!(!session.in_progress());
        assert!(!stale.is_current());

        let fresh = session.try_begin().unwrap();
        assert!(fresh.is_current());

        // The stale pass finishing must not release the fresh one.
        assert!(!stale.finish());
        assert!(session.in_progress());
        assert!(fresh.finish());
        assert!(!session.in_progress());
    }

    #[test]
    fn test_abandon_when_idle() {
        let session = Arc::new(SyncSession::new());
        assert!(!session.abandon());
        assert_eq!(session.epoch(), 1);
        assert!(session.try_begin().is_some());
    }
}
