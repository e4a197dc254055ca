//! Relay session identity and live-session accounting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::observability::metrics;

/// Global atomic counter for session IDs.
static SESSION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a relay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn next() -> Self {
        Self(SESSION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "relay-{}", self.0)
    }
}

/// Counts live and finished relay sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionTracker {
    active: Arc<AtomicU64>,
    total: Arc<AtomicU64>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session. The returned guard unregisters it on drop.
    pub fn track(&self) -> SessionGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        self.total.fetch_add(1, Ordering::SeqCst);
        metrics::record_session_opened();
        SessionGuard {
            active: Arc::clone(&self.active),
            id: SessionId::next(),
            termination: "aborted",
        }
    }

    pub fn active(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }
}

/// Held by a session task for its whole lifetime.
#[derive(Debug)]
pub struct SessionGuard {
    active: Arc<AtomicU64>,
    id: SessionId,
    termination: &'static str,
}

impl SessionGuard {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Label reported when the guard drops.
    pub fn set_termination(&mut self, termination: &'static str) {
        self.termination = termination;
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        metrics::record_session_closed(self.termination);
        tracing::trace!(session_id = %self.id, termination = self.termination, "Session released");
    }
}
