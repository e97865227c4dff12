//! Per-session liveness flags shared by the reader and the heartbeat.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct Flags {
    heartbeat_failed: AtomicBool,
    connected: AtomicBool,
}

/// Shared liveness state for one session.
///
/// The heartbeat sets `heartbeat_failed`, the reader clears `connected` when
/// the peer goes away, and both poll [`Liveness::should_stop`]. A new
/// instance is created for every session, so a failure never leaks into the
/// next connection.
#[derive(Debug, Clone)]
pub struct Liveness {
    flags: Arc<Flags>,
}

impl Liveness {
    /// Fresh flags for a newly connected session.
    pub fn new() -> Self {
        Self {
            flags: Arc::new(Flags {
                heartbeat_failed: AtomicBool::new(false),
                connected: AtomicBool::new(true),
            }),
        }
    }

    /// Flag the session as dead from the heartbeat side.
    pub fn mark_failed(&self) {
        self.flags.heartbeat_failed.store(true, Ordering::SeqCst);
    }

    /// Clear a stale heartbeat failure after a successful send.
    pub fn clear_failed(&self) {
        self.flags.heartbeat_failed.store(false, Ordering::SeqCst);
    }

    /// Whether the heartbeat has declared the session dead.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.flags.heartbeat_failed.load(Ordering::SeqCst)
    }

    /// Record that the peer closed the connection.
    pub fn mark_closed(&self) {
        self.flags.connected.store(false, Ordering::SeqCst);
    }

    /// Whether the socket is still believed to be open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.flags.connected.load(Ordering::SeqCst)
    }

    /// Termination check shared by the reader and the heartbeat.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        !self.is_connected() || self.is_failed()
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}
