//! Server counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters updated by connection tasks
#[derive(Debug, Default)]
pub struct ServerStats {
    accepted: AtomicU64,
    closed: AtomicU64,
    dispatched: AtomicU64,
    handler_failures: AtomicU64,
    io_errors: AtomicU64,
}

/// Point-in-time copy of [`ServerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Connections accepted by the listener
    pub accepted: u64,

    /// Connections that reached the Closed state
    pub closed: u64,

    /// Command sequences passed to the handler
    pub dispatched: u64,

    /// Handler calls that returned an error
    pub handler_failures: u64,

    /// Connections ended by an I/O or framing error
    pub io_errors: u64,
}

impl ServerStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            accepted: self.accepted.load(Ordering::Acquire),
            closed: self.closed.load(Ordering::Acquire),
            dispatched: self.dispatched.load(Ordering::Acquire),
            handler_failures: self.handler_failures.load(Ordering::Acquire),
            io_errors: self.io_errors.load(Ordering::Acquire),
        }
    }

    pub(crate) fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_closed(&self) {
        self.closed.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_handler_failure(&self) {
        self.handler_failures.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_io_error(&self) {
        self.io_errors.fetch_add(1, Ordering::AcqRel);
    }
}

impl StatsSnapshot {
    /// Connections still open
    pub fn in_flight(&self) -> u64 {
        self.accepted.saturating_sub(self.closed)
    }
}
