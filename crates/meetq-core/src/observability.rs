//! Worker counters and tracing setup.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Snapshot of a worker's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCounts {
    /// Receive calls that returned (empty batches included).
    pub polls: u64,
    /// Messages (or in-process jobs) taken for processing.
    pub received: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub poisoned: u64,
    pub renewals: u64,
    pub deleted: u64,
    pub transport_errors: u64,
}

/// Live counters shared between a worker and its per-message tasks.
#[derive(Debug, Default)]
pub struct WorkerStats {
    polls: AtomicU64,
    received: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    poisoned: AtomicU64,
    renewals: AtomicU64,
    deleted: AtomicU64,
    transport_errors: AtomicU64,
}

impl WorkerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_poll(&self, received: usize) {
        self.polls.fetch_add(1, Ordering::Relaxed);
        self.received.fetch_add(received as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_poisoned(&self) {
        self.poisoned.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_renewal(&self) {
        self.renewals.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deleted(&self) {
        self.deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> WorkerCounts {
        WorkerCounts {
            polls: self.polls.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            poisoned: self.poisoned.load(Ordering::Relaxed),
            renewals: self.renewals.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
        }
    }
}

/// Install the process-wide tracing subscriber.
///
/// Filter comes from `RUST_LOG` (default `info`). Safe to call more than once;
/// later calls are no-ops.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_events() {
        let stats = WorkerStats::new();
        stats.record_poll(3);
        stats.record_poll(0);
        stats.record_success();
        stats.record_failure();
        stats.record_renewal();
        stats.record_renewal();
        stats.record_deleted();

        let counts = stats.snapshot();
        assert_eq!(counts.polls, 2);
        assert_eq!(counts.received, 3);
        assert_eq!(counts.succeeded, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.renewals, 2);
        assert_eq!(counts.deleted, 1);
        assert_eq!(counts.poisoned, 0);
    }

    #[test]
    fn init_tracing_can_run_twice() {
        init_tracing(false);
        init_tracing(true);
    }
}
