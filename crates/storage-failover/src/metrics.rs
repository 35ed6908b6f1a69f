//! Failover metrics.
//!
//! Counters are independent `AtomicU64`s updated with `Ordering::Relaxed`; a
//! [`snapshot`](FailoverMetrics::snapshot) may observe counters from slightly
//! different instants, which is fine for periodic telemetry.
//!
//! ```
//! use inferadb_common_storage_failover::FailoverMetrics;
//!
//! let metrics = FailoverMetrics::new();
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.requests, 0);
//! assert_eq!(snapshot.failover_rate(), 0.0);
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use crate::{request::RequestState, types::BackendRole};

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    primary_successes: AtomicU64,
    primary_failures: AtomicU64,
    failovers: AtomicU64,
    secondary_successes: AtomicU64,
    secondary_failures: AtomicU64,
}

/// Shared failover counters. Clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct FailoverMetrics {
    counters: Arc<Counters>,
}

/// Point-in-time copy of [`FailoverMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailoverMetricsSnapshot {
    /// Requests that were sent.
    pub requests: u64,
    /// Requests settled successfully by the primary.
    pub primary_successes: u64,
    /// Requests settled with a failure on the primary (not failed over).
    pub primary_failures: u64,
    /// Requests that failed over to the secondary.
    pub failovers: u64,
    /// Requests settled successfully by the secondary.
    pub secondary_successes: u64,
    /// Requests settled with a failure on the secondary.
    pub secondary_failures: u64,
}

impl FailoverMetricsSnapshot {
    /// Fraction of sent requests that failed over.
    #[must_use]
    pub fn failover_rate(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        self.failovers as f64 / self.requests as f64
    }
}

impl FailoverMetrics {
    /// Creates zeroed metrics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_request(&self) {
        self.counters.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failover(&self) {
        self.counters.failovers.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the terminal state of a request. Non-terminal states are ignored.
    pub(crate) fn record_settled(&self, state: RequestState) {
        let counter = match state {
            RequestState::Succeeded(BackendRole::Primary) => &self.counters.primary_successes,
            RequestState::Failed(BackendRole::Primary) => &self.counters.primary_failures,
            RequestState::Succeeded(BackendRole::Secondary) => &self.counters.secondary_successes,
            RequestState::Failed(BackendRole::Secondary) => &self.counters.secondary_failures,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a copy of the current counters.
    #[must_use]
    pub fn snapshot(&self) -> FailoverMetricsSnapshot {
        let c = &self.counters;
        FailoverMetricsSnapshot {
            requests: c.requests.load(Ordering::Relaxed),
            primary_successes: c.primary_successes.load(Ordering::Relaxed),
            primary_failures: c.primary_failures.load(Ordering::Relaxed),
            failovers: c.failovers.load(Ordering::Relaxed),
            secondary_successes: c.secondary_successes.load(Ordering::Relaxed),
            secondary_failures: c.secondary_failures.load(Ordering::Relaxed),
        }
    }

    /// Zeroes every counter.
    pub fn reset(&self) {
        let c = &self.counters;
        for counter in [
            &c.requests,
            &c.primary_successes,
            &c.primary_failures,
            &c.failovers,
            &c.secondary_successes,
            &c.secondary_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_settled_by_role() {
        let metrics = FailoverMetrics::new();
        metrics.record_request();
        metrics.record_settled(RequestState::Succeeded(BackendRole::Primary));
        metrics.record_request();
        metrics.record_failover();
        metrics.record_settled(RequestState::Failed(BackendRole::Secondary));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests, 2);
        assert_eq!(snapshot.primary_successes, 1);
        assert_eq!(snapshot.failovers, 1);
        assert_eq!(snapshot.secondary_failures, 1);
        assert_eq!(snapshot.secondary_successes, 0);
        assert!((snapshot.failover_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_non_terminal_states_ignored() {
        let metrics = FailoverMetrics::new();
        metrics.record_settled(RequestState::PrimarySent);
        metrics.record_settled(RequestState::FailoverTriggered);

        assert_eq!(metrics.snapshot(), FailoverMetricsSnapshot::default());
    }

    #[test]
    fn test_clones_share_counters_and_reset() {
        let metrics = FailoverMetrics::new();
        let clone = metrics.clone();
        clone.record_request();
        assert_eq!(metrics.snapshot().requests, 1);

        metrics.reset();
        assert_eq!(clone.snapshot(), FailoverMetricsSnapshot::default());
    }
}
