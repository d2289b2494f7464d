//! Delivery accounting shared by every pipeline stage.
//!
//! Each accepted event ends in exactly one terminal counter, so once the
//! pipeline is idle:
//!
//! ```text
//! accepted == delivered + malformed + rejected + undeliverable + exhausted + abandoned
//! ```
//!
//! `retried` counts resubmissions and is not terminal.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Pipeline counters (all values use relaxed atomics).
#[derive(Debug, Default)]
pub struct ForwarderStats {
    accepted: AtomicU64,
    delivered: AtomicU64,
    retried: AtomicU64,
    malformed: AtomicU64,
    rejected: AtomicU64,
    undeliverable: AtomicU64,
    exhausted: AtomicU64,
    abandoned: AtomicU64,
}

impl ForwarderStats {
    pub(crate) fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self, count: usize) {
        self.delivered.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_malformed(&self, count: usize) {
        self.malformed.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self, count: usize) {
        self.rejected.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_undeliverable(&self, count: usize) {
        self.undeliverable.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_exhausted(&self) {
        self.exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_abandoned(&self, count: usize) {
        self.abandoned.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Captures a point-in-time snapshot of the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            undeliverable: self.undeliverable.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
        }
    }
}

/// Plain data representation of [`ForwarderStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Events that entered the queue from a producer.
    pub accepted: u64,
    /// Events the collector answered 200 for.
    pub delivered: u64,
    /// Resubmissions after a network failure.
    pub retried: u64,
    /// Events whose record could not be encoded or decoded.
    pub malformed: u64,
    /// Events in batches the collector answered with a non-200 status.
    pub rejected: u64,
    /// Events in batches whose request could not be issued at all.
    pub undeliverable: u64,
    /// Events discarded after using up their retry budget.
    pub exhausted: u64,
    /// Events that could not re-enter the queue because it was closed.
    pub abandoned: u64,
}

impl StatsSnapshot {
    /// Events that reached a terminal outcome.
    #[must_use]
    pub fn settled(&self) -> u64 {
        self.delivered
            + self.malformed
            + self.rejected
            + self.undeliverable
            + self.exhausted
            + self.abandoned
    }

    /// Events accepted but not settled yet (buffered or in flight).
    #[must_use]
    pub fn pending(&self) -> u64 {
        self.accepted.saturating_sub(self.settled())
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "accepted={}, delivered={}, retried={}, malformed={}, rejected={}, undeliverable={}, exhausted={}, abandoned={}",
            self.accepted,
            self.delivered,
            self.retried,
            self.malformed,
            self.rejected,
            self.undeliverable,
            self.exhausted,
            self.abandoned
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_starts_at_zero() {
        let stats = ForwarderStats::default();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_settled_and_pending() {
        let stats = ForwarderStats::default();
        for _ in 0..10 {
            stats.record_accepted();
        }
        stats.record_delivered(4);
        stats.record_rejected(2);
        stats.record_malformed(1);
        stats.record_exhausted();
        stats.record_retried();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.settled(), 8);
        assert_eq!(snapshot.pending(), 2);
        assert_eq!(snapshot.retried, 1);
    }

    #[test]
    fn test_display() {
        let snapshot = StatsSnapshot {
            accepted: 3,
            delivered: 3,
            ..Default::default()
        };
        let text = snapshot.to_string();
        assert!(text.starts_with("accepted=3, delivered=3"));
        assert!(text.ends_with("abandoned=0"));
    }
}
