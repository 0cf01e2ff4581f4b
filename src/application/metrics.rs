//! Observability metrics for ranking and rate limiting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters shared by the limiter, the orchestrator and the sweeper.
///
/// All metrics use relaxed atomic operations; clones share the same counters.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    requests_allowed: AtomicU64,
    requests_limited: AtomicU64,
    entries_evicted: AtomicU64,
    votes_accepted: AtomicU64,
    votes_duplicate: AtomicU64,
    scores_recomputed: AtomicU64,
    update_conflicts: AtomicU64,
    sweeps_completed: AtomicU64,
}

impl Metrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    pub(crate) fn record_allowed(&self) {
        self.inner.requests_allowed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_limited(&self) {
        self.inner.requests_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_evictions(&self, count: u64) {
        self.inner.entries_evicted.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_vote_accepted(&self) {
        self.inner.votes_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_vote_duplicate(&self) {
        self.inner.votes_duplicate.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_recompute(&self) {
        self.inner.scores_recomputed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_conflict(&self) {
        self.inner.update_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sweep(&self) {
        self.inner.sweeps_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Requests let through by the rate limiter.
    pub fn requests_allowed(&self) -> u64 {
        self.inner.requests_allowed.load(Ordering::Relaxed)
    }

    /// Requests rejected by the rate limiter.
    pub fn requests_limited(&self) -> u64 {
        self.inner.requests_limited.load(Ordering::Relaxed)
    }

    /// Rate-limit entries removed by eviction or retention cleanup.
    pub fn entries_evicted(&self) -> u64 {
        self.inner.entries_evicted.load(Ordering::Relaxed)
    }

    /// Votes and verifications counted.
    pub fn votes_accepted(&self) -> u64 {
        self.inner.votes_accepted.load(Ordering::Relaxed)
    }

    /// Votes and verifications rejected as duplicates.
    pub fn votes_duplicate(&self) -> u64 {
        self.inner.votes_duplicate.load(Ordering::Relaxed)
    }

    /// Hype scores written.
    pub fn scores_recomputed(&self) -> u64 {
        self.inner.scores_recomputed.load(Ordering::Relaxed)
    }

    /// Optimistic writes that lost a race and were retried.
    pub fn update_conflicts(&self) -> u64 {
        self.inner.update_conflicts.load(Ordering::Relaxed)
    }

    /// Batch sweeps run to completion.
    pub fn sweeps_completed(&self) -> u64 {
        self.inner.sweeps_completed.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_allowed: self.requests_allowed(),
            requests_limited: self.requests_limited(),
            entries_evicted: self.entries_evicted(),
            votes_accepted: self.votes_accepted(),
            votes_duplicate: self.votes_duplicate(),
            scores_recomputed: self.scores_recomputed(),
            update_conflicts: self.update_conflicts(),
            sweeps_completed: self.sweeps_completed(),
        }
    }

    /// Reset all metrics to zero.
    pub fn reset(&self) {
        let inner = &self.inner;
        for counter in [
            &inner.requests_allowed,
            &inner.requests_limited,
            &inner.entries_evicted,
            &inner.votes_accepted,
            &inner.votes_duplicate,
            &inner.scores_recomputed,
            &inner.update_conflicts,
            &inner.sweeps_completed,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Requests let through by the rate limiter
    pub requests_allowed: u64,
    /// Requests rejected by the rate limiter
    pub requests_limited: u64,
    /// Rate-limit entries removed
    pub entries_evicted: u64,
    /// Votes counted
    pub votes_accepted: u64,
    /// Votes rejected as duplicates
    pub votes_duplicate: u64,
    /// Hype scores written
    pub scores_recomputed: u64,
    /// Optimistic write conflicts
    pub update_conflicts: u64,
    /// Completed sweeps
    pub sweeps_completed: u64,
}

impl MetricsSnapshot {
    /// Fraction of rate-limited requests (0.0 to 1.0), 0.0 with no traffic.
    pub fn limited_rate(&self) -> f64 {
        ratio(self.requests_limited, self.requests_allowed)
    }

    /// Fraction of duplicate votes (0.0 to 1.0), 0.0 with no votes.
    pub fn duplicate_rate(&self) -> f64 {
        ratio(self.votes_duplicate, self.votes_accepted)
    }

    /// Total requests seen by the rate limiter.
    pub fn total_requests(&self) -> u64 {
        self.requests_allowed.saturating_add(self.requests_limited)
    }
}

fn ratio(part: u64, rest: u64) -> f64 {
    let total = part.saturating_add(rest);
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}
