//! Per-source rate limiter.
//!
//! A strict fixed-interval gate: at most one request per source key is let
//! through per window. The check-and-set for a key happens while that key's
//! entry is locked, so two concurrent requests can never both see *Idle*.
//! Different keys live in different shards and do not contend.

use crate::application::metrics::Metrics;
use crate::application::ports::Storage;
use crate::application::registry::GateRegistry;
use crate::domain::gate::{GateDecision, RateLimitEntry};
use std::time::Duration;
use tracing::debug;

/// Coordinates rate limiting decisions.
#[derive(Clone)]
pub struct RateLimiter<S>
where
    S: Storage<String, RateLimitEntry> + Clone,
{
    registry: GateRegistry<S>,
    metrics: Metrics,
}

impl<S> RateLimiter<S>
where
    S: Storage<String, RateLimitEntry> + Clone,
{
    /// Create a new rate limiter.
    ///
    /// # Arguments
    /// * `registry` - The gate registry (which contains the clock)
    /// * `metrics` - Metrics tracker
    pub fn new(registry: GateRegistry<S>, metrics: Metrics) -> Self {
        Self { registry, metrics }
    }

    /// Decide whether a request from `source_key` may proceed.
    ///
    /// Allowed requests start a new window for the key; rejected requests
    /// leave the key's state untouched.
    pub fn check(&self, source_key: &str, window: Duration) -> GateDecision {
        let decision = self
            .registry
            .with_entry(source_key, |entry, now| entry.register_request(now, window));

        match decision {
            GateDecision::Allow => self.metrics.record_allowed(),
            GateDecision::Reject => {
                debug!(source_key, window_ms = window.as_millis() as u64, "request rate limited");
                self.metrics.record_limited();
            }
        }

        decision
    }

    /// `true` if a request from `source_key` may proceed.
    pub fn allow(&self, source_key: &str, window: Duration) -> bool {
        self.check(source_key, window).is_allow()
    }

    /// Remove entries whose last allowed request is older than `retention`.
    ///
    /// Only bounds memory; a key removed here behaves exactly like a key whose
    /// window elapsed, provided `retention` is at least the largest window in use.
    ///
    /// Returns the number of entries removed.
    pub fn evict_stale(&self, retention: Duration) -> usize {
        let now = self.registry.now();
        let before = self.registry.len();
        let mut removed = 0usize;
        self.registry.cleanup(|_key, entry| {
            let keep = !entry.is_stale(now, retention);
            if !keep {
                removed += 1;
            }
            keep
        });

        if removed > 0 {
            self.metrics.record_evictions(removed as u64);
            debug!(removed, remaining = before.saturating_sub(removed), "evicted stale rate-limit entries");
        }
        removed
    }

    /// Get a reference to the registry.
    pub fn registry(&self) -> &GateRegistry<S> {
        &self.registry
    }

    /// Get a reference to the metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}
