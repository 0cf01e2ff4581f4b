//! LRU (Least Recently Used) eviction adapter.
//!
//! Implements the `EvictionPolicy` port so the rate-limit storage can cap
//! the number of tracked sources without changing any allow/reject outcome.

use crate::application::ports::{Clock, EvictionCandidate, EvictionPolicy};
use crate::domain::gate::RateLimitEntry;
use std::sync::Arc;

/// LRU eviction policy with entry count limit.
///
/// Evicts the least recently accessed entry when the limit is reached, but
/// only among entries whose own window has elapsed. When every tracked key
/// is still cooling nothing is evicted and the map grows past the limit
/// until retention cleanup catches up.
#[derive(Debug, Clone)]
pub struct LruEviction {
    max_entries: usize,
    clock: Arc<dyn Clock>,
}

impl LruEviction {
    /// Create a new LRU eviction policy with the given entry limit.
    pub fn new(max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self { max_entries, clock }
    }

    /// Configured entry limit.
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}

impl<K> EvictionPolicy<K, RateLimitEntry> for LruEviction
where
    K: Clone,
{
    fn select_victim(&self, candidates: &[EvictionCandidate<K, RateLimitEntry>]) -> Option<K> {
        let now = self.clock.now();
        candidates
            .iter()
            .filter(|candidate| !candidate.value.holds_window(now))
            .min_by_key(|candidate| candidate.last_access)
            .map(|candidate| candidate.key.clone())
    }

    fn is_evictable(&self, candidate: &EvictionCandidate<K, RateLimitEntry>) -> bool {
        !candidate.value.holds_window(self.clock.now())
    }

    fn should_evict(&self, current_entries: usize) -> bool {
        current_entries >= self.max_entries
    }
}
