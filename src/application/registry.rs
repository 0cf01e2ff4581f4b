//! Registry of per-source gate state.
//!
//! The registry owns the rate-limit entries for every source key. It is
//! injected into the limiter rather than living in global state, and it is
//! the only place entries are created, mutated or removed.

use crate::application::ports::{Clock, Storage};
use crate::domain::gate::RateLimitEntry;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Registry managing all rate-limit entries.
///
/// Generic over the storage implementation. In production, use
/// `Arc<ShardedStorage<String, RateLimitEntry>>`.
#[derive(Clone)]
pub struct GateRegistry<S>
where
    S: Storage<String, RateLimitEntry> + Clone,
{
    storage: S,
    clock: Arc<dyn Clock>,
}

impl<S> GateRegistry<S>
where
    S: Storage<String, RateLimitEntry> + Clone,
{
    /// Create a new registry with storage and clock.
    pub fn new(storage: S, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// Access or create the entry for `source_key` with a callback.
    ///
    /// The callback receives the entry and the current time while the entry
    /// is locked, so concurrent calls for the same key are serialized.
    pub fn with_entry<F, R>(&self, source_key: &str, f: F) -> R
    where
        F: FnOnce(&mut RateLimitEntry, DateTime<Utc>) -> R,
    {
        let now = self.clock.now();
        self.storage.with_entry_mut(
            source_key.to_string(),
            RateLimitEntry::idle,
            |entry| f(entry, now),
        )
    }

    /// Current time according to the registry's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Get the number of tracked source keys.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Clear all tracked state.
    pub fn clear(&self) {
        self.storage.clear();
    }

    /// Iterate over all entries with a callback.
    pub fn for_each<F>(&self, f: F)
    where
        F: FnMut(&String, &RateLimitEntry),
    {
        self.storage.for_each(f);
    }

    /// Keep only entries for which the predicate returns true.
    pub fn cleanup<F>(&self, f: F)
    where
        F: FnMut(&String, &mut RateLimitEntry) -> bool,
    {
        self.storage.retain(f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mocks::MockClock;
    use crate::infrastructure::storage::ShardedStorage;
    use std::time::Duration;

    fn registry() -> (GateRegistry<Arc<ShardedStorage<String, RateLimitEntry>>>, MockClock) {
        let clock = MockClock::new(Utc::now());
        let registry = GateRegistry::new(Arc::new(ShardedStorage::new()), Arc::new(clock.clone()));
        (registry, clock)
    }

    #[test]
    fn test_registry_creation() {
        let (registry, _) = registry();
        assert_eq!(registry.len(), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_with_entry_creates_idle_entry() {
        let (registry, _) = registry();

        registry.with_entry("10.0.0.1", |entry, _now| {
            assert_eq!(entry.last_allowed_at, None);
        });

        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_with_entry_sees_clock_time() {
        let (registry, clock) = registry();
        let window = Duration::from_secs(10);

        registry.with_entry("k", |entry, now| entry.register_request(now, window));
        clock.advance(Duration::from_secs(3));

        let last = registry.with_entry("k", |entry, now| {
            assert!(entry.is_cooling(now, window));
            entry.last_allowed_at
        });
        assert_eq!(last, Some(clock.now() - chrono::Duration::seconds(3)));
    }

    #[test]
    fn test_cleanup_and_clear() {
        let (registry, _) = registry();
        for i in 0..10 {
            registry.with_entry(&format!("key-{i}"), |_entry, _now| {});
        }
        assert_eq!(registry.len(), 10);

        registry.cleanup(|key, _| key.ends_with('3'));
        assert_eq!(registry.len(), 1);

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_access() {
        use std::thread;

        let (registry, _) = registry();
        let registry = Arc::new(registry);
        let mut handles = vec![];

        for i in 0..10 {
            let registry_clone = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    registry_clone.with_entry(&format!("src_{i}_{j}"), |_entry, _now| {});
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 1000);
    }
}
