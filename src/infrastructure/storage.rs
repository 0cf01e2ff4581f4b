//! Storage implementations for rate-limit state.
//!
//! Provides concurrent, sharded storage for per-source gate entries, with an
//! optional bound on the number of tracked keys.

use crate::application::metrics::Metrics;
use crate::application::ports::{EvictionCandidate, EvictionPolicy, Storage};
use dashmap::DashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

/// Number of evictable entries inspected when choosing an eviction victim.
const EVICTION_SAMPLE_SIZE: usize = 16;

#[derive(Debug, Clone)]
struct Slot<V> {
    value: V,
    last_access: Instant,
}

/// Thread-safe sharded storage backed by DashMap.
///
/// DashMap locks one shard per write, so updates for unrelated keys do not
/// contend. `with_entry_mut` holds the key's shard lock for the whole
/// accessor, which makes read-then-write sequences atomic per key.
pub struct ShardedStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    map: DashMap<K, Slot<V>>,
    eviction: Option<Arc<dyn EvictionPolicy<K, V>>>,
    metrics: Option<Metrics>,
}

impl<K, V> ShardedStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create a new, unbounded sharded storage instance.
    pub fn new() -> Self {
        Self {
            map: DashMap::new(),
            eviction: None,
            metrics: None,
        }
    }

    /// Bound the storage with an eviction policy consulted before each new key.
    pub fn with_eviction(mut self, policy: Arc<dyn EvictionPolicy<K, V>>) -> Self {
        self.eviction = Some(policy);
        self
    }

    /// Count evictions in `metrics`.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Insert or update a value.
    pub fn insert(&self, key: K, value: V) {
        self.map.insert(
            key,
            Slot {
                value,
                last_access: Instant::now(),
            },
        );
    }

    /// Check if a key exists.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }

    /// Remove a key and return its value.
    pub fn remove<Q>(&self, key: &Q) -> Option<(K, V)>
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.remove(key).map(|(k, slot)| (k, slot.value))
    }

    /// Get the number of entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if the storage is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.map.clear();
    }
}

impl<K, V> ShardedStorage<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Get a copy of a value.
    pub fn get_cloned<Q>(&self, key: &Q) -> Option<V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.get(key).map(|slot| slot.value.clone())
    }

    /// Make room for one more key if the eviction policy asks for it.
    fn evict_if_needed(&self) {
        let Some(policy) = &self.eviction else {
            return;
        };
        if !policy.should_evict(self.map.len()) {
            return;
        }

        // The iterator holds shard read locks; it must be dropped before removing.
        let candidates: Vec<EvictionCandidate<K, V>> = self
            .map
            .iter()
            .map(|entry| EvictionCandidate {
                key: entry.key().clone(),
                value: entry.value().value.clone(),
                last_access: entry.value().last_access,
            })
            .filter(|candidate| policy.is_evictable(candidate))
            .take(EVICTION_SAMPLE_SIZE)
            .collect();

        if candidates.is_empty() {
            trace!(len = self.map.len(), "no evictable entry, growing past the cap");
            return;
        }

        if let Some(victim) = policy.select_victim(&candidates) {
            if self.map.remove(&victim).is_some() {
                trace!(sampled = candidates.len(), "evicted entry to make room");
                if let Some(metrics) = &self.metrics {
                    metrics.record_evictions(1);
                }
            }
        }
    }
}

impl<K, V> Default for ShardedStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for ShardedStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardedStorage")
            .field("len", &self.map.len())
            .field("bounded", &self.eviction.is_some())
            .finish()
    }
}

// Implement the Storage port
impl<K, V> Storage<K, V> for ShardedStorage<K, V>
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn with_entry_mut<F, R>(&self, key: K, factory: impl FnOnce() -> V, accessor: F) -> R
    where
        F: FnOnce(&mut V) -> R,
    {
        if !self.map.contains_key(&key) {
            self.evict_if_needed();
        }

        let mut slot = self.map.entry(key).or_insert_with(|| Slot {
            value: factory(),
            last_access: Instant::now(),
        });
        slot.last_access = Instant::now();
        accessor(&mut slot.value)
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn clear(&self) {
        self.map.clear()
    }

    fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        for entry in self.map.iter() {
            f(entry.key(), &entry.value().value);
        }
    }

    fn retain<F>(&self, mut f: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        self.map.retain(|key, slot| f(key, &mut slot.value));
    }
}

// Implement Storage for Arc<ShardedStorage> to allow it to be used directly
impl<K, V> Storage<K, V> for Arc<ShardedStorage<K, V>>
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn with_entry_mut<F, R>(&self, key: K, factory: impl FnOnce() -> V, accessor: F) -> R
    where
        F: FnOnce(&mut V) -> R,
    {
        (**self).with_entry_mut(key, factory, accessor)
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn is_empty(&self) -> bool {
        (**self).is_empty()
    }

    fn clear(&self) {
        (**self).clear()
    }

    fn for_each<F>(&self, f: F)
    where
        F: FnMut(&K, &V),
    {
        (**self).for_each(f)
    }

    fn retain<F>(&self, f: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        (**self).retain(f)
    }
}
