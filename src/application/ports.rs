//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports; the record
//! stores and the signature verifier stand in for external collaborators.

use crate::domain::commitment::CommitmentHash;
use crate::domain::influence::{InfluenceSource, SourceId};
use crate::domain::model::{Comment, ContentItem, ItemId, VoteCommitment};
use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Instant;
use thiserror::Error;

/// Candidate entry for eviction consideration.
///
/// Values are cloned to avoid lifetime issues with concurrent maps.
pub struct EvictionCandidate<K, V> {
    /// The key of the entry
    pub key: K,
    /// The value of the entry (cloned)
    pub value: V,
    /// Last access time for LRU-based strategies
    pub last_access: Instant,
}

/// Port for eviction policy decisions.
///
/// Lets the storage layer delegate the choice of which entry to drop when it
/// is full.
pub trait EvictionPolicy<K, V>: Send + Sync + Debug
where
    K: Clone,
    V: Clone,
{
    /// Select a victim from the given candidates, or `None` to keep them all.
    fn select_victim(&self, candidates: &[EvictionCandidate<K, V>]) -> Option<K>;

    /// Whether `candidate` may be dropped at all. Refused entries are never
    /// offered to `select_victim`.
    fn is_evictable(&self, _candidate: &EvictionCandidate<K, V>) -> bool {
        true
    }

    /// Check if an insertion into a map of `current_entries` must evict first.
    fn should_evict(&self, current_entries: usize) -> bool;
}

/// Port for obtaining the current UTC time.
///
/// Infrastructure provides `SystemClock`; tests use `MockClock`.
pub trait Clock: Send + Sync + Debug {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Port for concurrent key-value storage of in-process state.
pub trait Storage<K, V>: Send + Sync + Debug
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Send + Sync,
{
    /// Access an entry with mutable access, creating it if necessary.
    ///
    /// The accessor runs while the entry is locked, so a read-then-write
    /// inside it is atomic with respect to other calls for the same key.
    fn with_entry_mut<F, R>(&self, key: K, factory: impl FnOnce() -> V, accessor: F) -> R
    where
        F: FnOnce(&mut V) -> R;

    /// Get the number of entries in the storage.
    fn len(&self) -> usize;

    /// Check if the storage is empty.
    fn is_empty(&self) -> bool;

    /// Clear all entries from the storage.
    fn clear(&self);

    /// Iterate over all entries.
    fn for_each<F>(&self, f: F)
    where
        F: FnMut(&K, &V);

    /// Remove entries for which the predicate returns false.
    fn retain<F>(&self, f: F)
    where
        F: FnMut(&K, &mut V) -> bool;
}

/// Failure reported by a record store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A record with this id already exists
    #[error("record {0} already exists")]
    AlreadyExists(String),
    /// The backend could not serve the request
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A record together with its optimistic-concurrency version.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    /// The record
    pub value: T,
    /// Incremented on every successful write
    pub version: u64,
}

/// Durable store of content items with atomic per-record updates.
pub trait ContentStore: Send + Sync + Debug {
    /// Insert a new item at version 0.
    fn insert(&self, item: ContentItem) -> Result<(), StoreError>;

    /// Read an item and its version.
    fn get(&self, id: &ItemId) -> Result<Option<Versioned<ContentItem>>, StoreError>;

    /// Replace the item if its stored version still equals `expected_version`.
    ///
    /// Returns `Ok(false)` on a version conflict or if the item vanished.
    fn compare_and_swap(&self, item: ContentItem, expected_version: u64)
        -> Result<bool, StoreError>;

    /// Ids of all stored items.
    fn ids(&self) -> Result<Vec<ItemId>, StoreError>;

    /// Copy of every stored item.
    fn snapshot(&self) -> Result<Vec<ContentItem>, StoreError>;
}

/// Durable store of vote commitments.
pub trait CommitmentStore: Send + Sync + Debug {
    /// Store the commitment unless its hash is already present.
    ///
    /// Returns `Ok(true)` if stored, `Ok(false)` if it was a duplicate. The
    /// check and the insert are one atomic step.
    fn insert_if_absent(&self, commitment: VoteCommitment) -> Result<bool, StoreError>;

    /// Whether a commitment hash is already stored.
    fn contains(&self, hash: &CommitmentHash) -> Result<bool, StoreError>;

    /// Number of commitments stored for a subject.
    fn count_for(&self, subject_id: &str) -> Result<u64, StoreError>;
}

/// Durable store of comments.
pub trait CommentStore: Send + Sync + Debug {
    /// Append a comment.
    fn add(&self, comment: Comment) -> Result<(), StoreError>;

    /// Number of distinct pseudonyms that commented on an item.
    fn distinct_contributors(&self, item_id: &ItemId) -> Result<u64, StoreError>;
}

/// Durable store of influence sources.
pub trait InfluenceStore: Send + Sync + Debug {
    /// Insert a new source at version 0.
    fn insert(&self, source: InfluenceSource) -> Result<(), StoreError>;

    /// Read a source and its version.
    fn get(&self, id: &SourceId) -> Result<Option<Versioned<InfluenceSource>>, StoreError>;

    /// Replace the source if its stored version still equals `expected_version`.
    fn compare_and_swap(
        &self,
        source: InfluenceSource,
        expected_version: u64,
    ) -> Result<bool, StoreError>;

    /// All sources that are active and have a linked location.
    fn active_linked(&self) -> Result<Vec<InfluenceSource>, StoreError>;
}

/// Signature-validity oracle.
///
/// Implementations must perform real cryptographic verification of
/// `signature` over `message` for `claimed_identity`; a format check alone
/// does not satisfy this contract.
pub trait SignatureVerifier: Send + Sync + Debug {
    /// Whether `signature` is a valid signature of `message` by `claimed_identity`.
    fn verify(&self, message: &str, signature: &str, claimed_identity: &str) -> bool;
}
