//! In-process record stores.
//!
//! DashMap-backed implementations of the store ports. Each record carries a
//! version that is bumped on every successful compare-and-swap, so concurrent
//! read-modify-write cycles on one record never lose an update.

use crate::application::orchestrator::Stores;
use crate::application::ports::{
    CommentStore, CommitmentStore, ContentStore, InfluenceStore, StoreError, Versioned,
};
use crate::domain::commitment::CommitmentHash;
use crate::domain::influence::{InfluenceSource, SourceId};
use crate::domain::model::{Comment, ContentItem, ItemId, VoteCommitment};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

/// Versioned map shared by the content and influence stores.
#[derive(Debug)]
struct VersionedMap<K, V>
where
    K: Eq + Hash,
{
    map: DashMap<K, Versioned<V>>,
}

impl<K, V> VersionedMap<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Display,
    V: Clone,
{
    fn new() -> Self {
        Self {
            map: DashMap::new(),
        }
    }

    fn insert(&self, key: K, value: V) -> Result<(), StoreError> {
        match self.map.entry(key) {
            Entry::Occupied(occupied) => Err(StoreError::AlreadyExists(occupied.key().to_string())),
            Entry::Vacant(vacant) => {
                vacant.insert(Versioned { value, version: 0 });
                Ok(())
            }
        }
    }

    fn get(&self, key: &K) -> Option<Versioned<V>> {
        self.map.get(key).map(|record| record.value().clone())
    }

    fn compare_and_swap(&self, key: &K, value: V, expected_version: u64) -> bool {
        match self.map.get_mut(key) {
            Some(mut record) if record.version == expected_version => {
                record.value = value;
                record.version += 1;
                true
            }
            _ => false,
        }
    }
}

/// Content items held in memory.
#[derive(Debug)]
pub struct MemoryContentStore {
    items: VersionedMap<ItemId, ContentItem>,
}

impl MemoryContentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            items: VersionedMap::new(),
        }
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.items.map.len()
    }

    /// Whether the store holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.map.is_empty()
    }
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentStore for MemoryContentStore {
    fn insert(&self, item: ContentItem) -> Result<(), StoreError> {
        self.items.insert(item.id.clone(), item)
    }

    fn get(&self, id: &ItemId) -> Result<Option<Versioned<ContentItem>>, StoreError> {
        Ok(self.items.get(id))
    }

    fn compare_and_swap(
        &self,
        item: ContentItem,
        expected_version: u64,
    ) -> Result<bool, StoreError> {
        let id = item.id.clone();
        Ok(self.items.compare_and_swap(&id, item, expected_version))
    }

    fn ids(&self) -> Result<Vec<ItemId>, StoreError> {
        Ok(self.items.map.iter().map(|entry| entry.key().clone()).collect())
    }

    fn snapshot(&self) -> Result<Vec<ContentItem>, StoreError> {
        Ok(self
            .items
            .map
            .iter()
            .map(|entry| entry.value().value.clone())
            .collect())
    }
}

/// Vote commitments held in memory, with a per-subject tally.
#[derive(Debug, Default)]
pub struct MemoryCommitmentStore {
    commitments: DashMap<CommitmentHash, VoteCommitment>,
    per_subject: DashMap<String, u64>,
}

impl MemoryCommitmentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CommitmentStore for MemoryCommitmentStore {
    fn insert_if_absent(&self, commitment: VoteCommitment) -> Result<bool, StoreError> {
        match self.commitments.entry(commitment.commitment.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(vacant) => {
                let subject = commitment.subject_id.clone();
                vacant.insert(commitment);
                *self.per_subject.entry(subject).or_insert(0) += 1;
                Ok(true)
            }
        }
    }

    fn contains(&self, hash: &CommitmentHash) -> Result<bool, StoreError> {
        Ok(self.commitments.contains_key(hash))
    }

    fn count_for(&self, subject_id: &str) -> Result<u64, StoreError> {
        Ok(self.per_subject.get(subject_id).map(|n| *n).unwrap_or(0))
    }
}

#[derive(Debug, Default)]
struct Thread {
    comments: Vec<Comment>,
    pseudonyms: HashSet<String>,
}

/// Comment threads held in memory.
#[derive(Debug, Default)]
pub struct MemoryCommentStore {
    threads: DashMap<ItemId, Thread>,
}

impl MemoryCommentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Comments on an item, oldest first.
    pub fn comments_for(&self, item_id: &ItemId) -> Vec<Comment> {
        self.threads
            .get(item_id)
            .map(|thread| thread.comments.clone())
            .unwrap_or_default()
    }
}

impl CommentStore for MemoryCommentStore {
    fn add(&self, comment: Comment) -> Result<(), StoreError> {
        let mut thread = self.threads.entry(comment.item_id.clone()).or_default();
        thread.pseudonyms.insert(comment.pseudonym.clone());
        thread.comments.push(comment);
        Ok(())
    }

    fn distinct_contributors(&self, item_id: &ItemId) -> Result<u64, StoreError> {
        Ok(self
            .threads
            .get(item_id)
            .map(|thread| thread.pseudonyms.len() as u64)
            .unwrap_or(0))
    }
}

/// Influence sources held in memory.
#[derive(Debug)]
pub struct MemoryInfluenceStore {
    sources: VersionedMap<SourceId, InfluenceSource>,
}

impl MemoryInfluenceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            sources: VersionedMap::new(),
        }
    }
}

impl Default for MemoryInfluenceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InfluenceStore for MemoryInfluenceStore {
    fn insert(&self, source: InfluenceSource) -> Result<(), StoreError> {
        self.sources.insert(source.id.clone(), source)
    }

    fn get(&self, id: &SourceId) -> Result<Option<Versioned<InfluenceSource>>, StoreError> {
        Ok(self.sources.get(id))
    }

    fn compare_and_swap(
        &self,
        source: InfluenceSource,
        expected_version: u64,
    ) -> Result<bool, StoreError> {
        let id = source.id.clone();
        Ok(self.sources.compare_and_swap(&id, source, expected_version))
    }

    fn active_linked(&self) -> Result<Vec<InfluenceSource>, StoreError> {
        Ok(self
            .sources
            .map
            .iter()
            .filter(|entry| entry.value().value.participates())
            .map(|entry| entry.value().value.clone())
            .collect())
    }
}

impl Stores {
    /// A full set of empty in-memory stores.
    pub fn in_memory() -> Self {
        Self {
            content: Arc::new(MemoryContentStore::new()),
            commitments: Arc::new(MemoryCommitmentStore::new()),
            verifications: Arc::new(MemoryCommitmentStore::new()),
            comments: Arc::new(MemoryCommentStore::new()),
            influence: Arc::new(MemoryInfluenceStore::new()),
        }
    }
}
