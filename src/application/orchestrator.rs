//! Ranking orchestrator.
//!
//! The only component with side effects. Every event (item creation, vote,
//! comment, influence-source change) reads the current record, runs the pure
//! calculators from the domain layer and writes the new score back with an
//! optimistic compare-and-swap. All score writes go through one code path,
//! [`recompute_score`], so a score stored after an event and a score stored
//! by a sweep are always computed the same way.

use crate::application::metrics::Metrics;
use crate::application::ports::{
    Clock, CommentStore, CommitmentStore, ContentStore, InfluenceStore, SignatureVerifier,
    StoreError,
};
use crate::domain::commitment::{commit, CommitmentHash, ServerSecret, SignedAction};
use crate::domain::geo::GeoPoint;
use crate::domain::hype::base_hype;
use crate::domain::influence::{
    location_impact, ImpactTag, InfluenceSource, LinkedLocation, SourceId,
};
use crate::domain::model::{Comment, ContentItem, ItemId, VoteCommitment};
use crate::domain::validation::ValidationError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors surfaced by the orchestrator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RankingError {
    /// The signature oracle rejected the request
    #[error("signature rejected")]
    InvalidSignature,

    /// No content item with this id
    #[error("content item {0} not found")]
    ItemNotFound(ItemId),

    /// No influence source with this id
    #[error("influence source {0} not found")]
    SourceNotFound(SourceId),

    /// Input failed validation; nothing was written
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The record store failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Every optimistic write attempt lost a race
    #[error("update abandoned after {attempts} conflicting attempts")]
    Contention {
        /// Attempts made before giving up
        attempts: u32,
    },
}

impl RankingError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RankingError::Contention { .. } | RankingError::Store(StoreError::Unavailable(_))
        )
    }
}

/// Result of a vote or verification.
#[derive(Debug, Clone, PartialEq)]
pub enum VoteOutcome<T> {
    /// Counted; carries the updated record
    Accepted(T),
    /// The identity already voted on this subject; nothing changed
    Duplicate,
}

impl<T> VoteOutcome<T> {
    /// `true` if the vote was counted.
    pub fn is_accepted(&self) -> bool {
        matches!(self, VoteOutcome::Accepted(_))
    }
}

/// Parameters for registering an influence source.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSource {
    /// Source identifier
    pub id: SourceId,
    /// Impact tag; fixes the multiplier
    pub tag: ImpactTag,
    /// Where the source applies, if anywhere
    pub linked_location: Option<LinkedLocation>,
}

/// Summary of a batch sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepReport {
    /// Items whose score was rewritten
    pub items_updated: usize,
    /// Items left untouched because of a transient failure
    pub items_failed: usize,
    /// Active, located sources the scores were computed against
    pub sources_considered: usize,
}

/// The record stores the orchestrator reads and writes.
///
/// Verifications of influence sources use their own commitment store so a
/// source id can never collide with an item id.
#[derive(Debug, Clone)]
pub struct Stores {
    /// Content items
    pub content: Arc<dyn ContentStore>,
    /// Vote commitments on content items
    pub commitments: Arc<dyn CommitmentStore>,
    /// Verification commitments on influence sources
    pub verifications: Arc<dyn CommitmentStore>,
    /// Comments
    pub comments: Arc<dyn CommentStore>,
    /// Influence sources
    pub influence: Arc<dyn InfluenceStore>,
}

/// Score to store for `item`: base hype scaled by the location impact of `sources`.
pub fn recompute_score(item: &ContentItem, sources: &[InfluenceSource], now: DateTime<Utc>) -> f64 {
    base_hype(&item.score_inputs(), now) * location_impact(item.location, sources)
}

/// Applies events to stored records and keeps `hype_score` current.
#[derive(Debug)]
pub struct RankingOrchestrator {
    stores: Stores,
    verifier: Arc<dyn SignatureVerifier>,
    clock: Arc<dyn Clock>,
    secret: ServerSecret,
    metrics: Metrics,
    max_attempts: u32,
}

impl RankingOrchestrator {
    /// Create an orchestrator.
    ///
    /// `max_attempts` is the optimistic-write budget per record update; zero
    /// is treated as one.
    pub fn new(
        stores: Stores,
        verifier: Arc<dyn SignatureVerifier>,
        clock: Arc<dyn Clock>,
        secret: ServerSecret,
        metrics: Metrics,
        max_attempts: u32,
    ) -> Self {
        Self {
            stores,
            verifier,
            clock,
            secret,
            metrics,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Commitment for `identity` acting on `subject_id` under this server's secret.
    pub fn commitment_for(
        &self,
        identity: &str,
        subject_id: &str,
    ) -> Result<CommitmentHash, ValidationError> {
        commit(identity, subject_id, &self.secret)
    }

    /// Verify the signature and store a new item with its initial score.
    pub fn create_item(
        &self,
        id: ItemId,
        location: GeoPoint,
        identity: &str,
        signature: &str,
    ) -> Result<ContentItem, RankingError> {
        self.check_signature(SignedAction::Create, identity, signature)?;
        if id.as_str().is_empty() {
            return Err(ValidationError::EmptyField("item id").into());
        }

        let now = self.clock.now();
        let sources = self.stores.influence.active_linked()?;
        let mut item = ContentItem::new(id, location, now);
        item.hype_score = recompute_score(&item, &sources, now);

        self.stores.content.insert(item.clone())?;
        self.metrics.record_recompute();
        info!(item_id = %item.id, hype_score = item.hype_score, "content item created");
        Ok(item)
    }

    /// Verify the signature on `vote:<item id>`, then count the vote if new.
    pub fn record_vote(
        &self,
        item_id: &ItemId,
        identity: &str,
        signature: &str,
    ) -> Result<VoteOutcome<ContentItem>, RankingError> {
        self.check_signature(SignedAction::Vote(item_id.as_str()), identity, signature)?;
        let commitment = self.commitment_for(identity, item_id.as_str())?;
        self.record_vote_if_new(item_id, commitment)
    }

    /// Count a vote unless this commitment was already stored.
    ///
    /// The commitment is persisted before the counter moves. If the counter
    /// update then exhausts its retries the vote is still recorded, and the
    /// next sweep raises `vote_count` to match the stored commitments.
    pub fn record_vote_if_new(
        &self,
        item_id: &ItemId,
        commitment: CommitmentHash,
    ) -> Result<VoteOutcome<ContentItem>, RankingError> {
        self.require_item(item_id)?;

        let stored = self.stores.commitments.insert_if_absent(VoteCommitment {
            subject_id: item_id.as_str().to_string(),
            commitment,
            created_at: self.clock.now(),
        })?;
        if !stored {
            self.metrics.record_vote_duplicate();
            debug!(item_id = %item_id, "duplicate vote ignored");
            return Ok(VoteOutcome::Duplicate);
        }
        self.metrics.record_vote_accepted();

        let sources = self.stores.influence.active_linked()?;
        let item = self.update_item(item_id, &sources, |item| {
            item.vote_count = item.vote_count.saturating_add(1);
            Ok(())
        })?;
        debug!(item_id = %item_id, votes = item.vote_count, hype_score = item.hype_score, "vote counted");
        Ok(VoteOutcome::Accepted(item))
    }

    /// Store a comment and refresh the item's contributor count and score.
    ///
    /// The comment is persisted before the counter moves. A `Contention`
    /// error therefore means the comment is already stored; resubmitting it
    /// stores a second copy. The next sweep raises `unique_contributors` to
    /// match the stored comments either way.
    pub fn record_comment(
        &self,
        item_id: &ItemId,
        text: &str,
        pseudonym: &str,
    ) -> Result<ContentItem, RankingError> {
        self.require_item(item_id)?;
        let comment = Comment::new(item_id.clone(), text, pseudonym, self.clock.now())?;
        self.stores.comments.add(comment)?;

        let comments = &self.stores.comments;
        let sources = self.stores.influence.active_linked()?;
        let item = self.update_item(item_id, &sources, |item| {
            let distinct = comments.distinct_contributors(item_id)?;
            item.unique_contributors = item.unique_contributors.max(distinct);
            Ok(())
        })?;
        debug!(
            item_id = %item_id,
            contributors = item.unique_contributors,
            hype_score = item.hype_score,
            "comment recorded"
        );
        Ok(item)
    }

    /// Recompute every item against the current set of active sources.
    ///
    /// Counters are first raised to what the commitment and comment stores
    /// hold, so writes whose counter update ran out of retries are picked up
    /// here. Each item is updated independently, so a sweep can be interrupted and
    /// rerun at any point. Items deleted mid-sweep are skipped; items that
    /// keep losing write races are counted in `items_failed`.
    pub fn sweep(&self) -> Result<SweepReport, RankingError> {
        let sources = self.stores.influence.active_linked()?;
        let ids = self.stores.content.ids()?;
        let commitments = &self.stores.commitments;
        let comments = &self.stores.comments;

        let mut report = SweepReport {
            sources_considered: sources.len(),
            ..SweepReport::default()
        };

        for id in ids {
            let result = self.update_item(&id, &sources, |item| {
                let stored_votes = commitments.count_for(item.id.as_str())?;
                item.vote_count = item.vote_count.max(stored_votes);
                let contributors = comments.distinct_contributors(&item.id)?;
                item.unique_contributors = item.unique_contributors.max(contributors);
                Ok(())
            });
            match result {
                Ok(_) => report.items_updated += 1,
                Err(RankingError::ItemNotFound(_)) => {}
                Err(e) => {
                    warn!(item_id = %id, error = %e, "sweep skipped item");
                    report.items_failed += 1;
                }
            }
        }

        self.metrics.record_sweep();
        info!(
            items_updated = report.items_updated,
            items_failed = report.items_failed,
            sources = report.sources_considered,
            "sweep complete"
        );
        Ok(report)
    }

    /// Verify the signature, store a new source and re-rank everything.
    pub fn register_source(
        &self,
        new: NewSource,
        identity: &str,
        signature: &str,
    ) -> Result<(InfluenceSource, SweepReport), RankingError> {
        self.check_signature(SignedAction::Create, identity, signature)?;
        if new.id.as_str().is_empty() {
            return Err(ValidationError::EmptyField("source id").into());
        }

        let source = InfluenceSource::new(new.id, new.tag, new.linked_location, self.clock.now());
        self.stores.influence.insert(source.clone())?;
        info!(source_id = %source.id, tag = %source.tag, located = source.linked_location.is_some(), "influence source registered");

        let report = self.sweep()?;
        Ok((source, report))
    }

    /// Activate or deactivate a source and re-rank everything.
    pub fn set_source_active(
        &self,
        id: &SourceId,
        active: bool,
    ) -> Result<SweepReport, RankingError> {
        self.update_source(id, |source| source.active = active)?;
        info!(source_id = %id, active, "influence source state changed");
        self.sweep()
    }

    /// Record one verification of a source per identity.
    pub fn verify_source(
        &self,
        id: &SourceId,
        identity: &str,
        signature: &str,
    ) -> Result<VoteOutcome<InfluenceSource>, RankingError> {
        self.check_signature(SignedAction::Vote(id.as_str()), identity, signature)?;
        let commitment = self.commitment_for(identity, id.as_str())?;
        if self.stores.influence.get(id)?.is_none() {
            return Err(RankingError::SourceNotFound(id.clone()));
        }

        let stored = self.stores.verifications.insert_if_absent(VoteCommitment {
            subject_id: id.as_str().to_string(),
            commitment,
            created_at: self.clock.now(),
        })?;
        if !stored {
            self.metrics.record_vote_duplicate();
            debug!(source_id = %id, "duplicate verification ignored");
            return Ok(VoteOutcome::Duplicate);
        }
        self.metrics.record_vote_accepted();

        let source = self.update_source(id, |source| {
            source.verify_count = source.verify_count.saturating_add(1);
        })?;
        Ok(VoteOutcome::Accepted(source))
    }

    /// The `limit` highest-scoring items, ties broken by id.
    pub fn top(&self, limit: usize) -> Result<Vec<ContentItem>, RankingError> {
        let mut items = self.stores.content.snapshot()?;
        items.sort_by(|a, b| {
            b.hype_score
                .total_cmp(&a.hype_score)
                .then_with(|| a.id.cmp(&b.id))
        });
        items.truncate(limit);
        Ok(items)
    }

    /// Current state of an item.
    pub fn item(&self, id: &ItemId) -> Result<Option<ContentItem>, RankingError> {
        Ok(self.stores.content.get(id)?.map(|record| record.value))
    }

    /// Current state of an influence source.
    pub fn source(&self, id: &SourceId) -> Result<Option<InfluenceSource>, RankingError> {
        Ok(self.stores.influence.get(id)?.map(|record| record.value))
    }

    /// The stores this orchestrator writes to.
    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// Get a reference to the metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn check_signature(
        &self,
        action: SignedAction<'_>,
        identity: &str,
        signature: &str,
    ) -> Result<(), RankingError> {
        let message = action.message();
        if self.verifier.verify(&message, signature, identity) {
            Ok(())
        } else {
            debug!(message = %message, "signature rejected");
            Err(RankingError::InvalidSignature)
        }
    }

    fn require_item(&self, id: &ItemId) -> Result<(), RankingError> {
        match self.stores.content.get(id)? {
            Some(_) => Ok(()),
            None => Err(RankingError::ItemNotFound(id.clone())),
        }
    }

    /// Read-modify-write an item with a fresh score, retrying on conflicts.
    fn update_item<F>(
        &self,
        id: &ItemId,
        sources: &[InfluenceSource],
        mut mutate: F,
    ) -> Result<ContentItem, RankingError>
    where
        F: FnMut(&mut ContentItem) -> Result<(), RankingError>,
    {
        for attempt in 1..=self.max_attempts {
            let current = self
                .stores
                .content
                .get(id)?
                .ok_or_else(|| RankingError::ItemNotFound(id.clone()))?;

            let mut item = current.value;
            mutate(&mut item)?;
            item.hype_score = recompute_score(&item, sources, self.clock.now());

            if self.stores.content.compare_and_swap(item.clone(), current.version)? {
                self.metrics.record_recompute();
                return Ok(item);
            }
            self.metrics.record_conflict();
            debug!(item_id = %id, attempt, "item changed underneath update, retrying");
        }

        warn!(item_id = %id, attempts = self.max_attempts, "item update retries exhausted");
        Err(RankingError::Contention {
            attempts: self.max_attempts,
        })
    }

    fn update_source<F>(&self, id: &SourceId, mut mutate: F) -> Result<InfluenceSource, RankingError>
    where
        F: FnMut(&mut InfluenceSource),
    {
        for attempt in 1..=self.max_attempts {
            let current = self
                .stores
                .influence
                .get(id)?
                .ok_or_else(|| RankingError::SourceNotFound(id.clone()))?;

            let mut source = current.value;
            mutate(&mut source);

            if self
                .stores
                .influence
                .compare_and_swap(source.clone(), current.version)?
            {
                return Ok(source);
            }
            self.metrics.record_conflict();
            debug!(source_id = %id, attempt, "source changed underneath update, retrying");
        }

        warn!(source_id = %id, attempts = self.max_attempts, "source update retries exhausted");
        Err(RankingError::Contention {
            attempts: self.max_attempts,
        })
    }
}
