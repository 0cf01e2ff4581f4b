//! Records owned by the storage collaborator.

use crate::domain::commitment::CommitmentHash;
use crate::domain::geo::GeoPoint;
use crate::domain::hype::ScoreInputs;
use crate::domain::validation::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest comment text kept, in characters.
pub const MAX_COMMENT_CHARS: usize = 500;

/// Longest pseudonym kept, in characters.
pub const MAX_PSEUDONYM_CHARS: usize = 50;

/// Identifier of a content item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    /// Borrow the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A location-tagged content item with its cached score.
///
/// `hype_score` is derived: it is only written by the ranking orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Item identifier
    pub id: ItemId,
    /// Where the item is pinned
    pub location: GeoPoint,
    /// Counted votes
    pub vote_count: u64,
    /// Distinct commenters
    pub unique_contributors: u64,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Cached `base_hype * location_impact`
    pub hype_score: f64,
}

impl ContentItem {
    /// A brand-new item with no votes, no contributors and a zero score.
    pub fn new(id: ItemId, location: GeoPoint, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            location,
            vote_count: 0,
            unique_contributors: 0,
            created_at,
            hype_score: 0.0,
        }
    }

    /// Signals feeding the base score.
    pub fn score_inputs(&self) -> ScoreInputs {
        ScoreInputs {
            vote_count: self.vote_count,
            unique_contributors: self.unique_contributors,
            created_at: self.created_at,
        }
    }
}

/// A stored vote, identified only by its commitment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCommitment {
    /// Item or source voted on
    pub subject_id: String,
    /// Commitment standing in for the voter
    pub commitment: CommitmentHash,
    /// When the vote was cast
    pub created_at: DateTime<Utc>,
}

/// A comment on a content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Item commented on
    pub item_id: ItemId,
    /// Trimmed text, at most 500 characters
    pub text: String,
    /// Trimmed pseudonym, at most 50 characters
    pub pseudonym: String,
    /// When the comment was made
    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// Build a comment, trimming and truncating text and pseudonym.
    ///
    /// # Errors
    /// Returns `ValidationError::EmptyField` if either is blank.
    pub fn new(
        item_id: ItemId,
        text: &str,
        pseudonym: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let text = truncate_chars(text.trim(), MAX_COMMENT_CHARS);
        let pseudonym = truncate_chars(pseudonym.trim(), MAX_PSEUDONYM_CHARS);
        if text.is_empty() {
            return Err(ValidationError::EmptyField("comment text"));
        }
        if pseudonym.is_empty() {
            return Err(ValidationError::EmptyField("pseudonym"));
        }
        Ok(Self {
            item_id,
            text,
            pseudonym,
            created_at,
        })
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
