//! Base hype score.
//!
//! ```text
//! base = 1.0 * votes + 0.3 * sqrt(unique_contributors) + 2.0 * decay(age, 7 days)
//! ```
//!
//! The final, stored score is `base * location_impact`.

use crate::domain::decay::{decay_since, HalfLife};
use chrono::{DateTime, Utc};

/// Weight of each counted vote.
pub const VOTE_WEIGHT: f64 = 1.0;

/// Weight of the square root of distinct contributors.
pub const CONTRIBUTOR_WEIGHT: f64 = 0.3;

/// Magnitude of the recency bonus for a brand new item.
pub const RECENCY_WEIGHT: f64 = 2.0;

/// Half-life of the recency bonus.
pub const RECENCY_HALF_LIFE: HalfLife = HalfLife::from_const(7.0);

/// Raw signals feeding the base score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreInputs {
    /// Counted votes
    pub vote_count: u64,
    /// Distinct contributors (commenters)
    pub unique_contributors: u64,
    /// Creation time of the item
    pub created_at: DateTime<Utc>,
}

/// Base hype for `inputs` evaluated at `now`. Always `>= 0`.
///
/// ```
/// use hype_rank::domain::hype::{base_hype, ScoreInputs};
/// use chrono::Utc;
///
/// let now = Utc::now();
/// let score = base_hype(
///     &ScoreInputs { vote_count: 10, unique_contributors: 4, created_at: now },
///     now,
/// );
/// assert!((score - 12.6).abs() < 1e-9);
/// ```
pub fn base_hype(inputs: &ScoreInputs, now: DateTime<Utc>) -> f64 {
    VOTE_WEIGHT * inputs.vote_count as f64
        + CONTRIBUTOR_WEIGHT * (inputs.unique_contributors as f64).sqrt()
        + RECENCY_WEIGHT * decay_since(inputs.created_at, now, RECENCY_HALF_LIFE)
}

/// Stored score: base hype scaled by the location impact.
pub fn hype_score(inputs: &ScoreInputs, location_impact: f64, now: DateTime<Utc>) -> f64 {
    base_hype(inputs, now) * location_impact
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn inputs(votes: u64, contributors: u64, created_at: DateTime<Utc>) -> ScoreInputs {
        ScoreInputs {
            vote_count: votes,
            unique_contributors: contributors,
            created_at,
        }
    }

    #[test]
    fn test_documented_example() {
        let now = Utc::now();
        let score = base_hype(&inputs(10, 4, now), now);
        assert!((score - 12.6).abs() < 1e-9);
    }

    #[test]
    fn test_fresh_empty_item_is_pure_recency() {
        let now = Utc::now();
        assert_eq!(base_hype(&inputs(0, 0, now), now), 2.0);
    }

    #[test]
    fn test_recency_bonus_halves_after_a_week() {
        let now = Utc::now();
        let score = base_hype(&inputs(0, 0, now - Duration::days(7)), now);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_future_created_at_does_not_exceed_full_bonus() {
        let now = Utc::now();
        let score = base_hype(&inputs(0, 0, now + Duration::hours(6)), now);
        assert_eq!(score, 2.0);
    }

    #[test]
    fn test_contributors_are_sublinear() {
        let now = Utc::now();
        let one = base_hype(&inputs(0, 1, now), now) - 2.0;
        let hundred = base_hype(&inputs(0, 100, now), now) - 2.0;
        assert!((one - 0.3).abs() < 1e-12);
        assert!((hundred - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_votes_dominate_old_recency() {
        let now = Utc::now();
        let old_popular = base_hype(&inputs(3, 0, now - Duration::days(30)), now);
        let new_empty = base_hype(&inputs(0, 0, now), now);
        assert!(old_popular > new_empty);
    }

    #[test]
    fn test_impact_scales_score() {
        let now = Utc::now();
        let i = inputs(10, 4, now);
        assert!((hype_score(&i, 0.5, now) - 6.3).abs() < 1e-9);
    }
}
