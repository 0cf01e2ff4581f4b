//! Exponential time decay.
//!
//! `factor = 0.5 ^ (age_days / half_life_days)`, which is 1 at age zero, 0.5
//! after one half-life and approaches (but never reaches) zero afterwards.

use crate::domain::validation::ValidationError;
use chrono::{DateTime, Utc};

const MILLIS_PER_DAY: f64 = 24.0 * 60.0 * 60.0 * 1000.0;

/// A validated, strictly positive half-life in days.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct HalfLife(f64);

impl HalfLife {
    /// Create a half-life of `days` days.
    ///
    /// # Errors
    /// Returns `ValidationError::NonPositiveHalfLife` for zero, negative or
    /// non-finite values. The value is never clamped.
    pub fn days(days: f64) -> Result<Self, ValidationError> {
        if !days.is_finite() || days <= 0.0 {
            return Err(ValidationError::NonPositiveHalfLife(days));
        }
        Ok(Self(days))
    }

    pub(crate) const fn from_const(days: f64) -> Self {
        Self(days)
    }

    /// Half-life in days.
    pub fn as_days(&self) -> f64 {
        self.0
    }
}

/// Age of `created_at` at `now` in fractional days, clamped at zero.
///
/// A `created_at` in the future (clock skew) yields an age of zero.
pub fn age_days(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = now.signed_duration_since(created_at).num_milliseconds();
    (millis.max(0) as f64) / MILLIS_PER_DAY
}

/// Decay factor for an age expressed in days.
///
/// Negative ages are treated as zero, so the factor never exceeds 1.
pub fn decay_factor(age_days: f64, half_life: HalfLife) -> f64 {
    0.5_f64.powf(age_days.max(0.0) / half_life.0)
}

/// Decay factor for an item created at `created_at`, evaluated at `now`.
pub fn decay_since(created_at: DateTime<Utc>, now: DateTime<Utc>, half_life: HalfLife) -> f64 {
    decay_factor(age_days(created_at, now), half_life)
}

/// Decay factor with an unvalidated half-life.
///
/// # Errors
/// Returns `ValidationError::NonPositiveHalfLife` when `half_life_days <= 0`.
///
/// # Example
/// ```
/// use hype_rank::domain::decay::decay;
/// use chrono::{Duration, Utc};
///
/// let now = Utc::now();
/// let week_old = now - Duration::days(7);
/// assert!((decay(week_old, now, 7.0).unwrap() - 0.5).abs() < 1e-9);
/// assert!(decay(week_old, now, 0.0).is_err());
/// ```
pub fn decay(
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
    half_life_days: f64,
) -> Result<f64, ValidationError> {
    Ok(decay_since(created_at, now, HalfLife::days(half_life_days)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_fresh_item_has_full_factor() {
        let now = Utc::now();
        assert_eq!(decay(now, now, 7.0).unwrap(), 1.0);
    }

    #[test]
    fn test_one_half_life_halves() {
        let now = Utc::now();
        let created = now - Duration::days(7);
        assert!((decay(created, now, 7.0).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_two_half_lives_quarter() {
        let now = Utc::now();
        let created = now - Duration::days(14);
        assert!((decay(created, now, 7.0).unwrap() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_fractional_age() {
        let now = Utc::now();
        let created = now - Duration::hours(84); // 3.5 days
        let expected = 0.5_f64.powf(0.5);
        assert!((decay(created, now, 7.0).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_strictly_decreasing_in_age() {
        let half_life = HalfLife::days(7.0).unwrap();
        let mut previous = decay_factor(0.0, half_life);
        for step in 1..200 {
            let current = decay_factor(step as f64 * 0.5, half_life);
            assert!(current < previous, "age {} did not decay", step as f64 * 0.5);
            assert!(current > 0.0);
            previous = current;
        }
    }

    #[test]
    fn test_future_created_at_clamps_to_one() {
        let now = Utc::now();
        let future = now + Duration::days(3);
        assert_eq!(age_days(future, now), 0.0);
        assert_eq!(decay(future, now, 7.0).unwrap(), 1.0);
    }

    #[test]
    fn test_non_positive_half_life_rejected() {
        let now = Utc::now();
        assert_eq!(
            decay(now, now, 0.0),
            Err(ValidationError::NonPositiveHalfLife(0.0))
        );
        assert!(decay(now, now, -1.0).is_err());
        assert!(HalfLife::days(f64::NAN).is_err());
        assert!(HalfLife::days(f64::INFINITY).is_err());
    }

    #[test]
    fn test_very_old_item_stays_positive() {
        let half_life = HalfLife::days(7.0).unwrap();
        let factor = decay_factor(365.0, half_life);
        assert!(factor > 0.0);
        assert!(factor < 1e-10);
    }
}
