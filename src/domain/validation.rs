//! Input validation errors shared by the domain types.

use thiserror::Error;

/// Error returned when a caller hands the core an invalid input.
///
/// Invalid input is always rejected synchronously, before any state is touched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Half-life must be strictly positive and finite
    #[error("half-life must be a positive number of days, got {0}")]
    NonPositiveHalfLife(f64),
    /// Latitude outside [-90, 90] or not finite
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),
    /// Longitude outside [-180, 180] or not finite
    #[error("longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),
    /// Influence radius must be strictly positive and finite
    #[error("radius must be a positive number of meters, got {0}")]
    NonPositiveRadius(f64),
    /// A required string field was empty (after trimming)
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    /// A commitment input contained the reserved field separator
    #[error("{0} contains the reserved separator character")]
    ReservedSeparator(&'static str),
    /// Unknown impact tag name
    #[error("unknown impact tag {0:?}, expected positive, negative or severe")]
    UnknownImpactTag(String),
}
