//! Influence sources and location impact aggregation.
//!
//! An influence source (a linked commentary item) carries an impact tag and,
//! optionally, a location with a radius. Every active, located source within
//! range of a content item scales that item's score:
//!
//! ```text
//! proximity = 1 - distance / radius          (1 at the source, 0 at the edge)
//! adjusted  = 1 + (multiplier - 1) * proximity
//! impact    = clamp(Π adjusted, 0.1, 3.0)
//! ```
//!
//! The fold is a product, so the order of sources never matters.

use crate::domain::geo::{distance_meters, GeoPoint};
use crate::domain::validation::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Radius used when a linked location does not specify one.
pub const DEFAULT_RADIUS_METERS: f64 = 5_000.0;

/// Lower bound of the aggregated impact multiplier.
pub const MIN_IMPACT: f64 = 0.1;

/// Upper bound of the aggregated impact multiplier.
pub const MAX_IMPACT: f64 = 3.0;

/// Identifier of an influence source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub String);

impl SourceId {
    /// Borrow the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Direction and strength of an influence source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactTag {
    /// Boosts nearby items (x1.2)
    Positive,
    /// Dampens nearby items (x0.8)
    Negative,
    /// Strongly dampens nearby items (x0.5)
    Severe,
}

impl ImpactTag {
    /// Multiplier applied at the source's exact location.
    pub fn multiplier(&self) -> f64 {
        match self {
            ImpactTag::Positive => 1.2,
            ImpactTag::Negative => 0.8,
            ImpactTag::Severe => 0.5,
        }
    }

    /// Human-readable description of the tag's effect.
    pub fn description(&self) -> &'static str {
        match self {
            ImpactTag::Positive => "Positive impact - boosts nearby locations",
            ImpactTag::Negative => "Negative impact - reduces hype of nearby locations",
            ImpactTag::Severe => "Severe negative impact - significantly reduces nearby hype",
        }
    }

    /// Lowercase tag name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactTag::Positive => "positive",
            ImpactTag::Negative => "negative",
            ImpactTag::Severe => "severe",
        }
    }
}

impl fmt::Display for ImpactTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImpactTag {
    type Err = ValidationError;

    /// Accepts `positive`/`negative`/`severe` and the legacy `good`/`bad`/`worse`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "positive" | "good" => Ok(ImpactTag::Positive),
            "negative" | "bad" => Ok(ImpactTag::Negative),
            "severe" | "worse" => Ok(ImpactTag::Severe),
            _ => Err(ValidationError::UnknownImpactTag(s.to_string())),
        }
    }
}

/// A location an influence source is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLinkedLocation")]
pub struct LinkedLocation {
    /// Center of the influence area
    pub point: GeoPoint,
    /// Radius of the influence area, `None` for the 5 km default
    pub radius_meters: Option<f64>,
}

impl LinkedLocation {
    /// Create a linked location.
    ///
    /// # Errors
    /// Returns `ValidationError::NonPositiveRadius` if a radius is given and
    /// is not a positive, finite number.
    pub fn new(point: GeoPoint, radius_meters: Option<f64>) -> Result<Self, ValidationError> {
        if let Some(radius) = radius_meters {
            if !radius.is_finite() || radius <= 0.0 {
                return Err(ValidationError::NonPositiveRadius(radius));
            }
        }
        Ok(Self {
            point,
            radius_meters,
        })
    }

    /// Radius actually used for aggregation.
    pub fn effective_radius(&self) -> f64 {
        match self.radius_meters {
            Some(radius) if radius.is_finite() && radius > 0.0 => radius,
            _ => DEFAULT_RADIUS_METERS,
        }
    }
}

#[derive(Deserialize)]
struct RawLinkedLocation {
    point: GeoPoint,
    radius_meters: Option<f64>,
}

impl TryFrom<RawLinkedLocation> for LinkedLocation {
    type Error = ValidationError;

    fn try_from(raw: RawLinkedLocation) -> Result<Self, Self::Error> {
        LinkedLocation::new(raw.point, raw.radius_meters)
    }
}

/// An external item whose tag and location adjust nearby scores.
///
/// The multiplier is serialized for readers but never trusted on the way
/// in: deserialization derives it from `tag` again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredSource")]
pub struct InfluenceSource {
    /// Source identifier
    pub id: SourceId,
    /// Impact tag chosen at creation
    pub tag: ImpactTag,
    impact_multiplier: f64,
    /// Optional location; unlocated sources never participate
    pub linked_location: Option<LinkedLocation>,
    /// Inactive sources never participate
    pub active: bool,
    /// Number of distinct identities that verified this source
    pub verify_count: u64,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct StoredSource {
    id: SourceId,
    tag: ImpactTag,
    linked_location: Option<LinkedLocation>,
    active: bool,
    verify_count: u64,
    created_at: DateTime<Utc>,
}

impl From<StoredSource> for InfluenceSource {
    fn from(stored: StoredSource) -> Self {
        let mut source =
            InfluenceSource::new(stored.id, stored.tag, stored.linked_location, stored.created_at);
        source.active = stored.active;
        source.verify_count = stored.verify_count;
        source
    }
}

impl InfluenceSource {
    /// Create an active source. The multiplier is derived from `tag` and
    /// cannot be changed afterwards.
    pub fn new(
        id: SourceId,
        tag: ImpactTag,
        linked_location: Option<LinkedLocation>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            tag,
            impact_multiplier: tag.multiplier(),
            linked_location,
            active: true,
            verify_count: 0,
            created_at,
        }
    }

    /// Multiplier fixed at creation.
    pub fn impact_multiplier(&self) -> f64 {
        self.impact_multiplier
    }

    /// Whether this source takes part in aggregation.
    pub fn participates(&self) -> bool {
        self.active && self.linked_location.is_some()
    }

    /// Factor this source contributes at `target`, or `None` when it has no effect.
    pub fn adjustment_at(&self, target: GeoPoint) -> Option<f64> {
        if !self.active {
            return None;
        }
        let location = self.linked_location.as_ref()?;
        let radius = location.effective_radius();
        let distance = distance_meters(target, location.point);
        if distance > radius {
            return None;
        }
        let proximity = 1.0 - distance / radius;
        Some(1.0 + (self.impact_multiplier - 1.0) * proximity)
    }
}

/// Aggregate multiplier for `target` from a set of sources, in `[0.1, 3.0]`.
///
/// Inactive or unlocated sources and sources farther than their radius are
/// skipped. With nothing in range the result is exactly `1.0`.
///
/// ```
/// use hype_rank::domain::geo::GeoPoint;
/// use hype_rank::domain::influence::{location_impact, ImpactTag, InfluenceSource, LinkedLocation};
/// use chrono::Utc;
///
/// let here = GeoPoint::new(2.35, 48.85).unwrap();
/// let source = InfluenceSource::new(
///     "article-1".into(),
///     ImpactTag::Positive,
///     Some(LinkedLocation::new(here, None).unwrap()),
///     Utc::now(),
/// );
/// assert!((location_impact(here, [&source]) - 1.2).abs() < 1e-12);
/// assert_eq!(location_impact(here, std::iter::empty::<&InfluenceSource>()), 1.0);
/// ```
pub fn location_impact<'a, I>(target: GeoPoint, sources: I) -> f64
where
    I: IntoIterator<Item = &'a InfluenceSource>,
{
    let product = sources
        .into_iter()
        .filter_map(|source| source.adjustment_at(target))
        .fold(1.0_f64, |acc, adjusted| acc * adjusted);

    product.clamp(MIN_IMPACT, MAX_IMPACT)
}
