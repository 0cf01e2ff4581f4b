//! Geographic points and great-circle distance.

use crate::domain::validation::ValidationError;
use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A longitude/latitude pair in degrees.
///
/// Always in range: the only ways in are [`GeoPoint::new`] and
/// deserialization, which goes through the same checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGeoPoint")]
pub struct GeoPoint {
    lng: f64,
    lat: f64,
}

#[derive(Deserialize)]
struct RawGeoPoint {
    lng: f64,
    lat: f64,
}

impl TryFrom<RawGeoPoint> for GeoPoint {
    type Error = ValidationError;

    fn try_from(raw: RawGeoPoint) -> Result<Self, Self::Error> {
        GeoPoint::new(raw.lng, raw.lat)
    }
}

impl GeoPoint {
    /// Create a point, rejecting out-of-range or non-finite coordinates.
    pub fn new(lng: f64, lat: f64) -> Result<Self, ValidationError> {
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(ValidationError::LongitudeOutOfRange(lng));
        }
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(ValidationError::LatitudeOutOfRange(lat));
        }
        Ok(Self { lng, lat })
    }

    /// Longitude in degrees, [-180, 180].
    pub fn lng(&self) -> f64 {
        self.lng
    }

    /// Latitude in degrees, [-90, 90].
    pub fn lat(&self) -> f64 {
        self.lat
    }

    /// Haversine distance to `other` in meters.
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        distance_meters(*self, *other)
    }
}

/// Great-circle (haversine) distance between two points in meters.
///
/// Symmetric, and zero iff the points are identical.
///
/// ```
/// use hype_rank::domain::geo::{distance_meters, GeoPoint};
///
/// let paris = GeoPoint::new(2.3522, 48.8566).unwrap();
/// let london = GeoPoint::new(-0.1278, 51.5074).unwrap();
/// let d = distance_meters(paris, london);
/// assert!((d - 343_500.0).abs() < 1_000.0);
/// ```
pub fn distance_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let d_phi = (b.lat - a.lat).to_radians();
    let d_lambda = (b.lng - a.lng).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // rounding can push h a hair outside [0, 1] for antipodal points
    let h = h.clamp(0.0, 1.0);

    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_METERS * c
}
