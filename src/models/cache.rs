use crate::models::GpsCoordinate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded point of a trip track
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripPoint {
    pub trip_id: String,
    pub coordinate: GpsCoordinate,
    pub recorded_at: DateTime<Utc>,
}

/// Last position reported by a device
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationFix {
    pub coordinate: GpsCoordinate,
    pub recorded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_knots: Option<f64>,
}

/// A cached value together with the time it was written
#[derive(Debug, Clone, PartialEq)]
pub struct CachedEntry<T> {
    pub device_id: String,
    pub value: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedEntry<T> {
    /// Caller-side staleness check; the store itself never expires entries
    pub fn is_older_than(&self, max_age: chrono::Duration, now: DateTime<Utc>) -> bool {
        now - self.cached_at > max_age
    }
}
