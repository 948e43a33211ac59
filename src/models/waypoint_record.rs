use crate::error::AppError;
use crate::models::GpsCoordinate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Named position marked during a trip (fishing ground, landing site, ...)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WaypointPayload {
    pub trip_id: String,
    pub name: String,
    pub coordinate: GpsCoordinate,
    pub recorded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl WaypointPayload {
    pub fn new(trip_id: impl Into<String>, name: impl Into<String>, coordinate: GpsCoordinate) -> Self {
        Self {
            trip_id: trip_id.into(),
            name: name.into(),
            coordinate,
            recorded_at: Utc::now(),
            notes: None,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.trip_id.trim().is_empty() {
            return Err(AppError::Validation("Trip reference is required".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("Waypoint name is required".to_string()));
        }
        if let Some(notes) = &self.notes {
            if notes.len() > 1000 {
                return Err(AppError::Validation(
                    "Notes must not exceed 1000 characters".to_string(),
                ));
            }
        }
        self.coordinate.validate()
    }
}
