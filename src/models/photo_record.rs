use crate::error::AppError;
use crate::models::GpsCoordinate;
use serde::{Deserialize, Serialize};

/// A photo captured on its own (not attached to a catch line)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhotoPayload {
    pub trip_id: String,
    /// Data URL or bare base64
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps: Option<GpsCoordinate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl PhotoPayload {
    pub fn new(trip_id: impl Into<String>, data: String) -> Self {
        Self {
            trip_id: trip_id.into(),
            data,
            gps: None,
            caption: None,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.trip_id.trim().is_empty() {
            return Err(AppError::Validation("Trip reference is required".to_string()));
        }
        if self.data.is_empty() {
            return Err(AppError::Validation("Photo data is empty".to_string()));
        }
        if let Some(gps) = &self.gps {
            gps.validate()?;
        }
        Ok(())
    }
}
