use crate::error::AppError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// WGS84 position, optionally with the device-reported accuracy in meters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GpsCoordinate {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

impl GpsCoordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !(-90.0..=90.0).contains(&self.latitude) || !(-180.0..=180.0).contains(&self.longitude)
        {
            return Err(AppError::Validation(format!(
                "Coordinate out of range: {}, {}",
                self.latitude, self.longitude
            )));
        }
        Ok(())
    }
}

/// Encoded photo attached to a catch entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatchPhoto {
    /// Data URL or bare base64
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps: Option<GpsCoordinate>,
}

impl CatchPhoto {
    pub fn new(data: String) -> Self {
        Self { data, gps: None }
    }

    pub fn with_gps(data: String, gps: GpsCoordinate) -> Self {
        Self {
            data,
            gps: Some(gps),
        }
    }
}

/// One line of a catch report: a fish group and how many were caught
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatchEntry {
    pub fish_group: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub photos: Vec<CatchPhoto>,
}

impl CatchEntry {
    pub fn new(fish_group: impl Into<String>, quantity: u32) -> Self {
        Self {
            fish_group: fish_group.into(),
            quantity,
            photos: Vec::new(),
        }
    }
}

/// Catch report as produced by the catch form
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatchFormData {
    pub trip_id: String,
    pub date: NaiveDate,
    pub catches: Vec<CatchEntry>,
}

impl CatchFormData {
    pub fn new(trip_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            trip_id: trip_id.into(),
            date,
            catches: Vec::new(),
        }
    }

    pub fn photo_count(&self) -> usize {
        self.catches.iter().map(|c| c.photos.len()).sum()
    }

    pub fn photos(&self) -> impl Iterator<Item = &CatchPhoto> {
        self.catches.iter().flat_map(|c| c.photos.iter())
    }

    /// Copy holding only trip, date, fish groups and quantities
    pub fn metadata_only(&self) -> Self {
        Self {
            trip_id: self.trip_id.clone(),
            date: self.date,
            catches: self
                .catches
                .iter()
                .map(|c| CatchEntry::new(c.fish_group.clone(), c.quantity))
                .collect(),
        }
    }

    /// Validates the report before it is stored
    pub fn validate(&self) -> Result<(), AppError> {
        if self.trip_id.trim().is_empty() {
            return Err(AppError::Validation("Trip reference is required".to_string()));
        }

        if self.catches.is_empty() {
            return Err(AppError::Validation(
                "A catch report needs at least one entry".to_string(),
            ));
        }

        for entry in &self.catches {
            if entry.fish_group.trim().is_empty() {
                return Err(AppError::Validation("Fish group is required".to_string()));
            }
            for photo in &entry.photos {
                if photo.data.is_empty() {
                    return Err(AppError::Validation("Empty photo attached".to_string()));
                }
                if let Some(gps) = &photo.gps {
                    gps.validate()?;
                }
            }
        }

        Ok(())
    }
}
