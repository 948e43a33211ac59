use crate::models::{CatchFormData, PhotoPayload, UploadType, WaypointPayload};
use serde::{Deserialize, Serialize};

/// Payload handed to the upload manager by the capture forms
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum UploadData {
    Catch(CatchFormData),
    Photo(PhotoPayload),
    Waypoint(WaypointPayload),
}

impl UploadData {
    pub fn upload_type(&self) -> UploadType {
        match self {
            UploadData::Catch(_) => UploadType::Catch,
            UploadData::Photo(_) => UploadType::Photo,
            UploadData::Waypoint(_) => UploadType::Waypoint,
        }
    }

    pub fn trip_id(&self) -> &str {
        match self {
            UploadData::Catch(c) => &c.trip_id,
            UploadData::Photo(p) => &p.trip_id,
            UploadData::Waypoint(w) => &w.trip_id,
        }
    }
}
