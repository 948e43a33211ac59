use crate::error::AppError;
use crate::models::{CatchFormData, PhotoPayload, UploadType, WaypointPayload};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who submits a record: a registered device or a named account, never both
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Submitter {
    DeviceId(String),
    Username(String),
}

impl Submitter {
    pub fn device_id(&self) -> Option<&str> {
        match self {
            Submitter::DeviceId(id) => Some(id),
            Submitter::Username(_) => None,
        }
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Submitter::Username(name) => Some(name),
            Submitter::DeviceId(_) => None,
        }
    }

    /// Rebuilds the submitter from its two nullable storage columns
    pub fn from_columns(device_id: Option<String>, username: Option<String>) -> Option<Self> {
        match (device_id, username) {
            (Some(id), None) => Some(Submitter::DeviceId(id)),
            (None, Some(name)) => Some(Submitter::Username(name)),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let value = match self {
            Submitter::DeviceId(id) => id,
            Submitter::Username(name) => name,
        };
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "Submitter identity must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Payload kinds that can be parked in the offline store
pub trait RecordPayload: Serialize + DeserializeOwned + Clone + Send + 'static {
    const KIND: UploadType;

    fn trip_id(&self) -> &str;

    fn validate(&self) -> Result<(), AppError>;
}

impl RecordPayload for CatchFormData {
    const KIND: UploadType = UploadType::Catch;

    fn trip_id(&self) -> &str {
        &self.trip_id
    }

    fn validate(&self) -> Result<(), AppError> {
        CatchFormData::validate(self)
    }
}

impl RecordPayload for PhotoPayload {
    const KIND: UploadType = UploadType::Photo;

    fn trip_id(&self) -> &str {
        &self.trip_id
    }

    fn validate(&self) -> Result<(), AppError> {
        PhotoPayload::validate(self)
    }
}

impl RecordPayload for WaypointPayload {
    const KIND: UploadType = UploadType::Waypoint;

    fn trip_id(&self) -> &str {
        &self.trip_id
    }

    fn validate(&self) -> Result<(), AppError> {
        WaypointPayload::validate(self)
    }
}

/// Durable copy of a captured record, kept forever as an audit trail
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingRecord<P> {
    pub id: Uuid,
    pub payload: P,
    pub submitter: Submitter,
    pub created_at: DateTime<Utc>,
    pub submitted: bool,
    pub submitted_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

pub type PendingCatchRecord = PendingRecord<CatchFormData>;
pub type PendingPhotoRecord = PendingRecord<PhotoPayload>;
pub type PendingWaypointRecord = PendingRecord<WaypointPayload>;

/// Column list matching the `TryFrom<&Row>` mapping below
pub const PENDING_RECORD_COLUMNS: &str =
    "id, payload, device_id, username, created_at, submitted, submitted_at, retry_count, last_error";

impl<'r, P: RecordPayload> TryFrom<&Row<'r>> for PendingRecord<P> {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'r>) -> Result<Self, Self::Error> {
        let id_str: String = row.get(0)?;
        let payload_str: String = row.get(1)?;
        let device_id: Option<String> = row.get(2)?;
        let username: Option<String> = row.get(3)?;

        let id = Uuid::parse_str(&id_str)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
        let payload: P = serde_json::from_str(&payload_str)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
        let submitter = Submitter::from_columns(device_id, username).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                Type::Null,
                Box::new(AppError::Validation(format!(
                    "Record {} has no unique submitter",
                    id_str
                ))),
            )
        })?;

        Ok(PendingRecord {
            id,
            payload,
            submitter,
            created_at: row.get(4)?,
            submitted: row.get(5)?,
            submitted_at: row.get(6)?,
            retry_count: row.get(7)?,
            last_error: row.get(8)?,
        })
    }
}
