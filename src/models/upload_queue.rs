use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of record an upload delivers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UploadType {
    Photo,
    Catch,
    Waypoint,
}

impl UploadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadType::Photo => "photo",
            UploadType::Catch => "catch",
            UploadType::Waypoint => "waypoint",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "photo" => Some(UploadType::Photo),
            "catch" => Some(UploadType::Catch),
            "waypoint" => Some(UploadType::Waypoint),
            _ => None,
        }
    }

    /// Table holding the durable records of this kind
    pub fn table(&self) -> &'static str {
        match self {
            UploadType::Photo => "pending_photos",
            UploadType::Catch => "pending_catches",
            UploadType::Waypoint => "pending_waypoints",
        }
    }
}

impl std::fmt::Display for UploadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted status of a queue item
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Uploading,
    Completed,
    Failed,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Uploading => "uploading",
            QueueStatus::Completed => "completed",
            QueueStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(QueueStatus::Pending),
            "uploading" => Some(QueueStatus::Uploading),
            "completed" => Some(QueueStatus::Completed),
            "failed" => Some(QueueStatus::Failed),
            _ => None,
        }
    }
}

/// Lightweight pointer from the upload queue to one durable record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadQueueItem {
    pub id: String,
    pub upload_type: UploadType,
    pub item_id: Uuid,
    pub priority: i64,
    pub status: QueueStatus,
    pub retry_count: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UploadQueueItem {
    /// Not eligible for an attempt before `next_retry_at`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_retry_at.map_or(true, |at| at <= now)
    }
}

/// Column list matching the `TryFrom<&Row>` mapping below
pub const QUEUE_COLUMNS: &str =
    "id, upload_type, item_id, priority, status, retry_count, next_retry_at, last_error, created_at";

fn invalid_text(idx: usize, what: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("invalid {}: {}", what, value).into(),
    )
}

impl<'r> TryFrom<&Row<'r>> for UploadQueueItem {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'r>) -> Result<Self, Self::Error> {
        let id: String = row.get(0)?;
        let type_str: String = row.get(1)?;
        let item_str: String = row.get(2)?;
        let status_str: String = row.get(4)?;

        let upload_type =
            UploadType::parse(&type_str).ok_or_else(|| invalid_text(1, "upload type", &type_str))?;
        let item_id = Uuid::parse_str(&item_str)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
        let status =
            QueueStatus::parse(&status_str).ok_or_else(|| invalid_text(4, "status", &status_str))?;

        Ok(UploadQueueItem {
            id,
            upload_type,
            item_id,
            priority: row.get(3)?,
            status,
            retry_count: row.get(5)?,
            next_retry_at: row.get(6)?,
            last_error: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_type_strings() {
        for t in [UploadType::Photo, UploadType::Catch, UploadType::Waypoint] {
            assert_eq!(UploadType::parse(t.as_str()), Some(t));
        }
        assert_eq!(UploadType::parse("video"), None);
        assert_eq!(UploadType::Catch.table(), "pending_catches");
    }

    #[test]
    fn test_queue_status_strings() {
        for s in [
            QueueStatus::Pending,
            QueueStatus::Uploading,
            QueueStatus::Completed,
            QueueStatus::Failed,
        ] {
            assert_eq!(QueueStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(QueueStatus::parse("retrying"), None);
    }

    #[test]
    fn test_is_due() {
        let now = Utc::now();
        let mut item = UploadQueueItem {
            id: "q".to_string(),
            upload_type: UploadType::Catch,
            item_id: Uuid::new_v4(),
            priority: 0,
            status: QueueStatus::Pending,
            retry_count: 0,
            next_retry_at: None,
            last_error: None,
            created_at: now,
        };
        assert!(item.is_due(now));

        item.next_retry_at = Some(now + chrono::Duration::minutes(2));
        assert!(!item.is_due(now));
        assert!(item.is_due(now + chrono::Duration::minutes(3)));
    }
}
