use crate::models::UploadType;
use crate::services::remote_api::NetworkErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status as shown to the user; `Retrying` only exists in memory
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Retrying,
    Completed,
    Failed,
}

impl UploadStatus {
    /// An attempt is running right now
    pub fn is_active(&self) -> bool {
        matches!(self, UploadStatus::Uploading | UploadStatus::Retrying)
    }
}

/// In-memory mirror of a queue item for UI observation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadProgress {
    pub id: String,
    pub upload_type: UploadType,
    pub status: UploadStatus,
    /// 0-100, estimated; stays at or below 90 until the upload completes
    pub progress: u8,
    pub error: Option<String>,
    pub error_kind: Option<NetworkErrorKind>,
    pub retry_count: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
}

impl UploadProgress {
    pub fn new(id: String, upload_type: UploadType) -> Self {
        Self {
            id,
            upload_type,
            status: UploadStatus::Pending,
            progress: 0,
            error: None,
            error_kind: None,
            retry_count: 0,
            next_retry_at: None,
        }
    }
}

/// Counts per status over the in-memory uploads
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadStats {
    pub total: usize,
    pub pending: usize,
    pub uploading: usize,
    pub retrying: usize,
    pub completed: usize,
    pub failed: usize,
}

impl UploadStats {
    pub fn from_progress<'a>(items: impl Iterator<Item = &'a UploadProgress>) -> Self {
        let mut stats = UploadStats::default();
        for item in items {
            stats.total += 1;
            match item.status {
                UploadStatus::Pending => stats.pending += 1,
                UploadStatus::Uploading => stats.uploading += 1,
                UploadStatus::Retrying => stats.retrying += 1,
                UploadStatus::Completed => stats.completed += 1,
                UploadStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }
}

/// Unsubmitted record counts in the offline store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStats {
    pub pending_catches: usize,
    pub pending_photos: usize,
    pub pending_waypoints: usize,
    pub queue_depth: usize,
}
