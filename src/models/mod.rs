pub mod cache;
pub mod catch_record;
pub mod pending_record;
pub mod photo_record;
pub mod upload_data;
pub mod upload_progress;
pub mod upload_queue;
pub mod waypoint_record;

pub use cache::{CachedEntry, LocationFix, TripPoint};
pub use catch_record::{CatchEntry, CatchFormData, CatchPhoto, GpsCoordinate};
pub use pending_record::{
    PendingCatchRecord, PendingPhotoRecord, PendingRecord, PendingWaypointRecord, RecordPayload,
    Submitter,
};
pub use photo_record::PhotoPayload;
pub use upload_data::UploadData;
pub use upload_progress::{StorageStats, UploadProgress, UploadStats, UploadStatus};
pub use upload_queue::{QueueStatus, UploadQueueItem, UploadType};
pub use waypoint_record::WaypointPayload;
