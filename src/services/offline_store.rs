use crate::config::DEFAULT_BACKOFF_CAP_MINUTES;
use crate::database;
use crate::error::AppError;
use crate::models::pending_record::PENDING_RECORD_COLUMNS;
use crate::models::upload_queue::QUEUE_COLUMNS;
use crate::models::{
    CachedEntry, CatchFormData, LocationFix, PendingCatchRecord, PendingPhotoRecord,
    PendingRecord, PendingWaypointRecord, PhotoPayload, QueueStatus, RecordPayload, StorageStats,
    Submitter, TripPoint, UploadQueueItem, UploadType, WaypointPayload,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

const TRIP_POINTS_CACHE: &str = "trip_points_cache";
const LAST_LOCATION_CACHE: &str = "last_location_cache";

/// Durable store for captured records, the upload queue and device caches.
///
/// Cloning is cheap; all clones share one SQLite connection.
#[derive(Clone)]
pub struct OfflineStore {
    conn: Arc<Mutex<Connection>>,
    backoff_cap_minutes: u64,
}

impl OfflineStore {
    /// Opens (and migrates) the database file at `path`
    pub fn open(path: &Path) -> Result<Self, AppError> {
        let conn = database::init_database(path)?;
        Ok(Self::from_connection(conn))
    }

    pub fn in_memory() -> Result<Self, AppError> {
        let conn = database::init_in_memory()?;
        Ok(Self::from_connection(conn))
    }

    /// Wraps a connection whose schema is already initialized
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            backoff_cap_minutes: DEFAULT_BACKOFF_CAP_MINUTES,
        }
    }

    pub fn with_backoff_cap(mut self, cap_minutes: u64) -> Self {
        self.backoff_cap_minutes = cap_minutes;
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.conn
            .lock()
            .map_err(|_| AppError::Other("Offline store lock poisoned".to_string()))
    }

    // ---------------------------------------------------------------------
    // Pending records
    // ---------------------------------------------------------------------

    /// Writes a new unsubmitted record and returns its id
    pub fn save<P: RecordPayload>(&self, payload: &P, submitter: &Submitter) -> Result<Uuid, AppError> {
        payload.validate()?;
        submitter.validate()?;

        let id = Uuid::new_v4();
        let json = serde_json::to_string(payload)?;
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO {} (id, trip_id, payload, device_id, username, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                P::KIND.table()
            ),
            params![
                id.to_string(),
                payload.trip_id(),
                json,
                submitter.device_id(),
                submitter.username(),
                Utc::now(),
            ],
        )?;

        log::debug!("Saved pending {} {}", P::KIND, id);
        Ok(id)
    }

    pub fn get_record<P: RecordPayload>(&self, id: Uuid) -> Result<Option<PendingRecord<P>>, AppError> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE id = ?1",
                    PENDING_RECORD_COLUMNS,
                    P::KIND.table()
                ),
                params![id.to_string()],
                |row| PendingRecord::<P>::try_from(row),
            )
            .optional()?;
        Ok(record)
    }

    /// All unsubmitted records of one kind, oldest first
    pub fn get_pending<P: RecordPayload>(&self) -> Result<Vec<PendingRecord<P>>, AppError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} WHERE submitted = 0 ORDER BY created_at ASC",
            PENDING_RECORD_COLUMNS,
            P::KIND.table()
        ))?;
        let rows = stmt.query_map([], |row| PendingRecord::<P>::try_from(row))?;

        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn get_pending_for_trip<P: RecordPayload>(
        &self,
        trip_id: &str,
    ) -> Result<Vec<PendingRecord<P>>, AppError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} WHERE trip_id = ?1 AND submitted = 0 ORDER BY created_at ASC",
            PENDING_RECORD_COLUMNS,
            P::KIND.table()
        ))?;
        let rows = stmt.query_map(params![trip_id], |row| PendingRecord::<P>::try_from(row))?;

        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    /// Flags a record as submitted. Returns `false` if it already was.
    pub fn mark_submitted(&self, kind: UploadType, id: Uuid) -> Result<bool, AppError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            &format!(
                "UPDATE {} SET submitted = 1, submitted_at = ?1 WHERE id = ?2 AND submitted = 0",
                kind.table()
            ),
            params![Utc::now(), id.to_string()],
        )?;
        if changed == 1 {
            return Ok(true);
        }

        let exists: Option<i64> = conn
            .query_row(
                &format!("SELECT 1 FROM {} WHERE id = ?1", kind.table()),
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        match exists {
            Some(_) => Ok(false),
            None => Err(AppError::NotFound(format!("{} record {}", kind, id))),
        }
    }

    /// Counts a failed delivery attempt against the record
    pub fn record_error(&self, kind: UploadType, id: Uuid, message: &str) -> Result<(), AppError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            &format!(
                "UPDATE {} SET retry_count = retry_count + 1, last_error = ?1 WHERE id = ?2",
                kind.table()
            ),
            params![message, id.to_string()],
        )?;
        if changed == 0 {
            return Err(AppError::NotFound(format!("{} record {}", kind, id)));
        }
        Ok(())
    }

    pub fn save_catch(&self, form: &CatchFormData, submitter: &Submitter) -> Result<Uuid, AppError> {
        self.save(form, submitter)
    }

    pub fn save_photo(&self, photo: &PhotoPayload, submitter: &Submitter) -> Result<Uuid, AppError> {
        self.save(photo, submitter)
    }

    pub fn save_waypoint(
        &self,
        waypoint: &WaypointPayload,
        submitter: &Submitter,
    ) -> Result<Uuid, AppError> {
        self.save(waypoint, submitter)
    }

    pub fn get_catch(&self, id: Uuid) -> Result<Option<PendingCatchRecord>, AppError> {
        self.get_record(id)
    }

    pub fn get_photo(&self, id: Uuid) -> Result<Option<PendingPhotoRecord>, AppError> {
        self.get_record(id)
    }

    pub fn get_waypoint(&self, id: Uuid) -> Result<Option<PendingWaypointRecord>, AppError> {
        self.get_record(id)
    }

    pub fn get_pending_catches(&self) -> Result<Vec<PendingCatchRecord>, AppError> {
        self.get_pending()
    }

    pub fn get_pending_photos(&self) -> Result<Vec<PendingPhotoRecord>, AppError> {
        self.get_pending()
    }

    pub fn get_pending_waypoints(&self) -> Result<Vec<PendingWaypointRecord>, AppError> {
        self.get_pending()
    }

    pub fn get_pending_catches_for_trip(
        &self,
        trip_id: &str,
    ) -> Result<Vec<PendingCatchRecord>, AppError> {
        self.get_pending_for_trip(trip_id)
    }

    pub fn get_pending_photos_for_trip(
        &self,
        trip_id: &str,
    ) -> Result<Vec<PendingPhotoRecord>, AppError> {
        self.get_pending_for_trip(trip_id)
    }

    pub fn get_pending_waypoints_for_trip(
        &self,
        trip_id: &str,
    ) -> Result<Vec<PendingWaypointRecord>, AppError> {
        self.get_pending_for_trip(trip_id)
    }

    pub fn mark_catch_submitted(&self, id: Uuid) -> Result<bool, AppError> {
        self.mark_submitted(UploadType::Catch, id)
    }

    pub fn mark_photo_submitted(&self, id: Uuid) -> Result<bool, AppError> {
        self.mark_submitted(UploadType::Photo, id)
    }

    pub fn mark_waypoint_submitted(&self, id: Uuid) -> Result<bool, AppError> {
        self.mark_submitted(UploadType::Waypoint, id)
    }

    pub fn record_catch_error(&self, id: Uuid, message: &str) -> Result<(), AppError> {
        self.record_error(UploadType::Catch, id, message)
    }

    pub fn record_photo_error(&self, id: Uuid, message: &str) -> Result<(), AppError> {
        self.record_error(UploadType::Photo, id, message)
    }

    pub fn record_waypoint_error(&self, id: Uuid, message: &str) -> Result<(), AppError> {
        self.record_error(UploadType::Waypoint, id, message)
    }

    // ---------------------------------------------------------------------
    // Upload queue
    // ---------------------------------------------------------------------

    /// Enqueues a pointer to a durable record and returns the queue item id
    pub fn add_to_upload_queue(
        &self,
        upload_type: UploadType,
        item_id: Uuid,
        priority: i64,
    ) -> Result<String, AppError> {
        let id = ulid::Ulid::new().to_string();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO upload_queue (id, upload_type, item_id, priority, status, created_at)
             VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
            params![id, upload_type.as_str(), item_id.to_string(), priority, Utc::now()],
        )?;
        log::debug!("Queued {} {} as {} (priority {})", upload_type, item_id, id, priority);
        Ok(id)
    }

    /// Pending queue items: highest priority first, FIFO within a priority
    pub fn get_upload_queue(&self) -> Result<Vec<UploadQueueItem>, AppError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM upload_queue
             WHERE status = 'pending'
             ORDER BY priority DESC, created_at ASC, seq ASC",
            QUEUE_COLUMNS
        ))?;
        let rows = stmt.query_map([], |row| UploadQueueItem::try_from(row))?;

        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn get_queue_item(&self, id: &str) -> Result<Option<UploadQueueItem>, AppError> {
        let conn = self.lock()?;
        let item = conn
            .query_row(
                &format!("SELECT {} FROM upload_queue WHERE id = ?1", QUEUE_COLUMNS),
                params![id],
                |row| UploadQueueItem::try_from(row),
            )
            .optional()?;
        Ok(item)
    }

    /// Sets the status of a queue item.
    ///
    /// `Failed` counts one more attempt and schedules `next_retry_at` with the
    /// exponential backoff; other statuses leave the counters alone.
    pub fn update_queue_item_status(
        &self,
        id: &str,
        status: QueueStatus,
        error: Option<&str>,
    ) -> Result<(), AppError> {
        let conn = self.lock()?;
        let changed = if status == QueueStatus::Failed {
            let tx = conn.unchecked_transaction()?;
            let retry_count: Option<u32> = tx
                .query_row(
                    "SELECT retry_count FROM upload_queue WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(retry_count) = retry_count else {
                return Err(AppError::NotFound(format!("Queue item {}", id)));
            };

            let retry_count = retry_count + 1;
            let minutes = crate::config::backoff_minutes(retry_count, self.backoff_cap_minutes);
            let next_retry_at = Utc::now() + chrono::Duration::minutes(minutes as i64);
            let changed = tx.execute(
                "UPDATE upload_queue
                 SET status = 'failed', retry_count = ?1, next_retry_at = ?2,
                     last_error = COALESCE(?3, last_error)
                 WHERE id = ?4",
                params![retry_count, next_retry_at, error, id],
            )?;
            tx.commit()?;
            changed
        } else {
            conn.execute(
                "UPDATE upload_queue SET status = ?1, last_error = COALESCE(?2, last_error)
                 WHERE id = ?3",
                params![status.as_str(), error, id],
            )?
        };

        if changed == 0 {
            return Err(AppError::NotFound(format!("Queue item {}", id)));
        }
        Ok(())
    }

    /// Puts items left in `uploading` by an interrupted run back to `pending`
    pub fn requeue_interrupted_uploads(&self) -> Result<usize, AppError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE upload_queue SET status = 'pending' WHERE status = 'uploading'",
            [],
        )?;
        Ok(changed)
    }

    /// Manual retry: back to pending, one attempt credited, no waiting time
    pub fn reset_queue_item_for_retry(&self, id: &str) -> Result<(), AppError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE upload_queue
             SET status = 'pending', retry_count = MAX(retry_count - 1, 0), next_retry_at = NULL
             WHERE id = ?1",
            params![id],
        )?;
        if changed == 0 {
            return Err(AppError::NotFound(format!("Queue item {}", id)));
        }
        Ok(())
    }

    /// Deletes a queue item. The referenced record is kept.
    pub fn remove_from_queue(&self, id: &str) -> Result<bool, AppError> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM upload_queue WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    pub fn get_storage_stats(&self) -> Result<StorageStats, AppError> {
        let conn = self.lock()?;
        let count_pending = |table: &str| -> Result<usize, AppError> {
            let n: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM {} WHERE submitted = 0", table),
                [],
                |row| row.get(0),
            )?;
            Ok(n as usize)
        };

        let pending_catches = count_pending(UploadType::Catch.table())?;
        let pending_photos = count_pending(UploadType::Photo.table())?;
        let pending_waypoints = count_pending(UploadType::Waypoint.table())?;
        let queue_depth: i64 =
            conn.query_row("SELECT COUNT(*) FROM upload_queue", [], |row| row.get(0))?;

        Ok(StorageStats {
            pending_catches,
            pending_photos,
            pending_waypoints,
            queue_depth: queue_depth as usize,
        })
    }

    // ---------------------------------------------------------------------
    // Device caches
    // ---------------------------------------------------------------------

    pub fn cache_trip_points(&self, device_id: &str, points: &[TripPoint]) -> Result<(), AppError> {
        self.write_cache(TRIP_POINTS_CACHE, device_id, &points)
    }

    pub fn get_cached_trip_points(
        &self,
        device_id: &str,
    ) -> Result<Option<CachedEntry<Vec<TripPoint>>>, AppError> {
        self.read_cache(TRIP_POINTS_CACHE, device_id)
    }

    pub fn cache_last_location(&self, device_id: &str, fix: &LocationFix) -> Result<(), AppError> {
        self.write_cache(LAST_LOCATION_CACHE, device_id, fix)
    }

    pub fn get_cached_last_location(
        &self,
        device_id: &str,
    ) -> Result<Option<CachedEntry<LocationFix>>, AppError> {
        self.read_cache(LAST_LOCATION_CACHE, device_id)
    }

    fn write_cache<T: Serialize + ?Sized>(
        &self,
        table: &str,
        device_id: &str,
        value: &T,
    ) -> Result<(), AppError> {
        let json = serde_json::to_string(value)?;
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO {table} (device_id, data, cached_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(device_id) DO UPDATE SET data = excluded.data, cached_at = excluded.cached_at"
            ),
            params![device_id, json, Utc::now()],
        )?;
        Ok(())
    }

    fn read_cache<T: DeserializeOwned>(
        &self,
        table: &str,
        device_id: &str,
    ) -> Result<Option<CachedEntry<T>>, AppError> {
        let conn = self.lock()?;
        let row: Option<(String, DateTime<Utc>)> = conn
            .query_row(
                &format!("SELECT data, cached_at FROM {table} WHERE device_id = ?1"),
                params![device_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((data, cached_at)) => Ok(Some(CachedEntry {
                device_id: device_id.to_string(),
                value: serde_json::from_str(&data)?,
                cached_at,
            })),
            None => Ok(None),
        }
    }
}
