//! Orchestrates delivery of captured records to the remote API.
//!
//! Every upload is persisted in the [`OfflineStore`] before anything touches
//! the network. The manager mirrors each queue item as an [`UploadProgress`]
//! that UIs observe through [`UploadManager::on_progress_update`], retries
//! failed submissions with exponential backoff and reconciles the whole queue
//! periodically and whenever connectivity returns.

use crate::config::SyncConfig;
use crate::error::AppError;
use crate::models::{
    PendingRecord, QueueStatus, RecordPayload, Submitter, UploadData, UploadProgress,
    UploadQueueItem, UploadStats, UploadStatus, UploadType,
};
use crate::services::background_sync::{self, SyncLog, SyncLogEntry};
use crate::services::connectivity::Connectivity;
use crate::services::offline_store::OfflineStore;
use crate::services::payload_optimizer;
use crate::services::remote_api::{RemoteSubmitter, SubmitError};
use chrono::Utc;
use photo_codec::ImageCodec;
use rand::Rng;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

/// Progress never reaches this value before the server confirms
const MAX_ESTIMATED_PROGRESS: u8 = 90;

/// Everything needed to submit one queue item
#[derive(Debug, Clone)]
struct UploadJob {
    queue_id: String,
    record_id: Uuid,
    data: UploadData,
    submitter: Submitter,
}

impl UploadJob {
    fn kind(&self) -> UploadType {
        self.data.upload_type()
    }
}

#[derive(Default)]
struct State {
    /// Keyed by ULID, so iteration follows creation order
    uploads: BTreeMap<String, UploadProgress>,
    retry_timers: HashMap<String, JoinHandle<()>>,
    /// Bumped by every addition; only the newest debounce timer may sweep
    debounce_generation: u64,
    /// Accepted by the server, record not yet marked submitted
    delivered: HashSet<String>,
    periodic: Vec<JoinHandle<()>>,
    next_sweep_at: Option<Instant>,
}

struct Inner {
    store: OfflineStore,
    api: Arc<dyn RemoteSubmitter>,
    codec: Arc<dyn ImageCodec>,
    connectivity: Connectivity,
    config: SyncConfig,
    state: Mutex<State>,
    progress_tx: watch::Sender<Vec<UploadProgress>>,
    is_processing: AtomicBool,
    /// A sweep was refused while another one ran
    rerun_requested: AtomicBool,
    sync_log: SyncLog,
}

/// Upload orchestrator. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct UploadManager {
    inner: Arc<Inner>,
}

/// Resets the sweep flag when the sweep ends, however it ends
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl UploadManager {
    pub fn new(
        store: OfflineStore,
        api: Arc<dyn RemoteSubmitter>,
        codec: Arc<dyn ImageCodec>,
        connectivity: Connectivity,
        config: SyncConfig,
    ) -> Self {
        let store = store.with_backoff_cap(config.backoff_cap_minutes);
        match store.requeue_interrupted_uploads() {
            Ok(0) => {}
            Ok(n) => log::info!("Requeued {} interrupted uploads", n),
            Err(e) => log::error!("Failed to requeue interrupted uploads: {}", e),
        }

        let (progress_tx, _rx) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(Inner {
                store,
                api,
                codec,
                connectivity,
                config,
                state: Mutex::new(State::default()),
                progress_tx,
                is_processing: AtomicBool::new(false),
                rerun_requested: AtomicBool::new(false),
                sync_log: SyncLog::default(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // State stays consistent even if a holder panicked
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify(&self) {
        let snapshot: Vec<UploadProgress> = self.state().uploads.values().cloned().collect();
        self.inner.progress_tx.send_replace(snapshot);
    }

    pub fn store(&self) -> &OfflineStore {
        &self.inner.store
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Subscribes to progress snapshots; the current snapshot is readable
    /// immediately. Dropping the receiver unsubscribes.
    pub fn on_progress_update(&self) -> watch::Receiver<Vec<UploadProgress>> {
        self.inner.progress_tx.subscribe()
    }

    pub fn get_progress(&self, id: &str) -> Option<UploadProgress> {
        self.state().uploads.get(id).cloned()
    }

    pub fn uploads(&self) -> Vec<UploadProgress> {
        self.state().uploads.values().cloned().collect()
    }

    /// Persists the record, queues it and schedules a deferred sweep.
    ///
    /// Returns the upload id (the queue item id). Storage failures are
    /// returned to the caller; nothing is queued in that case.
    pub fn add_upload(
        &self,
        data: UploadData,
        submitter: Submitter,
        priority: i64,
    ) -> Result<String, AppError> {
        let store = &self.inner.store;
        let kind = data.upload_type();
        let record_id = match &data {
            UploadData::Catch(form) => store.save_catch(form, &submitter)?,
            UploadData::Photo(photo) => store.save_photo(photo, &submitter)?,
            UploadData::Waypoint(waypoint) => store.save_waypoint(waypoint, &submitter)?,
        };
        let id = store.add_to_upload_queue(kind, record_id, priority)?;

        log::info!("Queued {} upload {} for trip {}", kind, id, data.trip_id());
        self.state()
            .uploads
            .insert(id.clone(), UploadProgress::new(id.clone(), kind));
        self.notify();
        self.schedule_debounced_sweep();

        Ok(id)
    }

    /// Restarts the debounce window; only the last addition in a burst fires.
    ///
    /// Older timers are outdated rather than aborted, so a sweep that already
    /// started always runs to completion.
    fn schedule_debounced_sweep(&self) {
        let generation = {
            let mut state = self.state();
            state.debounce_generation += 1;
            state.debounce_generation
        };

        let manager = self.clone();
        let delay = self.inner.config.debounce_delay();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if manager.state().debounce_generation != generation {
                return;
            }
            manager.process_pending_uploads().await;
        });
    }

    /// One delivery attempt for `job`.
    ///
    /// A no-op if the upload is in flight, completed, permanently failed or
    /// cancelled. Manual retries reset the status before calling this.
    async fn process_upload(&self, job: UploadJob, is_retry: bool) {
        let id = job.queue_id.clone();
        let delivered = {
            let mut state = self.state();
            let Some(entry) = state.uploads.get_mut(&id) else {
                log::debug!("Upload {} no longer tracked, skipping", id);
                return;
            };
            if matches!(
                entry.status,
                UploadStatus::Uploading | UploadStatus::Completed | UploadStatus::Failed
            ) {
                return;
            }
            entry.status = if is_retry {
                UploadStatus::Retrying
            } else {
                UploadStatus::Uploading
            };
            entry.progress = 0;
            entry.next_retry_at = None;

            if let Some(timer) = state.retry_timers.remove(&id) {
                timer.abort();
            }
            state.delivered.contains(&id)
        };
        self.notify();

        if delivered {
            log::info!("Upload {} already accepted by the server, finishing it", id);
            self.handle_success(&job);
            return;
        }

        if let Err(e) = self
            .inner
            .store
            .update_queue_item_status(&id, QueueStatus::Uploading, None)
        {
            log::warn!("Could not mark queue item {} uploading: {}", id, e);
        }

        log::debug!(
            "{} {} upload {}",
            if is_retry { "Retrying" } else { "Starting" },
            job.kind(),
            id
        );
        let ticker = self.spawn_progress_ticker(id.clone());
        let result = self.submit(&job).await;
        ticker.abort();

        match result {
            Ok(()) => self.handle_success(&job),
            Err(e) => self.handle_failure(job, e),
        }
    }

    /// Raises the progress estimate in small random steps while a request runs
    fn spawn_progress_ticker(&self, id: String) -> JoinHandle<()> {
        let manager = self.clone();
        let tick = self.inner.config.progress_tick();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(tick).await;
                let step: u8 = rand::rng().random_range(5..=15);
                {
                    let mut state = manager.state();
                    let Some(entry) = state.uploads.get_mut(&id) else {
                        return;
                    };
                    if !entry.status.is_active() {
                        return;
                    }
                    entry.progress = entry
                        .progress
                        .saturating_add(step)
                        .min(MAX_ESTIMATED_PROGRESS);
                }
                manager.notify();
            }
        })
    }

    async fn submit(&self, job: &UploadJob) -> Result<(), SubmitError> {
        let api = &self.inner.api;
        let config = &self.inner.config;
        let codec = self.inner.codec.as_ref();

        match &job.data {
            UploadData::Catch(form) => {
                let chunks = payload_optimizer::optimize_payload(form, config, codec);
                for chunk in &chunks {
                    let remote_id = api.submit_catch(chunk, &job.submitter).await?;
                    log::debug!("Catch {} accepted as {}", job.record_id, remote_id);
                }
            }
            UploadData::Photo(photo) => {
                let mut photo = photo.clone();
                photo.data = payload_optimizer::shrink_photo(&photo.data, config, codec);
                let remote_id = api.submit_photo(&photo, &job.submitter).await?;
                log::debug!("Photo {} accepted as {}", job.record_id, remote_id);
            }
            UploadData::Waypoint(waypoint) => {
                let remote_id = api.submit_waypoint(waypoint, &job.submitter).await?;
                log::debug!("Waypoint {} accepted as {}", job.record_id, remote_id);
            }
        }
        Ok(())
    }

    fn handle_success(&self, job: &UploadJob) {
        let store = &self.inner.store;
        match store.mark_submitted(job.kind(), job.record_id) {
            Ok(_) | Err(AppError::NotFound(_)) => {}
            Err(e) => {
                log::error!("Failed to mark {} {} submitted: {}", job.kind(), job.record_id, e);
                self.defer_marking(job, &e);
                return;
            }
        }
        // A crash before this point leaves a stale queue item; the next sweep drops it
        if let Err(e) = store.remove_from_queue(&job.queue_id) {
            log::error!("Failed to retire queue item {}: {}", job.queue_id, e);
        }
        self.state().delivered.remove(&job.queue_id);

        log::info!("Upload {} completed", job.queue_id);
        let tracked = {
            let mut state = self.state();
            match state.uploads.get_mut(&job.queue_id) {
                Some(entry) => {
                    entry.status = UploadStatus::Completed;
                    entry.progress = 100;
                    entry.error = None;
                    entry.error_kind = None;
                    entry.next_retry_at = None;
                    true
                }
                None => false,
            }
        };
        if tracked {
            self.notify();
            self.schedule_eviction(job.queue_id.clone());
        }
    }

    /// Keeps the queue item of a delivered upload whose record could not be
    /// marked, so the next sweep finishes it without sending it again
    fn defer_marking(&self, job: &UploadJob, error: &AppError) {
        if let Err(e) = self
            .inner
            .store
            .update_queue_item_status(&job.queue_id, QueueStatus::Pending, None)
        {
            log::error!("Failed to requeue {}: {}", job.queue_id, e);
        }

        {
            let mut state = self.state();
            state.delivered.insert(job.queue_id.clone());
            if let Some(entry) = state.uploads.get_mut(&job.queue_id) {
                entry.status = UploadStatus::Pending;
                entry.progress = MAX_ESTIMATED_PROGRESS;
                entry.error = Some(error.user_message());
                entry.error_kind = None;
            }
        }
        self.notify();
    }

    /// Drops a completed entry once the UI had time to show it
    fn schedule_eviction(&self, id: String) {
        let manager = self.clone();
        let grace = self.inner.config.completed_grace();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let removed = {
                let mut state = manager.state();
                let completed = state
                    .uploads
                    .get(&id)
                    .is_some_and(|e| e.status == UploadStatus::Completed);
                completed && state.uploads.remove(&id).is_some()
            };
            if removed {
                manager.notify();
            }
        });
    }

    fn handle_failure(&self, job: UploadJob, error: SubmitError) {
        log::warn!("Upload {} failed: {}", job.queue_id, error);
        if let Err(e) = self
            .inner
            .store
            .record_error(job.kind(), job.record_id, &error.to_string())
        {
            log::error!("Failed to record error for {}: {}", job.record_id, e);
        }

        {
            let mut state = self.state();
            let Some(entry) = state.uploads.get_mut(&job.queue_id) else {
                log::debug!("Upload {} was cancelled while in flight", job.queue_id);
                return;
            };
            entry.retry_count += 1;
            entry.error = Some(error.kind.to_string());
            entry.error_kind = Some(error.kind);
        }

        self.schedule_retry(job, &error);
    }

    /// Arms the backoff timer, or fails the upload for good once the
    /// attempt budget is spent.
    fn schedule_retry(&self, job: UploadJob, error: &SubmitError) {
        let store = &self.inner.store;
        let config = &self.inner.config;
        let id = job.queue_id.clone();
        let message = error.to_string();

        let Some(retry_count) = self.get_progress(&id).map(|p| p.retry_count) else {
            return;
        };

        if let Err(e) = store.update_queue_item_status(&id, QueueStatus::Failed, Some(&message)) {
            log::error!("Failed to persist failure of {}: {}", id, e);
        }

        if retry_count >= config.max_retry_attempts {
            log::error!(
                "Upload {} failed permanently after {} attempts",
                id,
                retry_count
            );
            if let Some(entry) = self.state().uploads.get_mut(&id) {
                entry.status = UploadStatus::Failed;
                entry.next_retry_at = None;
                entry.error = Some(error.kind.user_message().to_string());
            }
            self.notify();
            return;
        }

        if let Err(e) = store.update_queue_item_status(&id, QueueStatus::Pending, None) {
            log::error!("Failed to requeue {}: {}", id, e);
        }

        let delay = config.backoff_delay(retry_count);
        let next_retry_at = Utc::now()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        log::info!(
            "Retrying upload {} in {} minutes (attempt {})",
            id,
            delay.as_secs() / 60,
            retry_count + 1
        );

        let manager = self.clone();
        let timer_id = id.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            while !manager.inner.connectivity.is_online() {
                log::debug!("Retry of {} postponed, device offline", timer_id);
                tokio::time::sleep(delay).await;
            }
            manager.state().retry_timers.remove(&timer_id);
            manager.process_upload(job, true).await;
        });

        {
            let mut state = self.state();
            let Some(entry) = state.uploads.get_mut(&id) else {
                timer.abort();
                return;
            };
            entry.status = UploadStatus::Pending;
            entry.next_retry_at = Some(next_retry_at);
            if let Some(previous) = state.retry_timers.insert(id, timer) {
                previous.abort();
            }
        }
        self.notify();
    }

    /// Manually retries a permanently failed upload.
    ///
    /// Returns `Ok(false)` if the upload is not in the failed state.
    pub async fn retry_upload(&self, id: &str) -> Result<bool, AppError> {
        let store = &self.inner.store;

        let in_memory = self.get_progress(id);
        let failed = match &in_memory {
            Some(p) => p.status == UploadStatus::Failed,
            None => store
                .get_queue_item(id)?
                .is_some_and(|item| item.status == QueueStatus::Failed),
        };
        if !failed {
            return Ok(false);
        }

        store.reset_queue_item_for_retry(id)?;
        let Some(item) = store.get_queue_item(id)? else {
            return Ok(false);
        };
        let Some(job) = self.rehydrate(&item)? else {
            log::info!("Upload {} has nothing left to send, dropping it", id);
            store.remove_from_queue(id)?;
            self.state().uploads.remove(id);
            self.notify();
            return Ok(false);
        };

        {
            let mut state = self.state();
            let entry = state
                .uploads
                .entry(id.to_string())
                .or_insert_with(|| UploadProgress::new(id.to_string(), item.upload_type));
            entry.status = UploadStatus::Pending;
            entry.retry_count = item.retry_count;
            entry.error = None;
            entry.error_kind = None;
            entry.next_retry_at = None;
        }
        self.notify();

        log::info!("Manual retry of upload {}", id);
        self.process_upload(job, true).await;
        Ok(true)
    }

    /// Stops tracking an upload and removes it from the queue.
    ///
    /// The durable record is kept. A request already in flight is not
    /// aborted.
    pub fn cancel_upload(&self, id: &str) -> Result<bool, AppError> {
        let tracked = {
            let mut state = self.state();
            if let Some(timer) = state.retry_timers.remove(id) {
                timer.abort();
            }
            state.delivered.remove(id);
            state.uploads.remove(id).is_some()
        };
        if tracked {
            self.notify();
        }

        let queued = self.inner.store.remove_from_queue(id)?;
        if tracked || queued {
            log::info!("Cancelled upload {}", id);
        }
        Ok(tracked || queued)
    }

    /// Loads the record a queue item points to.
    ///
    /// `None` means the item is stale: the record is gone or already submitted.
    fn rehydrate(&self, item: &UploadQueueItem) -> Result<Option<UploadJob>, AppError> {
        fn unsent<P: RecordPayload>(record: Option<PendingRecord<P>>) -> Option<(P, Submitter)> {
            record
                .filter(|r| !r.submitted)
                .map(|r| (r.payload, r.submitter))
        }

        let store = &self.inner.store;
        let loaded = match item.upload_type {
            UploadType::Catch => {
                unsent(store.get_catch(item.item_id)?).map(|(p, s)| (UploadData::Catch(p), s))
            }
            UploadType::Photo => {
                unsent(store.get_photo(item.item_id)?).map(|(p, s)| (UploadData::Photo(p), s))
            }
            UploadType::Waypoint => unsent(store.get_waypoint(item.item_id)?)
                .map(|(p, s)| (UploadData::Waypoint(p), s)),
        };

        Ok(loaded.map(|(data, submitter)| UploadJob {
            queue_id: item.id.clone(),
            record_id: item.item_id,
            data,
            submitter,
        }))
    }

    pub fn is_processing(&self) -> bool {
        self.inner.is_processing.load(Ordering::SeqCst)
    }

    /// Reconciles the whole queue, one item after the other.
    ///
    /// Returns `None` if another sweep is running, the device is offline or
    /// the queue could not be read. A refused sweep makes the running one
    /// reload the queue before it finishes.
    pub async fn process_pending_uploads(&self) -> Option<SyncLogEntry> {
        if self.inner.is_processing.swap(true, Ordering::SeqCst) {
            self.inner.rerun_requested.store(true, Ordering::SeqCst);
            log::debug!("Sweep already running, rerun requested");
            return None;
        }
        let _guard = ProcessingGuard(&self.inner.is_processing);

        if !self.inner.connectivity.is_online() {
            log::debug!("Offline, sweep skipped");
            return None;
        }

        let mut entry = SyncLogEntry {
            at: Utc::now(),
            processed: 0,
            stale_removed: 0,
            skipped: 0,
        };

        loop {
            self.inner.rerun_requested.store(false, Ordering::SeqCst);
            let items = match self.inner.store.get_upload_queue() {
                Ok(items) => items,
                Err(e) => {
                    log::error!("Failed to load upload queue: {}", e);
                    return None;
                }
            };

            for queued in items {
                self.sweep_item(&queued.id, &mut entry).await;
            }

            if !self.inner.rerun_requested.load(Ordering::SeqCst)
                || !self.inner.connectivity.is_online()
            {
                break;
            }
            log::debug!("Queue changed during sweep, reloading");
        }

        log::debug!(
            "Sweep finished: {} processed, {} stale, {} skipped",
            entry.processed,
            entry.stale_removed,
            entry.skipped
        );
        self.inner.sync_log.append(entry.clone());
        Some(entry)
    }

    async fn sweep_item(&self, id: &str, entry: &mut SyncLogEntry) {
        // Earlier items took time; retry timers may have moved this one since
        let item = match self.inner.store.get_queue_item(id) {
            Ok(Some(item)) if item.status == QueueStatus::Pending => item,
            Ok(_) => {
                entry.skipped += 1;
                return;
            }
            Err(e) => {
                log::error!("Failed to reload queue item {}: {}", id, e);
                entry.skipped += 1;
                return;
            }
        };

        let now = Utc::now();
        if let Some(progress) = self.get_progress(id) {
            let waiting = progress.next_retry_at.is_some_and(|at| at > now);
            if waiting
                || matches!(
                    progress.status,
                    UploadStatus::Uploading | UploadStatus::Completed | UploadStatus::Failed
                )
            {
                entry.skipped += 1;
                return;
            }
        }
        if !item.is_due(now) {
            entry.skipped += 1;
            return;
        }

        let job = match self.rehydrate(&item) {
            Ok(Some(job)) => job,
            Ok(None) => {
                log::info!("Removing stale queue item {}", item.id);
                if let Err(e) = self.inner.store.remove_from_queue(&item.id) {
                    log::error!("Failed to remove stale item {}: {}", item.id, e);
                }
                self.state().uploads.remove(&item.id);
                self.notify();
                entry.stale_removed += 1;
                return;
            }
            Err(e) => {
                log::error!("Failed to load record for {}: {}", item.id, e);
                entry.skipped += 1;
                return;
            }
        };

        self.state()
            .uploads
            .entry(item.id.clone())
            .or_insert_with(|| {
                let mut progress = UploadProgress::new(item.id.clone(), item.upload_type);
                progress.retry_count = item.retry_count;
                progress
            });
        self.notify();

        self.process_upload(job, item.retry_count > 0).await;
        entry.processed += 1;
    }

    /// Starts the periodic sweep and the reconnect listener
    pub fn start_periodic_sync(&self) {
        let mut state = self.state();
        if !state.periodic.is_empty() {
            log::warn!("Periodic sync already running");
            return;
        }

        let config = &self.inner.config;
        state.periodic.push(background_sync::spawn_periodic_sweeps(
            self.clone(),
            config.sync_interval(),
        ));
        state.periodic.push(background_sync::spawn_reconnect_listener(
            self.clone(),
            self.inner.connectivity.clone(),
            config.reconnect_debounce_delay(),
        ));
    }

    pub fn stop_periodic_sync(&self) {
        let mut state = self.state();
        if state.periodic.is_empty() {
            return;
        }
        for handle in state.periodic.drain(..) {
            handle.abort();
        }
        state.next_sweep_at = None;
        log::info!("Stopped periodic sync");
    }

    pub fn is_periodic_sync_running(&self) -> bool {
        !self.state().periodic.is_empty()
    }

    pub(crate) fn set_next_sweep_at(&self, at: Option<Instant>) {
        self.state().next_sweep_at = at;
    }

    /// Time until the next periodic sweep, `None` when periodic sync is off
    pub fn next_sweep_eta(&self) -> Option<Duration> {
        let state = self.state();
        if state.periodic.is_empty() {
            return None;
        }
        state
            .next_sweep_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn sync_log(&self) -> Vec<SyncLogEntry> {
        self.inner.sync_log.entries()
    }

    pub fn get_stats(&self) -> UploadStats {
        UploadStats::from_progress(self.state().uploads.values())
    }

    /// Forgets completed uploads without waiting for the grace period
    pub fn clear_completed(&self) {
        self.state()
            .uploads
            .retain(|_, p| p.status != UploadStatus::Completed);
        self.notify();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CatchEntry, CatchFormData, CatchPhoto, GpsCoordinate, LocationFix, PhotoPayload,
        WaypointPayload,
    };
    use crate::services::remote_api::NetworkErrorKind;
    use chrono::NaiveDate;
    use photo_codec::CodecError;

    /// Remote API double: records every call, fails while `failures` > 0
    #[derive(Default)]
    struct FakeApi {
        catches: Mutex<Vec<CatchFormData>>,
        photos: Mutex<Vec<PhotoPayload>>,
        waypoints: Mutex<Vec<WaypointPayload>>,
        failures: Mutex<u32>,
        fail_kind: Mutex<Option<NetworkErrorKind>>,
        latency: Mutex<Duration>,
    }

    impl FakeApi {
        fn failing(times: u32, kind: NetworkErrorKind) -> Self {
            let api = Self::default();
            *api.failures.lock().unwrap() = times;
            *api.fail_kind.lock().unwrap() = Some(kind);
            api
        }

        fn with_latency(latency: Duration) -> Self {
            let api = Self::default();
            *api.latency.lock().unwrap() = latency;
            api
        }

        fn calls(&self) -> usize {
            self.catches.lock().unwrap().len()
                + self.photos.lock().unwrap().len()
                + self.waypoints.lock().unwrap().len()
        }

        async fn respond(&self) -> Result<String, SubmitError> {
            let latency = *self.latency.lock().unwrap();
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                let kind = self.fail_kind.lock().unwrap().unwrap_or(NetworkErrorKind::Unknown);
                return Err(SubmitError::new(kind, "simulated"));
            }
            Ok(Uuid::new_v4().to_string())
        }
    }

    #[async_trait::async_trait]
    impl RemoteSubmitter for FakeApi {
        async fn submit_catch(
            &self,
            form: &CatchFormData,
            _submitter: &Submitter,
        ) -> Result<String, SubmitError> {
            self.catches.lock().unwrap().push(form.clone());
            self.respond().await
        }

        async fn submit_photo(
            &self,
            photo: &PhotoPayload,
            _submitter: &Submitter,
        ) -> Result<String, SubmitError> {
            self.photos.lock().unwrap().push(photo.clone());
            self.respond().await
        }

        async fn submit_waypoint(
            &self,
            waypoint: &WaypointPayload,
            _submitter: &Submitter,
        ) -> Result<String, SubmitError> {
            self.waypoints.lock().unwrap().push(waypoint.clone());
            self.respond().await
        }
    }

    /// Codec that cannot decode anything
    struct BrokenCodec;

    impl ImageCodec for BrokenCodec {
        fn resize(&self, _photo: &str, _max: u32, _quality: u8) -> Result<String, CodecError> {
            Err(CodecError::Decode("unsupported".to_string()))
        }
    }

    fn manager_with(api: Arc<FakeApi>, online: bool) -> UploadManager {
        UploadManager::new(
            OfflineStore::in_memory().unwrap(),
            api,
            Arc::new(BrokenCodec),
            Connectivity::new(online),
            SyncConfig::default(),
        )
    }

    fn device() -> Submitter {
        Submitter::DeviceId("device-1".to_string())
    }

    fn catch(quantity: u32) -> UploadData {
        let mut form = CatchFormData::new("trip-1", NaiveDate::from_ymd_opt(2025, 8, 9).unwrap());
        form.catches.push(CatchEntry::new("pelagic", quantity));
        UploadData::Catch(form)
    }

    fn waypoint() -> UploadData {
        UploadData::Waypoint(WaypointPayload::new(
            "trip-1",
            "FAD 3",
            GpsCoordinate::new(-8.3, 115.9),
        ))
    }

    async fn settle(duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_adds_coalesce_into_one_sweep() {
        let api = Arc::new(FakeApi::default());
        let manager = manager_with(api.clone(), true);

        let ids: Vec<String> = (1..=4)
            .map(|q| manager.add_upload(catch(q), device(), 0).unwrap())
            .collect();
        assert_eq!(api.calls(), 0);
        assert_eq!(manager.get_stats().pending, 4);

        settle(Duration::from_secs(3)).await;

        assert_eq!(api.calls(), 4);
        for id in &ids {
            assert_eq!(manager.get_progress(id).unwrap().status, UploadStatus::Completed);
        }
        assert_eq!(manager.sync_log().len(), 1);
        assert_eq!(manager.sync_log()[0].processed, 4);
        assert!(manager.store().get_pending_catches().unwrap().is_empty());
        assert!(manager.store().get_upload_queue().unwrap().is_empty());

        // a later sweep finds nothing to resend
        manager.process_pending_uploads().await;
        assert_eq!(api.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_follows_priority() {
        let api = Arc::new(FakeApi::default());
        let manager = manager_with(api.clone(), true);

        manager.add_upload(catch(1), device(), 0).unwrap();
        manager.add_upload(waypoint(), device(), 0).unwrap();
        manager.add_upload(catch(3), device(), 5).unwrap();
        settle(Duration::from_secs(3)).await;

        let quantities: Vec<u32> = api
            .catches
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.catches[0].quantity)
            .collect();
        assert_eq!(quantities, vec![3, 1]);
        assert_eq!(api.waypoints.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_uploads_are_evicted() {
        let api = Arc::new(FakeApi::default());
        let manager = manager_with(api, true);
        let id = manager.add_upload(waypoint(), device(), 0).unwrap();

        settle(Duration::from_secs(3)).await;
        assert_eq!(manager.get_progress(&id).unwrap().progress, 100);

        settle(Duration::from_secs(4)).await;
        assert!(manager.get_progress(&id).is_none());
        assert_eq!(manager.get_stats(), UploadStats::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_failure_schedules_backoff() {
        let api = Arc::new(FakeApi::failing(1, NetworkErrorKind::ConnectionFailed));
        let manager = manager_with(api.clone(), true);
        let id = manager.add_upload(catch(2), device(), 0).unwrap();

        let before = Utc::now();
        settle(Duration::from_secs(3)).await;

        let progress = manager.get_progress(&id).unwrap();
        assert_eq!(progress.status, UploadStatus::Pending);
        assert_eq!(progress.error.as_deref(), Some("connection failed"));
        assert_eq!(progress.error_kind, Some(NetworkErrorKind::ConnectionFailed));
        assert_eq!(progress.retry_count, 1);
        let wait = progress.next_retry_at.unwrap() - before;
        assert!(wait >= chrono::Duration::seconds(115) && wait <= chrono::Duration::seconds(125));

        let item = manager.store().get_queue_item(&id).unwrap().unwrap();
        assert_eq!(item.status, QueueStatus::Pending);
        assert_eq!(item.retry_count, 1);
        assert_eq!(manager.store().get_pending_catches().unwrap().len(), 1);

        // the timer delivers after two minutes
        settle(Duration::from_secs(121)).await;
        assert_eq!(api.calls(), 2);
        assert_eq!(manager.get_progress(&id).unwrap().status, UploadStatus::Completed);
        assert!(manager.store().get_pending_catches().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_after_five_attempts() {
        let api = Arc::new(FakeApi::failing(u32::MAX, NetworkErrorKind::ServerError));
        let manager = manager_with(api.clone(), true);
        let mut rx = manager.on_progress_update();
        let id = manager.add_upload(waypoint(), device(), 0).unwrap();

        // first attempt plus backoffs of 2, 4, 8 and 16 minutes
        let mut last_retry_count = 0;
        for _ in 0..200 {
            settle(Duration::from_secs(10)).await;
            if rx.has_changed().unwrap_or(false) {
                let snapshot = rx.borrow_and_update().clone();
                if let Some(p) = snapshot.iter().find(|p| p.id == id) {
                    assert!(p.retry_count >= last_retry_count);
                    last_retry_count = p.retry_count;
                }
            }
        }

        assert_eq!(api.calls(), 5);
        let progress = manager.get_progress(&id).unwrap();
        assert_eq!(progress.status, UploadStatus::Failed);
        assert_eq!(progress.retry_count, 5);
        assert!(progress.next_retry_at.is_none());
        assert_eq!(
            progress.error.as_deref(),
            Some(NetworkErrorKind::ServerError.user_message())
        );
        assert_eq!(progress.error_kind, Some(NetworkErrorKind::ServerError));
        assert!(manager.state().retry_timers.is_empty());

        let item = manager.store().get_queue_item(&id).unwrap().unwrap();
        assert_eq!(item.status, QueueStatus::Failed);
        assert_eq!(item.retry_count, 5);

        // no sixth automatic attempt, not even from a sweep
        settle(Duration::from_secs(3600)).await;
        manager.process_pending_uploads().await;
        assert_eq!(api.calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_retry_of_failed_upload() {
        let api = Arc::new(FakeApi::failing(5, NetworkErrorKind::Timeout));
        let manager = manager_with(api.clone(), true);
        let id = manager.add_upload(catch(4), device(), 0).unwrap();

        assert!(!manager.retry_upload(&id).await.unwrap());

        settle(Duration::from_secs(60 * 40)).await;
        assert_eq!(manager.get_progress(&id).unwrap().status, UploadStatus::Failed);

        assert!(manager.retry_upload(&id).await.unwrap());
        assert_eq!(api.calls(), 6);
        assert_eq!(manager.get_progress(&id).unwrap().status, UploadStatus::Completed);
        let record = manager.store().get_pending_catches().unwrap();
        assert!(record.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_retry_that_fails_again_is_final() {
        let api = Arc::new(FakeApi::failing(u32::MAX, NetworkErrorKind::Timeout));
        let manager = manager_with(api.clone(), true);
        let id = manager.add_upload(catch(4), device(), 0).unwrap();
        settle(Duration::from_secs(60 * 40)).await;
        assert_eq!(api.calls(), 5);

        assert!(manager.retry_upload(&id).await.unwrap());
        let progress = manager.get_progress(&id).unwrap();
        assert_eq!(api.calls(), 6);
        assert_eq!(progress.status, UploadStatus::Failed);
        assert_eq!(progress.retry_count, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_debounce() {
        let api = Arc::new(FakeApi::default());
        let manager = manager_with(api.clone(), true);
        let id = manager.add_upload(catch(1), device(), 0).unwrap();

        assert!(manager.cancel_upload(&id).unwrap());
        settle(Duration::from_secs(3)).await;

        assert_eq!(api.calls(), 0);
        assert!(manager.get_progress(&id).is_none());
        assert!(manager.store().get_upload_queue().unwrap().is_empty());
        // the record itself is kept
        assert_eq!(manager.store().get_pending_catches().unwrap().len(), 1);
        assert!(!manager.cancel_upload(&id).unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_clears_retry_timer() {
        let api = Arc::new(FakeApi::failing(1, NetworkErrorKind::ConnectionFailed));
        let manager = manager_with(api.clone(), true);
        let id = manager.add_upload(catch(1), device(), 0).unwrap();
        settle(Duration::from_secs(3)).await;
        assert!(manager.state().retry_timers.contains_key(&id));

        manager.cancel_upload(&id).unwrap();
        assert!(manager.state().retry_timers.is_empty());
        settle(Duration::from_secs(600)).await;
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_catch_is_sent_as_metadata() {
        let api = Arc::new(FakeApi::default());
        let manager = manager_with(api.clone(), true);

        let mut form = CatchFormData::new("trip-6", NaiveDate::from_ymd_opt(2025, 8, 10).unwrap());
        let mut entry = CatchEntry::new("pelagic", 11);
        for _ in 0..3 {
            entry.photos.push(CatchPhoto::with_gps(
                "A".repeat(2_000_000 / 3 * 4),
                GpsCoordinate::new(-8.6, 115.2),
            ));
        }
        form.catches.push(entry);
        form.catches.push(CatchEntry::new("reef", 5));

        manager
            .add_upload(UploadData::Catch(form.clone()), device(), 0)
            .unwrap();
        let pending = manager.store().get_pending_catches().unwrap();
        assert_eq!(pending.len(), 1);
        let record_id = pending[0].id;

        settle(Duration::from_secs(3)).await;

        {
            let sent = api.catches.lock().unwrap();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].photo_count(), 0);
            assert_eq!(sent[0].catches[0].quantity, 11);
            assert_eq!(sent[0].catches[1].quantity, 5);
        }
        assert_eq!(manager.store().get_storage_stats().unwrap().pending_catches, 0);

        // the stored record keeps its photos
        let stored = manager.store().get_catch(record_id).unwrap().unwrap();
        assert!(stored.submitted);
        assert_eq!(stored.payload, form);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_items_are_removed() {
        let api = Arc::new(FakeApi::default());
        let manager = manager_with(api.clone(), true);
        let store = manager.store();

        let form = match catch(1) {
            UploadData::Catch(form) => form,
            _ => unreachable!(),
        };
        let submitted = store.save_catch(&form, &device()).unwrap();
        store.mark_catch_submitted(submitted).unwrap();
        store.add_to_upload_queue(UploadType::Catch, submitted, 0).unwrap();
        store
            .add_to_upload_queue(UploadType::Photo, Uuid::new_v4(), 0)
            .unwrap();

        let entry = manager.process_pending_uploads().await.unwrap();
        assert_eq!(entry.stale_removed, 2);
        assert_eq!(entry.processed, 0);
        assert_eq!(api.calls(), 0);
        assert!(store.get_upload_queue().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_rehydrates_queue_after_restart() {
        let api = Arc::new(FakeApi::default());
        let manager = manager_with(api.clone(), true);
        let store = manager.store();

        let photo = PhotoPayload::new("trip-2", "AAAA".to_string());
        let record = store.save_photo(&photo, &device()).unwrap();
        let queued = store.add_to_upload_queue(UploadType::Photo, record, 0).unwrap();

        let entry = manager.process_pending_uploads().await.unwrap();
        assert_eq!(entry.processed, 1);
        assert_eq!(api.photos.lock().unwrap()[0], photo);
        assert_eq!(manager.get_progress(&queued).unwrap().status, UploadStatus::Completed);
        assert!(store.get_photo(record).unwrap().unwrap().submitted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_flight() {
        let api = Arc::new(FakeApi::with_latency(Duration::from_secs(10)));
        let manager = manager_with(api.clone(), true);
        let id = manager.add_upload(waypoint(), device(), 0).unwrap();

        settle(Duration::from_secs(5)).await;
        let progress = manager.get_progress(&id).unwrap();
        assert_eq!(progress.status, UploadStatus::Uploading);
        assert!(progress.progress > 0 && progress.progress <= 90);
        assert!(manager.is_processing());

        // concurrent sweep is refused while the first one runs
        assert!(manager.process_pending_uploads().await.is_none());

        settle(Duration::from_secs(10)).await;
        assert_eq!(api.calls(), 1);
        assert_eq!(manager.get_progress(&id).unwrap().status, UploadStatus::Completed);
        assert!(!manager.is_processing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_never_exceeds_estimate_cap() {
        let api = Arc::new(FakeApi::with_latency(Duration::from_secs(60)));
        let manager = manager_with(api, true);
        let id = manager.add_upload(waypoint(), device(), 0).unwrap();

        settle(Duration::from_secs(50)).await;
        assert_eq!(manager.get_progress(&id).unwrap().progress, MAX_ESTIMATED_PROGRESS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_adds_wait_for_reconnect() {
        let api = Arc::new(FakeApi::default());
        let connectivity = Connectivity::new(false);
        let manager = UploadManager::new(
            OfflineStore::in_memory().unwrap(),
            api.clone(),
            Arc::new(BrokenCodec),
            connectivity.clone(),
            SyncConfig::default(),
        );
        manager.start_periodic_sync();

        let id = manager.add_upload(catch(9), device(), 0).unwrap();
        settle(Duration::from_secs(10)).await;
        assert_eq!(api.calls(), 0);
        assert_eq!(manager.get_progress(&id).unwrap().status, UploadStatus::Pending);

        connectivity.set_online(true);
        settle(Duration::from_secs(3)).await;
        assert_eq!(api.calls(), 1);
        assert_eq!(manager.get_progress(&id).unwrap().status, UploadStatus::Completed);

        manager.stop_periodic_sync();
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_timer_waits_while_offline() {
        let api = Arc::new(FakeApi::failing(1, NetworkErrorKind::ConnectionFailed));
        let connectivity = Connectivity::new(true);
        let manager = UploadManager::new(
            OfflineStore::in_memory().unwrap(),
            api.clone(),
            Arc::new(BrokenCodec),
            connectivity.clone(),
            SyncConfig::default(),
        );
        let id = manager.add_upload(catch(1), device(), 0).unwrap();
        settle(Duration::from_secs(3)).await;
        assert_eq!(api.calls(), 1);

        connectivity.set_online(false);
        settle(Duration::from_secs(180)).await;
        assert_eq!(api.calls(), 1);
        assert!(manager.state().retry_timers.contains_key(&id));

        connectivity.set_online(true);
        settle(Duration::from_secs(60)).await;
        assert_eq!(api.calls(), 2);
        assert_eq!(manager.get_progress(&id).unwrap().status, UploadStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_sweep() {
        let api = Arc::new(FakeApi::default());
        let manager = manager_with(api.clone(), true);
        assert!(manager.next_sweep_eta().is_none());

        let waypoint = WaypointPayload::new("trip-3", "Harbour", GpsCoordinate::new(-8.1, 115.0));
        let record = manager.store().save_waypoint(&waypoint, &device()).unwrap();
        manager
            .store()
            .add_to_upload_queue(UploadType::Waypoint, record, 0)
            .unwrap();

        manager.start_periodic_sync();
        settle(Duration::from_secs(60)).await;
        assert_eq!(api.calls(), 0);
        let eta = manager.next_sweep_eta().unwrap();
        assert!(eta <= Duration::from_secs(240));

        settle(Duration::from_secs(241)).await;
        assert_eq!(api.calls(), 1);
        assert_eq!(manager.sync_log().len(), 1);

        manager.stop_periodic_sync();
        assert!(!manager.is_periodic_sync_running());
        assert!(manager.next_sweep_eta().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscription_replays_current_state() {
        let api = Arc::new(FakeApi::default());
        let manager = manager_with(api, false);
        let id = manager.add_upload(catch(1), device(), 0).unwrap();

        let rx = manager.on_progress_update();
        let snapshot = rx.borrow().clone();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, id);
        assert_eq!(snapshot[0].status, UploadStatus::Pending);
        drop(rx);

        manager.clear_completed();
        assert_eq!(manager.uploads().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_upload_rejects_invalid_data() {
        let api = Arc::new(FakeApi::default());
        let manager = manager_with(api, true);
        let mut form = CatchFormData::new("trip-1", NaiveDate::from_ymd_opt(2025, 8, 9).unwrap());
        form.catches.clear();

        let err = manager
            .add_upload(UploadData::Catch(form), device(), 0)
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(manager.uploads().is_empty());
        assert!(manager.store().get_upload_queue().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_during_running_sweep_is_delivered() {
        let api = Arc::new(FakeApi::with_latency(Duration::from_secs(30)));
        let manager = manager_with(api.clone(), true);
        let first = manager.add_upload(waypoint(), device(), 0).unwrap();

        settle(Duration::from_secs(5)).await;
        assert!(manager.is_processing());
        let second = manager.add_upload(catch(7), device(), 0).unwrap();

        settle(Duration::from_secs(3600)).await;
        assert_eq!(api.calls(), 2);
        for id in [&first, &second] {
            let status = manager.get_progress(id).map(|p| p.status);
            assert!(matches!(status, None | Some(UploadStatus::Completed)));
        }
        assert!(manager.store().get_pending_waypoints().unwrap().is_empty());
        assert!(manager.store().get_pending_catches().unwrap().is_empty());
        assert!(manager.store().get_upload_queue().unwrap().is_empty());
        assert!(!manager.is_processing());
    }

    fn queue_waypoint(manager: &UploadManager) -> String {
        let record = manager.store().save_waypoint(
            &WaypointPayload::new("trip-2", "Reef edge", GpsCoordinate::new(-8.4, 116.0)),
            &device(),
        );
        manager
            .store()
            .add_to_upload_queue(UploadType::Waypoint, record.unwrap(), 0)
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_skips_failed_upload() {
        let api = Arc::new(FakeApi::default());
        let manager = manager_with(api.clone(), true);
        let id = queue_waypoint(&manager);

        let mut progress = UploadProgress::new(id.clone(), UploadType::Waypoint);
        progress.status = UploadStatus::Failed;
        progress.retry_count = 5;
        manager.state().uploads.insert(id.clone(), progress);

        let entry = manager.process_pending_uploads().await.unwrap();
        assert_eq!(api.calls(), 0);
        assert_eq!(entry.processed, 0);
        assert_eq!(entry.skipped, 1);
        assert_eq!(manager.get_progress(&id).unwrap().status, UploadStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_respects_scheduled_retry() {
        let api = Arc::new(FakeApi::default());
        let manager = manager_with(api.clone(), true);
        let id = queue_waypoint(&manager);
        assert!(manager
            .store()
            .get_queue_item(&id)
            .unwrap()
            .unwrap()
            .next_retry_at
            .is_none());

        let mut progress = UploadProgress::new(id.clone(), UploadType::Waypoint);
        progress.retry_count = 1;
        progress.next_retry_at = Some(Utc::now() + chrono::Duration::minutes(10));
        manager.state().uploads.insert(id.clone(), progress);

        manager.process_pending_uploads().await;
        assert_eq!(api.calls(), 0);
        assert_eq!(manager.get_progress(&id).unwrap().status, UploadStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_cap_comes_from_config() {
        let api = Arc::new(FakeApi::failing(1, NetworkErrorKind::Timeout));
        let config = SyncConfig {
            backoff_cap_minutes: 1,
            ..SyncConfig::default()
        };
        let manager = UploadManager::new(
            OfflineStore::in_memory().unwrap(),
            api.clone(),
            Arc::new(BrokenCodec),
            Connectivity::new(true),
            config,
        );
        let id = manager.add_upload(waypoint(), device(), 0).unwrap();

        let before = Utc::now();
        settle(Duration::from_secs(3)).await;

        let in_memory = manager.get_progress(&id).unwrap().next_retry_at.unwrap() - before;
        let item = manager.store().get_queue_item(&id).unwrap().unwrap();
        let durable = item.next_retry_at.unwrap() - before;
        for wait in [in_memory, durable] {
            assert!(wait >= chrono::Duration::seconds(55) && wait <= chrono::Duration::seconds(65));
        }

        settle(Duration::from_secs(61)).await;
        assert_eq!(api.calls(), 2);
        assert!(manager.store().get_upload_queue().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmarked_delivery_is_finished_without_resending() {
        let conn = crate::database::init_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TRIGGER block_marks BEFORE UPDATE OF submitted ON pending_waypoints
             WHEN NOT EXISTS (SELECT 1 FROM last_location_cache WHERE device_id = 'unblock')
             BEGIN
                SELECT RAISE(ABORT, 'disk full');
             END;",
        )
        .unwrap();
        let store = OfflineStore::from_connection(conn);
        let api = Arc::new(FakeApi::default());
        let manager = UploadManager::new(
            store.clone(),
            api.clone(),
            Arc::new(BrokenCodec),
            Connectivity::new(true),
            SyncConfig::default(),
        );
        let id = manager.add_upload(waypoint(), device(), 0).unwrap();

        settle(Duration::from_secs(3)).await;
        assert_eq!(api.calls(), 1);
        let progress = manager.get_progress(&id).unwrap();
        assert_eq!(progress.status, UploadStatus::Pending);
        assert!(progress.error.is_some());
        let item = store.get_queue_item(&id).unwrap().unwrap();
        assert_eq!(item.status, QueueStatus::Pending);
        assert_eq!(store.get_pending_waypoints().unwrap().len(), 1);

        let fix = LocationFix {
            coordinate: GpsCoordinate::new(-8.3, 115.9),
            recorded_at: Utc::now(),
            speed_knots: None,
        };
        store.cache_last_location("unblock", &fix).unwrap();
        manager.process_pending_uploads().await;

        assert_eq!(api.calls(), 1);
        assert!(store.get_pending_waypoints().unwrap().is_empty());
        assert!(store.get_upload_queue().unwrap().is_empty());
        assert_eq!(manager.get_progress(&id).unwrap().status, UploadStatus::Completed);
    }
}
