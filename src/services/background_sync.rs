use crate::services::connectivity::Connectivity;
use crate::services::upload_manager::UploadManager;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Entries kept in the in-memory sweep log
pub const SYNC_LOG_CAPACITY: usize = 500;

/// Outcome of one reconciliation sweep (volatile, lost on restart)
#[derive(Debug, Clone, PartialEq)]
pub struct SyncLogEntry {
    pub at: DateTime<Utc>,
    pub processed: usize,
    pub stale_removed: usize,
    pub skipped: usize,
}

/// Bounded in-memory log of sweeps, oldest entries dropped first
#[derive(Debug, Default)]
pub struct SyncLog {
    entries: Mutex<VecDeque<SyncLogEntry>>,
}

impl SyncLog {
    pub fn append(&self, entry: SyncLogEntry) {
        if let Ok(mut guard) = self.entries.lock() {
            guard.push_back(entry);
            while guard.len() > SYNC_LOG_CAPACITY {
                guard.pop_front();
            }
        }
    }

    pub fn entries(&self) -> Vec<SyncLogEntry> {
        match self.entries.lock() {
            Ok(guard) => guard.iter().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Sweeps the queue every `period`, skipping ticks while a sweep is running
pub(crate) fn spawn_periodic_sweeps(manager: UploadManager, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        log::info!("Starting periodic sync every {} seconds", period.as_secs());

        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            manager.set_next_sweep_at(Some(Instant::now() + period));
            ticker.tick().await;

            if manager.is_processing() {
                log::debug!("Periodic sync skipped, sweep already running");
                continue;
            }
            if let Some(entry) = manager.process_pending_uploads().await {
                log::info!(
                    "Periodic sync: {} processed, {} stale, {} skipped",
                    entry.processed,
                    entry.stale_removed,
                    entry.skipped
                );
            }
        }
    })
}

/// Triggers a sweep shortly after the device comes back online
pub(crate) fn spawn_reconnect_listener(
    manager: UploadManager,
    connectivity: Connectivity,
    debounce: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut rx = connectivity.subscribe();
        rx.borrow_and_update();

        while rx.changed().await.is_ok() {
            let online = *rx.borrow_and_update();
            if !online {
                log::info!("Device offline, uploads wait for connectivity");
                continue;
            }

            tokio::time::sleep(debounce).await;
            if !connectivity.is_online() {
                continue;
            }

            log::info!("Device back online, syncing pending uploads");
            manager.process_pending_uploads().await;
        }
    })
}
