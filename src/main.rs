use fangbuch::config::DaemonConfig;
use fangbuch::error::AppError;
use fangbuch::services::{Connectivity, HttpSubmitter, OfflineStore, UploadManager};
use photo_codec::JpegCodec;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Config file used when `FANGBUCH_CONFIG` is not set
const DEFAULT_CONFIG_PATH: &str = "./fangbuch.toml";

fn init_logging() {
    #[cfg(target_os = "android")]
    {
        android_logger::init_once(
            android_logger::Config::default()
                .with_max_level(log::LevelFilter::Info)
                .with_tag("fangbuch"),
        );
    }

    #[cfg(not(target_os = "android"))]
    {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_logging();

    if let Err(e) = run().await {
        log::error!("{} ({})", e.user_message(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let config_path = std::env::var("FANGBUCH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = DaemonConfig::load(&config_path)?;
    log::info!(
        "Using database {} and API {}",
        config.database_path.display(),
        config.api_base_url
    );

    let store =
        OfflineStore::open(&config.database_path)?.with_backoff_cap(config.sync.backoff_cap_minutes);
    let stats = store.get_storage_stats()?;
    log::info!(
        "{} catches, {} photos, {} waypoints waiting ({} queued)",
        stats.pending_catches,
        stats.pending_photos,
        stats.pending_waypoints,
        stats.queue_depth
    );

    let api = Arc::new(HttpSubmitter::new(
        &config.api_base_url,
        Duration::from_secs(config.request_timeout_seconds),
    )?);
    let connectivity = Connectivity::new(api.is_reachable().await);

    let manager = UploadManager::new(
        store,
        api.clone(),
        Arc::new(JpegCodec::default()),
        connectivity.clone(),
        config.sync.clone(),
    );
    manager.start_periodic_sync();

    // Drives the connectivity flag from a reachability probe
    let probe_interval = Duration::from_secs(config.probe_interval_seconds);
    let probe = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(probe_interval);
        loop {
            ticker.tick().await;
            connectivity.set_online(api.is_reachable().await);
        }
    });

    manager.process_pending_uploads().await;

    tokio::signal::ctrl_c().await?;
    log::info!("Shutting down");
    probe.abort();
    manager.stop_periodic_sync();

    Ok(())
}
