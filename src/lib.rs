//! Offline-first submission queue for catch reports, photos and waypoints.
//!
//! Records captured without connectivity are parked in a local SQLite store
//! and delivered by the [`services::UploadManager`] once the network is back.

pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod services;

pub use config::{DaemonConfig, SyncConfig};
pub use error::AppError;
