pub mod background_sync;
pub mod connectivity;
pub mod offline_store;
pub mod payload_optimizer;
pub mod remote_api;
pub mod upload_manager;

pub use background_sync::SyncLogEntry;
pub use connectivity::Connectivity;
pub use offline_store::OfflineStore;
pub use remote_api::{HttpSubmitter, NetworkErrorKind, RemoteSubmitter, SubmitError};
pub use upload_manager::UploadManager;
