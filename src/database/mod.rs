pub mod schema;

use crate::error::AppError;
use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// Default location of the offline database
pub fn get_database_path() -> PathBuf {
    #[cfg(target_os = "android")]
    {
        PathBuf::from("/data/data/org.fangbuch.portal/files/fangbuch.db")
    }

    #[cfg(not(target_os = "android"))]
    {
        PathBuf::from("./data/fangbuch.db")
    }
}

/// Opens the database at `path` and brings the schema up to date
pub fn init_database(path: &Path) -> Result<Connection, AppError> {
    // Make sure the directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let conn = Connection::open(path)?;
    schema::init_schema(&conn)?;

    Ok(conn)
}

/// In-memory database with the full schema (tests and dry runs)
pub fn init_in_memory() -> Result<Connection, AppError> {
    let conn = Connection::open_in_memory()?;
    schema::init_schema(&conn)?;
    Ok(conn)
}
