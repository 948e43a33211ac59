use rusqlite::{Connection, OptionalExtension, Result};

/// Version the schema is migrated to by [`init_schema`]
pub const SCHEMA_VERSION: i32 = 2;

/// Tables holding captured records waiting for upload
pub const PENDING_TABLES: [&str; 3] = ["pending_catches", "pending_photos", "pending_waypoints"];

/// Initialize or migrate the offline schema. Safe to call on every start.
pub fn init_schema(conn: &Connection) -> Result<()> {
    // Schema version table for migrations
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    let current = current_version(conn)?;
    if current >= SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.unchecked_transaction()?;
    for version in (current + 1)..=SCHEMA_VERSION {
        match version {
            1 => create_schema_v1(&tx)?,
            2 => create_schema_v2(&tx)?,
            _ => unreachable!("no migration for schema version {}", version),
        }
        tx.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
        log::info!("Applied offline schema version {}", version);
    }
    tx.commit()?;

    Ok(())
}

/// Highest applied schema version, 0 for a fresh database
pub fn current_version(conn: &Connection) -> Result<i32> {
    let version: Option<i32> = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(version.unwrap_or(0))
}

/// Version 1: pending records and the upload queue
fn create_schema_v1(conn: &Connection) -> Result<()> {
    for table in PENDING_TABLES {
        create_pending_table(conn, table)?;
    }

    // Table: upload_queue (one entry per deferred upload)
    // seq keeps insertion order stable for items created in the same instant
    conn.execute(
        "CREATE TABLE IF NOT EXISTS upload_queue (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            upload_type TEXT CHECK(upload_type IN ('photo', 'catch', 'waypoint')) NOT NULL,
            item_id TEXT NOT NULL,
            priority INTEGER NOT NULL DEFAULT 0,
            status TEXT CHECK(status IN ('pending', 'uploading', 'completed', 'failed')) NOT NULL DEFAULT 'pending',
            retry_count INTEGER NOT NULL DEFAULT 0 CHECK(retry_count >= 0),
            next_retry_at TEXT,
            last_error TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_upload_queue_order
         ON upload_queue(status, priority DESC, created_at, seq)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_upload_queue_item ON upload_queue(item_id)",
        [],
    )?;

    Ok(())
}

/// Version 2: read-through caches keyed by device
fn create_schema_v2(conn: &Connection) -> Result<()> {
    for table in ["trip_points_cache", "last_location_cache"] {
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    device_id TEXT PRIMARY KEY,
                    data TEXT NOT NULL,
                    cached_at TEXT NOT NULL
                )"
            ),
            [],
        )?;
    }
    Ok(())
}

fn create_pending_table(conn: &Connection, table: &str) -> Result<()> {
    // Exactly one of device_id / username identifies the submitter
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY,
                trip_id TEXT NOT NULL,
                payload TEXT NOT NULL,
                device_id TEXT,
                username TEXT,
                created_at TEXT NOT NULL,
                submitted INTEGER NOT NULL DEFAULT 0 CHECK(submitted IN (0,1)),
                submitted_at TEXT,
                retry_count INTEGER NOT NULL DEFAULT 0 CHECK(retry_count >= 0),
                last_error TEXT,
                CHECK( (device_id IS NOT NULL AND username IS NULL) OR (device_id IS NULL AND username IS NOT NULL) )
            )"
        ),
        [],
    )?;

    conn.execute(
        &format!("CREATE INDEX IF NOT EXISTS idx_{table}_trip ON {table}(trip_id)"),
        [],
    )?;
    conn.execute(
        &format!("CREATE INDEX IF NOT EXISTS idx_{table}_submitted ON {table}(submitted)"),
        [],
    )?;

    // A submitted record stays submitted
    conn.execute(
        &format!(
            "CREATE TRIGGER IF NOT EXISTS {table}_submitted_is_final
             BEFORE UPDATE OF submitted ON {table}
             WHEN OLD.submitted = 1 AND NEW.submitted = 0
             BEGIN
                SELECT RAISE(ABORT, 'submitted flag cannot be reverted');
             END"
        ),
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [name],
            |row| row.get::<_, i32>(0),
        )
        .unwrap()
            == 1
    }

    #[test]
    fn test_init_schema_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        for table in PENDING_TABLES {
            assert!(table_exists(&conn, table), "missing {}", table);
        }
        assert!(table_exists(&conn, "upload_queue"));
        assert!(table_exists(&conn, "trip_points_cache"));
        assert!(table_exists(&conn, "last_location_cache"));
        assert_eq!(current_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_init_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let rows: i32 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, SCHEMA_VERSION);
    }

    #[test]
    fn test_migrates_from_version_1() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )
        .unwrap();
        create_schema_v1(&conn).unwrap();
        conn.execute("INSERT INTO schema_version (version) VALUES (1)", [])
            .unwrap();
        assert!(!table_exists(&conn, "trip_points_cache"));

        init_schema(&conn).unwrap();
        assert!(table_exists(&conn, "trip_points_cache"));
        assert_eq!(current_version(&conn).unwrap(), 2);
    }

    #[test]
    fn test_submitted_cannot_revert() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO pending_catches (id, trip_id, payload, device_id, created_at, submitted)
             VALUES ('c1', 't1', '{}', 'dev', '2025-01-01', 1)",
            [],
        )
        .unwrap();

        let result = conn.execute("UPDATE pending_catches SET submitted = 0 WHERE id = 'c1'", []);
        assert!(result.is_err());
    }

    #[test]
    fn test_submitter_is_exclusive() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let result = conn.execute(
            "INSERT INTO pending_waypoints (id, trip_id, payload, device_id, username, created_at)
             VALUES ('w1', 't1', '{}', 'dev', 'fisher', '2025-01-01')",
            [],
        );
        assert!(result.is_err());
    }
}
