//! Schema upgrades tracked through SQLite's `user_version` pragma.
//!
//! Step `n` of [`STEPS`] moves the schema to version `n + 1`. Each step and
//! its version bump commit together.

use rusqlite::Connection;

use super::error::DatabaseError;

const STEPS: &[&str] = &[
    include_str!("sql/001_create_owner_data.sql"),
    include_str!("sql/002_index_owner_data_updated_at.sql"),
];

/// Highest schema version this build knows how to use.
pub fn latest_version() -> u32 {
    STEPS.len() as u32
}

pub fn current_version(conn: &Connection) -> Result<u32, DatabaseError> {
    Ok(conn.query_row("PRAGMA user_version", [], |r| r.get(0))?)
}

/// Brings the schema up to [`latest_version`].
///
/// A file written by a newer build is left untouched and refused.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    let found = current_version(conn)?;
    let latest = latest_version();
    if found > latest {
        return Err(DatabaseError::NewerSchema {
            found,
            supported: latest,
        });
    }

    for (version, sql) in (1..).zip(STEPS).skip(found as usize) {
        log::info!("Upgrading owner database to schema v{}", version);
        let batch = format!("BEGIN IMMEDIATE;\n{sql}\nPRAGMA user_version = {version};\nCOMMIT;");
        if let Err(source) = conn.execute_batch(&batch) {
            if !conn.is_autocommit() {
                if let Err(e) = conn.execute_batch("ROLLBACK") {
                    log::warn!("Rollback after failed upgrade to v{} failed: {}", version, e);
                }
            }
            return Err(DatabaseError::Upgrade { version, source });
        }
    }

    Ok(())
}
