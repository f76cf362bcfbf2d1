use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Cannot create database directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Upgrading owner database to schema v{version} failed: {source}")]
    Upgrade {
        version: u32,
        #[source]
        source: rusqlite::Error,
    },

    /// The file was written by a newer build.
    #[error("Owner database schema v{found} is newer than supported v{supported}")]
    NewerSchema { found: u32, supported: u32 },

    #[error("Database connection lock poisoned")]
    LockPoisoned,
}
