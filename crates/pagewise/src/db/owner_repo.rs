//! Owner data repository — one JSON document per owner in `owner_data`.
//!
//! Row-level functions take a `Connection` so they can run inside
//! [`Database::with_transaction`].

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{Database, DatabaseError};

#[derive(Debug, Clone, PartialEq)]
pub struct OwnerRow {
    pub owner_id: String,
    pub schema_version: u32,
    /// Serialized owner data.
    pub document: String,
    pub updated_at: String,
}

impl OwnerRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            owner_id: row.get("owner_id")?,
            schema_version: row.get("schema_version")?,
            document: row.get("document")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub fn find(conn: &Connection, owner_id: &str) -> Result<Option<OwnerRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT owner_id, schema_version, document, updated_at
             FROM owner_data WHERE owner_id = ?1",
            params![owner_id],
            OwnerRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Inserts or replaces the owner's document.
pub fn upsert(conn: &Connection, row: &OwnerRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO owner_data (owner_id, schema_version, document, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(owner_id) DO UPDATE SET
            schema_version = excluded.schema_version,
            document = excluded.document,
            updated_at = excluded.updated_at",
        params![row.owner_id, row.schema_version, row.document, row.updated_at],
    )?;
    Ok(())
}

/// All owners with stored data, most recently updated first.
pub fn list_owner_ids(db: &Database) -> Result<Vec<String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT owner_id FROM owner_data ORDER BY updated_at DESC, owner_id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    })
}
