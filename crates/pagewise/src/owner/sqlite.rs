use chrono::Utc;

use super::{OwnerData, OwnerStore, OWNER_SCHEMA_VERSION};
use crate::db::owner_repo::{self, OwnerRow};
use crate::db::Database;
use crate::error::OwnerStoreError;
use crate::jobs::OwnerId;

/// Owner store backed by one JSON document per owner in SQLite.
///
/// Each update runs in an immediate transaction, so concurrent writers
/// never lose each other's changes.
#[derive(Clone)]
pub struct SqliteOwnerStore {
    db: Database,
}

impl SqliteOwnerStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Owners with stored data, most recently updated first.
    pub fn owners(&self) -> Result<Vec<OwnerId>, OwnerStoreError> {
        let ids = owner_repo::list_owner_ids(&self.db)?;
        Ok(ids.into_iter().map(OwnerId::new).collect())
    }
}

fn decode(row: &OwnerRow) -> Result<OwnerData, OwnerStoreError> {
    if row.schema_version > OWNER_SCHEMA_VERSION {
        return Err(OwnerStoreError::UnsupportedSchema {
            found: row.schema_version,
            supported: OWNER_SCHEMA_VERSION,
        });
    }
    let mut data: OwnerData = serde_json::from_str(&row.document)?;
    data.schema_version = OWNER_SCHEMA_VERSION;
    Ok(data)
}

impl OwnerStore for SqliteOwnerStore {
    fn apply_update(
        &self,
        owner: &OwnerId,
        f: &mut dyn FnMut(&mut OwnerData),
    ) -> Result<OwnerData, OwnerStoreError> {
        self.db.with_transaction(|conn| {
            let mut data = match owner_repo::find(conn, owner.as_str())? {
                Some(row) => decode(&row)?,
                None => OwnerData::default(),
            };

            f(&mut data);

            let row = OwnerRow {
                owner_id: owner.as_str().to_string(),
                schema_version: data.schema_version,
                document: serde_json::to_string(&data)?,
                updated_at: Utc::now().to_rfc3339(),
            };
            owner_repo::upsert(conn, &row)?;

            log::debug!(
                "Committed owner data for {} ({} jobs, {} usage records)",
                owner,
                data.jobs.len(),
                data.usage.len()
            );
            Ok(data)
        })
    }

    fn load(&self, owner: &OwnerId) -> Result<OwnerData, OwnerStoreError> {
        let row = self
            .db
            .with_conn(|conn| owner_repo::find(conn, owner.as_str()))?;
        match row {
            Some(row) => decode(&row),
            None => Ok(OwnerData::default()),
        }
    }
}
