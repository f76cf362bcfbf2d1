//! Durable per-owner collections of committed jobs and usage records.

pub mod memory;
pub mod sqlite;

use serde::{Deserialize, Serialize};

use crate::error::OwnerStoreError;
use crate::jobs::{Job, JobId, OwnerId};
use crate::usage::{Usage, UsageRecord};

pub use memory::InMemoryOwnerStore;
pub use sqlite::SqliteOwnerStore;

/// Current layout of [`OwnerData`]. Documents written by a newer layout are
/// refused rather than rewritten.
pub const OWNER_SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    OWNER_SCHEMA_VERSION
}

/// Everything persisted for one owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerData {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub jobs: Vec<Job>,
    #[serde(default)]
    pub usage: Vec<UsageRecord>,
}

impl Default for OwnerData {
    fn default() -> Self {
        Self {
            schema_version: OWNER_SCHEMA_VERSION,
            jobs: Vec::new(),
            usage: Vec::new(),
        }
    }
}

impl OwnerData {
    /// Inserts `job`, or replaces the stored job with the same id.
    pub fn upsert_job(&mut self, job: Job) {
        match self.jobs.iter_mut().find(|j| j.id == job.id) {
            Some(existing) => *existing = job,
            None => self.jobs.push(job),
        }
    }

    pub fn remove_job(&mut self, job_id: &JobId) -> Option<Job> {
        let pos = self.jobs.iter().position(|j| &j.id == job_id)?;
        Some(self.jobs.remove(pos))
    }

    pub fn job(&self, job_id: &JobId) -> Option<&Job> {
        self.jobs.iter().find(|j| &j.id == job_id)
    }

    pub fn total_usage(&self) -> Usage {
        self.usage.iter().fold(Usage::default(), |mut acc, record| {
            acc.prompt_units += record.prompt_units;
            acc.response_units += record.response_units;
            acc
        })
    }
}

/// Commits job-level mutations into an owner's durable collection.
///
/// `apply_update` runs `f` against the current data (default data for an
/// unknown owner) and persists the result atomically. The closure may be
/// called at most once.
pub trait OwnerStore: Send + Sync {
    fn apply_update(
        &self,
        owner: &OwnerId,
        f: &mut dyn FnMut(&mut OwnerData),
    ) -> Result<OwnerData, OwnerStoreError>;

    /// Current data, or default data for an unknown owner. Never writes.
    fn load(&self, owner: &OwnerId) -> Result<OwnerData, OwnerStoreError>;
}
