//! Bounded side-table holding uploaded bytes while a job is queued or running.

use std::collections::HashMap;

use crate::document::RawContent;
use crate::error::CacheError;

use super::job::JobId;

struct Entry {
    job_id: JobId,
    content: RawContent,
}

/// Slot arena of raw uploads, indexed by job id.
///
/// Entries are written once at submission and moved out once when the job
/// starts. Nothing here is ever written to disk.
pub struct RawContentCache {
    slots: Vec<Option<Entry>>,
    free: Vec<usize>,
    index: HashMap<JobId, usize>,
    max_entries: usize,
    max_bytes: u64,
    bytes: u64,
}

impl RawContentCache {
    pub fn new(max_entries: usize, max_bytes: u64) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            max_entries,
            max_bytes,
            bytes: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Total bytes currently held.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn contains(&self, job_id: &JobId) -> bool {
        self.index.contains_key(job_id)
    }

    pub fn insert(&mut self, job_id: JobId, content: RawContent) -> Result<(), CacheError> {
        if self.index.contains_key(&job_id) {
            return Err(CacheError::Duplicate(job_id));
        }

        let size = content.len() as u64;
        if self.index.len() >= self.max_entries || self.bytes.saturating_add(size) > self.max_bytes
        {
            return Err(CacheError::Full {
                entries: self.index.len(),
                bytes: self.bytes,
                requested: size,
            });
        }

        let entry = Entry {
            job_id: job_id.clone(),
            content,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(entry);
                slot
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        };

        self.index.insert(job_id, slot);
        self.bytes += size;
        Ok(())
    }

    /// Moves the content out. A second call for the same job returns `None`.
    pub fn take(&mut self, job_id: &JobId) -> Option<RawContent> {
        let slot = self.index.remove(job_id)?;
        let entry = self.slots.get_mut(slot).and_then(Option::take)?;
        debug_assert_eq!(&entry.job_id, job_id);
        self.free.push(slot);
        self.bytes = self.bytes.saturating_sub(entry.content.len() as u64);
        Some(entry.content)
    }

    /// Discards any content still held for the job.
    pub fn release(&mut self, job_id: &JobId) -> bool {
        self.take(job_id).is_some()
    }
}
