//! In-memory job state store with per-job change notifications.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{broadcast, watch};

use super::job::{Job, JobId, JobPatch, JobStatus, LogEntry, LogLevel, OwnerId};
use crate::error::JobStoreError;

/// Default capacity of the event channel.
const EVENT_CAPACITY: usize = 256;

// ─── Events ─────────────────────────────────────────────────────────────────

/// A change notification keyed by job id.
///
/// Events are deliberately small; observers that need the full record use
/// [`JobStore::get`] or [`JobStore::watch`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    Created {
        job_id: JobId,
        owner: OwnerId,
    },
    Updated {
        job_id: JobId,
        status: JobStatus,
        progress: u8,
    },
    Removed {
        job_id: JobId,
    },
}

impl JobEvent {
    pub fn job_id(&self) -> &JobId {
        match self {
            JobEvent::Created { job_id, .. }
            | JobEvent::Updated { job_id, .. }
            | JobEvent::Removed { job_id } => job_id,
        }
    }
}

// ─── JobStore ───────────────────────────────────────────────────────────────

struct Slot {
    job: Job,
    watcher: watch::Sender<Job>,
}

/// Current record per job. No history is kept.
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Slot>>,
    events: broadcast::Sender<JobEvent>,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            jobs: RwLock::new(HashMap::new()),
            events,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<JobId, Slot>> {
        match self.jobs.read() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<JobId, Slot>> {
        match self.jobs.write() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn publish(&self, event: JobEvent) {
        // No active receivers is fine
        let _ = self.events.send(event);
    }

    /// Adds a new job record.
    pub fn insert(&self, job: Job) -> Result<(), JobStoreError> {
        let event = {
            let mut jobs = self.write();
            if jobs.contains_key(&job.id) {
                return Err(JobStoreError::Duplicate(job.id));
            }
            let event = JobEvent::Created {
                job_id: job.id.clone(),
                owner: job.owner.clone(),
            };
            let (watcher, _) = watch::channel(job.clone());
            jobs.insert(job.id.clone(), Slot { job, watcher });
            event
        };
        self.publish(event);
        Ok(())
    }

    pub fn get(&self, job_id: &JobId) -> Option<Job> {
        self.read().get(job_id).map(|slot| slot.job.clone())
    }

    pub fn contains(&self, job_id: &JobId) -> bool {
        self.read().contains_key(job_id)
    }

    /// All jobs of one owner, oldest first.
    pub fn list(&self, owner: &OwnerId) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .read()
            .values()
            .filter(|slot| &slot.job.owner == owner)
            .map(|slot| slot.job.clone())
            .collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        jobs
    }

    /// Merges `patch` into the job and notifies observers.
    ///
    /// The patch is validated as a whole before anything is applied, so a
    /// rejected patch leaves the record untouched.
    pub fn update(&self, job_id: &JobId, patch: JobPatch) -> Result<Job, JobStoreError> {
        let updated = {
            let mut jobs = self.write();
            let slot = jobs
                .get_mut(job_id)
                .ok_or_else(|| JobStoreError::NotFound(job_id.clone()))?;

            validate(&slot.job, &patch)?;
            apply(&mut slot.job, patch);
            slot.watcher.send_replace(slot.job.clone());
            slot.job.clone()
        };

        self.publish(JobEvent::Updated {
            job_id: updated.id.clone(),
            status: updated.status,
            progress: updated.progress,
        });
        Ok(updated)
    }

    /// Appends one log line.
    pub fn log(&self, job_id: &JobId, entry: LogEntry) -> Result<Job, JobStoreError> {
        self.update(job_id, JobPatch::new().log(entry))
    }

    /// Drops a job record. Watchers observe the channel closing.
    pub fn remove(&self, job_id: &JobId) -> Option<Job> {
        let removed = self.write().remove(job_id).map(|slot| slot.job);
        if removed.is_some() {
            self.publish(JobEvent::Removed {
                job_id: job_id.clone(),
            });
        }
        removed
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Follows a single job's record.
    pub fn watch(&self, job_id: &JobId) -> Option<watch::Receiver<Job>> {
        self.read().get(job_id).map(|slot| slot.watcher.subscribe())
    }
}

// ─── Rules ──────────────────────────────────────────────────────────────────

fn validate(job: &Job, patch: &JobPatch) -> Result<(), JobStoreError> {
    if job.status.is_terminal() {
        return Err(JobStoreError::Terminal {
            job_id: job.id.clone(),
            status: job.status,
        });
    }

    let next = patch.status.unwrap_or(job.status);
    if next != job.status {
        if !job.status.can_transition_to(next) {
            return Err(JobStoreError::InvalidTransition {
                job_id: job.id.clone(),
                from: job.status,
                to: next,
            });
        }
        if job.status == JobStatus::Queued && job.logs.is_empty() && patch.logs.is_empty() {
            return Err(JobStoreError::MissingLog(job.id.clone()));
        }
    }

    match (next, patch.result.is_some()) {
        (JobStatus::Completed, false) => {
            return Err(JobStoreError::CompletionWithoutResult(job.id.clone()))
        }
        (status, true) if status != JobStatus::Completed => {
            return Err(JobStoreError::ResultWithoutCompletion(job.id.clone()))
        }
        _ => {}
    }

    // Within one processing pass progress only moves forward.
    if let Some(requested) = patch.progress {
        let requested = requested.min(100);
        if job.status == JobStatus::Processing && requested < job.progress {
            return Err(JobStoreError::ProgressRegression {
                job_id: job.id.clone(),
                current: job.progress,
                requested,
            });
        }
    }

    Ok(())
}

fn apply(job: &mut Job, patch: JobPatch) {
    let now = Utc::now();

    if let Some(next) = patch.status {
        if next != job.status {
            if next == JobStatus::Processing {
                job.progress = 0;
                job.started_at = Some(now);
            }
            if next.is_terminal() {
                job.finished_at = Some(now);
            }
            if next == JobStatus::Completed && patch.progress.is_none() {
                job.progress = 100;
            }
            job.status = next;
        }
    }

    if let Some(progress) = patch.progress {
        job.progress = progress.min(100);
    }

    for entry in patch.logs {
        mirror(&job.id, &entry);
        job.logs.push(entry);
    }

    if let Some(result) = patch.result {
        job.result = Some(result);
    }
    if let Some(usage) = patch.usage {
        job.usage = Some(usage);
    }
}

fn mirror(job_id: &JobId, entry: &LogEntry) {
    match entry.level {
        LogLevel::Info => tracing::info!(job_id = %job_id, "{}", entry.message),
        LogLevel::Warn => tracing::warn!(job_id = %job_id, "{}", entry.message),
        LogLevel::Error => tracing::error!(job_id = %job_id, "{}", entry.message),
    }
}
