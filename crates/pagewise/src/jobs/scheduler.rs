//! FIFO queue with a single active slot.
//!
//! Jobs run one at a time, in submission order. The drain loop sleeps on a
//! [`Notify`] while the queue is empty and wakes on every submission and
//! every finished job.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::job::{Job, JobId, JobPatch, JobStatus};
use super::processor::UnitProcessor;
use super::raw_cache::RawContentCache;
use super::store::JobStore;
use crate::owner::OwnerStore;
use crate::usage::{UsageRecorder, UsageRequest};

#[derive(Default)]
struct QueueState {
    pending: VecDeque<JobId>,
    active: Option<JobId>,
}

struct Inner {
    state: Mutex<QueueState>,
    /// Submissions and finished jobs.
    wake: Notify,
    /// Finished jobs only.
    finished: Notify,
    shutdown: AtomicBool,
    store: Arc<JobStore>,
    cache: Arc<Mutex<RawContentCache>>,
    processor: Arc<UnitProcessor>,
    owners: Arc<dyn OwnerStore>,
    usage: Arc<dyn UsageRecorder>,
}

#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
    handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Scheduler {
    pub fn new(
        store: Arc<JobStore>,
        cache: Arc<Mutex<RawContentCache>>,
        processor: Arc<UnitProcessor>,
        owners: Arc<dyn OwnerStore>,
        usage: Arc<dyn UsageRecorder>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::default()),
                wake: Notify::new(),
                finished: Notify::new(),
                shutdown: AtomicBool::new(false),
                store,
                cache,
                processor,
                owners,
                usage,
            }),
            handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Appends a job to the queue. Never rejects.
    pub fn submit(&self, job_id: JobId) {
        debug!(job_id = %job_id, "Job queued");
        self.inner.lock_state().pending.push_back(job_id);
        self.inner.wake.notify_one();
    }

    /// Drops a job that has not started yet.
    pub fn remove_pending(&self, job_id: &JobId) -> bool {
        let mut state = self.inner.lock_state();
        let before = state.pending.len();
        state.pending.retain(|id| id != job_id);
        state.pending.len() != before
    }

    pub fn is_active(&self, job_id: &JobId) -> bool {
        self.inner.lock_state().active.as_ref() == Some(job_id)
    }

    pub fn active(&self) -> Option<JobId> {
        self.inner.lock_state().active.clone()
    }

    /// Queued job ids in the order they will run.
    pub fn pending(&self) -> Vec<JobId> {
        self.inner.lock_state().pending.iter().cloned().collect()
    }

    /// Spawns the drain loop on the current runtime. A second call is a no-op.
    pub fn start(&self) {
        let mut handle = match self.handle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if handle.is_some() {
            return;
        }
        self.inner.shutdown.store(false, Ordering::SeqCst);
        let inner = Arc::clone(&self.inner);
        *handle = Some(tokio::spawn(drain_loop(inner)));
        info!("Scheduler started");
    }

    /// Stops the drain loop once the active job (if any) has finished.
    /// Queued jobs stay queued.
    pub async fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        self.inner.wake.notify_one();

        let handle = match self.handle.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Scheduler loop ended abnormally: {}", e);
            }
            info!("Scheduler stopped");
        }
    }

    /// Processes queued jobs until none are pending or active.
    ///
    /// Shares the single active slot with the drain loop, so it is safe to
    /// call while the loop is running.
    pub async fn run_until_idle(&self) {
        loop {
            let finished = self.inner.finished.notified();
            tokio::pin!(finished);
            finished.as_mut().enable();

            if let Some(job_id) = self.inner.claim_next() {
                self.inner.run_job(job_id).await;
                continue;
            }
            if self.inner.lock_state().active.is_none() {
                return;
            }
            finished.await;
        }
    }
}

async fn drain_loop(inner: Arc<Inner>) {
    loop {
        if inner.shutdown.load(Ordering::SeqCst) {
            break;
        }
        match inner.claim_next() {
            Some(job_id) => inner.run_job(job_id).await,
            None => inner.wake.notified().await,
        }
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                warn!("Scheduler state lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn lock_cache(&self) -> MutexGuard<'_, RawContentCache> {
        match self.cache.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                warn!("Raw content cache lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Pops the head of the queue into the active slot, if the slot is free.
    fn claim_next(&self) -> Option<JobId> {
        let mut state = self.lock_state();
        if state.active.is_some() {
            return None;
        }
        let next = state.pending.pop_front()?;
        state.active = Some(next.clone());
        Some(next)
    }

    async fn run_job(&self, job_id: JobId) {
        self.dispatch(&job_id).await;
        self.lock_cache().release(&job_id);

        if let Some(job) = self.store.get(&job_id).filter(Job::is_terminal) {
            self.commit(&job).await;
        }

        self.lock_state().active = None;
        self.finished.notify_waiters();
        self.wake.notify_one();
    }

    async fn dispatch(&self, job_id: &JobId) {
        let Some(job) = self.store.get(job_id) else {
            debug!(job_id = %job_id, "Job was removed before it started");
            return;
        };

        let Some(raw) = self.lock_cache().take(job_id) else {
            warn!(job_id = %job_id, "No raw content cached for job");
            let patch = JobPatch::new()
                .status(JobStatus::Error)
                .error("Uploaded content is no longer available; submit the document again");
            if let Err(e) = self.store.update(job_id, patch) {
                warn!(job_id = %job_id, "Could not mark job as failed: {}", e);
            }
            return;
        };

        info!(job_id = %job_id, kind = %job.kind, source = %job.source_name, "Starting job");

        let processor = Arc::clone(&self.processor);
        let id = job_id.clone();
        let task = tokio::spawn(async move { processor.process(&id, raw, &job.model).await });

        match task.await {
            Ok(outcome) => {
                info!(job_id = %job_id, status = %outcome.status, "Job finished");
            }
            Err(e) => {
                let reason = if e.is_panic() {
                    "Analysis aborted by an internal error"
                } else {
                    "Analysis was cancelled"
                };
                error!(job_id = %job_id, "Processing task failed: {}", e);
                let still_running = self
                    .store
                    .get(job_id)
                    .is_some_and(|j| !j.is_terminal());
                if still_running {
                    let patch = JobPatch::new().status(JobStatus::Error).error(reason);
                    if let Err(e) = self.store.update(job_id, patch) {
                        warn!(job_id = %job_id, "Could not mark job as failed: {}", e);
                    }
                }
            }
        }
    }

    /// Writes the terminal job into its owner's data and records usage for
    /// completed jobs.
    async fn commit(&self, job: &Job) {
        let committed = self
            .owners
            .apply_update(&job.owner, &mut |data| data.upsert_job(job.clone()));
        if let Err(e) = committed {
            error!(job_id = %job.id, owner = %job.owner, "Failed to commit job: {}", e);
        }

        if job.status == JobStatus::Completed {
            match self.usage.record_usage(UsageRequest::for_job(job)).await {
                Ok(usage) => info!(
                    job_id = %job.id,
                    prompt_units = usage.prompt_units,
                    response_units = usage.response_units,
                    "Job committed: {} units used",
                    usage.total()
                ),
                Err(e) => error!(job_id = %job.id, "Failed to record usage: {}", e),
            }
        }
    }
}
