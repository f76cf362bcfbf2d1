//! Entry point for front ends: submit documents, follow jobs, delete them.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{broadcast, watch};

use crate::config::Config;
use crate::document::RawContent;
use crate::error::{PagewiseError, Result};
use crate::inference::InferenceClient;
use crate::jobs::{
    render_report, Job, JobEvent, JobId, JobStore, LogEntry, OwnerId, RawContentCache,
    Scheduler, UnitProcessor,
};
use crate::model::AnalysisKind;
use crate::owner::OwnerStore;
use crate::usage::UsageRecorder;

/// One uploaded document to analyse.
#[derive(Clone)]
pub struct SubmitRequest {
    pub owner: OwnerId,
    pub kind: AnalysisKind,
    pub source_name: String,
    pub bytes: Vec<u8>,
    /// Falls back to the configured default model.
    pub model: Option<String>,
}

impl SubmitRequest {
    pub fn new(
        owner: OwnerId,
        kind: AnalysisKind,
        source_name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            owner,
            kind,
            source_name: source_name.into(),
            bytes,
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

pub struct AnalysisService {
    config: Config,
    store: Arc<JobStore>,
    cache: Arc<Mutex<RawContentCache>>,
    scheduler: Scheduler,
    owners: Arc<dyn OwnerStore>,
}

impl AnalysisService {
    pub fn new(
        config: Config,
        inference: Arc<dyn InferenceClient>,
        owners: Arc<dyn OwnerStore>,
        usage: Arc<dyn UsageRecorder>,
    ) -> Self {
        let store = Arc::new(JobStore::new());
        let cache = Arc::new(Mutex::new(RawContentCache::new(
            config.pipeline.raw_cache.max_entries,
            config.pipeline.raw_cache.max_bytes,
        )));
        let processor = Arc::new(UnitProcessor::from_config(
            &config.pipeline,
            Arc::clone(&store),
            inference,
        ));
        let scheduler = Scheduler::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            processor,
            Arc::clone(&owners),
            usage,
        );

        Self {
            config,
            store,
            cache,
            scheduler,
            owners,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    fn lock_cache(&self) -> MutexGuard<'_, RawContentCache> {
        match self.cache.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Raw content cache lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Creates a queued job and hands it to the scheduler.
    ///
    /// Fails without queuing anything when the raw-content cache is full.
    pub fn submit(&self, request: SubmitRequest) -> Result<JobId> {
        let model = request
            .model
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.config.inference.default_model.clone());

        let mut job = Job::new(request.owner, request.kind, &request.source_name, model);
        job.logs.push(LogEntry::info(format!(
            "Queued {} for {} with {}",
            job.source_name, job.kind, job.model
        )));
        let job_id = job.id.clone();

        let raw = RawContent::from_upload(request.source_name, request.bytes);
        let size = raw.len();
        self.lock_cache().insert(job_id.clone(), raw)?;

        if let Err(e) = self.store.insert(job) {
            self.lock_cache().release(&job_id);
            return Err(e.into());
        }
        self.scheduler.submit(job_id.clone());

        tracing::info!(job_id = %job_id, bytes = size, "Job submitted");
        Ok(job_id)
    }

    /// Submits every request, continuing past rejected ones.
    ///
    /// Results line up with the requests.
    pub fn submit_batch(
        &self,
        requests: impl IntoIterator<Item = SubmitRequest>,
    ) -> Vec<Result<JobId>> {
        requests
            .into_iter()
            .map(|request| {
                let source_name = request.source_name.clone();
                let result = self.submit(request);
                if let Err(e) = &result {
                    tracing::warn!(source = %source_name, "Submission rejected: {}", e);
                }
                result
            })
            .collect()
    }

    /// Removes a queued or finished job everywhere it is held.
    ///
    /// The job currently being processed cannot be deleted.
    pub fn delete(&self, job_id: &JobId) -> Result<Job> {
        let job = self
            .store
            .get(job_id)
            .ok_or_else(|| PagewiseError::JobNotFound(job_id.clone()))?;

        let was_pending = self.scheduler.remove_pending(job_id);
        if self.scheduler.is_active(job_id) || (!was_pending && !job.is_terminal()) {
            return Err(PagewiseError::JobActive(job_id.clone()));
        }

        self.lock_cache().release(job_id);
        let removed = self.store.remove(job_id).unwrap_or(job);
        if removed.is_terminal() {
            self.owners.apply_update(&removed.owner, &mut |data| {
                data.remove_job(job_id);
            })?;
        }

        tracing::info!(job_id = %job_id, "Job deleted");
        Ok(removed)
    }

    pub fn job(&self, job_id: &JobId) -> Option<Job> {
        self.store.get(job_id)
    }

    /// Jobs submitted to this service, oldest first.
    pub fn jobs(&self, owner: &OwnerId) -> Vec<Job> {
        self.store.list(owner)
    }

    /// Jobs committed to the owner's durable data, including earlier sessions.
    pub fn committed_jobs(&self, owner: &OwnerId) -> Result<Vec<Job>> {
        Ok(self.owners.load(owner)?.jobs)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.store.subscribe()
    }

    pub fn watch(&self, job_id: &JobId) -> Option<watch::Receiver<Job>> {
        self.store.watch(job_id)
    }

    /// Text report of a finished job.
    pub fn export(&self, job_id: &JobId) -> Result<String> {
        let job = self
            .store
            .get(job_id)
            .ok_or_else(|| PagewiseError::JobNotFound(job_id.clone()))?;
        render_report(&job)
    }

    pub fn start(&self) {
        self.scheduler.start();
    }

    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }

    pub async fn run_until_idle(&self) {
        self.scheduler.run_until_idle().await;
    }
}
