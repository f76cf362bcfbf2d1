//! The per-document pipeline: extract, chunk, analyse each chunk, complete.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info_span, Instrument};

use super::job::{JobId, JobPatch, JobStatus, LogEntry};
use super::store::JobStore;
use crate::config::PipelineConfig;
use crate::document::RawContent;
use crate::error::{PagewiseError, Result};
use crate::inference::{InferenceClient, RetryObserver, RetryingInvoker, TokenUsage};
use crate::model::Finding;
use crate::strategy::StrategyRegistry;

/// What the scheduler learns about a finished job.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutcome {
    pub status: JobStatus,
    pub result: Option<Vec<Finding>>,
    pub usage: Option<TokenUsage>,
}

impl ProcessOutcome {
    fn failed() -> Self {
        Self {
            status: JobStatus::Error,
            result: None,
            usage: None,
        }
    }
}

/// Progress after `done` of `total` chunks, rounded to the nearest percent.
pub fn chunk_progress(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((100 * done) as f64 / total as f64).round().min(100.0) as u8
}

pub struct UnitProcessor {
    store: Arc<JobStore>,
    strategies: StrategyRegistry,
    invoker: RetryingInvoker,
    inter_chunk_delay: Duration,
}

impl UnitProcessor {
    pub fn new(
        store: Arc<JobStore>,
        strategies: StrategyRegistry,
        invoker: RetryingInvoker,
        inter_chunk_delay: Duration,
    ) -> Self {
        Self {
            store,
            strategies,
            invoker,
            inter_chunk_delay,
        }
    }

    pub fn from_config(
        config: &PipelineConfig,
        store: Arc<JobStore>,
        client: Arc<dyn InferenceClient>,
    ) -> Self {
        Self::new(
            store,
            StrategyRegistry::from_config(config),
            RetryingInvoker::new(client, config.retry_policy()),
            config.inter_chunk_delay(),
        )
    }

    /// Runs one job to a terminal status.
    ///
    /// Chunk failures are logged and skipped. Any other failure moves the
    /// job to `error` with the reason in its log.
    pub async fn process(&self, job_id: &JobId, raw: RawContent, model: &str) -> ProcessOutcome {
        let span = info_span!("job", job_id = %job_id, source = %raw.source_name);
        async {
            match self.run(job_id, raw, model).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Job failed: {}", e);
                    let patch = JobPatch::new()
                        .status(JobStatus::Error)
                        .error(format!("Analysis failed: {}", e));
                    if let Err(store_err) = self.store.update(job_id, patch) {
                        tracing::warn!("Could not record failure: {}", store_err);
                    }
                    ProcessOutcome::failed()
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, job_id: &JobId, raw: RawContent, model: &str) -> Result<ProcessOutcome> {
        let job = self
            .store
            .get(job_id)
            .ok_or_else(|| PagewiseError::JobNotFound(job_id.clone()))?;

        if job.status == JobStatus::Queued {
            self.store.update(
                job_id,
                JobPatch::new()
                    .status(JobStatus::Processing)
                    .info("Processing started"),
            )?;
        }

        let strategy = self
            .strategies
            .get(job.kind)
            .ok_or(PagewiseError::UnsupportedKind(job.kind))?;

        // Step 1: Extract
        self.store.log(
            job_id,
            LogEntry::info(format!("Extracting content from {}", raw.source_name)),
        )?;
        let content = {
            let strategy = Arc::clone(&strategy);
            tokio::task::spawn_blocking(move || strategy.extract(&raw))
                .instrument(info_span!("extract"))
                .await
                .map_err(|e| PagewiseError::Internal(format!("Extraction task failed: {}", e)))??
        };

        // Step 2: Chunk
        let chunks = strategy.chunk(content);
        let total = chunks.len();
        if total == 0 {
            tracing::info!("Document has no content, nothing to analyse");
            let job = self.store.update(
                job_id,
                JobPatch::new()
                    .status(JobStatus::Completed)
                    .progress(100)
                    .result(Vec::new())
                    .info("Document is empty; nothing to analyse"),
            )?;
            return Ok(ProcessOutcome {
                status: job.status,
                result: job.result,
                usage: None,
            });
        }
        self.store.log(
            job_id,
            LogEntry::info(format!(
                "Split into {} chunk{}",
                total,
                if total == 1 { "" } else { "s" }
            )),
        )?;

        // Step 3: Analyse chunks in order
        let mut findings: Vec<Finding> = Vec::new();
        let mut usage: Option<TokenUsage> = None;
        let mut failed = 0usize;

        for (i, chunk) in chunks.iter().enumerate() {
            let n = i + 1;
            self.store.update(
                job_id,
                JobPatch::new()
                    .progress(chunk_progress(n, total))
                    .info(format!(
                        "Analysing chunk {}/{} ({})",
                        n,
                        total,
                        chunk.page_span()
                    )),
            )?;

            let store = &self.store;
            let observer: RetryObserver<'_> = &mut |notice| {
                if let Err(e) = store.log(job_id, LogEntry::warn(notice.to_string())) {
                    tracing::warn!("Could not record retry notice: {}", e);
                }
            };

            let outcome = strategy
                .invoke(&self.invoker, chunk, model, observer)
                .instrument(info_span!("chunk", index = n, pages = %chunk.page_span()))
                .await;

            match outcome {
                Ok(output) => {
                    let count = output.findings.len();
                    findings.extend(output.findings);
                    if let Some(tokens) = output.usage {
                        *usage.get_or_insert_with(TokenUsage::default) += tokens;
                    }
                    self.store.log(
                        job_id,
                        LogEntry::info(format!(
                            "Chunk {}/{} returned {} finding{}",
                            n,
                            total,
                            count,
                            if count == 1 { "" } else { "s" }
                        )),
                    )?;
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(chunk = n, "Chunk failed: {}", e);
                    self.store.log(
                        job_id,
                        LogEntry::error(format!(
                            "Chunk {}/{} ({}) failed: {}",
                            n,
                            total,
                            chunk.page_span(),
                            e
                        )),
                    )?;
                }
            }

            if n < total {
                tokio::time::sleep(self.inter_chunk_delay).await;
            }
        }

        // Step 4: Complete
        let summary = if failed == 0 {
            format!("Analysis complete: {} findings", findings.len())
        } else {
            format!(
                "Analysis complete: {} findings ({} of {} chunks failed)",
                findings.len(),
                failed,
                total
            )
        };
        let job = self.store.update(
            job_id,
            JobPatch::new()
                .status(JobStatus::Completed)
                .progress(100)
                .result(findings)
                .usage(usage)
                .info(summary),
        )?;

        Ok(ProcessOutcome {
            status: job.status,
            result: job.result,
            usage: job.usage,
        })
    }
}
