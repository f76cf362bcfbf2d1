//! Usage accounting for completed jobs.
//!
//! Real provider billing is not wired in. [`SyntheticUsageRecorder`]
//! prefers token counts reported by the provider and otherwise draws
//! placeholder quantities from fixed ranges.

use std::ops::RangeInclusive;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::UsageError;
use crate::inference::TokenUsage;
use crate::jobs::{Job, JobId, OwnerId};
use crate::owner::OwnerStore;

const PROMPT_UNITS: RangeInclusive<u64> = 2_000..=8_000;
const RESPONSE_UNITS: RangeInclusive<u64> = 500..=2_500;

/// Quantities consumed by one job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub prompt_units: u64,
    pub response_units: u64,
}

impl Usage {
    pub fn total(&self) -> u64 {
        self.prompt_units + self.response_units
    }
}

impl From<TokenUsage> for Usage {
    fn from(tokens: TokenUsage) -> Self {
        Self {
            prompt_units: tokens.prompt_tokens,
            response_units: tokens.response_tokens,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UsageRequest {
    pub owner: OwnerId,
    /// Tool name of the analysis kind, e.g. `compliance-checker`.
    pub tool: String,
    pub model: String,
    pub job_id: JobId,
    pub source_name: String,
    /// Provider-reported tokens, if any.
    pub reported: Option<TokenUsage>,
}

impl UsageRequest {
    pub fn for_job(job: &Job) -> Self {
        Self {
            owner: job.owner.clone(),
            tool: job.kind.tool_name().to_string(),
            model: job.model.clone(),
            job_id: job.id.clone(),
            source_name: job.source_name.clone(),
            reported: job.usage,
        }
    }
}

/// One ledger line in an owner's data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub job_id: JobId,
    pub tool: String,
    pub model: String,
    pub source_name: String,
    pub prompt_units: u64,
    pub response_units: u64,
    pub recorded_at: DateTime<Utc>,
}

impl UsageRecord {
    pub fn new(request: &UsageRequest, usage: Usage) -> Self {
        Self {
            job_id: request.job_id.clone(),
            tool: request.tool.clone(),
            model: request.model.clone(),
            source_name: request.source_name.clone(),
            prompt_units: usage.prompt_units,
            response_units: usage.response_units,
            recorded_at: Utc::now(),
        }
    }

    pub fn usage(&self) -> Usage {
        Usage {
            prompt_units: self.prompt_units,
            response_units: self.response_units,
        }
    }
}

/// Called exactly once for every completed job.
#[async_trait]
pub trait UsageRecorder: Send + Sync {
    async fn record_usage(&self, request: UsageRequest) -> Result<Usage, UsageError>;
}

/// Records usage into the owner's ledger.
pub struct SyntheticUsageRecorder {
    owners: Arc<dyn OwnerStore>,
}

impl SyntheticUsageRecorder {
    pub fn new(owners: Arc<dyn OwnerStore>) -> Self {
        Self { owners }
    }

    fn quantities(reported: Option<TokenUsage>) -> Usage {
        match reported {
            Some(tokens) if tokens.total() > 0 => tokens.into(),
            _ => {
                let mut rng = rand::thread_rng();
                Usage {
                    prompt_units: rng.gen_range(PROMPT_UNITS),
                    response_units: rng.gen_range(RESPONSE_UNITS),
                }
            }
        }
    }
}

#[async_trait]
impl UsageRecorder for SyntheticUsageRecorder {
    async fn record_usage(&self, request: UsageRequest) -> Result<Usage, UsageError> {
        let usage = Self::quantities(request.reported);
        let record = UsageRecord::new(&request, usage);

        // A repeated call for the same job keeps the first record.
        self.owners.apply_update(&request.owner, &mut |data| {
            if !data.usage.iter().any(|r| r.job_id == record.job_id) {
                data.usage.push(record.clone());
            }
        })?;

        tracing::info!(
            job_id = %request.job_id,
            tool = %request.tool,
            model = %request.model,
            prompt_units = usage.prompt_units,
            response_units = usage.response_units,
            "Recorded usage"
        );
        Ok(usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AnalysisKind;
    use crate::owner::InMemoryOwnerStore;

    fn request() -> UsageRequest {
        let job = Job::new(
            OwnerId::from("alice"),
            AnalysisKind::MetadataExtraction,
            "book.pdf",
            "gemini-2.5-flash",
        );
        UsageRequest::for_job(&job)
    }

    #[test]
    fn test_request_for_job() {
        let req = request();
        assert_eq!(req.tool, "metadata-extractor");
        assert_eq!(req.source_name, "book.pdf");
        assert!(req.reported.is_none());
    }

    #[tokio::test]
    async fn test_synthetic_quantities_in_range() {
        let owners = Arc::new(InMemoryOwnerStore::new());
        let recorder = SyntheticUsageRecorder::new(owners.clone());

        let usage = recorder.record_usage(request()).await.unwrap();
        assert!(PROMPT_UNITS.contains(&usage.prompt_units));
        assert!(RESPONSE_UNITS.contains(&usage.response_units));

        let data = owners.load(&OwnerId::from("alice")).unwrap();
        assert_eq!(data.usage.len(), 1);
        assert_eq!(data.usage[0].usage(), usage);
        assert_eq!(data.total_usage(), usage);
    }

    #[tokio::test]
    async fn test_reported_tokens_preferred() {
        let owners = Arc::new(InMemoryOwnerStore::new());
        let recorder = SyntheticUsageRecorder::new(owners);

        let mut req = request();
        req.reported = Some(TokenUsage {
            prompt_tokens: 120,
            response_tokens: 30,
        });
        let usage = recorder.record_usage(req).await.unwrap();
        assert_eq!(
            usage,
            Usage {
                prompt_units: 120,
                response_units: 30
            }
        );
    }

    #[tokio::test]
    async fn test_repeated_record_keeps_one_entry() {
        let owners = Arc::new(InMemoryOwnerStore::new());
        let recorder = SyntheticUsageRecorder::new(owners.clone());
        let req = request();

        recorder.record_usage(req.clone()).await.unwrap();
        recorder.record_usage(req).await.unwrap();

        assert_eq!(owners.load(&OwnerId::from("alice")).unwrap().usage.len(), 1);
    }
}
