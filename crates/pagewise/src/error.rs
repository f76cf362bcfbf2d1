use std::path::PathBuf;
use thiserror::Error;

use crate::jobs::{JobId, JobStatus};
use crate::model::AnalysisKind;

#[derive(Error, Debug)]
pub enum PagewiseError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Job store error: {0}")]
    JobStore(#[from] JobStoreError),

    #[error("Raw content cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Owner store error: {0}")]
    OwnerStore(#[from] OwnerStoreError),

    #[error("Usage accounting error: {0}")]
    Usage(#[from] UsageError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("No analysis strategy registered for {0}")]
    UnsupportedKind(AnalysisKind),

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Job {0} is currently processing")]
    JobActive(JobId),

    #[error("Job {job_id} has not finished (status: {status})")]
    JobNotTerminal { job_id: JobId, status: JobStatus },

    #[error("Failed to render report: {0}")]
    Report(#[from] std::fmt::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to process PDF: {0}")]
    Pdf(String),

    #[error("Failed to process image: {0}")]
    Image(String),

    #[error("Failed to decode text: {0}")]
    Text(String),

    #[error("Failed to render page images: {0}")]
    Render(String),
}

/// Errors surfaced across the inference boundary.
///
/// Only [`InferenceError::RateLimited`] is considered retriable.
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Rate limited (status {status}): {message}")]
    RateLimited { status: u16, message: String },

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Inference API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid inference response: {0}")]
    InvalidResponse(String),

    #[error("Unsupported payload for {kind}: {reason}")]
    Payload { kind: AnalysisKind, reason: String },
}

/// Provider status string used for quota exhaustion.
const RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";

impl InferenceError {
    /// Classifies a failed HTTP response.
    pub fn from_status(status: u16, provider_status: Option<&str>, message: String) -> Self {
        let lower = message.to_ascii_lowercase();
        if status == 429
            || provider_status == Some(RESOURCE_EXHAUSTED)
            || lower.contains("429")
            || lower.contains("rate limit")
            || lower.contains("resource exhausted")
        {
            Self::RateLimited { status, message }
        } else {
            Self::Api { status, message }
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

#[derive(Error, Debug)]
pub enum JobStoreError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job already exists: {0}")]
    Duplicate(JobId),

    #[error("Job {job_id} is terminal ({status}) and can no longer change")]
    Terminal { job_id: JobId, status: JobStatus },

    #[error("Job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Job {0}: a result may only be attached on completion")]
    ResultWithoutCompletion(JobId),

    #[error("Job {0}: completion requires a result")]
    CompletionWithoutResult(JobId),

    #[error("Job {job_id}: progress may not go back from {current} to {requested}")]
    ProgressRegression {
        job_id: JobId,
        current: u8,
        requested: u8,
    },

    #[error("Job {0}: leaving the queue requires a log entry")]
    MissingLog(JobId),
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Raw content for job {0} is already cached")]
    Duplicate(JobId),

    #[error("Raw content cache is full ({entries} entries, {bytes} bytes in use; {requested} bytes requested)")]
    Full {
        entries: usize,
        bytes: u64,
        requested: u64,
    },
}

#[derive(Error, Debug)]
pub enum OwnerStoreError {
    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Failed to (de)serialize owner data: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Owner data schema v{found} is newer than supported v{supported}")]
    UnsupportedSchema { found: u32, supported: u32 },

    #[error("Owner store lock poisoned")]
    LockPoisoned,
}

#[derive(Error, Debug)]
pub enum UsageError {
    #[error("Failed to record usage: {0}")]
    OwnerStore(#[from] OwnerStoreError),
}

pub type Result<T> = std::result::Result<T, PagewiseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_429_is_rate_limit() {
        let err = InferenceError::from_status(429, None, "Too many requests".to_string());
        assert!(err.is_rate_limit());
    }

    #[test]
    fn test_resource_exhausted_is_rate_limit() {
        let err = InferenceError::from_status(
            400,
            Some("RESOURCE_EXHAUSTED"),
            "Quota exceeded".to_string(),
        );
        assert!(err.is_rate_limit());
    }

    #[test]
    fn test_rate_limit_message_is_rate_limit() {
        let err = InferenceError::from_status(
            503,
            None,
            "Rate limit reached for requests".to_string(),
        );
        assert!(err.is_rate_limit());
    }

    #[test]
    fn test_proxied_429_in_message_is_rate_limit() {
        let err = InferenceError::from_status(
            500,
            None,
            "upstream returned 429 Too Many Requests".to_string(),
        );
        assert!(err.is_rate_limit());
    }

    #[test]
    fn test_other_statuses_are_fatal() {
        for status in [400, 401, 403, 404, 500, 503] {
            let err = InferenceError::from_status(status, Some("INTERNAL"), "boom".to_string());
            assert!(!err.is_rate_limit(), "status {} should not be retried", status);
        }
        assert!(!InferenceError::InvalidResponse("bad json".to_string()).is_rate_limit());
    }

    #[test]
    fn test_error_messages() {
        let err = InferenceError::from_status(429, None, "slow down".to_string());
        assert_eq!(err.to_string(), "Rate limited (status 429): slow down");

        let err = PagewiseError::from(ExtractError::Pdf("bad xref".to_string()));
        assert_eq!(
            err.to_string(),
            "Extraction error: Failed to process PDF: bad xref"
        );
    }
}
