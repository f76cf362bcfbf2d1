//! The job record and the partial updates applied to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::inference::TokenUsage;
use crate::model::{AnalysisKind, Finding};

// ─── Identifiers ────────────────────────────────────────────────────────────

/// Opaque job identifier, assigned at submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The account under whose data store a job is committed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OwnerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── Status ─────────────────────────────────────────────────────────────────

/// Lifecycle status: `queued → processing → {completed | error}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    /// Completed and error are absorbing.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    /// Whether a job may move from `self` to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Queued, JobStatus::Error)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Error)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Error => write!(f, "error"),
        }
    }
}

// ─── Logs ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// One timestamped line in a job's log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warn, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }
}

// ─── Job ────────────────────────────────────────────────────────────────────

/// One analysis request for one document.
///
/// Holds metadata only; the uploaded bytes live in the raw content cache
/// for as long as the job is queued or processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub owner: OwnerId,
    pub kind: AnalysisKind,
    /// Display name of the uploaded file.
    pub source_name: String,
    /// Model identifier chosen at submission.
    pub model: String,
    pub status: JobStatus,
    /// 0-100.
    pub progress: u8,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    /// Present iff status is `completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<Finding>>,
    /// Token counts reported by the provider, summed over chunks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Creates a queued job with a fresh id.
    pub fn new(
        owner: OwnerId,
        kind: AnalysisKind,
        source_name: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            id: JobId::new(),
            owner,
            kind,
            source_name: source_name.into(),
            model: model.into(),
            status: JobStatus::Queued,
            progress: 0,
            logs: Vec::new(),
            result: None,
            usage: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn finding_count(&self) -> usize {
        self.result.as_ref().map(Vec::len).unwrap_or(0)
    }
}

// ─── JobPatch ───────────────────────────────────────────────────────────────

/// Partial changes merged into a job by the store.
///
/// `logs` are appended; every other field is last-write-wins.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub logs: Vec<LogEntry>,
    pub result: Option<Vec<Finding>>,
    pub usage: Option<TokenUsage>,
}

impl JobPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn log(mut self, entry: LogEntry) -> Self {
        self.logs.push(entry);
        self
    }

    pub fn info(self, message: impl Into<String>) -> Self {
        self.log(LogEntry::info(message))
    }

    pub fn warn(self, message: impl Into<String>) -> Self {
        self.log(LogEntry::warn(message))
    }

    pub fn error(self, message: impl Into<String>) -> Self {
        self.log(LogEntry::error(message))
    }

    pub fn result(mut self, findings: Vec<Finding>) -> Self {
        self.result = Some(findings);
        self
    }

    pub fn usage(mut self, usage: Option<TokenUsage>) -> Self {
        self.usage = usage;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.progress.is_none()
            && self.logs.is_empty()
            && self.result.is_none()
            && self.usage.is_none()
    }
}
