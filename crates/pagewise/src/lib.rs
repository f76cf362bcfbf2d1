pub mod chunker;
pub mod config;
pub mod db;
pub mod document;
pub mod error;
pub mod inference;
pub mod jobs;
pub mod model;
pub mod owner;
pub mod secrets;
pub mod service;
pub mod strategy;
pub mod telemetry;
pub mod usage;

pub use chunker::{chunk_pages, split_pages, Chunk, ChunkPayload};
pub use config::{load_config, Config};
pub use document::{DocumentFormat, RawContent};
pub use error::{PagewiseError, Result};
pub use inference::{
    GeminiClient, InferenceClient, InferenceOutput, RetryPolicy, RetryingInvoker, TokenUsage,
};
pub use jobs::{
    Job, JobEvent, JobId, JobPatch, JobStatus, JobStore, LogEntry, LogLevel, OwnerId, Scheduler,
    UnitProcessor,
};
pub use model::{AnalysisKind, Finding, Severity};
pub use owner::{InMemoryOwnerStore, OwnerData, OwnerStore, SqliteOwnerStore};
pub use service::{AnalysisService, SubmitRequest};
pub use strategy::{AnalysisStrategy, StrategyRegistry};
pub use usage::{SyntheticUsageRecorder, Usage, UsageRecorder, UsageRequest};
