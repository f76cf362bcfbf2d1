//! Job lifecycle: records, state store, raw-content cache, processing and
//! scheduling.

pub mod export;
pub mod job;
pub mod processor;
pub mod raw_cache;
pub mod scheduler;
pub mod store;

pub use export::render_report;
pub use job::{Job, JobId, JobPatch, JobStatus, LogEntry, LogLevel, OwnerId};
pub use processor::{chunk_progress, ProcessOutcome, UnitProcessor};
pub use raw_cache::RawContentCache;
pub use scheduler::Scheduler;
pub use store::{JobEvent, JobStore};
