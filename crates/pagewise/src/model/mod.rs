//! Domain types shared by the pipeline: analysis kinds and findings.

pub mod finding;
pub mod kind;

pub use finding::{Finding, Severity};
pub use kind::{AnalysisKind, UnknownKind};
