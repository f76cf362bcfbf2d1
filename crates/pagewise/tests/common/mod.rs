//! Shared test utilities for pagewise integration tests.
//!
//! - `ScriptedClient`: an inference client that replays scripted replies
//! - `TestHarness`: an `AnalysisService` wired to a scripted client
//! - Builders for text and PDF fixtures

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{Reply, ScriptedClient, TestHarness};
