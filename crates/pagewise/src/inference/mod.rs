//! The inference boundary: one structured call per chunk.

pub mod gemini;
pub mod prompts;
pub mod retry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chunker::ChunkPayload;
use crate::error::InferenceError;
use crate::model::{AnalysisKind, Finding};

pub use gemini::GeminiClient;
pub use retry::{RetryNotice, RetryObserver, RetryPolicy, RetryingInvoker};

/// Token counts reported by the provider for one or more calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub response_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.response_tokens
    }
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.prompt_tokens += rhs.prompt_tokens;
        self.response_tokens += rhs.response_tokens;
    }
}

/// Result of one successful call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InferenceOutput {
    pub findings: Vec<Finding>,
    pub usage: Option<TokenUsage>,
}

impl InferenceOutput {
    pub fn new(findings: Vec<Finding>) -> Self {
        Self {
            findings,
            usage: None,
        }
    }
}

/// Given a payload, returns structured findings or fails.
///
/// Implementations must report throttling as
/// [`InferenceError::RateLimited`] so callers can retry it.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn call(
        &self,
        kind: AnalysisKind,
        payload: &ChunkPayload,
        model: &str,
    ) -> Result<InferenceOutput, InferenceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_accumulates() {
        let mut total = TokenUsage::default();
        total += TokenUsage {
            prompt_tokens: 100,
            response_tokens: 20,
        };
        total += TokenUsage {
            prompt_tokens: 50,
            response_tokens: 5,
        };
        assert_eq!(total.prompt_tokens, 150);
        assert_eq!(total.response_tokens, 25);
        assert_eq!(total.total(), 175);
    }
}
