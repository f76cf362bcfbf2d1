//! Per-kind pipeline strategies: how to extract, chunk and invoke.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::chunker::{self, Chunk};
use crate::config::PipelineConfig;
use crate::document::{self, ExtractedContent, RawContent};
use crate::error::{ExtractError, InferenceError};
use crate::inference::{InferenceOutput, RetryObserver, RetryingInvoker};
use crate::model::AnalysisKind;

#[async_trait]
pub trait AnalysisStrategy: Send + Sync {
    fn kind(&self) -> AnalysisKind;

    /// Turns raw bytes into text or page images. Runs on a blocking thread.
    fn extract(&self, raw: &RawContent) -> Result<ExtractedContent, ExtractError>;

    fn chunk(&self, content: ExtractedContent) -> Vec<Chunk>;

    /// Runs one chunk through the retrying invoker.
    async fn invoke(
        &self,
        invoker: &RetryingInvoker,
        chunk: &Chunk,
        model: &str,
        observer: RetryObserver<'_>,
    ) -> Result<InferenceOutput, InferenceError> {
        invoker
            .invoke(self.kind(), &chunk.payload, model, observer)
            .await
    }
}

/// Page-marked text cut into page-aligned chunks.
pub struct TextAnalysis {
    kind: AnalysisKind,
    pages_per_chunk: usize,
}

impl TextAnalysis {
    pub fn new(kind: AnalysisKind, pages_per_chunk: usize) -> Self {
        Self {
            kind,
            pages_per_chunk,
        }
    }
}

#[async_trait]
impl AnalysisStrategy for TextAnalysis {
    fn kind(&self) -> AnalysisKind {
        self.kind
    }

    fn extract(&self, raw: &RawContent) -> Result<ExtractedContent, ExtractError> {
        document::extract_text(raw).map(ExtractedContent::Text)
    }

    fn chunk(&self, content: ExtractedContent) -> Vec<Chunk> {
        chunker::chunk_content(content, self.pages_per_chunk)
    }
}

/// One rendered page image per chunk.
pub struct PageImageAnalysis {
    kind: AnalysisKind,
    dpi: u32,
}

impl PageImageAnalysis {
    pub fn new(kind: AnalysisKind, dpi: u32) -> Self {
        Self { kind, dpi }
    }
}

#[async_trait]
impl AnalysisStrategy for PageImageAnalysis {
    fn kind(&self) -> AnalysisKind {
        self.kind
    }

    fn extract(&self, raw: &RawContent) -> Result<ExtractedContent, ExtractError> {
        document::extract_page_images(raw, self.dpi).map(ExtractedContent::Pages)
    }

    fn chunk(&self, content: ExtractedContent) -> Vec<Chunk> {
        chunker::chunk_content(content, 1)
    }
}

#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: HashMap<AnalysisKind, Arc<dyn AnalysisStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard strategy for every kind.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let mut registry = Self::new();
        for kind in AnalysisKind::ALL {
            let strategy: Arc<dyn AnalysisStrategy> = if kind.uses_page_images() {
                Arc::new(PageImageAnalysis::new(kind, config.render_dpi))
            } else {
                Arc::new(TextAnalysis::new(kind, config.pages_per_chunk))
            };
            registry.register(strategy);
        }
        registry
    }

    /// Replaces any strategy registered for the same kind.
    pub fn register(&mut self, strategy: Arc<dyn AnalysisStrategy>) {
        self.strategies.insert(strategy.kind(), strategy);
    }

    pub fn get(&self, kind: AnalysisKind) -> Option<Arc<dyn AnalysisStrategy>> {
        self.strategies.get(&kind).cloned()
    }
}
