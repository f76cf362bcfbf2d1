use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The kind of analysis a job performs.
///
/// Each kind selects its own extraction strategy, chunk payload and output
/// schema, while sharing one pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    /// Per-page asset extraction (figures, tables, images) from page images.
    MetadataExtraction,
    /// Compliance checks against a publishing checklist.
    ComplianceCheck,
    /// Editorial issue detection in long manuscripts.
    ManuscriptAnalysis,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 3] = [
        AnalysisKind::MetadataExtraction,
        AnalysisKind::ComplianceCheck,
        AnalysisKind::ManuscriptAnalysis,
    ];

    /// Name under which usage is accounted.
    pub fn tool_name(&self) -> &'static str {
        match self {
            AnalysisKind::MetadataExtraction => "metadata-extractor",
            AnalysisKind::ComplianceCheck => "compliance-checker",
            AnalysisKind::ManuscriptAnalysis => "manuscript-analyzer",
        }
    }

    /// Whether chunks are rendered page images rather than text.
    pub fn uses_page_images(&self) -> bool {
        matches!(self, AnalysisKind::MetadataExtraction)
    }
}

impl std::fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisKind::MetadataExtraction => write!(f, "metadata extraction"),
            AnalysisKind::ComplianceCheck => write!(f, "compliance check"),
            AnalysisKind::ManuscriptAnalysis => write!(f, "manuscript analysis"),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown analysis kind '{0}' (expected metadata, compliance or manuscript)")]
pub struct UnknownKind(pub String);

impl FromStr for AnalysisKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "metadata" | "metadata_extraction" | "assets" => Ok(AnalysisKind::MetadataExtraction),
            "compliance" | "compliance_check" => Ok(AnalysisKind::ComplianceCheck),
            "manuscript" | "manuscript_analysis" | "issues" => Ok(AnalysisKind::ManuscriptAnalysis),
            _ => Err(UnknownKind(s.to_string())),
        }
    }
}
