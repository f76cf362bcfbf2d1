use serde::{Deserialize, Serialize};

use super::AnalysisKind;

/// How serious a finding is. Compliance results use `Pass` and `Fail`;
/// issues and assets use the graded levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Pass,
    Info,
    Warning,
    Fail,
    Critical,
}

impl Severity {
    /// Maps a free-form label produced by the model onto a severity.
    /// Unrecognised labels become `Info`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "pass" | "passed" | "ok" | "compliant" | "met" => Severity::Pass,
            "warning" | "warn" | "medium" | "moderate" | "minor" | "partial" => Severity::Warning,
            "fail" | "failed" | "error" | "high" | "major" | "non-compliant" | "not met" => {
                Severity::Fail
            }
            "critical" | "blocker" | "severe" => Severity::Critical,
            _ => Severity::Info,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Severity::Pass => "PASS",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Fail => "FAIL",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(label)
    }
}

/// One structured result unit from an inference call.
///
/// Findings from different chunks are concatenated into a job's result
/// without merging or deduplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Which analysis produced this finding.
    pub kind: AnalysisKind,
    /// Check name, issue type or asset type.
    pub category: String,
    pub severity: Severity,
    /// Why the model reported this finding.
    pub justification: String,
    /// 1-based page numbers the finding refers to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pages: Vec<u32>,
    /// Free-form location hint (section, paragraph, figure label).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Quoted text supporting the finding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    /// Kind-specific extra fields (e.g. caption and alt text for assets).
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl Finding {
    pub fn new(
        kind: AnalysisKind,
        category: impl Into<String>,
        severity: Severity,
        justification: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            category: category.into(),
            severity,
            justification: justification.into(),
            pages: Vec::new(),
            location: None,
            excerpt: None,
            attributes: serde_json::Map::new(),
        }
    }

    pub fn with_pages(mut self, pages: impl IntoIterator<Item = u32>) -> Self {
        self.pages = pages.into_iter().collect();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_from_label() {
        assert_eq!(Severity::from_label("Passed"), Severity::Pass);
        assert_eq!(Severity::from_label("NON-COMPLIANT"), Severity::Fail);
        assert_eq!(Severity::from_label("medium"), Severity::Warning);
        assert_eq!(Severity::from_label("Critical"), Severity::Critical);
        assert_eq!(Severity::from_label("something else"), Severity::Info);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::Fail);
        assert!(Severity::Fail > Severity::Warning);
        assert!(Severity::Pass < Severity::Info);
    }

    #[test]
    fn test_finding_serialization_skips_empty_fields() {
        let finding = Finding::new(
            AnalysisKind::ManuscriptAnalysis,
            "inconsistent-spelling",
            Severity::Warning,
            "'colour' and 'color' both used",
        );
        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["kind"], "manuscript_analysis");
        assert_eq!(json["severity"], "warning");
        assert!(json.get("pages").is_none());
        assert!(json.get("attributes").is_none());
    }

    #[test]
    fn test_finding_builders() {
        let finding = Finding::new(
            AnalysisKind::ComplianceCheck,
            "copyright-page",
            Severity::Fail,
            "No copyright notice found",
        )
        .with_pages([2, 3])
        .with_location("front matter");

        assert_eq!(finding.pages, vec![2, 3]);
        assert_eq!(finding.location.as_deref(), Some("front matter"));
    }
}
