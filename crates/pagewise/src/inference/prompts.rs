//! Per-kind instructions and structured output schemas.

use serde_json::{json, Value};

use crate::model::AnalysisKind;

const METADATA_INSTRUCTIONS: &str = "\
You are cataloguing the visual assets of a book page. For every figure, \
table, chart, photograph or illustration visible on the page, emit one entry. \
Use `category` for the asset type (figure, table, chart, photo, illustration), \
`severity` \"info\", `justification` for a one-sentence description, `page` \
for the page number, `location` for where it sits on the page, `caption` for \
the printed caption if any and `altText` for concise alternative text. \
Return an empty array when the page has no assets.";

const COMPLIANCE_INSTRUCTIONS: &str = "\
You are checking a manuscript excerpt against a publishing compliance \
checklist: copyright notice, ISBN, table of contents, permissions for quoted \
material, image credits, accessibility of figures, and consistent headings. \
Emit one entry per check you can evaluate from this excerpt. Use `category` \
for the check name, `severity` \"pass\", \"warning\" or \"fail\", \
`justification` for the evidence, `pages` for the page numbers shown in the \
`--- Page N ---` markers and `excerpt` for a short supporting quotation.";

const MANUSCRIPT_INSTRUCTIONS: &str = "\
You are a copy editor reviewing a manuscript excerpt. Report spelling and \
grammar errors, inconsistent terminology or style, factual contradictions and \
structural problems. Emit one entry per issue. Use `category` for the issue \
type, `severity` \"info\", \"warning\", \"fail\" or \"critical\", \
`justification` to explain the problem, `pages` for the page numbers shown in \
the `--- Page N ---` markers, `excerpt` for the offending text and \
`suggestion` for a proposed fix. Return an empty array when there is nothing \
to report.";

pub fn instructions(kind: AnalysisKind) -> &'static str {
    match kind {
        AnalysisKind::MetadataExtraction => METADATA_INSTRUCTIONS,
        AnalysisKind::ComplianceCheck => COMPLIANCE_INSTRUCTIONS,
        AnalysisKind::ManuscriptAnalysis => MANUSCRIPT_INSTRUCTIONS,
    }
}

/// Extra string properties a kind asks the model for.
pub fn extra_fields(kind: AnalysisKind) -> &'static [&'static str] {
    match kind {
        AnalysisKind::MetadataExtraction => &["caption", "altText"],
        AnalysisKind::ComplianceCheck => &[],
        AnalysisKind::ManuscriptAnalysis => &["suggestion"],
    }
}

/// `responseSchema` for the generateContent request: an array of findings.
pub fn response_schema(kind: AnalysisKind) -> Value {
    let mut properties = json!({
        "category": { "type": "STRING" },
        "severity": { "type": "STRING" },
        "justification": { "type": "STRING" },
        "location": { "type": "STRING" },
        "excerpt": { "type": "STRING" },
    });

    if let Some(map) = properties.as_object_mut() {
        if kind.uses_page_images() {
            map.insert("page".to_string(), json!({ "type": "INTEGER" }));
        } else {
            map.insert(
                "pages".to_string(),
                json!({ "type": "ARRAY", "items": { "type": "INTEGER" } }),
            );
        }
        for field in extra_fields(kind) {
            map.insert(field.to_string(), json!({ "type": "STRING" }));
        }
    }

    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": properties,
            "required": ["category", "severity", "justification"],
        }
    })
}
