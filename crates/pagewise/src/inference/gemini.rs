//! Gemini `generateContent` client with structured JSON output.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{prompts, InferenceClient, InferenceOutput, TokenUsage};
use crate::chunker::ChunkPayload;
use crate::config::InferenceSettings;
use crate::error::InferenceError;
use crate::model::{AnalysisKind, Finding, Severity};

pub struct GeminiClient {
    client: Client,
    endpoint: String,
    api_key: SecretString,
}

impl GeminiClient {
    /// Builds a client. `timeout` of `None` means requests never time out.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: SecretString,
        timeout: Option<Duration>,
    ) -> Result<Self, InferenceError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        tracing::info!("Initializing Gemini client: endpoint={}", endpoint);

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    /// Resolves the API key from the settings and builds a client.
    pub fn from_settings(settings: &InferenceSettings) -> crate::error::Result<Self> {
        let api_key = crate::secrets::resolve_api_key(settings)?;
        Ok(Self::new(
            settings.endpoint.clone(),
            api_key,
            settings.request_timeout(),
        )?)
    }

    fn url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, model)
    }
}

#[async_trait]
impl InferenceClient for GeminiClient {
    async fn call(
        &self,
        kind: AnalysisKind,
        payload: &ChunkPayload,
        model: &str,
    ) -> Result<InferenceOutput, InferenceError> {
        let body = request_body(kind, payload)?;

        let response = self
            .client
            .post(self.url(model))
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(classify_error(status.as_u16(), &text));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text)
            .map_err(|e| InferenceError::InvalidResponse(format!("Malformed response: {}", e)))?;
        let output = parse_output(kind, parsed)?;
        tracing::debug!(
            %kind,
            model,
            findings = output.findings.len(),
            "Inference call succeeded"
        );
        Ok(output)
    }
}

// ─── Request ────────────────────────────────────────────────────────────────

fn request_body(kind: AnalysisKind, payload: &ChunkPayload) -> Result<Value, InferenceError> {
    let parts = match payload {
        ChunkPayload::Text(text) => vec![json!({ "text": text })],
        ChunkPayload::Image(image) => {
            if !kind.uses_page_images() {
                return Err(InferenceError::Payload {
                    kind,
                    reason: "expects page text, got an image".to_string(),
                });
            }
            vec![
                json!({
                    "inlineData": {
                        "mimeType": image.mime_type,
                        "data": base64::engine::general_purpose::STANDARD.encode(&image.bytes),
                    }
                }),
                json!({ "text": format!("This image is page {}.", image.page) }),
            ]
        }
    };

    Ok(json!({
        "systemInstruction": { "parts": [{ "text": prompts::instructions(kind) }] },
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": prompts::response_schema(kind),
            "temperature": 0.2,
        }
    }))
}

// ─── Response ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    status: Option<String>,
}

/// One finding as the model emits it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFinding {
    #[serde(default)]
    category: String,
    severity: Option<String>,
    #[serde(default)]
    justification: String,
    #[serde(default)]
    pages: Vec<u32>,
    page: Option<u32>,
    location: Option<String>,
    excerpt: Option<String>,
    #[serde(flatten)]
    attributes: serde_json::Map<String, Value>,
}

impl WireFinding {
    fn into_finding(self, kind: AnalysisKind) -> Finding {
        let mut pages = self.pages;
        if pages.is_empty() {
            pages.extend(self.page);
        }
        let category = if self.category.trim().is_empty() {
            "uncategorized".to_string()
        } else {
            self.category
        };

        Finding {
            kind,
            category,
            severity: self
                .severity
                .as_deref()
                .map(Severity::from_label)
                .unwrap_or(Severity::Info),
            justification: self.justification,
            pages,
            location: self.location.filter(|l| !l.is_empty()),
            excerpt: self.excerpt.filter(|e| !e.is_empty()),
            attributes: self
                .attributes
                .into_iter()
                .filter(|(_, v)| !v.is_null())
                .collect(),
        }
    }
}

fn classify_error(status: u16, body: &str) -> InferenceError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            InferenceError::from_status(status, envelope.error.status.as_deref(), envelope.error.message)
        }
        Err(_) => InferenceError::from_status(status, None, body.trim().to_string()),
    }
}

fn parse_output(
    kind: AnalysisKind,
    response: GenerateContentResponse,
) -> Result<InferenceOutput, InferenceError> {
    let usage = response.usage_metadata.map(|u| TokenUsage {
        prompt_tokens: u.prompt_token_count,
        response_tokens: u.candidates_token_count,
    });

    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates returned".to_string());
        return Err(InferenceError::InvalidResponse(format!(
            "Empty response: {}",
            reason
        )));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(InferenceError::InvalidResponse(format!(
            "Candidate has no text (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    let findings = parse_findings(kind, &text)?;
    Ok(InferenceOutput { findings, usage })
}

/// Parses the JSON array of findings, tolerating a markdown code fence or a
/// `{"findings": [...]}` wrapper.
fn parse_findings(kind: AnalysisKind, text: &str) -> Result<Vec<Finding>, InferenceError> {
    let trimmed = strip_code_fence(text.trim());
    let value: Value = serde_json::from_str(trimmed)
        .map_err(|e| InferenceError::InvalidResponse(format!("Findings are not JSON: {}", e)))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("findings") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(InferenceError::InvalidResponse(
                    "Expected a JSON array of findings".to_string(),
                ))
            }
        },
        _ => {
            return Err(InferenceError::InvalidResponse(
                "Expected a JSON array of findings".to_string(),
            ))
        }
    };

    items
        .into_iter()
        .map(|item| {
            serde_json::from_value::<WireFinding>(item)
                .map(|wire| wire.into_finding(kind))
                .map_err(|e| InferenceError::InvalidResponse(format!("Malformed finding: {}", e)))
        })
        .collect()
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
