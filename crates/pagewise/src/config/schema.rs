use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::loader::validate_config;
use crate::error::ConfigError;
use crate::inference::RetryPolicy;

pub const CONFIG_VERSION: &str = "1.0";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_API_KEY_ENV_VAR: &str = "GEMINI_API_KEY";
pub const DEFAULT_DATABASE_PATH: &str = "~/.pagewise/data/pagewise.db";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub inference: InferenceSettings,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            pipeline: PipelineConfig::default(),
            inference: InferenceSettings::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Applies `PAGEWISE_MODEL`, `PAGEWISE_LOG`, `PAGEWISE_DATABASE` and
    /// `PAGEWISE_PAGES_PER_CHUNK`, then validates the result again.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(model) = env_override("PAGEWISE_MODEL") {
            self.inference.default_model = model;
        }
        if let Some(level) = env_override("PAGEWISE_LOG") {
            self.logging.level = level;
        }
        if let Some(path) = env_override("PAGEWISE_DATABASE") {
            self.storage.database_path = path;
        }
        if let Some(pages) = env_override("PAGEWISE_PAGES_PER_CHUNK") {
            self.pipeline.pages_per_chunk =
                pages.parse().map_err(|_| ConfigError::Validation {
                    message: format!("PAGEWISE_PAGES_PER_CHUNK must be a number, got '{}'", pages),
                })?;
        }
        validate_config(self)
    }
}

fn env_override(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ─── Pipeline ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Upper bound on pages per inference call.
    #[serde(default = "default_pages_per_chunk")]
    pub pages_per_chunk: usize,
    /// Pause between consecutive chunk calls of one job.
    #[serde(default = "default_inter_chunk_delay_ms")]
    pub inter_chunk_delay_ms: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub raw_cache: RawCacheConfig,
    /// Resolution for rendering PDF pages to images.
    #[serde(default = "default_render_dpi")]
    pub render_dpi: u32,
}

fn default_pages_per_chunk() -> usize {
    25
}

fn default_inter_chunk_delay_ms() -> u64 {
    1500
}

fn default_render_dpi() -> u32 {
    150
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pages_per_chunk: default_pages_per_chunk(),
            inter_chunk_delay_ms: default_inter_chunk_delay_ms(),
            retry: RetryConfig::default(),
            raw_cache: RawCacheConfig::default(),
            render_dpi: default_render_dpi(),
        }
    }
}

impl PipelineConfig {
    pub fn inter_chunk_delay(&self) -> Duration {
        Duration::from_millis(self.inter_chunk_delay_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.base_delay_ms),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    2000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCacheConfig {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
}

fn default_max_entries() -> usize {
    64
}

fn default_max_bytes() -> u64 {
    512 * 1024 * 1024
}

impl Default for RawCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            max_bytes: default_max_bytes(),
        }
    }
}

// ─── Inference ──────────────────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceSettings {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Used when a submission does not name a model.
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Inline key. Never written back out.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env_var")]
    pub api_key_env_var: String,
    /// No timeout when unset.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_key_env_var() -> String {
    DEFAULT_API_KEY_ENV_VAR.to_string()
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            default_model: default_model(),
            api_key: None,
            api_key_file: None,
            api_key_env_var: default_api_key_env_var(),
            request_timeout_secs: None,
        }
    }
}

impl InferenceSettings {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

impl std::fmt::Debug for InferenceSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceSettings")
            .field("endpoint", &self.endpoint)
            .field("default_model", &self.default_model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_key_file", &self.api_key_file)
            .field("api_key_env_var", &self.api_key_env_var)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

// ─── Storage / logging ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

fn default_database_path() -> String {
    DEFAULT_DATABASE_PATH.to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

impl StorageConfig {
    /// Database path with `~` expanded.
    pub fn resolved_database_path(&self) -> PathBuf {
        crate::secrets::expand_home(&self.database_path)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// An `EnvFilter` directive such as `info` or `pagewise=debug`.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}
