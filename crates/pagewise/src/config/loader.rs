use std::path::Path;

use crate::config::schema::{Config, CONFIG_VERSION};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

/// Semantic checks that apply to configs built in code as well as loaded ones.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != CONFIG_VERSION {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    let pipeline = &config.pipeline;
    if pipeline.pages_per_chunk == 0 {
        return Err(invalid("pipeline.pagesPerChunk must be at least 1"));
    }
    if pipeline.retry.max_attempts == 0 {
        return Err(invalid("pipeline.retry.maxAttempts must be at least 1"));
    }
    if pipeline.raw_cache.max_entries == 0 || pipeline.raw_cache.max_bytes == 0 {
        return Err(invalid("pipeline.rawCache bounds must be non-zero"));
    }
    if !(36..=600).contains(&pipeline.render_dpi) {
        return Err(ConfigError::Validation {
            message: format!(
                "pipeline.renderDpi must be between 36 and 600, got {}",
                pipeline.render_dpi
            ),
        });
    }

    let inference = &config.inference;
    if !inference.endpoint.starts_with("http://") && !inference.endpoint.starts_with("https://") {
        return Err(ConfigError::Validation {
            message: format!(
                "inference.endpoint must be an http(s) URL, got '{}'",
                inference.endpoint
            ),
        });
    }
    if inference.default_model.trim().is_empty() {
        return Err(invalid("inference.defaultModel must not be empty"));
    }
    if inference.request_timeout_secs == Some(0) {
        return Err(invalid("inference.requestTimeoutSecs must be positive when set"));
    }

    if config.storage.database_path.trim().is_empty() {
        return Err(invalid("storage.databasePath must not be empty"));
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Validation {
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogFormat;

    #[test]
    fn test_load_minimal_config() {
        let config = load_config_from_str(r#"{ "version": "1.0" }"#).unwrap();
        assert_eq!(config.pipeline.pages_per_chunk, 25);
        assert_eq!(config.pipeline.retry.max_attempts, 5);
        assert_eq!(config.inference.default_model, "gemini-2.5-flash");
    }

    #[test]
    fn test_load_full_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "pipeline": {
                "pagesPerChunk": 10,
                "interChunkDelayMs": 250,
                "retry": { "maxAttempts": 3, "baseDelayMs": 500 },
                "rawCache": { "maxEntries": 8, "maxBytes": 1048576 },
                "renderDpi": 200
            },
            "inference": {
                "endpoint": "http://localhost:8080/v1beta",
                "defaultModel": "gemini-2.5-pro",
                "apiKeyEnvVar": "MY_KEY",
                "requestTimeoutSecs": 120
            },
            "storage": { "databasePath": "/var/lib/pagewise/db.sqlite" },
            "logging": { "level": "pagewise=debug", "format": "json" }
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.pipeline.pages_per_chunk, 10);
        assert_eq!(config.pipeline.retry.base_delay_ms, 500);
        assert_eq!(config.pipeline.raw_cache.max_entries, 8);
        assert_eq!(config.inference.api_key_env_var, "MY_KEY");
        assert_eq!(config.inference.request_timeout_secs, Some(120));
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_version() {
        let result = load_config_from_str(r#"{ "version": "2.0" }"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_missing_version_fails_schema() {
        let result = load_config_from_str(r#"{ "pipeline": {} }"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_zero_chunk_size_fails_schema() {
        let result = load_config_from_str(r#"{ "version": "1.0", "pipeline": { "pagesPerChunk": 0 } }"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_unknown_field_fails_schema() {
        let result = load_config_from_str(r#"{ "version": "1.0", "workers": 4 }"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_bad_log_format_fails_schema() {
        let result = load_config_from_str(
            r#"{ "version": "1.0", "logging": { "format": "xml" } }"#,
        );
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_invalid_json() {
        let result = load_config_from_str("{ not json");
        assert!(matches!(result, Err(ConfigError::ParseJson(_))));
    }

    #[test]
    fn test_validate_config_in_code() {
        let mut config = Config::default();
        assert!(validate_config(&config).is_ok());

        config.pipeline.retry.max_attempts = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.inference.endpoint = "ftp://example.com".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = load_config("/nonexistent/pagewise/config.json");
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}
