//! Table-driven tests for configuration loading and validation.

use std::io::Write;

use serial_test::serial;
use tempfile::NamedTempFile;

use pagewise::config::{load_config, load_config_from_str, LogFormat};

struct ConfigTestCase {
    name: &'static str,
    config_json: &'static str,
    should_succeed: bool,
    /// Substring of the error message when loading fails.
    expected_error: Option<&'static str>,
}

const CONFIG_TESTS: &[ConfigTestCase] = &[
    ConfigTestCase {
        name: "valid_minimal",
        config_json: r#"{ "version": "1.0" }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "valid_full",
        config_json: r#"{
            "version": "1.0",
            "pipeline": {
                "pagesPerChunk": 10,
                "interChunkDelayMs": 500,
                "retry": { "maxAttempts": 3, "baseDelayMs": 1000 },
                "rawCache": { "maxEntries": 8, "maxBytes": 1048576 },
                "renderDpi": 200
            },
            "inference": {
                "endpoint": "https://example.test/v1beta",
                "defaultModel": "gemini-2.5-pro",
                "apiKeyEnvVar": "MY_KEY",
                "requestTimeoutSecs": 120
            },
            "storage": { "databasePath": "/tmp/pagewise.db" },
            "logging": { "level": "pagewise=debug", "format": "json" }
        }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "missing_version",
        config_json: r#"{ "pipeline": {} }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "unknown_field",
        config_json: r#"{ "version": "1.0", "workers": 4 }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "zero_chunk_size",
        config_json: r#"{ "version": "1.0", "pipeline": { "pagesPerChunk": 0 } }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "unknown_log_format",
        config_json: r#"{ "version": "1.0", "logging": { "format": "xml" } }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "unsupported_version",
        config_json: r#"{ "version": "2.0" }"#,
        should_succeed: false,
        expected_error: Some("Unsupported config version: 2.0"),
    },
    ConfigTestCase {
        name: "non_http_endpoint",
        config_json: r#"{ "version": "1.0", "inference": { "endpoint": "ftp://example.test" } }"#,
        should_succeed: false,
        expected_error: Some("inference.endpoint must be an http(s) URL"),
    },
    ConfigTestCase {
        name: "invalid_json",
        config_json: r#"{ "version": "1.0", "#,
        should_succeed: false,
        expected_error: Some("Failed to parse config JSON"),
    },
];

#[test]
fn test_config_loading() {
    for case in CONFIG_TESTS {
        let result = load_config_from_str(case.config_json);
        match (case.should_succeed, result) {
            (true, Ok(_)) => {}
            (true, Err(e)) => panic!("{}: expected success, got error: {}", case.name, e),
            (false, Ok(_)) => panic!("{}: expected an error, loading succeeded", case.name),
            (false, Err(e)) => {
                if let Some(expected) = case.expected_error {
                    assert!(
                        e.to_string().contains(expected),
                        "{}: error '{}' does not contain '{}'",
                        case.name,
                        e,
                        expected
                    );
                }
            }
        }
    }
}

#[test]
fn test_full_config_values() {
    let case = CONFIG_TESTS
        .iter()
        .find(|c| c.name == "valid_full")
        .unwrap();
    let config = load_config_from_str(case.config_json).unwrap();

    assert_eq!(config.pipeline.pages_per_chunk, 10);
    assert_eq!(config.pipeline.retry_policy().max_attempts, 3);
    assert_eq!(config.pipeline.raw_cache.max_entries, 8);
    assert_eq!(config.inference.default_model, "gemini-2.5-pro");
    assert_eq!(config.inference.api_key_env_var, "MY_KEY");
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
#[serial]
fn test_load_from_file_then_env_override() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{ "version": "1.0", "inference": {{ "defaultModel": "from-file" }} }}"#
    )
    .unwrap();

    let mut config = load_config(file.path()).unwrap();
    assert_eq!(config.inference.default_model, "from-file");

    std::env::set_var("PAGEWISE_MODEL", "from-env");
    config.apply_env_overrides().unwrap();
    std::env::remove_var("PAGEWISE_MODEL");

    assert_eq!(config.inference.default_model, "from-env");
}

#[test]
fn test_missing_file() {
    let err = load_config("/nonexistent/pagewise/config.json").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}
