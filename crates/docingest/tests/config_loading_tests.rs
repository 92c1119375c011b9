//! Table-driven tests for configuration loading and validation.

mod common;

use serial_test::serial;

use common::TestHarness;
use docingest::config::{load_config, load_config_from_str, Config, DatasetConfig};
use docingest::dataset::IndexingTechnique;
use docingest::error::ConfigError;
use docingest::partition::Strategy;

/// Represents a single config loading test case.
struct ConfigTestCase {
    /// Test case name for identification.
    name: &'static str,
    /// The config JSON content to test.
    config_json: &'static str,
    /// Whether loading should succeed.
    should_succeed: bool,
    /// Expected error substring (if should_succeed is false).
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
            "partition": {
                "apiUrl": "https://partition.example.com/general/v0/general",
                "apiKeyEnvVar": "PARTITION_KEY",
                "languages": ["rus", "eng"],
                "ocrLanguages": ["rus"],
                "imageStrategy": "hi_res",
                "requestTimeoutSecs": 600,
                "ocrDpi": 200,
                "toolTimeoutSecs": 45
            },
            "images": {
                "enabled": true,
                "scratchDir": "/var/tmp/docingest",
                "conversionTimeoutSecs": 30,
                "officeCommand": "libreoffice",
                "imageMagickCommand": "magick"
            },
            "dataset": {
                "baseUrl": "http://kb.local/v1",
                "datasetId": "ds-1",
                "apiKeyFile": "/run/secrets/dataset",
                "pollIntervalSecs": 5,
                "maxWaitSecs": 300,
                "indexingTechnique": "economy",
                "requestTimeoutSecs": 15,
                "maxRetries": 3,
                "retryBackoffMs": 250
            }
        }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "null_dataset",
        config_json: r#"{ "version": "1.0", "dataset": null }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "missing_version",
        config_json: r#"{ "partition": {} }"#,
        should_succeed: false,
        expected_error: Some("version"),
    },
    ConfigTestCase {
        name: "unsupported_version",
        config_json: r#"{ "version": "2.0" }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "unknown_top_level_key",
        config_json: r#"{ "version": "1.0", "ocr": {} }"#,
        should_succeed: false,
        expected_error: Some("ocr"),
    },
    ConfigTestCase {
        name: "unknown_strategy",
        config_json: r#"{ "version": "1.0", "partition": { "imageStrategy": "magic" } }"#,
        should_succeed: false,
        expected_error: Some("magic"),
    },
    ConfigTestCase {
        name: "zero_request_timeout",
        config_json: r#"{ "version": "1.0", "partition": { "requestTimeoutSecs": 0 } }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "non_http_api_url",
        config_json: r#"{ "version": "1.0", "partition": { "apiUrl": "ftp://partition" } }"#,
        should_succeed: false,
        expected_error: Some("partition.apiUrl must be an http(s) URL"),
    },
    ConfigTestCase {
        name: "empty_api_url_means_local",
        config_json: r#"{ "version": "1.0", "partition": { "apiUrl": "" } }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "dataset_without_id",
        config_json: r#"{ "version": "1.0", "dataset": { "baseUrl": "http://kb.local/v1" } }"#,
        should_succeed: false,
        expected_error: Some("datasetId"),
    },
    ConfigTestCase {
        name: "dataset_blank_id",
        config_json: r#"{
            "version": "1.0",
            "dataset": { "baseUrl": "http://kb.local/v1", "datasetId": "   " }
        }"#,
        should_succeed: false,
        expected_error: Some("dataset.datasetId must not be empty"),
    },
    ConfigTestCase {
        name: "dataset_bad_url",
        config_json: r#"{
            "version": "1.0",
            "dataset": { "baseUrl": "kb.local", "datasetId": "ds-1" }
        }"#,
        should_succeed: false,
        expected_error: Some("dataset.baseUrl"),
    },
    ConfigTestCase {
        name: "unknown_indexing_technique",
        config_json: r#"{
            "version": "1.0",
            "dataset": {
                "baseUrl": "http://kb.local/v1",
                "datasetId": "ds-1",
                "indexingTechnique": "premium"
            }
        }"#,
        should_succeed: false,
        expected_error: Some("premium"),
    },
    ConfigTestCase {
        name: "too_many_retries",
        config_json: r#"{
            "version": "1.0",
            "dataset": { "baseUrl": "http://kb.local/v1", "datasetId": "ds-1", "maxRetries": 50 }
        }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "invalid_json",
        config_json: r#"{ "version": "1.0", "#,
        should_succeed: false,
        expected_error: Some("Failed to parse config JSON"),
    },
];

#[test]
fn test_config_loading_table() {
    for case in CONFIG_TESTS {
        let result = load_config_from_str(case.config_json);

        if case.should_succeed {
            assert!(
                result.is_ok(),
                "[{}] expected success, got: {:?}",
                case.name,
                result.err()
            );
        } else {
            let err = match result {
                Ok(_) => panic!("[{}] expected failure, but loading succeeded", case.name),
                Err(e) => e.to_string(),
            };
            if let Some(expected) = case.expected_error {
                assert!(
                    err.contains(expected),
                    "[{}] expected error containing '{}', got: {}",
                    case.name,
                    expected,
                    err
                );
            }
        }
    }
}

#[test]
fn test_full_config_values() {
    let full = CONFIG_TESTS
        .iter()
        .find(|c| c.name == "valid_full")
        .unwrap();
    let config = load_config_from_str(full.config_json).unwrap();

    assert_eq!(config.partition.image_strategy, Strategy::HiRes);
    assert_eq!(config.partition.ocr_languages, vec!["rus"]);
    assert_eq!(config.partition.ocr_dpi, 200);
    assert_eq!(config.partition.tool_timeout_secs, 45);
    assert_eq!(config.images.office_command, "libreoffice");
    let dataset = config.dataset.unwrap();
    assert_eq!(dataset.dataset_id, "ds-1");
    assert_eq!(dataset.max_wait_secs, 300);
    assert_eq!(dataset.indexing_technique, IndexingTechnique::Economy);
    assert_eq!(dataset.request_timeout_secs, 15);
    assert_eq!(dataset.max_retries, 3);
    assert_eq!(dataset.retry_backoff_ms, 250);
}

#[test]
fn test_dataset_defaults() {
    let config = load_config_from_str(
        r#"{ "version": "1.0", "dataset": { "baseUrl": "http://kb/v1", "datasetId": "ds" } }"#,
    )
    .unwrap();
    let dataset = config.dataset.unwrap();
    assert_eq!(dataset.indexing_technique, IndexingTechnique::HighQuality);
    assert_eq!(dataset.request_timeout_secs, 30);
    assert_eq!(dataset.max_retries, 5);
    assert_eq!(dataset.retry_backoff_ms, 500);
    assert_eq!(config.partition.tool_timeout_secs, 120);
}

#[test]
fn test_missing_file() {
    let err = load_config("/nonexistent/docingest.json").unwrap_err();
    assert!(matches!(err, ConfigError::ReadFile { .. }));
}

#[test]
#[serial]
fn test_file_round_trip_with_environment_overlay() {
    let harness = TestHarness::new();
    let mut config = Config::default();
    config.dataset = Some(DatasetConfig::new("http://kb.local/v1", "ds-file"));
    let path = harness.write_config("docingest.json", &config);

    std::env::set_var("UNSTRUCTURED_API_URL", "http://partition.local/general/v0/general");
    std::env::set_var("DATASET_ID", "ds-env");
    let loaded = load_config(&path);
    std::env::remove_var("UNSTRUCTURED_API_URL");
    std::env::remove_var("DATASET_ID");

    let loaded = loaded.unwrap();
    assert_eq!(
        loaded.partition.api_url.as_deref(),
        Some("http://partition.local/general/v0/general")
    );
    assert_eq!(loaded.dataset.unwrap().dataset_id, "ds-env");
}

#[test]
#[serial]
fn test_environment_overlay_is_validated() {
    let harness = TestHarness::new();
    let path = harness.write_config("docingest.json", &Config::default());

    std::env::set_var("UNSTRUCTURED_API_URL", "partition.local");
    let loaded = load_config(&path);
    std::env::remove_var("UNSTRUCTURED_API_URL");

    let err = loaded.unwrap_err();
    assert!(err.to_string().contains("partition.apiUrl"));
}
