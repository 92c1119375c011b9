use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

/// Loads a JSON config file, then overlays endpoints from the environment.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut config = load_config_from_str(&content)?;
    config.apply_env();
    validate_config(&config)?;
    Ok(config)
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

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if let Some(url) = config.partition.api_url.as_deref() {
        if !url.trim().is_empty() {
            validate_http_url("partition.apiUrl", url)?;
        }
    }

    if config.partition.request_timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "partition.requestTimeoutSecs must be greater than 0".to_string(),
        });
    }

    if config.images.conversion_timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "images.conversionTimeoutSecs must be greater than 0".to_string(),
        });
    }

    if let Some(dataset) = &config.dataset {
        validate_http_url("dataset.baseUrl", &dataset.base_url)?;

        if dataset.dataset_id.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "dataset.datasetId must not be empty".to_string(),
            });
        }

        if dataset.poll_interval_secs == 0 {
            return Err(ConfigError::Validation {
                message: "dataset.pollIntervalSecs must be greater than 0".to_string(),
            });
        }
    }

    Ok(())
}

fn validate_http_url(field: &str, url: &str) -> Result<(), ConfigError> {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Validation {
            message: format!("{} must be an http(s) URL, got '{}'", field, url),
        })
    }
}
