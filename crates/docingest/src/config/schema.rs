use serde::{Deserialize, Serialize};

use crate::dataset::IndexingTechnique;
use crate::partition::Strategy;
use crate::secrets::SecretSource;

pub const ENV_PARTITION_API_URL: &str = "UNSTRUCTURED_API_URL";
pub const ENV_PARTITION_API_KEY: &str = "UNSTRUCTURED_API_KEY";
pub const ENV_DATASET_API_URL: &str = "DATASET_API_URL";
pub const ENV_DATASET_API_KEY: &str = "DATASET_API_KEY";
pub const ENV_DATASET_ID: &str = "DATASET_ID";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub partition: PartitionConfig,
    #[serde(default)]
    pub images: ImageOcrConfig,
    #[serde(default)]
    pub dataset: Option<DatasetConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            partition: PartitionConfig::default(),
            images: ImageOcrConfig::default(),
            dataset: None,
        }
    }
}

impl Config {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    pub fn apply_env(&mut self) {
        self.apply_env_with(|name| std::env::var(name).ok());
    }

    /// Overlays service endpoints from `lookup`. Empty values are ignored.
    /// A dataset section is created only when both its URL and ID are known.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(url) = get(ENV_PARTITION_API_URL) {
            self.partition.api_url = Some(url);
        }

        let base_url = get(ENV_DATASET_API_URL);
        let dataset_id = get(ENV_DATASET_ID);
        match self.dataset.as_mut() {
            Some(dataset) => {
                if let Some(url) = base_url {
                    dataset.base_url = url;
                }
                if let Some(id) = dataset_id {
                    dataset.dataset_id = id;
                }
            }
            None => {
                if let (Some(base_url), Some(dataset_id)) = (base_url, dataset_id) {
                    self.dataset = Some(DatasetConfig::new(base_url, dataset_id));
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionConfig {
    /// Remote partitioning endpoint; in-process partitioning when unset.
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_partition_key_env")]
    pub api_key_env_var: Option<String>,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default = "default_languages")]
    pub ocr_languages: Vec<String>,
    #[serde(default = "default_image_strategy")]
    pub image_strategy: Strategy,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_dpi")]
    pub ocr_dpi: u32,
    /// Limit for each poppler call made by in-process PDF partitioning.
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
}

fn default_partition_key_env() -> Option<String> {
    Some(ENV_PARTITION_API_KEY.to_string())
}

fn default_languages() -> Vec<String> {
    vec!["rus".to_string(), "eng".to_string()]
}

fn default_image_strategy() -> Strategy {
    Strategy::OcrOnly
}

fn default_request_timeout() -> u64 {
    300
}

fn default_dpi() -> u32 {
    300
}

fn default_tool_timeout() -> u64 {
    120
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: None,
            api_key_file: None,
            api_key_env_var: default_partition_key_env(),
            languages: default_languages(),
            ocr_languages: default_languages(),
            image_strategy: default_image_strategy(),
            request_timeout_secs: default_request_timeout(),
            ocr_dpi: default_dpi(),
            tool_timeout_secs: default_tool_timeout(),
        }
    }
}

impl PartitionConfig {
    pub fn credential(&self) -> SecretSource {
        SecretSource {
            value: self.api_key.clone(),
            file: self.api_key_file.clone(),
            env_var: self.api_key_env_var.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageOcrConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Parent for per-document scratch directories; the system temp dir when unset.
    #[serde(default)]
    pub scratch_dir: Option<String>,
    #[serde(default = "default_conversion_timeout")]
    pub conversion_timeout_secs: u64,
    #[serde(default = "default_office_command")]
    pub office_command: String,
    #[serde(default = "default_imagemagick_command")]
    pub image_magick_command: String,
}

fn default_true() -> bool {
    true
}

fn default_conversion_timeout() -> u64 {
    60
}

fn default_office_command() -> String {
    "soffice".to_string()
}

fn default_imagemagick_command() -> String {
    "convert".to_string()
}

impl Default for ImageOcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scratch_dir: None,
            conversion_timeout_secs: default_conversion_timeout(),
            office_command: default_office_command(),
            image_magick_command: default_imagemagick_command(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetConfig {
    pub base_url: String,
    pub dataset_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_dataset_key_env")]
    pub api_key_env_var: Option<String>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_wait")]
    pub max_wait_secs: u64,
    #[serde(default = "default_indexing_technique")]
    pub indexing_technique: IndexingTechnique,
    #[serde(default = "default_dataset_request_timeout")]
    pub request_timeout_secs: u64,
    /// Extra attempts after a transport error or a 500/502/503/504 reply.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First retry delay; each further retry doubles it.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

fn default_dataset_key_env() -> Option<String> {
    Some(ENV_DATASET_API_KEY.to_string())
}

fn default_poll_interval() -> u64 {
    2
}

fn default_max_wait() -> u64 {
    120
}

fn default_indexing_technique() -> IndexingTechnique {
    IndexingTechnique::HighQuality
}

fn default_dataset_request_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_backoff() -> u64 {
    500
}

impl DatasetConfig {
    pub fn new(base_url: impl Into<String>, dataset_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            dataset_id: dataset_id.into(),
            api_key: None,
            api_key_file: None,
            api_key_env_var: default_dataset_key_env(),
            poll_interval_secs: default_poll_interval(),
            max_wait_secs: default_max_wait(),
            indexing_technique: default_indexing_technique(),
            request_timeout_secs: default_dataset_request_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }

    pub fn credential(&self) -> SecretSource {
        SecretSource {
            value: self.api_key.clone(),
            file: self.api_key_file.clone(),
            env_var: self.api_key_env_var.clone(),
        }
    }
}
