//! Client for the ingestion pipeline's dataset API: upload a file, poll its
//! indexing status, delete it.

use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::DatasetConfig;
use crate::error::{DatasetError, DocIngestError};
use crate::partition::file_name_of;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ERROR_BODY_LENGTH: usize = 500;
const RETRY_STATUSES: [u16; 4] = [500, 502, 503, 504];

/// How often a request is repeated after a transport error or a
/// 500/502/503/504 reply. Retry `n` waits `base_delay * 2^(n-1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    pub fn delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exponent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexingTechnique {
    HighQuality,
    Economy,
}

/// How the pipeline splits an uploaded document into segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ProcessRule {
    Automatic,
    Custom { rules: CustomRules },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomRules {
    pub pre_processing_rules: Vec<PreProcessingRule>,
    pub segmentation: Segmentation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreProcessingRule {
    pub id: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segmentation {
    pub separator: String,
    pub max_tokens: u32,
    pub chunk_overlap: u32,
}

impl ProcessRule {
    pub fn automatic() -> Self {
        ProcessRule::Automatic
    }

    /// Custom segmentation with whitespace and URL cleanup turned off, so the
    /// extracted text reaches the index unchanged.
    pub fn custom(separator: &str, max_tokens: u32, chunk_overlap: u32) -> Self {
        ProcessRule::Custom {
            rules: CustomRules {
                pre_processing_rules: vec![
                    PreProcessingRule {
                        id: "remove_extra_spaces".to_string(),
                        enabled: false,
                    },
                    PreProcessingRule {
                        id: "remove_urls_emails".to_string(),
                        enabled: false,
                    },
                ],
                segmentation: Segmentation {
                    separator: separator.to_string(),
                    max_tokens,
                    chunk_overlap,
                },
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct UploadData<'a> {
    indexing_technique: IndexingTechnique,
    process_rule: &'a ProcessRule,
}

/// Indexing state of a document. Values this client doesn't know are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IndexingStatus {
    Waiting,
    Parsing,
    Cleaning,
    Splitting,
    Indexing,
    Paused,
    Completed,
    Error,
    Other(String),
}

impl IndexingStatus {
    pub fn as_str(&self) -> &str {
        match self {
            IndexingStatus::Waiting => "waiting",
            IndexingStatus::Parsing => "parsing",
            IndexingStatus::Cleaning => "cleaning",
            IndexingStatus::Splitting => "splitting",
            IndexingStatus::Indexing => "indexing",
            IndexingStatus::Paused => "paused",
            IndexingStatus::Completed => "completed",
            IndexingStatus::Error => "error",
            IndexingStatus::Other(s) => s,
        }
    }

}

impl From<String> for IndexingStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "waiting" => IndexingStatus::Waiting,
            "parsing" => IndexingStatus::Parsing,
            "cleaning" => IndexingStatus::Cleaning,
            "splitting" => IndexingStatus::Splitting,
            "indexing" => IndexingStatus::Indexing,
            "paused" => IndexingStatus::Paused,
            "completed" => IndexingStatus::Completed,
            "error" => IndexingStatus::Error,
            _ => IndexingStatus::Other(value),
        }
    }
}

impl From<IndexingStatus> for String {
    fn from(status: IndexingStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for IndexingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentStatus {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub indexing_status: IndexingStatus,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub segment_count: Option<u64>,
    #[serde(default)]
    pub tokens: Option<u64>,
    #[serde(default)]
    pub character_count: Option<u64>,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadReceipt {
    pub document_id: String,
    pub batch: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    document: UploadedDocument,
    #[serde(default)]
    batch: String,
}

#[derive(Debug, Deserialize)]
struct UploadedDocument {
    id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndexingOutcome {
    Completed(DocumentStatus),
    Failed(DocumentStatus),
    TimedOut { last_status: Option<DocumentStatus> },
}

pub struct DatasetClient {
    client: Client,
    base_url: String,
    dataset_id: String,
    api_key: SecretString,
    indexing_technique: IndexingTechnique,
    retry: RetryPolicy,
}

impl DatasetClient {
    pub fn new(
        base_url: &str,
        dataset_id: &str,
        api_key: SecretString,
    ) -> Result<Self, DatasetError> {
        Ok(Self {
            client: build_client(DEFAULT_REQUEST_TIMEOUT)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            dataset_id: dataset_id.to_string(),
            api_key,
            indexing_technique: IndexingTechnique::HighQuality,
            retry: RetryPolicy::default(),
        })
    }

    pub fn from_config(config: &DatasetConfig) -> Result<Self, DocIngestError> {
        let api_key = config.credential().resolve()?;
        let client = Self::new(&config.base_url, &config.dataset_id, api_key)?
            .with_request_timeout(Duration::from_secs(config.request_timeout_secs))?
            .with_indexing_technique(config.indexing_technique)
            .with_retry_policy(RetryPolicy {
                max_retries: config.max_retries,
                base_delay: Duration::from_millis(config.retry_backoff_ms),
            });
        Ok(client)
    }

    /// Limit for a single HTTP request, connect through body.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Result<Self, DatasetError> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_indexing_technique(mut self, technique: IndexingTechnique) -> Self {
        self.indexing_technique = technique;
        self
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    fn dataset_url(&self, suffix: &str) -> String {
        format!("{}/datasets/{}/{}", self.base_url, self.dataset_id, suffix)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key.expose_secret())
    }

    /// Sends what `request` builds, rebuilding it for every retry. Replies
    /// outside 2xx that are not retried become [`DatasetError::Api`].
    fn send<F>(&self, what: &str, request: F) -> Result<Response, DatasetError>
    where
        F: Fn() -> Result<RequestBuilder, DatasetError>,
    {
        let mut retry = 0;
        loop {
            let sent = request()?
                .header(reqwest::header::AUTHORIZATION, self.bearer())
                .send();
            let exhausted = retry >= self.retry.max_retries;
            let failure = match sent {
                Ok(response) if exhausted || !is_retryable(response.status()) => {
                    return check_status(response);
                }
                Ok(response) => format!("server returned {}", response.status()),
                Err(e) if exhausted => return Err(DatasetError::Http(e.to_string())),
                Err(e) => e.to_string(),
            };

            retry += 1;
            let delay = self.retry.delay(retry);
            warn!(
                "{} failed: {}, retry {}/{} in {}ms",
                what,
                failure,
                retry,
                self.retry.max_retries,
                delay.as_millis()
            );
            std::thread::sleep(delay);
        }
    }

    /// Uploads `path` for indexing. `name` overrides the uploaded file name.
    pub fn create_by_file(
        &self,
        path: &Path,
        name: Option<&str>,
        rule: &ProcessRule,
    ) -> Result<UploadReceipt, DatasetError> {
        let bytes = std::fs::read(path).map_err(|e| DatasetError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        let file_name = name.map(str::to_string).unwrap_or_else(|| file_name_of(path));
        let mime = mime_guess::from_path(&file_name).first_or_octet_stream();

        let data = serde_json::to_string(&UploadData {
            indexing_technique: self.indexing_technique,
            process_rule: rule,
        })
        .map_err(|e| DatasetError::InvalidResponse(e.to_string()))?;

        info!("Uploading {} to dataset {}", file_name, self.dataset_id);
        let url = self.dataset_url("document/create_by_file");
        let response = self.send("Upload", || {
            let part = Part::bytes(bytes.clone())
                .file_name(file_name.clone())
                .mime_str(mime.essence_str())
                .map_err(|e| DatasetError::Http(e.to_string()))?;
            let form = Form::new().part("file", part).text("data", data.clone());
            Ok(self.client.post(&url).multipart(form))
        })?;

        let uploaded: UploadResponse = read_json(response)?;

        info!(
            "Uploaded {} as document {} (batch {})",
            file_name, uploaded.document.id, uploaded.batch
        );
        Ok(UploadReceipt {
            document_id: uploaded.document.id,
            batch: uploaded.batch,
        })
    }

    pub fn document(&self, document_id: &str) -> Result<DocumentStatus, DatasetError> {
        let url = self.dataset_url(&format!("documents/{}", document_id));
        let response = self.send("Status request", || Ok(self.client.get(&url)))?;
        read_json(response)
    }

    pub fn delete_document(&self, document_id: &str) -> Result<(), DatasetError> {
        let url = self.dataset_url(&format!("documents/{}", document_id));
        self.send("Delete", || Ok(self.client.delete(&url)))?;
        info!("Deleted document {}", document_id);
        Ok(())
    }

    /// Polls until the document is `completed` or `error`, or `max_wait`
    /// elapses. Transport errors while polling are logged and retried.
    pub fn wait_for_indexing(
        &self,
        document_id: &str,
        max_wait: Duration,
        interval: Duration,
    ) -> Result<IndexingOutcome, DatasetError> {
        let started = Instant::now();
        let mut last_status = None;

        while started.elapsed() < max_wait {
            match self.document(document_id) {
                Ok(status) => match status.indexing_status {
                    IndexingStatus::Completed => {
                        info!(
                            "Document {} indexed in {:.1}s",
                            document_id,
                            started.elapsed().as_secs_f64()
                        );
                        return Ok(IndexingOutcome::Completed(status));
                    }
                    IndexingStatus::Error => {
                        warn!(
                            "Indexing of document {} failed: {}",
                            document_id,
                            status.error.as_deref().unwrap_or("unknown error")
                        );
                        return Ok(IndexingOutcome::Failed(status));
                    }
                    ref pending => {
                        debug!("Document {} is {}", document_id, pending);
                        last_status = Some(status);
                    }
                },
                Err(DatasetError::Http(e)) => {
                    warn!("Status request for {} failed: {}, retrying", document_id, e);
                }
                Err(e) => return Err(e),
            }

            let remaining = max_wait.saturating_sub(started.elapsed());
            std::thread::sleep(interval.min(remaining));
        }

        warn!(
            "Timed out after {}s waiting for document {}",
            max_wait.as_secs(),
            document_id
        );
        Ok(IndexingOutcome::TimedOut { last_status })
    }
}

fn build_client(timeout: Duration) -> Result<Client, DatasetError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| DatasetError::ClientBuild(e.to_string()))
}

fn is_retryable(status: StatusCode) -> bool {
    RETRY_STATUSES.contains(&status.as_u16())
}

/// A body that stops arriving is a transport error; one that arrives but
/// doesn't parse is an invalid response.
fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, DatasetError> {
    let body = response.text().map_err(|e| {
        if e.is_decode() {
            DatasetError::InvalidResponse(e.to_string())
        } else {
            DatasetError::Http(e.to_string())
        }
    })?;
    serde_json::from_str(&body).map_err(|e| DatasetError::InvalidResponse(e.to_string()))
}

fn check_status(response: Response) -> Result<Response, DatasetError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    let body = if body.chars().count() > MAX_ERROR_BODY_LENGTH {
        let head: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
        format!("{}... (truncated)", head)
    } else {
        body
    };
    Err(DatasetError::Api {
        status: status.as_u16(),
        body,
    })
}
