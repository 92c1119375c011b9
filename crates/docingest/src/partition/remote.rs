//! HTTP client for the hosted partitioning API.

use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};

use super::{Element, PartitionRequest, Partitioner};
use crate::error::PartitionError;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "unstructured-api-key";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum length for error bodies copied into errors and logs.
const MAX_ERROR_BODY_LENGTH: usize = 200;

pub struct RemotePartitioner {
    client: Client,
    api_url: String,
    api_key: Option<SecretString>,
}

impl RemotePartitioner {
    pub fn new(
        api_url: &str,
        api_key: Option<SecretString>,
        request_timeout_secs: u64,
    ) -> Result<Self, PartitionError> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(request_timeout_secs))
            .build()
            .map_err(|e| PartitionError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            api_url: api_url.to_string(),
            api_key,
        })
    }

    fn build_form(&self, request: &PartitionRequest) -> Result<Form, PartitionError> {
        let bytes = std::fs::read(&request.path).map_err(|e| PartitionError::ReadDocument {
            path: request.path.clone(),
            source: e,
        })?;

        let mime = mime_guess::from_path(&request.path).first_or_octet_stream();
        let part = Part::bytes(bytes)
            .file_name(request.file_name())
            .mime_str(mime.essence_str())
            .map_err(|e| PartitionError::Http(format!("Invalid MIME type {}: {}", mime, e)))?;

        let mut form = Form::new().part("files", part);
        for language in &request.languages {
            form = form.text("languages", language.clone());
        }
        for language in &request.ocr_languages {
            form = form.text("ocr_languages", language.clone());
        }
        if let Some(strategy) = request.strategy {
            form = form.text("strategy", strategy.as_str());
        }

        Ok(form)
    }
}

impl Partitioner for RemotePartitioner {
    fn partition(&self, request: &PartitionRequest) -> Result<Vec<Element>, PartitionError> {
        let _span = tracing::info_span!(
            "partition.remote",
            file = %request.file_name(),
            strategy = request.strategy.map(|s| s.as_str()).unwrap_or("default")
        )
        .entered();

        let form = self.build_form(request)?;

        let mut http = self
            .client
            .post(&self.api_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .multipart(form);
        if let Some(key) = &self.api_key {
            http = http.header(API_KEY_HEADER, key.expose_secret());
        }

        let response = http
            .send()
            .map_err(|e| PartitionError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(PartitionError::Api {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let elements: Vec<Element> = response
            .json()
            .map_err(|e| PartitionError::InvalidResponse(e.to_string()))?;

        tracing::debug!(elements = elements.len(), "Partitioning API responded");
        Ok(elements)
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() > MAX_ERROR_BODY_LENGTH {
        let head: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
        format!("{}... (truncated)", head)
    } else {
        body.to_string()
    }
}
