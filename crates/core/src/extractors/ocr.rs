use super::ExtractionStrategy;
use crate::error::IngestError;
use crate::models::{ExtractionMethod, RawFile};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrEndpointConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
}

impl OcrEndpointConfig {
    /// `None` when the endpoint is blank; blank keys are dropped.
    pub fn new(endpoint: &str, api_key: Option<&str>) -> Option<Self> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return None;
        }

        let api_key = api_key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string);

        Some(Self {
            endpoint: endpoint.to_string(),
            api_key,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
struct OcrRequest<'a> {
    document_base64: String,
    mime_type: &'a str,
    source_path: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OcrResponse {
    pages: Option<Vec<OcrPage>>,
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OcrPage {
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
struct PageText {
    number: u32,
    text: String,
}

/// Remote multimodal OCR service. Receives the raw file base64-encoded and answers with either
/// per-page text or a single form-feed separated string.
pub struct OcrEndpointStrategy {
    config: OcrEndpointConfig,
    client: Client,
}

impl OcrEndpointStrategy {
    pub fn new(config: OcrEndpointConfig, timeout: Duration) -> Result<Self, IngestError> {
        let client = Client::builder().timeout(timeout).build().map_err(|error| {
            IngestError::Configuration(format!("cannot build OCR http client: {error}"))
        })?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl ExtractionStrategy for OcrEndpointStrategy {
    fn name(&self) -> &'static str {
        "ocr-endpoint"
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Ocr
    }

    async fn extract(&self, raw: &RawFile) -> Result<String, IngestError> {
        let payload = OcrRequest {
            document_base64: STANDARD.encode(&raw.bytes),
            mime_type: raw.mime_type(),
            source_path: raw.path.to_string_lossy().to_string(),
        };

        let mut request = self
            .client
            .post(&self.config.endpoint)
            .header("content-type", "application/json")
            .json(&payload);

        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|error| {
            IngestError::extraction(&raw.path, format!("OCR request failed: {error}"))
        })?;

        if !response.status().is_success() {
            return Err(IngestError::extraction(
                &raw.path,
                format!(
                    "OCR request to {} returned {}",
                    self.config.endpoint,
                    response.status()
                ),
            ));
        }

        let body: OcrResponse = response.json().await.map_err(|error| {
            IngestError::extraction(&raw.path, format!("OCR response unreadable: {error}"))
        })?;

        let pages = payload_to_pages(&body);
        Ok(pages
            .into_iter()
            .map(|page| page.text)
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

fn payload_to_pages(payload: &OcrResponse) -> Vec<PageText> {
    if let Some(listed) = &payload.pages {
        let mut listed = listed
            .iter()
            .filter_map(|page| {
                let normalized = page.text.as_deref().map(str::trim).unwrap_or_default();
                if normalized.is_empty() {
                    None
                } else {
                    Some(PageText {
                        number: page.page.unwrap_or(1),
                        text: normalized.to_string(),
                    })
                }
            })
            .collect::<Vec<_>>();

        if !listed.is_empty() {
            listed.sort_by_key(|page| page.number);
            return listed;
        }
    }

    if let Some(raw_text) = &payload.text {
        let pages = raw_text
            .split('\u{000c}')
            .enumerate()
            .filter_map(|(index, chunk)| {
                let normalized = chunk.trim();
                if normalized.is_empty() {
                    None
                } else {
                    Some(PageText {
                        number: (index + 1) as u32,
                        text: normalized.to_string(),
                    })
                }
            })
            .collect::<Vec<_>>();

        if !pages.is_empty() {
            return pages;
        }
    }

    // an empty answer means nothing was recognized, which the chain reports separately
    Vec::new()
}
