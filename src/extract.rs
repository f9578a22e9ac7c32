//! Web content extraction and search
//!
//! Backed by a reader proxy that returns the readable text of a page, and a
//! companion search endpoint.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Longest extracted text returned, in characters
pub const MAX_CONTENT_CHARS: usize = 20_000;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Could not reach {0}")]
    Unreachable(String),
    #[error("No readable content found")]
    Empty,
    #[error("Extraction service error: {0}")]
    Upstream(String),
}

/// One search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchHit {
    pub title: String,
    pub url: String,
}

#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Readable text of the page at `url`
    async fn extract(&self, url: &Url) -> Result<String, ExtractError>;

    async fn search(&self, query: &str) -> Result<Vec<ResearchHit>, ExtractError>;
}

/// Parse user input as an absolute http(s) URL
pub fn parse_http_url(raw: &str) -> Result<Url, ExtractError> {
    let url = Url::parse(raw.trim()).map_err(|e| ExtractError::InvalidUrl(e.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        scheme => Err(ExtractError::InvalidUrl(format!(
            "unsupported scheme '{scheme}'"
        ))),
    }
}

/// Configuration for [`ReaderExtractor`]
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    pub reader_url: String,
    pub search_url: String,
    pub api_key: Option<String>,
}

impl ReaderConfig {
    pub fn from_env() -> Self {
        Self {
            reader_url: std::env::var("FOLIO_READER_URL")
                .unwrap_or_else(|_| "https://r.jina.ai".to_string()),
            search_url: std::env::var("FOLIO_SEARCH_URL")
                .unwrap_or_else(|_| "https://s.jina.ai".to_string()),
            api_key: std::env::var("FOLIO_READER_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
        }
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<ResearchHit>,
}

/// Statuses that describe the reader service itself rather than the page
fn is_reader_fault(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::UNAUTHORIZED
            | StatusCode::PAYMENT_REQUIRED
            | StatusCode::FORBIDDEN
            | StatusCode::TOO_MANY_REQUESTS
    )
}

pub struct ReaderExtractor {
    client: reqwest::Client,
    config: ReaderConfig,
}

impl ReaderExtractor {
    pub fn new(config: ReaderConfig) -> Result<Self, ExtractError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ExtractError::Upstream(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl ContentExtractor for ReaderExtractor {
    async fn extract(&self, url: &Url) -> Result<String, ExtractError> {
        let endpoint = format!("{}/{}", self.config.reader_url.trim_end_matches('/'), url);
        let response = self
            .authorized(self.client.get(endpoint))
            .header(reqwest::header::ACCEPT, "text/plain")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(%url, error = %e, "Reader request failed");
                ExtractError::Upstream(e.to_string())
            })?;

        let status = response.status();
        if is_reader_fault(status) {
            return Err(ExtractError::Upstream(format!("status {status}")));
        }
        // Remaining 4xx mean the reader could not fetch the target page
        if status.is_client_error() {
            return Err(ExtractError::Unreachable(url.to_string()));
        }
        if !status.is_success() {
            return Err(ExtractError::Upstream(format!("status {status}")));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ExtractError::Upstream(e.to_string()))?;
        let text = text.trim();
        if text.is_empty() {
            return Err(ExtractError::Empty);
        }
        Ok(text.chars().take(MAX_CONTENT_CHARS).collect())
    }

    async fn search(&self, query: &str) -> Result<Vec<ResearchHit>, ExtractError> {
        let mut endpoint = Url::parse(&self.config.search_url)
            .map_err(|e| ExtractError::Upstream(format!("bad search URL: {e}")))?;
        endpoint
            .path_segments_mut()
            .map_err(|()| ExtractError::Upstream("search URL cannot take a path".to_string()))?
            .pop_if_empty()
            .push(query);

        let response = self
            .authorized(self.client.get(endpoint))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ExtractError::Upstream(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ExtractError::Upstream(format!(
                "status {}",
                response.status()
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::Upstream(e.to_string()))?;
        Ok(parsed.data)
    }
}
