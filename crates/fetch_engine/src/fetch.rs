use std::time::Duration;

use fetch_logging::fetch_debug;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};

use crate::config::{FetchConfig, DEFAULT_MAX_BODY_BYTES};
use crate::{FailureKind, FetchError};

pub const MARKDOWN_ACCEPT: &str = "text/markdown, text/plain;q=0.9, text/html;q=0.8, */*;q=0.1";
pub const HTML_ACCEPT: &str = "text/html, application/xhtml+xml;q=0.9, */*;q=0.1";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REDIRECT_LIMIT: usize = 10;

/// Which representation the request asks the server for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accept {
    /// Content fetches: Markdown first, then plain text, then HTML.
    PreferMarkdown,
    /// Metadata-only fetches: the HTML carries `<title>` and `<meta>`.
    PreferHtml,
}

impl Accept {
    pub fn header_value(&self) -> &'static str {
        match self {
            Accept::PreferMarkdown => MARKDOWN_ACCEPT,
            Accept::PreferHtml => HTML_ACCEPT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub final_url: String,
    /// Set when the body hit `max_body_bytes` and the rest was discarded.
    pub truncated: bool,
}

impl HttpResponse {
    pub fn content_type(&self) -> &str {
        self.content_type.as_deref().unwrap_or_default()
    }
}

/// A single bounded HTTP GET.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn get(
        &self,
        url: &str,
        accept: Accept,
        config: &FetchConfig,
    ) -> Result<HttpResponse, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(REDIRECT_LIMIT))
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn get(
        &self,
        url: &str,
        accept: Accept,
        config: &FetchConfig,
    ) -> Result<HttpResponse, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;

        let mut request = self
            .client
            .get(parsed)
            .timeout(config.http_timeout)
            .header(ACCEPT, accept.header_value());
        if !config.user_agent.is_empty() {
            request = request.header(USER_AGENT, config.user_agent.as_str());
        }
        for (name, value) in config.headers.iter() {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        let final_url = response.url().to_string();
        if status.as_u16() >= 400 {
            let reason = status.canonical_reason().unwrap_or("Unknown Status");
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                format!("{} {} ({})", status.as_u16(), reason, final_url),
            ));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let limit = if config.max_body_bytes == 0 {
            DEFAULT_MAX_BODY_BYTES
        } else {
            config.max_body_bytes
        };
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);

        let mut body = Vec::new();
        let mut truncated = false;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let take = chunk.len().min(limit - body.len());
            body.extend_from_slice(&chunk[..take]);
            if take < chunk.len() {
                truncated = true;
                break;
            }
        }

        fetch_debug!(
            "GET {} -> {} final_url={} bytes={} truncated={} accept={:?}",
            url,
            status.as_u16(),
            final_url,
            body.len(),
            truncated,
            accept
        );

        Ok(HttpResponse {
            body,
            content_type,
            final_url,
            truncated,
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_builder() {
        return FetchError::new(FailureKind::InvalidUrl, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
