//! HTTP fetch transport
//!
//! The worker talks to the network only through [`FetchTransport`], which
//! hands back the status, content type and a chunked body stream so reads can
//! stop at the task's byte budget. [`ReqwestTransport`] is the production
//! implementation.

use crate::config::{CrawlerConfig, UserAgentConfig};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Why a fetch did not complete
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("timed out after {0} ms")]
    Timeout(u64),

    #[error("aborted: {0}")]
    Aborted(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("body read failed: {0}")]
    Body(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(0)
        } else if err.is_redirect() {
            FetchError::Aborted(format!("redirect limit: {}", err))
        } else if err.is_body() || err.is_decode() {
            FetchError::Body(err.to_string())
        } else if err.is_connect() {
            FetchError::Transport(format!("connection failed: {}", err))
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// Per-request fetch options
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub timeout_ms: u64,
    pub max_redirects: usize,
}

/// A response body read chunk by chunk
#[async_trait]
pub trait BodyStream: Send {
    /// Next chunk, or `None` at end of body
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, FetchError>;
}

/// Response headers plus an unread body
pub struct FetchResponse {
    pub status: u16,
    pub content_type: Option<String>,
    /// URL after redirects
    pub final_url: Url,
    pub body: Box<dyn BodyStream>,
}

/// Network seam used by the crawl worker
#[async_trait]
pub trait FetchTransport: Send + Sync {
    async fn fetch(&self, url: &Url, options: FetchOptions) -> Result<FetchResponse, FetchError>;
}

/// Builds the crawler's HTTP client
///
/// The user agent is `CrawlerName/Version (+ContactURL; ContactEmail)` and
/// redirects are followed up to `max_redirects` hops.
///
/// # Arguments
///
/// * `user_agent` - Identification sent with every request
/// * `crawler` - Redirect limit and HTTPS-only switch
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    crawler: &CrawlerConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(crawler.max_redirects))
        .https_only(crawler.https_only)
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`FetchTransport`] backed by a reqwest client
///
/// The redirect limit is a property of the client, so `max_redirects` in
/// [`FetchOptions`] is honored only as configured at build time.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

struct ReqwestBody {
    response: reqwest::Response,
}

#[async_trait]
impl BodyStream for ReqwestBody {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, FetchError> {
        let chunk = self.response.chunk().await?;
        Ok(chunk.map(|bytes| bytes.to_vec()))
    }
}

#[async_trait]
impl FetchTransport for ReqwestTransport {
    async fn fetch(&self, url: &Url, options: FetchOptions) -> Result<FetchResponse, FetchError> {
        let mut request = self.client.get(url.clone());
        if options.timeout_ms > 0 {
            request = request.timeout(Duration::from_millis(options.timeout_ms));
        }

        let response = request.send().await.map_err(|e| match FetchError::from(e) {
            FetchError::Timeout(_) => FetchError::Timeout(options.timeout_ms),
            other => other,
        })?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        Ok(FetchResponse {
            status: response.status().as_u16(),
            content_type,
            final_url: response.url().clone(),
            body: Box::new(ReqwestBody { response }),
        })
    }
}

/// Returns true for HTML content types; a missing header counts as HTML
pub fn is_html(content_type: Option<&str>) -> bool {
    match content_type {
        None => true,
        Some(ct) => {
            let mime = ct.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
            mime == "text/html" || mime == "application/xhtml+xml"
        }
    }
}

/// Reads `body` until it ends or `byte_budget` bytes have been collected
///
/// Returns the bytes read and whether the body was cut short. Bytes past the
/// budget are never kept and the rest of the stream is left unread.
pub async fn read_budgeted(
    body: &mut dyn BodyStream,
    byte_budget: usize,
) -> Result<(Vec<u8>, bool), FetchError> {
    let mut buf = Vec::new();

    while let Some(chunk) = body.next_chunk().await? {
        let room = byte_budget.saturating_sub(buf.len());
        if chunk.len() > room {
            buf.extend_from_slice(&chunk[..room]);
            return Ok((buf, true));
        }
        buf.extend_from_slice(&chunk);
        if buf.len() == byte_budget {
            return Ok((buf, true));
        }
    }

    Ok((buf, false))
}
