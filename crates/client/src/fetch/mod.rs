//! HTTP fetch pipeline with SSRF protection.
//!
//! ### Safety gates
//! - Every hop (the initial URL and each redirect destination) passes the
//!   syntactic validator and the SSRF guard before it is contacted.
//! - Redirects are followed manually up to a configured cap; a redirect
//!   status without a `Location` header is a hard failure.
//! - Only `text/html` / `application/xhtml+xml` responses are accepted.
//! - The body is streamed against a byte budget and the transfer is
//!   aborted as soon as the budget is exceeded.

pub mod ssrf;
pub mod url;

use std::time::Instant;

use readgate_core::{AppConfig, Error};
use reqwest::{Client, StatusCode, Url, header};

pub use ssrf::{SsrfError, SsrfGuard, is_private_or_reserved};
pub use url::{UrlError, validate_url};

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Error type for fetch failures.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Url(#[from] UrlError),

    #[error(transparent)]
    Ssrf(#[from] SsrfError),

    #[error("network error: {0}")]
    Network(String),

    #[error("fetch timed out")]
    Timeout,

    #[error("HTTP {0}")]
    Status(StatusCode),

    #[error("invalid content type for extraction: {0}")]
    NotHtml(String),

    #[error("response exceeds {0} byte budget")]
    BodyTooLarge(usize),

    #[error("too many redirects (cap {0})")]
    TooManyRedirects(usize),

    #[error("redirect response carried no Location header")]
    RedirectWithoutLocation,

    #[error("invalid redirect location: {0}")]
    BadRedirectLocation(String),
}

impl From<FetchError> for Error {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Url(e) => Error::InvalidInput(e.to_string()),
            FetchError::Ssrf(SsrfError::DnsFailed(msg)) => Error::ServiceUnavailable(format!("DNS: {msg}")),
            FetchError::Ssrf(e) => Error::Forbidden(e.to_string()),
            FetchError::NotHtml(_) => Error::InvalidInput(err.to_string()),
            FetchError::Network(_)
            | FetchError::Timeout
            | FetchError::Status(_)
            | FetchError::BodyTooLarge(_)
            | FetchError::TooManyRedirects(_)
            | FetchError::RedirectWithoutLocation
            | FetchError::BadRedirectLocation(_) => Error::ServiceUnavailable(err.to_string()),
        }
    }
}

/// A fetched HTML page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// The URL originally requested.
    pub url: Url,
    /// The final URL after redirects.
    pub final_url: Url,
    /// Terminal HTTP status.
    pub status: StatusCode,
    /// Decoded response body.
    pub html: String,
    /// Time taken across all hops in milliseconds.
    pub fetch_ms: u64,
}

/// HTTP fetch client with per-hop SSRF re-validation.
pub struct FetchClient {
    http: Client,
    guard: SsrfGuard,
    blocked_ports: Vec<u16>,
    max_bytes: usize,
    max_redirects: usize,
}

impl FetchClient {
    /// Build a fetch client from application configuration.
    ///
    /// Redirects are disabled at the reqwest level; the hop loop in
    /// [`fetch_html`](Self::fetch_html) owns redirect handling so the SSRF
    /// guard can vet each destination.
    pub fn new(config: &AppConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.fetch_timeout())
            .redirect(reqwest::redirect::Policy::none())
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::InternalError(format!("failed to build HTTP client: {e}")))?;

        let guard = SsrfGuard::new(config.dns_timeout(), config.allow_dns_failure, config.allow_private_networks);

        Ok(Self {
            http,
            guard,
            blocked_ports: config.blocked_ports.clone(),
            max_bytes: config.max_html_bytes,
            max_redirects: config.max_redirects,
        })
    }

    /// Shared SSRF guard, also applied to the initial pipeline check.
    pub fn guard(&self) -> &SsrfGuard {
        &self.guard
    }

    /// Fetch a security-cleared URL, following redirects under the per-hop
    /// re-validation rule, and return its HTML body.
    pub async fn fetch_html(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let start = Instant::now();
        let mut current = url.clone();
        let mut hops = 0usize;

        loop {
            // Clearance never transfers across hosts: re-run both the
            // syntactic checks and the guard for every hop.
            validate_url(current.as_str(), &self.blocked_ports)?;
            self.guard.check(&current).await?;

            let response = self
                .http
                .get(current.clone())
                .header(header::ACCEPT, ACCEPT_HTML)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() { FetchError::Timeout } else { FetchError::Network(e.to_string()) }
                })?;

            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(header::LOCATION)
                    .ok_or(FetchError::RedirectWithoutLocation)?
                    .to_str()
                    .map_err(|e| FetchError::BadRedirectLocation(e.to_string()))?;

                let next = current
                    .join(location)
                    .map_err(|e| FetchError::BadRedirectLocation(format!("{location}: {e}")))?;

                if hops >= self.max_redirects {
                    return Err(FetchError::TooManyRedirects(self.max_redirects));
                }
                hops += 1;

                tracing::debug!(from = %current, to = %next, hop = hops, "following redirect");
                current = next;
                continue;
            }

            if !status.is_success() {
                return Err(FetchError::Status(status));
            }

            let content_type = response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            if !is_html_content_type(&content_type) {
                return Err(FetchError::NotHtml(content_type));
            }

            if let Some(len) = response.content_length()
                && len as usize > self.max_bytes
            {
                return Err(FetchError::BodyTooLarge(self.max_bytes));
            }

            let html = self.read_body_bounded(response).await?;
            let fetch_ms = start.elapsed().as_millis() as u64;

            tracing::debug!(url = %url, final_url = %current, hops, fetch_ms, bytes = html.len(), "fetched page");

            return Ok(FetchedPage { url: url.clone(), final_url: current, status, html, fetch_ms });
        }
    }

    /// Stream the body, aborting the transfer (by dropping the response)
    /// the moment the byte budget is exceeded.
    async fn read_body_bounded(&self, mut response: reqwest::Response) -> Result<String, FetchError> {
        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| {
                if e.is_timeout() { FetchError::Timeout } else { FetchError::Network(e.to_string()) }
            })?
        {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(FetchError::BodyTooLarge(self.max_bytes));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

fn is_html_content_type(content_type: &str) -> bool {
    content_type.starts_with("text/html") || content_type.starts_with("application/xhtml+xml")
}
