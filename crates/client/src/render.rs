//! Client for the external headless rendering worker.
//!
//! Each render occupies a full browser context upstream, so calls are
//! bounded by a semaphore sized independently of HTTP-layer concurrency.

use std::time::Duration;

use async_trait::async_trait;
use readgate_core::AppConfig;
use url::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("renderer request failed: {0}")]
    Network(String),
    #[error("renderer timed out after {0:?}")]
    Timeout(Duration),
    #[error("renderer returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("renderer reported failure: {0}")]
    Failed(String),
}

#[derive(Debug, Serialize)]
struct RenderRequest<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct RenderResponse {
    html: String,
    success: bool,
    render_time_ms: u64,
    error: Option<String>,
}

/// A successful render: the post-JavaScript markup and how long the worker
/// spent producing it.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub html: String,
    pub render_ms: u64,
}

/// Seam for the rendering worker, so the pipeline can be exercised without
/// a live browser fleet.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, url: &Url) -> Result<RenderedPage, RenderError>;
}

pub struct RenderClient {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    permits: Semaphore,
}

impl RenderClient {
    pub fn new(config: &AppConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .use_rustls_tls()
            .build()?;
        Ok(Self {
            http,
            endpoint: config.renderer_endpoint.trim_end_matches('/').to_string(),
            timeout: config.render_timeout(),
            permits: Semaphore::new(config.render_concurrency),
        })
    }

    async fn call(&self, url: &Url) -> Result<RenderResponse, RenderError> {
        let request = self
            .http
            .post(format!("{}/render", self.endpoint))
            .json(&RenderRequest { url: url.as_str() })
            .send();

        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| RenderError::Timeout(self.timeout))?
            .map_err(|e| RenderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::Status(status));
        }

        tokio::time::timeout(self.timeout, response.json::<RenderResponse>())
            .await
            .map_err(|_| RenderError::Timeout(self.timeout))?
            .map_err(|e| RenderError::Network(e.to_string()))
    }
}

#[async_trait]
impl Renderer for RenderClient {
    async fn render(&self, url: &Url) -> Result<RenderedPage, RenderError> {
        // A closed semaphore is unreachable; map the error anyway rather
        // than panic in a request path.
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| RenderError::Network(e.to_string()))?;

        tracing::debug!(url = %url, "render request");
        let body = self.call(url).await?;
        if !body.success {
            return Err(RenderError::Failed(
                body.error.unwrap_or_else(|| "unspecified renderer error".to_string()),
            ));
        }
        tracing::debug!(url = %url, render_ms = body.render_time_ms, "render complete");
        Ok(RenderedPage { html: body.html, render_ms: body.render_time_ms })
    }
}
