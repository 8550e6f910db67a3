//! Domain-specific extraction handlers.
//!
//! A handler is an optimization for a known source, not a hard dependency:
//! the pipeline tries the first matching handler and falls through to the
//! generic fetch path on any handler failure.

use std::sync::Arc;

use async_trait::async_trait;
use readgate_core::{AppConfig, ExtractionResult, RateLimiter};
use url::Url;
use thiserror::Error;

pub mod reddit;
pub mod stackoverflow;

pub use reddit::RedditHandler;
pub use stackoverflow::StackOverflowHandler;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("upstream request failed: {0}")]
    Network(String),
    #[error("upstream returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("client-side rate limit for {0}")]
    RateLimited(&'static str),
    #[error("unexpected upstream payload: {0}")]
    Payload(String),
}

/// One known content source. `matches` is checked once per request against
/// the canonical URL; `handle` performs its own rate limiting before any
/// outbound call.
#[async_trait]
pub trait DomainHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn matches(&self, url: &Url) -> bool;
    async fn handle(&self, url: &Url) -> Result<ExtractionResult, HandlerError>;
}

/// The built-in handler set, in dispatch order.
pub fn default_handlers(
    config: &AppConfig,
    limiter: Arc<RateLimiter>,
) -> Result<Vec<Box<dyn DomainHandler>>, reqwest::Error> {
    Ok(vec![
        Box::new(RedditHandler::new(config, Arc::clone(&limiter))?),
        Box::new(StackOverflowHandler::new(config, limiter)?),
    ])
}
