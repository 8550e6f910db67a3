//! The extraction orchestrator.
//!
//! Runs a caller URL through validation, SSRF clearance, canonicalization,
//! cache lookup, domain-handler dispatch, the generic fetch, the render
//! decision, and score-threshold fallback, writing the cache on every
//! successful path.

use std::sync::Arc;

use readgate_core::{AppConfig, Engine, Error, ExtractCache, ExtractionResult, RateLimiter};
use url::Url;

use crate::engine::EngineClient;
use crate::fallback::{FallbackExtractor, fallback_score};
use crate::fetch::{FetchClient, FetchError, validate_url};
use crate::handlers::{DomainHandler, default_handlers};
use crate::render::{RenderClient, Renderer};
use crate::ssr::SsrDetector;
use crate::transform::canonicalize;

fn client_build_error(e: reqwest::Error) -> Error {
    Error::InternalError(format!("failed to build HTTP client: {e}"))
}

pub struct ExtractPipeline {
    config: Arc<AppConfig>,
    fetcher: FetchClient,
    detector: SsrDetector,
    renderer: Box<dyn Renderer>,
    engine: EngineClient,
    fallback: FallbackExtractor,
    cache: Arc<ExtractCache>,
    limiter: Arc<RateLimiter>,
    handlers: Vec<Box<dyn DomainHandler>>,
}

impl ExtractPipeline {
    pub fn new(config: AppConfig) -> Result<Self, Error> {
        let renderer = Box::new(RenderClient::new(&config).map_err(client_build_error)?);
        Self::with_renderer(config, renderer)
    }

    /// Wires the pipeline around a caller-supplied renderer seam.
    pub fn with_renderer(
        config: AppConfig,
        renderer: Box<dyn Renderer>,
    ) -> Result<Self, Error> {
        let limiter = Arc::new(RateLimiter::new());
        let cache = Arc::new(ExtractCache::new(config.cache_max_size, config.cache_ttl()));
        let handlers = default_handlers(&config, Arc::clone(&limiter)).map_err(client_build_error)?;
        let fetcher = FetchClient::new(&config)?;
        let detector = SsrDetector::new(config.ssr.clone());
        let engine = EngineClient::new(&config).map_err(client_build_error)?;
        Ok(Self {
            config: Arc::new(config),
            fetcher,
            detector,
            renderer,
            engine,
            fallback: FallbackExtractor::new(),
            cache,
            limiter,
            handlers,
        })
    }

    pub fn cache(&self) -> &ExtractCache {
        &self.cache
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Runs the full extraction state machine for one caller URL.
    pub async fn extract_content(&self, raw_url: &str) -> Result<ExtractionResult, Error> {
        let url = validate_url(raw_url, &self.config.blocked_ports)
            .map_err(|e| Error::from(FetchError::Url(e)))?;

        if let Err(e) = self.fetcher.guard().check(&url).await {
            tracing::warn!(url = %url, error = %e, "ssrf rejection");
            return Err(Error::from(FetchError::Ssrf(e)));
        }

        let canonical = canonicalize(&url);
        let key = canonical.as_str();

        if let Some(hit) = self.cache.get(key) {
            tracing::info!(url = key, engine = %hit.engine, "cache hit");
            return Ok(hit);
        }

        if let Some(handler) = self.handlers.iter().find(|h| h.matches(&canonical)) {
            match handler.handle(&canonical).await {
                Ok(result) => return Ok(self.finish(key, result)),
                Err(e) => {
                    // A handler is an optimization, not a dependency.
                    tracing::warn!(
                        handler = handler.name(),
                        url = key,
                        error = %e,
                        "domain handler failed, using generic path"
                    );
                }
            }
        }

        let page = self.fetcher.fetch_html(&canonical).await.map_err(Error::from)?;

        let result = if self.detector.needs_rendering(&page.html) {
            match self.renderer.render(&canonical).await {
                Ok(rendered) => {
                    self.extract_scored(&rendered.html, &canonical, Some(rendered.render_ms))
                        .await?
                }
                Err(e) => {
                    tracing::warn!(url = key, error = %e, "render failed, extracting raw markup");
                    self.extract_scored(&page.html, &canonical, None).await?
                }
            }
        } else {
            self.extract_scored(&page.html, &canonical, None).await?
        };

        Ok(self.finish(key, result))
    }

    /// Primary engine, accepted only on success at or above the score
    /// threshold; anything else falls back to the local extractor.
    async fn extract_scored(
        &self,
        html: &str,
        url: &Url,
        render_ms: Option<u64>,
    ) -> Result<ExtractionResult, Error> {
        match self.engine.extract(html, url).await {
            Ok(resp) if resp.success && resp.score >= self.config.score_threshold => {
                let engine = if render_ms.is_some() {
                    Engine::RenderThenMarkup
                } else {
                    Engine::GenericMarkup
                };
                Ok(ExtractionResult {
                    title: resp.title,
                    text: resp.text,
                    engine,
                    score: resp.score,
                    cached: false,
                    render_ms,
                })
            }
            Ok(resp) => {
                tracing::debug!(
                    url = %url,
                    score = resp.score,
                    success = resp.success,
                    threshold = self.config.score_threshold,
                    "primary extraction below threshold, falling back"
                );
                self.fallback_result(html, url, render_ms)
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "extractor service failed, falling back");
                self.fallback_result(html, url, render_ms)
            }
        }
    }

    fn fallback_result(
        &self,
        html: &str,
        url: &Url,
        render_ms: Option<u64>,
    ) -> Result<ExtractionResult, Error> {
        let content = self
            .fallback
            .extract(html, url)
            .map_err(|e| Error::InternalError(format!("fallback extraction failed: {e}")))?;
        let score =
            fallback_score(&content.text, &content.title, self.config.fallback_score_factor);
        Ok(ExtractionResult {
            title: content.title,
            text: content.text,
            engine: Engine::GenericFallback,
            score,
            cached: false,
            render_ms,
        })
    }

    /// Write-through cache step shared by every successful path.
    fn finish(&self, key: &str, result: ExtractionResult) -> ExtractionResult {
        self.cache.set(key, &result);
        tracing::info!(
            url = key,
            engine = %result.engine,
            score = result.score,
            "extraction complete"
        );
        result
    }
}
