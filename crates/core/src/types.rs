//! Shared result types produced by the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The closed set of extraction strategies a result can come from.
///
/// Score scales are engine-local and are only comparable against the single
/// configured threshold, never across engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Engine {
    /// The extraction service run directly over fetched markup.
    GenericMarkup,
    /// The extraction service run over browser-rendered markup.
    RenderThenMarkup,
    /// The local permissive fallback extractor.
    GenericFallback,
    /// Reddit thread JSON endpoint.
    RedditJson,
    /// Stack Exchange API.
    StackoverflowApi,
}

impl Engine {
    /// Wire name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::GenericMarkup => "generic-markup",
            Engine::RenderThenMarkup => "render-then-markup",
            Engine::GenericFallback => "generic-fallback",
            Engine::RedditJson => "reddit-json",
            Engine::StackoverflowApi => "stackoverflow-api",
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successful extraction, as returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Page or thread title.
    pub title: String,
    /// Extracted readable text.
    pub text: String,
    /// Strategy that produced this result.
    pub engine: Engine,
    /// Non-negative, engine-local confidence score.
    pub score: f64,
    /// True only when served from the cache.
    pub cached: bool,
    /// Present only when full browser rendering occurred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_ms: Option<u64>,
}

/// Operational snapshot of the result cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub ttl: Duration,
}
