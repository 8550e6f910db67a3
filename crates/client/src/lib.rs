//! Extraction pipeline for readgate.
//!
//! This crate turns a caller-supplied URL into clean readable text while
//! defending the host network: URL validation, SSRF guarding with per-hop
//! redirect re-checks, AMP/mobile canonicalization, a needs-rendering
//! heuristic, and score-threshold fallback between extraction strategies.

pub mod engine;
pub mod fallback;
pub mod fetch;
pub mod handlers;
pub mod pipeline;
pub mod render;
pub mod ssr;
pub mod text;
pub mod transform;

pub use engine::{EngineClient, EngineError, EngineResponse};
pub use fallback::{FallbackContent, FallbackError, FallbackExtractor, fallback_score};
pub use fetch::{FetchClient, FetchError, FetchedPage, SsrfGuard, validate_url};
pub use handlers::{DomainHandler, HandlerError};
pub use pipeline::ExtractPipeline;
pub use render::{RenderClient, RenderError, RenderedPage, Renderer};
pub use ssr::SsrDetector;
pub use transform::canonicalize;
