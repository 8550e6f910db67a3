//! Local last-resort extractor, used when the engine fails or scores low.
//!
//! Runs the `readability` crate in-process, so it stays available when the
//! extractor service is down. The pipeline computes its own quality score
//! from the output since readability reports none.

use readability::extractor;
use url::Url;
use thiserror::Error;

/// Flat bonus applied when the extraction recovered a title.
const TITLE_BONUS: f64 = 100.0;

#[derive(Debug, Error)]
pub enum FallbackError {
    #[error("readability extraction failed: {0}")]
    Extraction(String),
    #[error("readability produced no text")]
    Empty,
}

#[derive(Debug, Clone)]
pub struct FallbackContent {
    pub title: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackExtractor;

impl FallbackExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, html: &str, url: &Url) -> Result<FallbackContent, FallbackError> {
        let article = extractor::extract(&mut html.as_bytes(), url)
            .map_err(|e| FallbackError::Extraction(e.to_string()))?;

        let text = article.text.trim().to_string();
        if text.is_empty() {
            return Err(FallbackError::Empty);
        }
        Ok(FallbackContent { title: article.title.trim().to_string(), text })
    }
}

/// Length/structure score for fallback output. Scale is incomparable with
/// the engine's scores; only the threshold comparison matters.
pub fn fallback_score(text: &str, title: &str, factor: f64) -> f64 {
    let chars = text.chars().count() as f64;
    let words = text.split_whitespace().count() as f64;
    let title_bonus = if title.is_empty() { 0.0 } else { TITLE_BONUS };
    (chars + words * 2.0 + title_bonus) * factor
}
