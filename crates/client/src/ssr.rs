//! Heuristic classifier for pages that need headless rendering.
//!
//! Scores weighted signals over the raw markup and compares against a
//! configured threshold. False positives and negatives are acceptable; the
//! knobs live in [`SsrConfig`] so tuning never requires a code change.

use std::sync::LazyLock;

use readgate_core::config::SsrConfig;
use regex::Regex;
use scraper::{Html, Selector};

static SCRIPT_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<script\b[^>]*>").expect("invalid regex"));

static JSON_SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)type\s*=\s*["']application/(ld\+)?json["']"#).expect("invalid regex")
});

/// Literal fingerprints left behind by the common SPA frameworks.
const FRAMEWORK_MARKERS: &[&str] = &[
    "__NEXT_DATA__",
    "data-reactroot",
    "id=\"__next\"",
    "<app-root",
    "data-v-inspector",
    "ng-version",
    "__NUXT__",
];

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("invalid selector")
}

static ROOT_MOUNT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| selector("div#root, div#app, div#__next"));

static ARTICLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    selector("article, main, [class*=\"content\"], [class*=\"article\"], [class*=\"post\"]")
});

static NOSCRIPT_SELECTOR: LazyLock<Selector> = LazyLock::new(|| selector("noscript"));

pub struct SsrDetector {
    config: SsrConfig,
}

impl SsrDetector {
    pub fn new(config: SsrConfig) -> Self {
        Self { config }
    }

    /// Returns true when the page likely needs a full browser render before
    /// extraction is worthwhile.
    pub fn needs_rendering(&self, html: &str) -> bool {
        let cfg = &self.config;
        let size = html.len();
        let density = self.script_density(html);
        let has_markers = FRAMEWORK_MARKERS.iter().any(|m| html.contains(m));

        let doc = Html::parse_document(html);

        // Moderately sized pages with clear article markup and no SPA
        // fingerprints are static long-form content; skip the render.
        if size >= cfg.html_size_threshold
            && !has_markers
            && density <= cfg.script_ratio_threshold
            && doc.select(&ARTICLE_SELECTOR).next().is_some()
        {
            tracing::debug!(size, density, "ssr fast path: static article markup");
            return false;
        }

        let mut score = 0.0;
        if size < cfg.html_size_threshold {
            score += cfg.weights.small_size;
        }
        if density > cfg.script_ratio_threshold {
            score += cfg.weights.high_script_ratio;
        }
        if has_markers {
            score += cfg.weights.framework_markers;
        }
        if doc.select(&ROOT_MOUNT_SELECTOR).next().is_some() {
            score += cfg.weights.spa_structure;
        }
        if self.noscript_text_len(&doc) >= cfg.noscript_min_len {
            // Substantial noscript fallback means the page degrades
            // gracefully without JavaScript.
            score -= cfg.weights.noscript_content;
        }

        let needed = score >= cfg.threshold;
        tracing::debug!(size, density, score, threshold = cfg.threshold, needed, "ssr decision");
        needed
    }

    /// Executable script-open-tag count per `script_divisor` bytes. JSON
    /// payload scripts (structured data) are not executable and do not count.
    fn script_density(&self, html: &str) -> f64 {
        let executable = SCRIPT_OPEN_RE
            .find_iter(html)
            .filter(|m| !JSON_SCRIPT_RE.is_match(m.as_str()))
            .count();
        if html.is_empty() {
            return 0.0;
        }
        executable as f64 / (html.len() as f64 / self.config.script_divisor as f64)
    }

    fn noscript_text_len(&self, doc: &Html) -> usize {
        doc.select(&NOSCRIPT_SELECTOR)
            .map(|el| el.text().map(str::len).sum::<usize>())
            .sum()
    }
}
