//! End-to-end pipeline tests with mocked content and extractor services.

use async_trait::async_trait;
use readgate_client::{ExtractPipeline, RenderError, RenderedPage, Renderer};
use readgate_core::{AppConfig, Engine, Error};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct FailingRenderer;

#[async_trait]
impl Renderer for FailingRenderer {
    async fn render(&self, _url: &Url) -> Result<RenderedPage, RenderError> {
        Err(RenderError::Network("renderer offline".to_string()))
    }
}

struct StaticRenderer {
    html: String,
    render_ms: u64,
}

#[async_trait]
impl Renderer for StaticRenderer {
    async fn render(&self, _url: &Url) -> Result<RenderedPage, RenderError> {
        Ok(RenderedPage { html: self.html.clone(), render_ms: self.render_ms })
    }
}

/// Long-form static article markup: big enough to skip rendering, rich
/// enough for the readability fallback to chew on.
fn article_html() -> String {
    let paragraphs: String = (0..40)
        .map(|i| {
            format!(
                "<p>Paragraph {i} discusses ownership, borrowing, and lifetimes in \
                 enough depth that an extractor finds real sentences to keep.</p>"
            )
        })
        .collect();
    format!(
        "<html><head><title>Understanding Ownership</title></head>\
         <body><article><h1>Understanding Ownership</h1>{paragraphs}</article></body></html>"
    )
}

/// Small SPA shell that the detector classifies as needing a render.
fn spa_html() -> String {
    "<html><body><div id=\"root\"></div>\
     <script src=\"/bundle.js\"></script><script src=\"/vendor.js\"></script>\
     </body></html>"
        .to_string()
}

fn config_for(extractor: &MockServer) -> AppConfig {
    AppConfig {
        allow_private_networks: true,
        extractor_endpoint: extractor.uri(),
        ..AppConfig::default()
    }
}

async fn mount_article(site: &MockServer, at: &str, html: String) {
    Mock::given(method("GET"))
        .and(path(at.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html, "text/html; charset=utf-8"))
        .mount(site)
        .await;
}

async fn mount_extractor(extractor: &MockServer, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/extract"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(extractor)
        .await;
}

#[tokio::test]
async fn test_amp_print_variant_extracts_then_serves_from_cache() {
    let site = MockServer::start().await;
    let extractor = MockServer::start().await;

    // Only the canonical path is mounted; the amp/print variant must be
    // rewritten before the fetch.
    mount_article(&site, "/article", article_html()).await;
    mount_extractor(
        &extractor,
        serde_json::json!({
            "title": "Understanding Ownership",
            "text": "ownership, borrowing, and lifetimes",
            "score": 85.0,
            "success": true,
            "engine": "trafilatura"
        }),
    )
    .await;

    let pipeline =
        ExtractPipeline::with_renderer(config_for(&extractor), Box::new(FailingRenderer)).unwrap();

    let raw = format!("{}/article/amp?print=1", site.uri());
    let first = pipeline.extract_content(&raw).await.unwrap();
    assert_eq!(first.engine, Engine::GenericMarkup);
    assert!(!first.cached);
    assert!((first.score - 85.0).abs() < f64::EPSILON);
    assert!(first.render_ms.is_none());

    let second = pipeline.extract_content(&raw).await.unwrap();
    assert!(second.cached);
    assert_eq!(second.title, first.title);
    assert_eq!(second.engine, first.engine);
}

#[tokio::test]
async fn test_failed_primary_extraction_falls_back() {
    let site = MockServer::start().await;
    let extractor = MockServer::start().await;

    mount_article(&site, "/article", article_html()).await;
    mount_extractor(
        &extractor,
        serde_json::json!({
            "title": "", "text": "", "score": 0.0, "success": false, "engine": "trafilatura"
        }),
    )
    .await;

    let pipeline =
        ExtractPipeline::with_renderer(config_for(&extractor), Box::new(FailingRenderer)).unwrap();

    let result = pipeline
        .extract_content(&format!("{}/article", site.uri()))
        .await
        .unwrap();
    assert_eq!(result.engine, Engine::GenericFallback);
    assert!(result.text.contains("ownership"));
    assert!(result.score > 0.0);
}

#[tokio::test]
async fn test_low_score_never_surfaces_primary_engine() {
    let site = MockServer::start().await;
    let extractor = MockServer::start().await;

    mount_article(&site, "/article", article_html()).await;
    mount_extractor(
        &extractor,
        serde_json::json!({
            "title": "Understanding Ownership",
            "text": "thin",
            "score": 12.0,
            "success": true,
            "engine": "trafilatura"
        }),
    )
    .await;

    let pipeline =
        ExtractPipeline::with_renderer(config_for(&extractor), Box::new(FailingRenderer)).unwrap();

    let result = pipeline
        .extract_content(&format!("{}/article", site.uri()))
        .await
        .unwrap();
    assert_eq!(result.engine, Engine::GenericFallback);
}

#[tokio::test]
async fn test_render_path_reports_engine_and_duration() {
    let site = MockServer::start().await;
    let extractor = MockServer::start().await;

    mount_article(&site, "/app", spa_html()).await;
    mount_extractor(
        &extractor,
        serde_json::json!({
            "title": "Hydrated",
            "text": "content that only exists after scripts run",
            "score": 85.0,
            "success": true,
            "engine": "trafilatura"
        }),
    )
    .await;

    let renderer = StaticRenderer { html: article_html(), render_ms: 900 };
    let pipeline =
        ExtractPipeline::with_renderer(config_for(&extractor), Box::new(renderer)).unwrap();

    let result = pipeline
        .extract_content(&format!("{}/app", site.uri()))
        .await
        .unwrap();
    assert_eq!(result.engine, Engine::RenderThenMarkup);
    assert_eq!(result.render_ms, Some(900));
}

#[tokio::test]
async fn test_render_failure_degrades_to_direct_extraction() {
    let site = MockServer::start().await;
    let extractor = MockServer::start().await;

    mount_article(&site, "/app", spa_html()).await;
    mount_extractor(
        &extractor,
        serde_json::json!({
            "title": "Shell",
            "text": "what the raw markup yields",
            "score": 85.0,
            "success": true,
            "engine": "trafilatura"
        }),
    )
    .await;

    let pipeline =
        ExtractPipeline::with_renderer(config_for(&extractor), Box::new(FailingRenderer)).unwrap();

    let result = pipeline
        .extract_content(&format!("{}/app", site.uri()))
        .await
        .unwrap();
    assert_eq!(result.engine, Engine::GenericMarkup);
    assert!(result.render_ms.is_none());
}

#[tokio::test]
async fn test_metadata_endpoint_is_forbidden_without_fetching() {
    let extractor = MockServer::start().await;
    let mut config = config_for(&extractor);
    config.allow_private_networks = false;

    let pipeline = ExtractPipeline::with_renderer(config, Box::new(FailingRenderer)).unwrap();
    let err = pipeline
        .extract_content("http://169.254.169.254/latest/meta-data/")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));
    assert!(pipeline.cache().is_empty());
}

#[tokio::test]
async fn test_unavailable_extractor_still_produces_fallback_result() {
    let site = MockServer::start().await;
    let extractor = MockServer::start().await;

    mount_article(&site, "/article", article_html()).await;
    Mock::given(method("POST"))
        .and(path("/extract"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&extractor)
        .await;

    let pipeline =
        ExtractPipeline::with_renderer(config_for(&extractor), Box::new(FailingRenderer)).unwrap();

    let result = pipeline
        .extract_content(&format!("{}/article", site.uri()))
        .await
        .unwrap();
    assert_eq!(result.engine, Engine::GenericFallback);
    assert_eq!(result.title, "Understanding Ownership");
}
