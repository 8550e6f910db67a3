//! Integration tests for the fetch layer against a local mock server.
//!
//! The configs here set `allow_private_networks` so the SSRF guard lets
//! requests reach the loopback mock server; everything else runs with
//! production settings.

use readgate_client::{FetchClient, FetchError};
use readgate_core::AppConfig;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config() -> AppConfig {
    AppConfig { allow_private_networks: true, ..AppConfig::default() }
}

fn page_url(server: &MockServer, p: &str) -> Url {
    Url::parse(&format!("{}{p}", server.uri())).unwrap()
}

#[tokio::test]
async fn test_fetches_html_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "<html><body><p>hello</p></body></html>",
            "text/html; charset=utf-8",
        ))
        .mount(&server)
        .await;

    let client = FetchClient::new(&test_config()).unwrap();
    let page = client.fetch_html(&page_url(&server, "/article")).await.unwrap();
    assert!(page.html.contains("hello"));
    assert_eq!(page.final_url.path(), "/article");
}

#[tokio::test]
async fn test_follows_redirects_to_final_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/end"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/end"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html><body>done</body></html>", "text/html"),
        )
        .mount(&server)
        .await;

    let client = FetchClient::new(&test_config()).unwrap();
    let page = client.fetch_html(&page_url(&server, "/start")).await.unwrap();
    assert_eq!(page.final_url.path(), "/end");
    assert!(page.html.contains("done"));
}

#[tokio::test]
async fn test_redirect_chain_beyond_cap_fails() {
    let server = MockServer::start().await;
    // Six hops against the default cap of five. The chain's tail is never
    // mounted, so reaching it would fail differently.
    for hop in 0..6 {
        Mock::given(method("GET"))
            .and(path(format!("/hop{hop}")))
            .respond_with(
                ResponseTemplate::new(302).insert_header("location", format!("/hop{}", hop + 1)),
            )
            .mount(&server)
            .await;
    }

    let client = FetchClient::new(&test_config()).unwrap();
    let err = client.fetch_html(&page_url(&server, "/hop0")).await.unwrap_err();
    assert!(matches!(err, FetchError::TooManyRedirects(5)));
}

#[tokio::test]
async fn test_redirect_without_location_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/nowhere"))
        .respond_with(ResponseTemplate::new(302))
        .mount(&server)
        .await;

    let client = FetchClient::new(&test_config()).unwrap();
    let err = client.fetch_html(&page_url(&server, "/nowhere")).await.unwrap_err();
    assert!(matches!(err, FetchError::RedirectWithoutLocation));
}

#[tokio::test]
async fn test_rejects_non_html_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("{\"not\":\"html\"}", "application/json"),
        )
        .mount(&server)
        .await;

    let client = FetchClient::new(&test_config()).unwrap();
    let err = client.fetch_html(&page_url(&server, "/data")).await.unwrap_err();
    assert!(matches!(err, FetchError::NotHtml(_)));
}

#[tokio::test]
async fn test_aborts_transfer_over_byte_budget() {
    let server = MockServer::start().await;
    let body = "x".repeat(64 * 1024);
    Mock::given(method("GET"))
        .and(path("/huge"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(&server)
        .await;

    let config = AppConfig { max_html_bytes: 16 * 1024, ..test_config() };
    let client = FetchClient::new(&config).unwrap();
    let err = client.fetch_html(&page_url(&server, "/huge")).await.unwrap_err();
    assert!(matches!(err, FetchError::BodyTooLarge(_)));
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = FetchClient::new(&test_config()).unwrap();
    let err = client.fetch_html(&page_url(&server, "/gone")).await.unwrap_err();
    assert!(matches!(err, FetchError::Status(s) if s.as_u16() == 404));
}

#[tokio::test]
async fn test_guard_still_blocks_localhost_by_name() {
    // The private-network escape hatch skips address checks, not the
    // well-known local hostnames.
    let client = FetchClient::new(&test_config()).unwrap();
    let err = client
        .fetch_html(&Url::parse("http://localhost:8080/admin").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Ssrf(_)));
}
