// tests/extract_http.rs
//
// Plain-strategy extraction against a local axum server on 127.0.0.1:0.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::Html,
    routing::get,
    Router,
};
use listing_watch::extract::ExtractSettings;
use listing_watch::{Extractor, FetchError, FetchStrategy, PageExtractor, SelectorRule};

const LISTING_PAGE: &str = r#"<!doctype html>
<html><body>
  <ol class="search-list">
    <li><h2 class="search-result__header-title">Keizersgracht 12</h2></li>
    <li><h2 class="search-result__header-title">Prinsengracht
        &amp; 263</h2></li>
    <li><h2 class="promo">Sponsored</h2></li>
  </ol>
</body></html>"#;

async fn spawn_site() -> SocketAddr {
    let app = Router::new()
        .route("/koop", get(|| async { Html(LISTING_PAGE) }))
        .route(
            "/ua",
            get(|headers: HeaderMap| async move {
                let ua = headers
                    .get(header::USER_AGENT)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Html(format!(r#"<span class="ua">{ua}</span>"#))
            }),
        )
        .route("/gone", get(|| async { StatusCode::NOT_FOUND }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn extractor() -> PageExtractor {
    PageExtractor::new(&ExtractSettings {
        fetch_timeout: Duration::from_secs(5),
        ..ExtractSettings::default()
    })
    .unwrap()
}

#[tokio::test]
async fn plain_fetch_applies_selector() {
    let addr = spawn_site().await;
    let rule = SelectorRule::new("h2", "search-result__header-title");
    let tags = extractor()
        .extract(&format!("http://{addr}/koop"), &rule, FetchStrategy::Plain)
        .await
        .unwrap();
    assert_eq!(tags, vec!["Keizersgracht 12", "Prinsengracht & 263"]);
}

#[tokio::test]
async fn plain_fetch_sends_configured_user_agent() {
    let addr = spawn_site().await;
    let ex = PageExtractor::new(&ExtractSettings {
        user_agent: "listing-watch-test/1.0".into(),
        ..ExtractSettings::default()
    })
    .unwrap();
    let tags = ex
        .extract(
            &format!("http://{addr}/ua"),
            &SelectorRule::new("span", "ua"),
            FetchStrategy::Plain,
        )
        .await
        .unwrap();
    assert_eq!(tags, vec!["listing-watch-test/1.0"]);
}

#[tokio::test]
async fn non_success_status_is_fetch_error() {
    let addr = spawn_site().await;
    let err = extractor()
        .extract(
            &format!("http://{addr}/gone"),
            &SelectorRule::new("h2", "x"),
            FetchStrategy::Plain,
        )
        .await
        .unwrap_err();
    match err {
        FetchError::Status { status, .. } => assert_eq!(status.as_u16(), 404),
        other => panic!("unexpected: {other}"),
    }
}

#[tokio::test]
async fn unmatched_selector_is_empty_not_error() {
    let addr = spawn_site().await;
    let tags = extractor()
        .extract(
            &format!("http://{addr}/koop"),
            &SelectorRule::new("article", "card"),
            FetchStrategy::Plain,
        )
        .await
        .unwrap();
    assert!(tags.is_empty());
}

#[tokio::test]
async fn unreachable_host_is_fetch_error() {
    // bind then drop to get a port nobody listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let err = extractor()
        .extract(
            &format!("http://{addr}/"),
            &SelectorRule::new("h2", "x"),
            FetchStrategy::Plain,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Http { .. }), "{err}");
}
