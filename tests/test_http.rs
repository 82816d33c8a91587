#![cfg(feature = "server")]

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{CACHE_CONTROL, ETAG, IF_NONE_MATCH, LAST_MODIFIED};
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use common::{sol_ring_and_island, Harness};
use deckcache::http::{router, AppState};

const DECK_URL: &str = "https://archidekt.com/decks/100";

fn app(h: &Harness) -> Router {
    router(Arc::new(AppState {
        cache: h.cache.clone(),
    }))
}

async fn get(app: Router, uri: &str, if_none_match: Option<&str>) -> Response<Body> {
    let mut request = Request::builder().uri(uri);
    if let Some(tag) = if_none_match {
        request = request.header(IF_NONE_MATCH, tag);
    }
    app.oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_deck_ok_with_conditional_headers() {
    let h = Harness::new(sol_ring_and_island());
    let response = get(app(&h), &format!("/deck?url={DECK_URL}"), None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let record = h.cache.peek(deckcache::Provider::Archidekt, "100").await.unwrap();
    let headers = response.headers();
    assert_eq!(headers[ETAG], format!("W/\"{}\"", record.fingerprint).as_str());
    assert_eq!(
        headers[CACHE_CONTROL],
        "public, max-age=300, stale-while-revalidate=3600"
    );
    assert_eq!(headers[LAST_MODIFIED], "Sat, 01 Jun 2024 12:00:00 GMT");

    let body = body_json(response).await;
    assert_eq!(body["provider"], "archidekt");
    assert_eq!(body["deckId"], "100");
    assert_eq!(body["categoryOrder"], serde_json::json!(["Artifacts", "Lands"]));
    assert_eq!(body["images"][0]["name"], "Sol Ring");
    assert_eq!(
        body["images"][0]["frontImageURL"],
        "https://cards.test/name:sol-ring/front.jpg"
    );
    assert!(body["images"][0].get("backImageURL").is_none());
}

#[tokio::test]
async fn test_matching_if_none_match_gets_304() {
    let h = Harness::new(sol_ring_and_island());
    let first = get(app(&h), &format!("/deck?url={DECK_URL}"), None).await;
    let etag = first.headers()[ETAG].to_str().unwrap().to_string();

    let response = get(app(&h), &format!("/deck?url={DECK_URL}"), Some(&etag)).await;
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(response.headers()[ETAG], etag.as_str());
    assert!(response.headers().contains_key(CACHE_CONTROL));
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(bytes.is_empty());
    assert_eq!(h.extractor.calls(), 1);
}

#[tokio::test]
async fn test_stale_if_none_match_gets_full_body() {
    let h = Harness::new(sol_ring_and_island());
    let response = get(
        app(&h),
        &format!("/deck?url={DECK_URL}"),
        Some("W/\"0000\""),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["images"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_force_param_rebuilds() {
    let h = Harness::new(sol_ring_and_island());
    get(app(&h), &format!("/deck?url={DECK_URL}"), None).await;
    get(app(&h), &format!("/deck?url={DECK_URL}&force=no"), None).await;
    assert_eq!(h.extractor.calls(), 1);

    let response = get(app(&h), &format!("/deck?url={DECK_URL}&force=TRUE"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.extractor.calls(), 2);
}

#[tokio::test]
async fn test_missing_url_is_bad_request() {
    let h = Harness::new(sol_ring_and_island());
    let response = get(app(&h), "/deck", None).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "invalid_request");
    assert!(body["details"].as_str().unwrap().contains("url"));
}

#[tokio::test]
async fn test_unsupported_host_is_bad_request() {
    let h = Harness::new(sol_ring_and_island());
    let response = get(app(&h), "/deck?url=https://example.com/decks/1", None).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "invalid_request");
    assert_eq!(h.extractor.calls(), 0);
}

#[tokio::test]
async fn test_cold_build_failure_is_server_error() {
    let h = Harness::new(sol_ring_and_island());
    h.extractor.set_failing(true);
    let response = get(app(&h), &format!("/deck?url={DECK_URL}"), None).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "build_failed");
    assert!(body["details"].as_str().unwrap().contains("upstream unavailable"));
}

#[tokio::test]
async fn test_health_reports_cache_sizes() {
    let h = Harness::new(sol_ring_and_island());
    get(app(&h), &format!("/deck?url={DECK_URL}"), None).await;

    let body = body_json(get(app(&h), "/health", None).await).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["decks"], 1);
    assert_eq!(body["images"], 2);
}
