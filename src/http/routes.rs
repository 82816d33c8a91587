use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header::IF_NONE_MATCH;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::parse_flag;
use crate::http::error::AppError;
use crate::http::headers::{if_none_match_matches, set_conditional_headers};
use crate::http::AppState;
use crate::provider::parse_deck_url;

#[derive(Deserialize)]
pub struct DeckParams {
    pub url: Option<String>,
    pub force: Option<String>,
}

/// GET /deck?url=https://archidekt.com/decks/123&force=true
///
/// Resolve a deck page to its hydrated card list. Answers `304` when the
/// client's `If-None-Match` already names the current fingerprint.
pub async fn get_deck(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DeckParams>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let url = params
        .url
        .ok_or_else(|| AppError::bad_request("invalid_request", "Missing required query parameter: url"))?;
    let (provider, deck_id) = parse_deck_url(&url)?;
    let force = params.force.as_deref().is_some_and(parse_flag);

    let record = state.cache.resolve(provider, &deck_id, force).await?;
    let now = state.cache.clock().now();

    let not_modified = headers
        .get(IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| if_none_match_matches(v, &record.fingerprint));

    let mut response = if not_modified {
        StatusCode::NOT_MODIFIED.into_response()
    } else {
        Json(record.payload.as_ref()).into_response()
    };
    set_conditional_headers(response.headers_mut(), &record, now);
    Ok(response)
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let decks = state.cache.len().await;
    let images = state.cache.images().len().await;
    Json(json!({
        "status": "ok",
        "decks": decks,
        "images": images,
    }))
}
