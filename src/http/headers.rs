//! Conditional-response headers derived from a deck record.

use axum::http::header::{CACHE_CONTROL, ETAG, LAST_MODIFIED};
use axum::http::{HeaderMap, HeaderValue};
use chrono::{DateTime, Utc};

use crate::models::DeckRecord;

/// `Cache-Control` for a record as seen at `now`.
///
/// `max-age` counts down to `fresh_until`; `stale-while-revalidate` covers the
/// rest of the window up to `swr_until`.
pub fn cache_control(record: &DeckRecord, now: DateTime<Utc>) -> String {
    let max_age = (record.fresh_until - now).num_seconds().max(0);
    let swr_from = record.fresh_until.max(now);
    let swr = (record.swr_until - swr_from).num_seconds().max(0);
    format!("public, max-age={max_age}, stale-while-revalidate={swr}")
}

pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Write `ETag`, `Cache-Control`, and `Last-Modified` for `record`.
pub fn set_conditional_headers(headers: &mut HeaderMap, record: &DeckRecord, now: DateTime<Utc>) {
    if let Ok(v) = HeaderValue::from_str(&record.etag()) {
        headers.insert(ETAG, v);
    }
    if let Ok(v) = HeaderValue::from_str(&cache_control(record, now)) {
        headers.insert(CACHE_CONTROL, v);
    }
    if let Ok(v) = HeaderValue::from_str(&http_date(record.built_at)) {
        headers.insert(LAST_MODIFIED, v);
    }
}

/// Whether an `If-None-Match` value matches the record's fingerprint.
///
/// Weak comparison: `W/"x"` and `"x"` both match, as does `*`.
pub fn if_none_match_matches(header: &str, fingerprint: &str) -> bool {
    header.split(',').map(str::trim).any(|tag| {
        if tag == "*" {
            return true;
        }
        let tag = tag.strip_prefix("W/").unwrap_or(tag);
        tag.strip_prefix('"')
            .and_then(|t| t.strip_suffix('"'))
            .is_some_and(|t| t == fingerprint)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeckPayload;
    use crate::provider::Provider;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn record(now: DateTime<Utc>) -> DeckRecord {
        DeckRecord {
            payload: Arc::new(DeckPayload {
                provider: Provider::Moxfield,
                deck_id: "abc".into(),
                images: vec![],
                category_order: vec![],
            }),
            fingerprint: "f00d".into(),
            upstream_signature: None,
            fresh_until: now + Duration::seconds(300),
            swr_until: now + Duration::seconds(3900),
            built_at: now,
        }
    }

    #[test]
    fn cache_control_while_fresh() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            cache_control(&record(now), now),
            "public, max-age=300, stale-while-revalidate=3600"
        );
    }

    #[test]
    fn cache_control_while_stale() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let later = now + Duration::seconds(900);
        assert_eq!(
            cache_control(&record(now), later),
            "public, max-age=0, stale-while-revalidate=3000"
        );
    }

    #[test]
    fn headers_are_written() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap();
        let mut headers = HeaderMap::new();
        set_conditional_headers(&mut headers, &record(now), now);
        assert_eq!(headers[ETAG], "W/\"f00d\"");
        assert_eq!(headers[LAST_MODIFIED], "Mon, 01 Jan 2024 12:30:00 GMT");
        assert!(headers.contains_key(CACHE_CONTROL));
    }

    #[test]
    fn if_none_match_forms() {
        assert!(if_none_match_matches("W/\"f00d\"", "f00d"));
        assert!(if_none_match_matches("\"f00d\"", "f00d"));
        assert!(if_none_match_matches("\"other\", W/\"f00d\"", "f00d"));
        assert!(if_none_match_matches("*", "f00d"));
        assert!(!if_none_match_matches("W/\"beef\"", "f00d"));
        assert!(!if_none_match_matches("f00d", "f00d"));
    }
}
