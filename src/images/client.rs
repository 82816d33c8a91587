//! Scryfall artwork lookups with conditional request support.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::config;
use crate::error::{DeckCacheError, Result};
use crate::models::{CardIdentity, ImageData, Validator};

/// Outcome of one lookup against the artwork source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageFetch {
    /// The held validator still matches; reuse the cached data.
    NotModified,
    Modified { data: ImageData, validator: Validator },
}

#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Look up artwork for `identity`, sending `validator` as a precondition when given.
    async fn fetch(&self, identity: &CardIdentity, validator: Option<&Validator>)
        -> Result<ImageFetch>;
}

// ---------------------------------------------------------------------------
// ScryfallClient
// ---------------------------------------------------------------------------

pub struct ScryfallClient {
    client: Client,
    base_url: String,
}

impl ScryfallClient {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: config::SCRYFALL_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request(&self, identity: &CardIdentity) -> reqwest::RequestBuilder {
        match identity {
            CardIdentity::Printing {
                set_code,
                collector_number,
            } => self
                .client
                .get(format!("{}/cards/{set_code}/{collector_number}", self.base_url)),
            CardIdentity::Name(name) => self
                .client
                .get(format!("{}/cards/named", self.base_url))
                .query(&[("exact", name.as_str())]),
        }
    }
}

#[async_trait]
impl ImageSource for ScryfallClient {
    async fn fetch(
        &self,
        identity: &CardIdentity,
        validator: Option<&Validator>,
    ) -> Result<ImageFetch> {
        let mut req = self.request(identity);
        if let Some(v) = validator {
            if let Some(etag) = &v.etag {
                req = req.header(IF_NONE_MATCH, etag);
            }
            if let Some(lm) = &v.last_modified {
                req = req.header(IF_MODIFIED_SINCE, lm);
            }
        }

        let resp = req
            .send()
            .await
            .map_err(|e| DeckCacheError::ImageLookup(format!("{identity}: {e}")))?;
        let status = resp.status();
        if status == StatusCode::NOT_MODIFIED {
            return Ok(ImageFetch::NotModified);
        }
        if !status.is_success() {
            return Err(DeckCacheError::ImageLookup(format!(
                "{identity}: scryfall returned {status}"
            )));
        }

        let validator = validator_from_headers(resp.headers());
        let body: Value = resp
            .json()
            .await
            .map_err(|e| DeckCacheError::ImageLookup(format!("{identity}: {e}")))?;
        let data = parse_card_images(&body).ok_or_else(|| {
            DeckCacheError::ImageLookup(format!("{identity}: card has no image URIs"))
        })?;

        Ok(ImageFetch::Modified { data, validator })
    }
}

pub fn validator_from_headers(headers: &HeaderMap) -> Validator {
    let get = |name: HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Validator {
        etag: get(ETAG),
        last_modified: get(LAST_MODIFIED),
    }
}

fn image_uri(value: &Value) -> Option<String> {
    let uris = value.get("image_uris")?;
    ["normal", "large", "png"]
        .iter()
        .find_map(|size| uris.get(size).and_then(|v| v.as_str()))
        .map(str::to_string)
}

/// Pull front/back artwork out of a Scryfall card object.
///
/// Single-faced cards carry `image_uris` at the top level; double-faced cards
/// carry one per entry of `card_faces`.
pub fn parse_card_images(card: &Value) -> Option<ImageData> {
    if let Some(front) = image_uri(card) {
        return Some(ImageData {
            front_image_url: front,
            back_image_url: None,
        });
    }

    let faces = card.get("card_faces")?.as_array()?;
    let front = faces.first().and_then(image_uri)?;
    let back = faces.get(1).and_then(image_uri);
    Some(ImageData {
        front_image_url: front,
        back_image_url: back,
    })
}
