//! Deck extraction: turns a provider deck into normalized card rows.
//!
//! The resolver only depends on the [`Extractor`] trait. [`HttpExtractor`]
//! reads each provider's public deck JSON.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::config::Endpoints;
use crate::error::{DeckCacheError, Result};
use crate::models::{CardRow, Extraction};
use crate::provider::Provider;

#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, provider: Provider, deck_id: &str) -> Result<Extraction>;
}

// ---------------------------------------------------------------------------
// HttpExtractor
// ---------------------------------------------------------------------------

pub struct HttpExtractor {
    client: Client,
    endpoints: Endpoints,
}

impl HttpExtractor {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            endpoints: Endpoints::default(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }
}

#[async_trait]
impl Extractor for HttpExtractor {
    async fn extract(&self, provider: Provider, deck_id: &str) -> Result<Extraction> {
        let url = provider.deck_api_url(&self.endpoints, deck_id);
        tracing::debug!(%provider, deck_id, %url, "fetching deck");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DeckCacheError::Extraction(format!("{url}: {e}")))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(DeckCacheError::Extraction(format!(
                "{provider} deck {deck_id} not found"
            )));
        }
        let resp = resp
            .error_for_status()
            .map_err(|e| DeckCacheError::Extraction(format!("{url}: {e}")))?;
        let data: Value = resp
            .json()
            .await
            .map_err(|e| DeckCacheError::Extraction(format!("{url}: invalid JSON: {e}")))?;

        match provider {
            Provider::Archidekt => parse_archidekt(&data),
            Provider::Moxfield => parse_moxfield(&data),
        }
    }
}

// ---------------------------------------------------------------------------
// Provider-specific parsing
// ---------------------------------------------------------------------------

fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(value, |v, key| v.get(key))
        .and_then(|v| v.as_str())
}

fn quantity_of(value: &Value) -> u32 {
    value
        .get("quantity")
        .and_then(|v| v.as_u64())
        .map(|q| q.min(u32::MAX as u64) as u32)
        .unwrap_or(0)
}

/// Parse Archidekt's `/api/decks/<id>/` response.
///
/// Categories flagged `includedInDeck: false` (maybeboard and similar) are
/// dropped along with the cards whose primary category they are.
pub fn parse_archidekt(data: &Value) -> Result<Extraction> {
    let cards = data
        .get("cards")
        .and_then(|v| v.as_array())
        .ok_or_else(|| DeckCacheError::Extraction("archidekt response has no cards".into()))?;

    let mut declared = Vec::new();
    let mut excluded = Vec::new();
    for category in data
        .get("categories")
        .and_then(|v| v.as_array())
        .into_iter()
        .flatten()
    {
        let Some(name) = category.get("name").and_then(|v| v.as_str()) else {
            continue;
        };
        let included = category
            .get("includedInDeck")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        if included {
            declared.push(name.to_string());
        } else {
            excluded.push(name.to_string());
        }
    }

    let mut rows = Vec::with_capacity(cards.len());
    for entry in cards {
        let quantity = quantity_of(entry);
        let name = str_at(entry, &["card", "oracleCard", "name"])
            .or_else(|| str_at(entry, &["card", "name"]))
            .unwrap_or_default()
            .trim();
        if quantity == 0 || name.is_empty() {
            continue;
        }

        let categories: Vec<String> = entry
            .get("categories")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .filter_map(|c| c.as_str())
            .map(str::to_string)
            .collect();
        if categories.first().is_some_and(|c| excluded.contains(c)) {
            continue;
        }

        rows.push(CardRow {
            name: name.to_string(),
            quantity,
            foil: entry
                .get("modifier")
                .and_then(|v| v.as_str())
                .is_some_and(|m| m.eq_ignore_ascii_case("foil")),
            categories,
            set_code: str_at(entry, &["card", "edition", "editioncode"]).map(str::to_string),
            collector_number: str_at(entry, &["card", "collectorNumber"]).map(str::to_string),
        });
    }

    Ok(Extraction {
        rows,
        declared_categories: declared,
    })
}

/// Moxfield boards that make up a playable deck, in display order.
const MOXFIELD_BOARDS: [(&str, &str); 4] = [
    ("commanders", "Commander"),
    ("companions", "Companion"),
    ("mainboard", "Mainboard"),
    ("sideboard", "Sideboard"),
];

/// Parse Moxfield's `/v3/decks/all/<id>` response. Each board becomes a category.
pub fn parse_moxfield(data: &Value) -> Result<Extraction> {
    let boards = data
        .get("boards")
        .and_then(|v| v.as_object())
        .ok_or_else(|| DeckCacheError::Extraction("moxfield response has no boards".into()))?;

    let mut rows = Vec::new();
    let mut declared = Vec::new();
    for (board_key, category) in MOXFIELD_BOARDS {
        let Some(cards) = boards
            .get(board_key)
            .and_then(|b| b.get("cards"))
            .and_then(|c| c.as_object())
        else {
            continue;
        };
        if cards.is_empty() {
            continue;
        }
        declared.push(category.to_string());

        for entry in cards.values() {
            let quantity = quantity_of(entry);
            let name = str_at(entry, &["card", "name"]).unwrap_or_default().trim();
            if quantity == 0 || name.is_empty() {
                continue;
            }
            rows.push(CardRow {
                name: name.to_string(),
                quantity,
                foil: entry
                    .get("isFoil")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
                categories: vec![category.to_string()],
                set_code: str_at(entry, &["card", "set"]).map(str::to_string),
                collector_number: str_at(entry, &["card", "cn"]).map(str::to_string),
            });
        }
    }

    Ok(Extraction {
        rows,
        declared_categories: declared,
    })
}
