use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::Provider;

// ---------------------------------------------------------------------------
// DeckKey — Cache key for one deck on one provider
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeckKey {
    pub provider: Provider,
    pub deck_id: String,
}

impl DeckKey {
    pub fn new(provider: Provider, deck_id: impl Into<String>) -> Self {
        Self {
            provider,
            deck_id: deck_id.into(),
        }
    }
}

impl std::fmt::Display for DeckKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.provider, self.deck_id)
    }
}

// ---------------------------------------------------------------------------
// CardEntry / DeckPayload — The client-visible deck
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardEntry {
    pub name: String,
    pub quantity: u32,
    pub foil: bool,
    pub category: String,
    pub set_code: Option<String>,
    pub collector_number: Option<String>,
    #[serde(rename = "frontImageURL")]
    pub front_image_url: String,
    #[serde(rename = "backImageURL", skip_serializing_if = "Option::is_none", default)]
    pub back_image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckPayload {
    pub provider: Provider,
    pub deck_id: String,
    pub images: Vec<CardEntry>,
    pub category_order: Vec<String>,
}

// ---------------------------------------------------------------------------
// DeckRecord — A payload plus its freshness metadata, replaced as a unit
// ---------------------------------------------------------------------------

/// One cached deck. Never mutated after construction; renewals and rebuilds
/// install a new record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckRecord {
    pub payload: Arc<DeckPayload>,
    pub fingerprint: String,
    /// Opaque upstream change marker, `None` when the probe could not tell.
    pub upstream_signature: Option<String>,
    pub fresh_until: DateTime<Utc>,
    pub swr_until: DateTime<Utc>,
    pub built_at: DateTime<Utc>,
}

impl DeckRecord {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.fresh_until
    }

    /// Past `fresh_until` but still inside the stale-while-revalidate window.
    pub fn is_revalidatable(&self, now: DateTime<Utc>) -> bool {
        !self.is_fresh(now) && now < self.swr_until
    }

    /// Weak entity tag derived from the fingerprint.
    pub fn etag(&self) -> String {
        format!("W/\"{}\"", self.fingerprint)
    }

    /// A copy of this record with new freshness bounds and the same payload.
    pub fn renewed(&self, fresh_until: DateTime<Utc>, swr_until: DateTime<Utc>) -> Self {
        Self {
            payload: Arc::clone(&self.payload),
            fingerprint: self.fingerprint.clone(),
            upstream_signature: self.upstream_signature.clone(),
            fresh_until,
            swr_until,
            built_at: self.built_at,
        }
    }
}
