//! Supported deck-building sites and deck URL parsing.

use serde::{Deserialize, Serialize};

use crate::config::Endpoints;
use crate::error::{DeckCacheError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Archidekt,
    Moxfield,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Archidekt => "archidekt",
            Provider::Moxfield => "moxfield",
        }
    }

    fn from_host(host: &str) -> Option<Self> {
        let host = host.trim_start_matches("www.");
        match host {
            "archidekt.com" => Some(Provider::Archidekt),
            "moxfield.com" => Some(Provider::Moxfield),
            _ => None,
        }
    }

    /// Public page for a deck.
    pub fn page_url(&self, endpoints: &Endpoints, deck_id: &str) -> String {
        match self {
            Provider::Archidekt => format!("{}/decks/{deck_id}", endpoints.archidekt),
            Provider::Moxfield => format!("{}/decks/{deck_id}", endpoints.moxfield),
        }
    }

    /// Full deck JSON used by the extractor.
    pub fn deck_api_url(&self, endpoints: &Endpoints, deck_id: &str) -> String {
        match self {
            Provider::Archidekt => format!("{}/api/decks/{deck_id}/", endpoints.archidekt),
            Provider::Moxfield => format!("{}/v3/decks/all/{deck_id}", endpoints.moxfield_api),
        }
    }

    /// Lightweight metadata endpoint carrying an `updatedAt` marker, if the site has one.
    pub fn metadata_url(&self, endpoints: &Endpoints, deck_id: &str) -> Option<String> {
        match self {
            Provider::Archidekt => Some(format!(
                "{}/api/decks/{deck_id}/small/",
                endpoints.archidekt
            )),
            Provider::Moxfield => None,
        }
    }

    fn is_valid_id(&self, id: &str) -> bool {
        match self {
            Provider::Archidekt => !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()),
            Provider::Moxfield => {
                !id.is_empty()
                    && id
                        .bytes()
                        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
            }
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split a deck page URL into its provider and deck identifier.
///
/// Accepts `http(s)://[www.]<host>/decks/<id>[/<slug>...]` with optional query
/// string or fragment. Anything else is an [`DeckCacheError::InvalidRequest`].
pub fn parse_deck_url(url: &str) -> Result<(Provider, String)> {
    let url = url.trim();
    let rest = match url.split_once("://") {
        Some((scheme, rest))
            if scheme.eq_ignore_ascii_case("https") || scheme.eq_ignore_ascii_case("http") =>
        {
            rest
        }
        _ => {
            return Err(DeckCacheError::InvalidRequest(format!(
                "not an http(s) URL: {url}"
            )))
        }
    };

    let rest = rest.split(['?', '#']).next().unwrap_or_default();
    let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));
    let host = authority
        .rsplit('@')
        .next()
        .unwrap_or(authority)
        .split(':')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();

    let provider = Provider::from_host(&host)
        .ok_or_else(|| DeckCacheError::InvalidRequest(format!("unsupported deck site: {host}")))?;

    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let deck_id = match (segments.next(), segments.next()) {
        (Some("decks"), Some(id)) if provider.is_valid_id(id) => id.to_string(),
        _ => {
            return Err(DeckCacheError::InvalidRequest(format!(
                "no {provider} deck identifier in URL: {url}"
            )))
        }
    };

    Ok((provider, deck_id))
}
