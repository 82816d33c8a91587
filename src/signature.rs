//! Cheap upstream change detection.
//!
//! A signature is an opaque string that changes when the upstream deck changes.
//! Strategies run cheapest first and the first one that yields a value wins:
//!
//! 1. the provider's metadata endpoint (`updatedAt`-style marker),
//! 2. a `HEAD` of the deck page, combining `ETag` and `Last-Modified`,
//! 3. a SHA-256 over a bounded prefix of the page body.
//!
//! `None` means "unknown" and must never be read as "unchanged".

use async_trait::async_trait;
use reqwest::header::{HeaderMap, ETAG, LAST_MODIFIED, RANGE};
use reqwest::Client;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::config::Endpoints;
use crate::error::{DeckCacheError, Result};
use crate::provider::Provider;

#[async_trait]
pub trait SignatureProbe: Send + Sync {
    /// Best-effort probe; failures come back as `None`.
    async fn probe(&self, provider: Provider, deck_id: &str) -> Option<String>;
}

// ---------------------------------------------------------------------------
// HttpSignatureChecker
// ---------------------------------------------------------------------------

pub struct HttpSignatureChecker {
    client: Client,
    endpoints: Endpoints,
    prefix_bytes: usize,
}

impl HttpSignatureChecker {
    pub fn new(client: Client, prefix_bytes: usize) -> Self {
        Self {
            client,
            endpoints: Endpoints::default(),
            prefix_bytes,
        }
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    async fn from_metadata(&self, provider: Provider, deck_id: &str) -> Result<Option<String>> {
        let Some(url) = provider.metadata_url(&self.endpoints, deck_id) else {
            return Ok(None);
        };
        let data: Value = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(signature_from_metadata(&data))
    }

    async fn from_head(&self, provider: Provider, deck_id: &str) -> Result<Option<String>> {
        let resp = self
            .client
            .head(provider.page_url(&self.endpoints, deck_id))
            .send()
            .await?
            .error_for_status()?;
        Ok(signature_from_headers(resp.headers()))
    }

    async fn from_prefix(&self, provider: Provider, deck_id: &str) -> Result<Option<String>> {
        if self.prefix_bytes == 0 {
            return Ok(None);
        }
        let mut resp = self
            .client
            .get(provider.page_url(&self.endpoints, deck_id))
            .header(RANGE, format!("bytes=0-{}", self.prefix_bytes - 1))
            .send()
            .await?
            .error_for_status()?;

        let mut prefix = Vec::with_capacity(self.prefix_bytes);
        while prefix.len() < self.prefix_bytes {
            match resp.chunk().await? {
                Some(chunk) => {
                    let take = (self.prefix_bytes - prefix.len()).min(chunk.len());
                    prefix.extend_from_slice(&chunk[..take]);
                }
                None => break,
            }
        }
        if prefix.is_empty() {
            return Ok(None);
        }
        Ok(Some(signature_from_prefix(&prefix)))
    }
}

#[async_trait]
impl SignatureProbe for HttpSignatureChecker {
    async fn probe(&self, provider: Provider, deck_id: &str) -> Option<String> {
        match self.from_metadata(provider, deck_id).await {
            Ok(Some(sig)) => return Some(sig),
            Err(e) => log_probe_failure("metadata", provider, deck_id, &e),
            Ok(None) => {}
        }

        match self.from_head(provider, deck_id).await {
            Ok(Some(sig)) => return Some(sig),
            Err(e) => log_probe_failure("head", provider, deck_id, &e),
            Ok(None) => {}
        }

        match self.from_prefix(provider, deck_id).await {
            Ok(Some(sig)) => return Some(sig),
            Err(e) => log_probe_failure("prefix", provider, deck_id, &e),
            Ok(None) => {}
        }

        tracing::debug!(%provider, deck_id, "no upstream signature available");
        None
    }
}

fn log_probe_failure(strategy: &str, provider: Provider, deck_id: &str, error: &DeckCacheError) {
    tracing::debug!(%provider, deck_id, strategy, %error, "signature strategy failed");
}

// ---------------------------------------------------------------------------
// Signature derivation
// ---------------------------------------------------------------------------

/// Signature from a metadata response's `updatedAt` marker.
pub fn signature_from_metadata(data: &Value) -> Option<String> {
    let marker = data.get("updatedAt")?;
    let marker = match marker {
        Value::String(s) if !s.is_empty() => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Some(format!("meta:{marker}"))
}

/// Combine change-indicating headers. Returns `None` when the response carries none.
pub fn signature_from_headers(headers: &HeaderMap) -> Option<String> {
    let etag = headers.get(ETAG).and_then(|v| v.to_str().ok());
    let last_modified = headers.get(LAST_MODIFIED).and_then(|v| v.to_str().ok());
    if etag.is_none() && last_modified.is_none() {
        return None;
    }
    Some(format!(
        "head:{}|{}",
        etag.unwrap_or_default(),
        last_modified.unwrap_or_default()
    ))
}

pub fn signature_from_prefix(prefix: &[u8]) -> String {
    format!("body:{}", hex::encode(Sha256::digest(prefix)))
}
