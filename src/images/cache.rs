//! Per-card artwork cache.
//!
//! Entries live for a fixed TTL from the moment they were stored, and the map
//! is bounded by an LRU capacity. A live entry is still revalidated upstream
//! with its validator on every lookup; a `304` hands back the cached data.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use moka::policy::EvictionPolicy;

use crate::clock::{self, Clock};
use crate::error::{DeckCacheError, Result};
use crate::images::client::{ImageFetch, ImageSource};
use crate::models::{CardIdentity, ImageData, Validator};

#[derive(Debug, Clone)]
struct ImageEntry {
    data: ImageData,
    validator: Validator,
    stored_at: DateTime<Utc>,
}

pub struct CardImageCache {
    source: Arc<dyn ImageSource>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    entries: Cache<String, ImageEntry>,
}

impl CardImageCache {
    pub fn new(
        source: Arc<dyn ImageSource>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        capacity: usize,
    ) -> Self {
        // Expiry is judged against `clock`; moka's own TTL only reclaims memory.
        let entries = Cache::builder()
            .max_capacity(capacity.max(1) as u64)
            .eviction_policy(EvictionPolicy::lru())
            .time_to_live(ttl.max(Duration::from_secs(1)))
            .eviction_listener(|key, _entry, cause| {
                if cause.was_evicted() {
                    tracing::trace!(key = %key, ?cause, "evicted card image entry");
                }
            })
            .build();
        Self {
            source,
            clock,
            ttl,
            entries,
        }
    }

    /// Return the live entry for `key`, dropping it if its TTL has passed.
    async fn live_entry(&self, key: &str) -> Option<ImageEntry> {
        let entry = self.entries.get(key).await?;
        if self.clock.now() < clock::add(entry.stored_at, self.ttl) {
            Some(entry)
        } else {
            self.entries.invalidate(key).await;
            None
        }
    }

    async fn store(&self, key: String, data: ImageData, validator: Validator) {
        let entry = ImageEntry {
            data,
            validator,
            stored_at: self.clock.now(),
        };
        self.entries.insert(key, entry).await;
    }

    /// Resolve artwork for one card.
    pub async fn lookup(&self, identity: &CardIdentity) -> Result<ImageData> {
        let key = identity.cache_key();

        if let Some(entry) = self.live_entry(&key).await {
            let validator = (!entry.validator.is_empty()).then_some(&entry.validator);
            return match self.source.fetch(identity, validator).await {
                Ok(ImageFetch::NotModified) => {
                    tracing::trace!(%key, "card image not modified");
                    Ok(entry.data)
                }
                Ok(ImageFetch::Modified { data, validator }) => {
                    self.store(key, data.clone(), validator).await;
                    Ok(data)
                }
                Err(e) => {
                    tracing::warn!(%key, error = %e, "card image revalidation failed; serving cached");
                    Ok(entry.data)
                }
            };
        }

        match self.source.fetch(identity, None).await? {
            ImageFetch::Modified { data, validator } => {
                self.store(key, data.clone(), validator).await;
                Ok(data)
            }
            ImageFetch::NotModified => Err(DeckCacheError::ImageLookup(format!(
                "{identity}: not-modified reply to an unconditional lookup"
            ))),
        }
    }

    /// Apply pending evictions and recency updates.
    pub async fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks().await;
    }

    /// Exact entry count; flushes pending maintenance first.
    pub async fn len(&self) -> usize {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count() as usize
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
