//! The deck resolution cache.
//!
//! `resolve` walks a graduated freshness policy:
//!
//! 1. forced rebuild, bypassing every check;
//! 2. fresh record, served with no upstream contact;
//! 3. probe the upstream signature (best-effort);
//! 4. unchanged signature, renew the window without rebuilding;
//! 5. inside the stale-while-revalidate window, serve stale and refresh in the background;
//! 6. otherwise block on a coordinated rebuild, falling back to any stale record.
//!
//! Records are immutable and replaced whole, so readers never see a half-built one.

use std::sync::Arc;

use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use moka::policy::EvictionPolicy;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;

use crate::assemble::Assembler;
use crate::clock::{self, Clock, SystemClock};
use crate::config::Config;
use crate::error::{DeckCacheError, Result};
use crate::extract::{Extractor, HttpExtractor};
use crate::fingerprint::fingerprint;
use crate::images::{CardImageCache, ImageSource, ScryfallClient};
use crate::models::{DeckKey, DeckRecord};
use crate::provider::Provider;
use crate::signature::{HttpSignatureChecker, SignatureProbe};
use crate::single_flight::SingleFlight;

// ---------------------------------------------------------------------------
// DeckResolutionCacheBuilder
// ---------------------------------------------------------------------------

/// Builder for a [`DeckResolutionCache`].
///
/// Collaborators that are not supplied default to the HTTP implementations,
/// sharing one `reqwest` client configured from [`Config`].
#[derive(Default)]
pub struct DeckResolutionCacheBuilder {
    config: Config,
    extractor: Option<Arc<dyn Extractor>>,
    signatures: Option<Arc<dyn SignatureProbe>>,
    image_source: Option<Arc<dyn ImageSource>>,
    clock: Option<Arc<dyn Clock>>,
}

impl DeckResolutionCacheBuilder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn signature_probe(mut self, probe: Arc<dyn SignatureProbe>) -> Self {
        self.signatures = Some(probe);
        self
    }

    pub fn image_source(mut self, source: Arc<dyn ImageSource>) -> Self {
        self.image_source = Some(source);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    fn http_client(config: &Config) -> Result<Client> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json;q=0.9,*/*;q=0.8"));
        Ok(Client::builder()
            .timeout(config.http_timeout)
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?)
    }

    pub fn build(self) -> Result<DeckResolutionCache> {
        self.config.validate()?;
        let config = self.config;

        let needs_http = self.extractor.is_none()
            || self.signatures.is_none()
            || self.image_source.is_none();
        let shared = if needs_http {
            Some(Self::http_client(&config)?)
        } else {
            None
        };
        let client = || shared.clone().unwrap_or_default();

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let endpoints = &config.endpoints;
        let extractor = self.extractor.unwrap_or_else(|| {
            Arc::new(HttpExtractor::new(client()).with_endpoints(endpoints.clone()))
        });
        let signatures = self.signatures.unwrap_or_else(|| {
            Arc::new(
                HttpSignatureChecker::new(client(), config.probe_prefix_bytes)
                    .with_endpoints(endpoints.clone()),
            )
        });
        let image_source = self.image_source.unwrap_or_else(|| {
            Arc::new(ScryfallClient::new(client()).with_base_url(endpoints.scryfall.clone()))
        });

        let images = Arc::new(CardImageCache::new(
            image_source,
            Arc::clone(&clock),
            config.image_ttl,
            config.image_capacity,
        ));
        let assembler = Assembler::new(
            extractor,
            Arc::clone(&images),
            config.extract_timeout,
            config.hydrate_concurrency,
        );

        let records = Cache::builder()
            .max_capacity(config.deck_capacity.max(1) as u64)
            .eviction_policy(EvictionPolicy::lru())
            .eviction_listener(|key: Arc<DeckKey>, _record, cause| {
                if cause.was_evicted() {
                    tracing::debug!(key = %key, "evicted deck record");
                }
            })
            .build();

        Ok(DeckResolutionCache {
            inner: Arc::new(Inner {
                records,
                flights: SingleFlight::new(),
                config,
                clock,
                signatures,
                assembler,
                images,
            }),
        })
    }
}

// ---------------------------------------------------------------------------
// DeckResolutionCache
// ---------------------------------------------------------------------------

/// Process-wide deck cache. Cloning is cheap and shares all state.
#[derive(Clone)]
pub struct DeckResolutionCache {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,
    clock: Arc<dyn Clock>,
    signatures: Arc<dyn SignatureProbe>,
    assembler: Assembler,
    images: Arc<CardImageCache>,
    records: Cache<DeckKey, Arc<DeckRecord>>,
    flights: SingleFlight<DeckKey, Arc<DeckRecord>>,
}

/// What a build already knows when it starts.
struct BuildInput {
    key: DeckKey,
    /// `Some` when the caller already probed; the inner value may still be `None`.
    signature: Option<Option<String>>,
    /// The record the caller saw, if any.
    observed: Option<Arc<DeckRecord>>,
    force: bool,
}

impl DeckResolutionCache {
    pub fn builder() -> DeckResolutionCacheBuilder {
        DeckResolutionCacheBuilder::default()
    }

    /// Resolve a deck to a record, rebuilding only as much as freshness requires.
    pub async fn resolve(
        &self,
        provider: Provider,
        deck_id: &str,
        force_rebuild: bool,
    ) -> Result<Arc<DeckRecord>> {
        let key = DeckKey::new(provider, deck_id);
        let current = self.inner.current(&key).await;

        if force_rebuild {
            tracing::info!(%key, "forced rebuild");
            let input = BuildInput {
                key,
                signature: None,
                observed: current.clone(),
                force: true,
            };
            return self.rebuild_blocking(input, current).await;
        }

        if let Some(record) = &current {
            if record.is_fresh(self.inner.clock.now()) {
                tracing::debug!(%key, "serving fresh record");
                return Ok(Arc::clone(record));
            }
        }

        let signature = self.inner.signatures.probe(provider, deck_id).await;

        if let Some(record) = &current {
            if signature.is_some() && signature == record.upstream_signature {
                tracing::debug!(%key, "upstream unchanged; renewing");
                return Ok(self.inner.renew(&key, record).await);
            }

            if record.is_revalidatable(self.inner.clock.now()) {
                let input = BuildInput {
                    key: key.clone(),
                    signature: Some(signature),
                    observed: Some(Arc::clone(record)),
                    force: false,
                };
                let started = self.spawn_rebuild(input);
                tracing::debug!(%key, refresh_started = started, "serving stale record");
                return Ok(Arc::clone(record));
            }
        }

        tracing::debug!(%key, cached = current.is_some(), "blocking rebuild");
        let input = BuildInput {
            key,
            signature: Some(signature),
            observed: current.clone(),
            force: false,
        };
        self.rebuild_blocking(input, current).await
    }

    async fn rebuild_blocking(
        &self,
        input: BuildInput,
        fallback: Option<Arc<DeckRecord>>,
    ) -> Result<Arc<DeckRecord>> {
        let key = input.key.clone();
        let inner = Arc::clone(&self.inner);
        let outcome = self
            .inner
            .flights
            .run_exclusive(key.clone(), move || async move { inner.build(input).await })
            .await;

        let error = match outcome {
            Ok(record) => return Ok(record),
            Err(error) => error,
        };
        let fallback = match fallback {
            Some(record) => Some(record),
            None => self.inner.current(&key).await,
        };
        match fallback {
            Some(stale) => {
                tracing::warn!(%key, %error, "rebuild failed; serving stale record");
                Ok(stale)
            }
            None => Err(DeckCacheError::Build(error)),
        }
    }

    /// Start a background rebuild unless one is already running for the key.
    fn spawn_rebuild(&self, input: BuildInput) -> bool {
        let key = input.key.clone();
        let inner = Arc::clone(&self.inner);
        self.inner
            .flights
            .trigger(key, move || async move { inner.build(input).await })
    }

    /// The cached record for a deck, without any freshness checks.
    pub async fn peek(&self, provider: Provider, deck_id: &str) -> Option<Arc<DeckRecord>> {
        self.inner.current(&DeckKey::new(provider, deck_id)).await
    }

    /// Whether a build is currently running for a deck.
    pub fn is_building(&self, provider: Provider, deck_id: &str) -> bool {
        self.inner
            .flights
            .is_in_flight(&DeckKey::new(provider, deck_id))
    }

    /// Exact record count; flushes pending evictions first.
    pub async fn len(&self) -> usize {
        self.inner.records.run_pending_tasks().await;
        self.inner.records.entry_count() as usize
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    pub fn images(&self) -> &CardImageCache {
        &self.inner.images
    }
}

impl Inner {
    async fn current(&self, key: &DeckKey) -> Option<Arc<DeckRecord>> {
        self.records.get(key).await
    }

    fn window_from_now(&self) -> (chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>) {
        let fresh_until = clock::add(self.clock.now(), self.config.fresh_ttl);
        let swr_until = clock::add(fresh_until, self.config.swr_window);
        (fresh_until, swr_until)
    }

    /// Extend `observed`'s window, unless another record replaced it meanwhile.
    async fn renew(&self, key: &DeckKey, observed: &Arc<DeckRecord>) -> Arc<DeckRecord> {
        let (fresh_until, swr_until) = self.window_from_now();
        let renewed = Arc::new(observed.renewed(fresh_until, swr_until));
        let seen = Arc::clone(observed);

        let outcome = self
            .records
            .entry(key.clone())
            .and_compute_with(|entry| {
                let op = match entry {
                    Some(current) if !Arc::ptr_eq(current.value(), &seen) => Op::Nop,
                    _ => Op::Put(renewed),
                };
                std::future::ready(op)
            })
            .await;

        match outcome {
            CompResult::Inserted(entry)
            | CompResult::ReplacedWith(entry)
            | CompResult::Unchanged(entry) => entry.into_value(),
            CompResult::Removed(_) | CompResult::StillNone(_) => Arc::clone(observed),
        }
    }

    async fn build(&self, input: BuildInput) -> Result<Arc<DeckRecord>> {
        let key = input.key;

        // A build that finished while this caller was probing already did the work.
        if !input.force {
            if let Some(current) = self.current(&key).await {
                let replaced = input
                    .observed
                    .as_ref()
                    .map_or(true, |seen| !Arc::ptr_eq(seen, &current));
                if replaced && current.is_fresh(self.clock.now()) {
                    return Ok(current);
                }
            }
        }

        let signature = match input.signature {
            Some(known) => known,
            None => self.signatures.probe(key.provider, &key.deck_id).await,
        };

        let payload = match self.assembler.assemble(key.provider, &key.deck_id).await {
            Ok(payload) => payload,
            Err(error) => {
                tracing::warn!(%key, %error, "deck build failed");
                return Err(error);
            }
        };
        let fingerprint = fingerprint(&payload)?;
        let built_at = self.clock.now();
        let (fresh_until, swr_until) = self.window_from_now();

        let record = Arc::new(DeckRecord {
            payload: Arc::new(payload),
            fingerprint,
            upstream_signature: signature,
            fresh_until,
            swr_until,
            built_at,
        });
        tracing::info!(%key, fingerprint = %record.fingerprint, "installed deck record");
        self.records.insert(key, Arc::clone(&record)).await;
        Ok(record)
    }
}
