//! Shared test fixtures for the deckcache integration tests.
//!
//! Provides counting fakes for every upstream collaborator and a [`Harness`]
//! that wires them into a [`DeckResolutionCache`] driven by a [`ManualClock`].

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use deckcache::{
    CardIdentity, CardRow, Config, DeckCacheError, DeckResolutionCache, Extraction, Extractor,
    ImageData, ImageFetch, ImageSource, ManualClock, Provider, Result, SignatureProbe, Validator,
};

// ---------------------------------------------------------------------------
// FakeExtractor
// ---------------------------------------------------------------------------

/// Returns a configurable extraction, counting every call.
pub struct FakeExtractor {
    extraction: Mutex<Extraction>,
    delay: Mutex<Duration>,
    fail: AtomicBool,
    panicking: AtomicBool,
    calls: AtomicUsize,
}

impl FakeExtractor {
    pub fn new(extraction: Extraction) -> Self {
        Self {
            extraction: Mutex::new(extraction),
            delay: Mutex::new(Duration::ZERO),
            fail: AtomicBool::new(false),
            panicking: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_rows(&self, rows: Vec<CardRow>) {
        self.extraction.lock().unwrap().rows = rows;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Make the next extractions panic instead of returning.
    pub fn set_panicking(&self, panicking: bool) {
        self.panicking.store(panicking, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn extract(&self, _provider: Provider, _deck_id: &str) -> Result<Extraction> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.panicking.load(Ordering::SeqCst) {
            panic!("extractor bug");
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(DeckCacheError::Extraction("upstream unavailable".into()));
        }
        Ok(self.extraction.lock().unwrap().clone())
    }
}

// ---------------------------------------------------------------------------
// FakeSignatureProbe
// ---------------------------------------------------------------------------

pub struct FakeSignatureProbe {
    signature: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl FakeSignatureProbe {
    pub fn new(signature: Option<&str>) -> Self {
        Self {
            signature: Mutex::new(signature.map(str::to_string)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, signature: Option<&str>) {
        *self.signature.lock().unwrap() = signature.map(str::to_string);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignatureProbe for FakeSignatureProbe {
    async fn probe(&self, _provider: Provider, _deck_id: &str) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.signature.lock().unwrap().clone()
    }
}

// ---------------------------------------------------------------------------
// FakeImageSource
// ---------------------------------------------------------------------------

/// Serves deterministic artwork URLs derived from the card identity.
///
/// Every reply carries an `ETag` built from the current version; a request
/// presenting that tag gets `NotModified`.
pub struct FakeImageSource {
    failing: Mutex<HashSet<String>>,
    version: AtomicUsize,
    calls: AtomicUsize,
    conditional_calls: AtomicUsize,
}

impl Default for FakeImageSource {
    fn default() -> Self {
        Self {
            failing: Mutex::new(HashSet::new()),
            version: AtomicUsize::new(1),
            calls: AtomicUsize::new(0),
            conditional_calls: AtomicUsize::new(0),
        }
    }
}

impl FakeImageSource {
    /// Make lookups for this cache key (e.g. `name:sol ring`) fail.
    pub fn fail_for(&self, cache_key: &str) {
        self.failing.lock().unwrap().insert(cache_key.to_string());
    }

    /// Change upstream artwork so held validators stop matching.
    pub fn bump_version(&self) {
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn conditional_calls(&self) -> usize {
        self.conditional_calls.load(Ordering::SeqCst)
    }
}

/// The front image URL the fake serves for `identity` at `version`.
pub fn front_url(identity: &CardIdentity, version: usize) -> String {
    let slug = identity.cache_key().replace(' ', "-");
    if version <= 1 {
        format!("https://cards.test/{slug}/front.jpg")
    } else {
        format!("https://cards.test/{slug}/front.jpg?v={version}")
    }
}

#[async_trait]
impl ImageSource for FakeImageSource {
    async fn fetch(
        &self,
        identity: &CardIdentity,
        validator: Option<&Validator>,
    ) -> Result<ImageFetch> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if validator.is_some() {
            self.conditional_calls.fetch_add(1, Ordering::SeqCst);
        }
        if self.failing.lock().unwrap().contains(&identity.cache_key()) {
            return Err(DeckCacheError::ImageLookup(format!("{identity}: not found")));
        }

        let version = self.version.load(Ordering::SeqCst);
        let etag = format!("\"v{version}\"");
        if validator.and_then(|v| v.etag.as_deref()) == Some(etag.as_str()) {
            return Ok(ImageFetch::NotModified);
        }
        Ok(ImageFetch::Modified {
            data: ImageData {
                front_image_url: front_url(identity, version),
                back_image_url: None,
            },
            validator: Validator {
                etag: Some(etag),
                last_modified: None,
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// A cache wired to fakes, with handles to each fake for assertions.
pub struct Harness {
    pub cache: DeckResolutionCache,
    pub clock: Arc<ManualClock>,
    pub extractor: Arc<FakeExtractor>,
    pub probe: Arc<FakeSignatureProbe>,
    pub images: Arc<FakeImageSource>,
}

impl Harness {
    pub fn new(rows: Vec<CardRow>) -> Self {
        Self::with_config(Extraction::from_rows(rows), Config::default())
    }

    pub fn with_config(extraction: Extraction, config: Config) -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        ));
        let extractor = Arc::new(FakeExtractor::new(extraction));
        let probe = Arc::new(FakeSignatureProbe::new(None));
        let images = Arc::new(FakeImageSource::default());

        let cache = DeckResolutionCache::builder()
            .config(config)
            .extractor(extractor.clone())
            .signature_probe(probe.clone())
            .image_source(images.clone())
            .clock(clock.clone())
            .build()
            .unwrap();

        Self {
            cache,
            clock,
            extractor,
            probe,
            images,
        }
    }

    /// Wait until no build is running for the deck.
    pub async fn settle(&self, provider: Provider, deck_id: &str) {
        while self.cache.is_building(provider, deck_id) {
            tokio::task::yield_now().await;
        }
    }
}

/// The two-card deck used throughout the tests.
pub fn sol_ring_and_island() -> Vec<CardRow> {
    vec![
        CardRow::new("Sol Ring", 1).with_category("Artifacts"),
        CardRow::new("Island", 10).with_category("Lands"),
    ]
}
