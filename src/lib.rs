//! Deck resolution cache for Archidekt and Moxfield decklists.
//!
//! Turns a public deck page into a hydrated card list (each card paired with
//! its Scryfall artwork) and caches the result with a graduated freshness
//! policy: fresh records are served with no upstream contact, an unchanged
//! upstream signature renews a record in place, stale records are served while
//! a single background rebuild runs, and a failed rebuild falls back to the
//! last good record.
//!
//! # Quick start
//!
//! ```no_run
//! use deckcache::{parse_deck_url, DeckResolutionCache};
//!
//! # async fn run() -> deckcache::Result<()> {
//! let cache = DeckResolutionCache::builder().build()?;
//! let (provider, deck_id) = parse_deck_url("https://archidekt.com/decks/123456")?;
//! let record = cache.resolve(provider, &deck_id, false).await?;
//! println!("{} cards, etag {}", record.payload.images.len(), record.etag());
//! # Ok(())
//! # }
//! ```

pub mod assemble;
pub mod clock;
pub mod config;
pub mod error;
pub mod extract;
pub mod fingerprint;
#[cfg(feature = "server")]
pub mod http;
pub mod images;
pub mod models;
pub mod provider;
pub mod resolver;
pub mod signature;
pub mod single_flight;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, Endpoints};
pub use error::{DeckCacheError, Result};
pub use extract::{Extractor, HttpExtractor};
pub use images::{CardImageCache, ImageFetch, ImageSource, ScryfallClient};
pub use models::*;
pub use provider::{parse_deck_url, Provider};
pub use resolver::{DeckResolutionCache, DeckResolutionCacheBuilder};
pub use signature::{HttpSignatureChecker, SignatureProbe};
