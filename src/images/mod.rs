//! Card artwork: the Scryfall lookup client and the per-card cache in front of it.

pub mod cache;
pub mod client;

pub use cache::CardImageCache;
pub use client::{ImageFetch, ImageSource, ScryfallClient};
