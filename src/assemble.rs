//! Build orchestration: extract rows, hydrate artwork, and assemble the payload.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};

use crate::error::{DeckCacheError, Result};
use crate::extract::Extractor;
use crate::images::CardImageCache;
use crate::models::{CardEntry, CardRow, DeckPayload, Extraction};
use crate::provider::Provider;

pub const UNCATEGORIZED: &str = "Uncategorized";

pub struct Assembler {
    extractor: Arc<dyn Extractor>,
    images: Arc<CardImageCache>,
    extract_timeout: Duration,
    hydrate_concurrency: usize,
}

impl Assembler {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        images: Arc<CardImageCache>,
        extract_timeout: Duration,
        hydrate_concurrency: usize,
    ) -> Self {
        Self {
            extractor,
            images,
            extract_timeout,
            hydrate_concurrency: hydrate_concurrency.max(1),
        }
    }

    /// Extract the deck and hydrate every row. Cards whose artwork cannot be
    /// resolved are dropped; only extraction failures fail the build.
    pub async fn assemble(&self, provider: Provider, deck_id: &str) -> Result<DeckPayload> {
        let started = Instant::now();
        let extraction = tokio::time::timeout(
            self.extract_timeout,
            self.extractor.extract(provider, deck_id),
        )
        .await
        .map_err(|_| {
            DeckCacheError::Timeout(format!(
                "extracting {provider} deck {deck_id} took longer than {:?}",
                self.extract_timeout
            ))
        })??;

        let row_count = extraction.rows.len();
        let (rows, category_order) = categorize(extraction);

        let hydrated: Vec<_> = stream::iter(rows)
            .map(|(row, category)| async move {
                let identity = row.identity();
                let result = self.images.lookup(&identity).await;
                (row, category, result)
            })
            .buffer_unordered(self.hydrate_concurrency)
            .collect()
            .await;

        let mut images = Vec::with_capacity(hydrated.len());
        for (row, category, result) in hydrated {
            match result {
                Ok(data) => images.push(CardEntry {
                    name: row.name,
                    quantity: row.quantity,
                    foil: row.foil,
                    category,
                    set_code: row.set_code,
                    collector_number: row.collector_number,
                    front_image_url: data.front_image_url,
                    back_image_url: data.back_image_url,
                }),
                Err(e) => {
                    tracing::warn!(
                        %provider,
                        deck_id,
                        card = %row.name,
                        error = %e,
                        "dropping card without artwork"
                    );
                }
            }
        }
        sort_entries(&mut images, &category_order);

        tracing::info!(
            %provider,
            deck_id,
            rows = row_count,
            cards = images.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "deck assembled"
        );

        Ok(DeckPayload {
            provider,
            deck_id: deck_id.to_string(),
            images,
            category_order,
        })
    }
}

/// Pick each row's category and collect categories in first-seen order.
///
/// A row takes whichever of its categories is declared earliest at deck level;
/// failing that its own first category; failing that [`UNCATEGORIZED`].
pub fn categorize(extraction: Extraction) -> (Vec<(CardRow, String)>, Vec<String>) {
    let declared: HashMap<&str, usize> = extraction
        .declared_categories
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_str(), i))
        .collect();

    let mut order: Vec<String> = Vec::new();
    let mut rows = Vec::with_capacity(extraction.rows.len());
    for row in extraction.rows {
        let category = row
            .categories
            .iter()
            .filter_map(|c| declared.get(c.as_str()).map(|&pos| (pos, c)))
            .min_by_key(|(pos, _)| *pos)
            .map(|(_, c)| c.clone())
            .or_else(|| row.categories.first().cloned())
            .unwrap_or_else(|| UNCATEGORIZED.to_string());

        if !order.contains(&category) {
            order.push(category.clone());
        }
        rows.push((row, category));
    }
    (rows, order)
}

/// Canonical entry order: category position, then name, printing, and finish.
pub fn sort_entries(entries: &mut [CardEntry], category_order: &[String]) {
    let position = |category: &str| {
        category_order
            .iter()
            .position(|c| c == category)
            .unwrap_or(usize::MAX)
    };
    entries.sort_by(|a, b| {
        position(&a.category)
            .cmp(&position(&b.category))
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.set_code.cmp(&b.set_code))
            .then_with(|| a.collector_number.cmp(&b.collector_number))
            .then_with(|| a.foil.cmp(&b.foil))
            .then_with(|| a.quantity.cmp(&b.quantity))
    });
}
