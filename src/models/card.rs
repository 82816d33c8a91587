use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CardRow — One normalized row as produced by an extractor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRow {
    pub name: String,
    pub quantity: u32,
    #[serde(default)]
    pub foil: bool,
    /// Card-level categories, most significant first.
    #[serde(default)]
    pub categories: Vec<String>,
    pub set_code: Option<String>,
    pub collector_number: Option<String>,
}

impl CardRow {
    pub fn new(name: impl Into<String>, quantity: u32) -> Self {
        Self {
            name: name.into(),
            quantity,
            foil: false,
            categories: Vec::new(),
            set_code: None,
            collector_number: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    pub fn with_printing(mut self, set_code: impl Into<String>, number: impl Into<String>) -> Self {
        self.set_code = Some(set_code.into());
        self.collector_number = Some(number.into());
        self
    }

    pub fn foil(mut self, foil: bool) -> Self {
        self.foil = foil;
        self
    }

    /// The identity used to look up this row's artwork.
    pub fn identity(&self) -> CardIdentity {
        match (&self.set_code, &self.collector_number) {
            (Some(set), Some(number)) if !set.trim().is_empty() && !number.trim().is_empty() => {
                CardIdentity::Printing {
                    set_code: set.trim().to_lowercase(),
                    collector_number: number.trim().to_string(),
                }
            }
            _ => CardIdentity::Name(normalize_name(&self.name)),
        }
    }
}

// ---------------------------------------------------------------------------
// Extraction — Everything an extractor returns for one deck
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub rows: Vec<CardRow>,
    /// Deck-level declared category order, when the provider exposes one.
    pub declared_categories: Vec<String>,
}

impl Extraction {
    pub fn from_rows(rows: Vec<CardRow>) -> Self {
        Self {
            rows,
            declared_categories: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// CardIdentity — Key for artwork lookups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CardIdentity {
    /// A specific printing: lower-cased set code and collector number.
    Printing {
        set_code: String,
        collector_number: String,
    },
    /// Exact-name lookup on the normalized card name.
    Name(String),
}

impl CardIdentity {
    pub fn cache_key(&self) -> String {
        match self {
            CardIdentity::Printing {
                set_code,
                collector_number,
            } => format!("{set_code}/{collector_number}"),
            CardIdentity::Name(name) => format!("name:{name}"),
        }
    }
}

impl std::fmt::Display for CardIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.cache_key())
    }
}

/// Trim, collapse inner whitespace, and lower-case a card name.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// ---------------------------------------------------------------------------
// ImageData / Validator — Artwork lookup results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageData {
    #[serde(rename = "frontImageURL")]
    pub front_image_url: String,
    #[serde(rename = "backImageURL")]
    pub back_image_url: Option<String>,
}

/// HTTP validator pair for conditional re-fetches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validator {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl Validator {
    pub fn is_empty(&self) -> bool {
        self.etag.is_none() && self.last_modified.is_none()
    }
}
