//! Endpoints, defaults, and runtime configuration.
//!
//! Defaults live as constants; [`Config::from_env`] overlays `DECKCACHE_*`
//! environment variables on top of them.

use std::time::Duration;

use crate::error::{DeckCacheError, Result};

pub const SCRYFALL_API_BASE: &str = "https://api.scryfall.com";
pub const ARCHIDEKT_BASE: &str = "https://archidekt.com";
pub const MOXFIELD_BASE: &str = "https://www.moxfield.com";
pub const MOXFIELD_API_BASE: &str = "https://api2.moxfield.com";

pub const DEFAULT_FRESH_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_SWR_WINDOW: Duration = Duration::from_secs(3600);
pub const DEFAULT_DECK_CAPACITY: usize = 512;
pub const DEFAULT_IMAGE_TTL: Duration = Duration::from_secs(24 * 3600);
pub const DEFAULT_IMAGE_CAPACITY: usize = 8192;
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_EXTRACT_TIMEOUT: Duration = Duration::from_secs(90);
pub const DEFAULT_PROBE_PREFIX_BYTES: usize = 16 * 1024;
pub const DEFAULT_HYDRATE_CONCURRENCY: usize = 8;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_USER_AGENT: &str = concat!("deckcache/", env!("CARGO_PKG_VERSION"));

/// Base URLs for every upstream site. Overridable so collaborators can be
/// pointed at a mirror or a local server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub archidekt: String,
    pub moxfield: String,
    pub moxfield_api: String,
    pub scryfall: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            archidekt: ARCHIDEKT_BASE.to_string(),
            moxfield: MOXFIELD_BASE.to_string(),
            moxfield_api: MOXFIELD_API_BASE.to_string(),
            scryfall: SCRYFALL_API_BASE.to_string(),
        }
    }
}

impl Endpoints {
    /// Every site served from one base URL.
    pub fn all_at(base: &str) -> Self {
        let base = trim_base(base);
        Self {
            archidekt: base.clone(),
            moxfield: base.clone(),
            moxfield_api: base.clone(),
            scryfall: base,
        }
    }
}

fn trim_base(base: &str) -> String {
    base.trim().trim_end_matches('/').to_string()
}

/// Runtime configuration for the resolver and its HTTP collaborators.
#[derive(Debug, Clone)]
pub struct Config {
    /// How long a freshly built record is served without any upstream contact.
    pub fresh_ttl: Duration,
    /// Stale-while-revalidate window, measured from the end of `fresh_ttl`.
    pub swr_window: Duration,
    /// Maximum number of deck records held before LRU eviction.
    pub deck_capacity: usize,
    /// Absolute lifetime of a card image entry.
    pub image_ttl: Duration,
    /// Maximum number of card image entries held before LRU eviction.
    pub image_capacity: usize,
    /// Timeout applied to every outbound HTTP request.
    pub http_timeout: Duration,
    /// Upper bound for one whole extraction step.
    pub extract_timeout: Duration,
    /// Body prefix size hashed by the last-resort signature strategy.
    pub probe_prefix_bytes: usize,
    /// Concurrent artwork lookups per deck build.
    pub hydrate_concurrency: usize,
    pub bind_addr: String,
    pub user_agent: String,
    /// Emit JSON log lines instead of the human-readable format.
    pub log_json: bool,
    pub endpoints: Endpoints,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fresh_ttl: DEFAULT_FRESH_TTL,
            swr_window: DEFAULT_SWR_WINDOW,
            deck_capacity: DEFAULT_DECK_CAPACITY,
            image_ttl: DEFAULT_IMAGE_TTL,
            image_capacity: DEFAULT_IMAGE_CAPACITY,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            extract_timeout: DEFAULT_EXTRACT_TIMEOUT,
            probe_prefix_bytes: DEFAULT_PROBE_PREFIX_BYTES,
            hydrate_concurrency: DEFAULT_HYDRATE_CONCURRENCY,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            log_json: false,
            endpoints: Endpoints::default(),
        }
    }
}

impl Config {
    /// Build a config from defaults overlaid with `DECKCACHE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(v) = lookup("DECKCACHE_FRESH_SECS") {
            config.fresh_ttl = parse_secs("DECKCACHE_FRESH_SECS", &v)?;
        }
        if let Some(v) = lookup("DECKCACHE_SWR_SECS") {
            config.swr_window = parse_secs("DECKCACHE_SWR_SECS", &v)?;
        }
        if let Some(v) = lookup("DECKCACHE_DECK_CAPACITY") {
            config.deck_capacity = parse_count("DECKCACHE_DECK_CAPACITY", &v)?;
        }
        if let Some(v) = lookup("DECKCACHE_IMAGE_TTL_SECS") {
            config.image_ttl = parse_secs("DECKCACHE_IMAGE_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("DECKCACHE_IMAGE_CAPACITY") {
            config.image_capacity = parse_count("DECKCACHE_IMAGE_CAPACITY", &v)?;
        }
        if let Some(v) = lookup("DECKCACHE_HTTP_TIMEOUT_SECS") {
            config.http_timeout = parse_secs("DECKCACHE_HTTP_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("DECKCACHE_EXTRACT_TIMEOUT_SECS") {
            config.extract_timeout = parse_secs("DECKCACHE_EXTRACT_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("DECKCACHE_PROBE_PREFIX_BYTES") {
            config.probe_prefix_bytes = parse_count("DECKCACHE_PROBE_PREFIX_BYTES", &v)?;
        }
        if let Some(v) = lookup("DECKCACHE_HYDRATE_CONCURRENCY") {
            config.hydrate_concurrency = parse_count("DECKCACHE_HYDRATE_CONCURRENCY", &v)?;
        }
        if let Some(v) = lookup("DECKCACHE_BIND") {
            config.bind_addr = v;
        }
        if let Some(v) = lookup("DECKCACHE_USER_AGENT") {
            config.user_agent = v;
        }
        if let Some(v) = lookup("DECKCACHE_LOG_JSON") {
            config.log_json = parse_flag(&v);
        }
        if let Some(v) = lookup("DECKCACHE_ARCHIDEKT_BASE") {
            config.endpoints.archidekt = trim_base(&v);
        }
        if let Some(v) = lookup("DECKCACHE_MOXFIELD_BASE") {
            config.endpoints.moxfield = trim_base(&v);
        }
        if let Some(v) = lookup("DECKCACHE_MOXFIELD_API_BASE") {
            config.endpoints.moxfield_api = trim_base(&v);
        }
        if let Some(v) = lookup("DECKCACHE_SCRYFALL_BASE") {
            config.endpoints.scryfall = trim_base(&v);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would break cache invariants or starve builds.
    pub fn validate(&self) -> Result<()> {
        if self.deck_capacity == 0 || self.image_capacity == 0 {
            return Err(DeckCacheError::InvalidArgument(
                "cache capacities must be at least 1".into(),
            ));
        }
        if self.hydrate_concurrency == 0 {
            return Err(DeckCacheError::InvalidArgument(
                "hydrate concurrency must be at least 1".into(),
            ));
        }
        if self.extract_timeout.is_zero() || self.http_timeout.is_zero() {
            return Err(DeckCacheError::InvalidArgument(
                "timeouts must be finite and non-zero".into(),
            ));
        }
        Ok(())
    }
}

fn parse_secs(key: &str, value: &str) -> Result<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| DeckCacheError::InvalidArgument(format!("{key}={value:?}: {e}")))
}

fn parse_count(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|e| DeckCacheError::InvalidArgument(format!("{key}={value:?}: {e}")))
}

/// Truthy strings: `1`, `true`, `yes`, `on` (case-insensitive).
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
