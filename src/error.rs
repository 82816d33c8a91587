use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum DeckCacheError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Signature probe failed: {0}")]
    SignatureProbe(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Image lookup failed: {0}")]
    ImageLookup(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Build failed: {0}")]
    Build(Arc<DeckCacheError>),

    #[error("Build task aborted: {0}")]
    TaskAborted(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl DeckCacheError {
    /// Short machine-readable kind, used as the `error` field of JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            DeckCacheError::Http(_) => "http",
            DeckCacheError::Json(_) => "json",
            DeckCacheError::InvalidRequest(_) => "invalid_request",
            DeckCacheError::SignatureProbe(_) => "signature_probe",
            DeckCacheError::Extraction(_) => "extraction_failed",
            DeckCacheError::ImageLookup(_) => "image_lookup_failed",
            DeckCacheError::Timeout(_) => "timeout",
            DeckCacheError::Build(_) => "build_failed",
            DeckCacheError::TaskAborted(_) => "task_aborted",
            DeckCacheError::InvalidArgument(_) => "invalid_argument",
        }
    }
}

pub type Result<T> = std::result::Result<T, DeckCacheError>;
