use thiserror::Error;

/// Failures that abort the current record. Backend-level rejections are
/// [`Outcome`](reviewsync_core::Outcome)s, not errors.
#[derive(Error, Debug)]
pub enum SyncError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("invalid base URL {0:?}: must start with http:// or https://")]
    InvalidBaseUrl(String),

    #[error("API token is empty")]
    MissingToken,

    #[error("JSON encode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("classifier setup failed: {0}")]
    Classifier(#[from] reviewsync_core::ClassifyError),
}
