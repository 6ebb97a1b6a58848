// Error taxonomy for catalog lookups and file downloads.

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum DownloadError {
    #[error("request failed for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected HTTP status {status} for {url}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("{url} returned an HTML page ({content_type}) instead of asset data")]
    ContentMismatch { url: String, content_type: String },
    #[error("io failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("download cancelled")]
    Cancelled,
    #[error("malformed payload: {0}")]
    Format(String),
    #[error("{0} not found")]
    NotFound(String),
}

impl DownloadError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
