// Fetches one named blob from the asset host and streams it to disk.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::stats::DownloadStats;
use crate::config::{Config, BUNDLE_DIR_SUFFIX, HTTP_TIMEOUT_SECS};
use crate::error::DownloadError;
use crate::model::BundleFile;

/// How a fetch concluded without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// The blob was downloaded and written to the destination path.
    Fetched,
    /// The remote answered 404 for a file allowed to be missing; nothing was
    /// written.
    SkippedMissing,
}

pub struct AssetFetcher {
    client: Client,
    base_assets_url: String,
    stats: Arc<DownloadStats>,
}

impl AssetFetcher {
    pub fn new(config: &Config, stats: Arc<DownloadStats>) -> Self {
        Self {
            client: Client::new(),
            base_assets_url: config.base_assets_url.clone(),
            stats,
        }
    }

    fn bundle_url(&self, bundle_file: &BundleFile) -> String {
        format!(
            "{}/{}{}/{}",
            self.base_assets_url, bundle_file.bundle_name, BUNDLE_DIR_SUFFIX, bundle_file.file_name
        )
    }

    /// Download one bundle file to `dest`.
    ///
    /// A 404 is tolerated as a no-op when `allow_missing` is set (the physics
    /// file is legitimately absent for some models). A 200 carrying an HTML
    /// content type is the host's "does not exist" page and is rejected so an
    /// error page is never saved as a binary asset.
    pub async fn fetch(
        &self,
        bundle_file: &BundleFile,
        dest: &Path,
        allow_missing: bool,
        cancel: &CancellationToken,
    ) -> Result<FetchStatus, DownloadError> {
        if cancel.is_cancelled() {
            debug!("fetch of {} skipped: cancelled", bundle_file.file_name);
            return Err(DownloadError::Cancelled);
        }

        let url = self.bundle_url(bundle_file);
        debug!("fetching {}", url);

        let request = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS));
        let resp = tokio::select! {
            resp = request.send() => {
                resp.map_err(|e| DownloadError::Transport {
                    url: url.clone(),
                    source: e,
                })?
            }
            _ = cancel.cancelled() => {
                return Err(DownloadError::Cancelled);
            }
        };

        let status = resp.status();
        if status != StatusCode::OK {
            if allow_missing && status == StatusCode::NOT_FOUND {
                debug!("{} absent at remote, skipping", url);
                return Ok(FetchStatus::SkippedMissing);
            }
            warn!("unexpected status {} for {}", status, url);
            return Err(DownloadError::HttpStatus { url, status });
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if content_type.starts_with("text/html") {
            warn!("{} served an HTML page ({})", url, content_type);
            return Err(DownloadError::ContentMismatch { url, content_type });
        }

        if let Err(err) = self.write_body(resp, &url, dest, cancel).await {
            // Whole file or nothing: a partial file would pass the next run's
            // existence check.
            let _ = fs::remove_file(dest).await;
            return Err(err);
        }

        debug!("saved {}", dest.display());
        Ok(FetchStatus::Fetched)
    }

    async fn write_body(
        &self,
        resp: Response,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), DownloadError> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io(parent, e))?;
        }

        let mut file = fs::File::create(dest)
            .await
            .map_err(|e| DownloadError::io(dest, e))?;

        let mut stream = resp.bytes_stream();
        loop {
            let next = tokio::select! {
                chunk = stream.next() => chunk,
                _ = cancel.cancelled() => {
                    debug!("copy of {} cancelled", url);
                    return Err(DownloadError::Cancelled);
                }
            };
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(|e| DownloadError::Transport {
                url: url.to_string(),
                source: e,
            })?;
            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::io(dest, e))?;
            self.stats.record_downloaded(chunk.len() as u64);
        }

        file.flush().await.map_err(|e| DownloadError::io(dest, e))?;
        Ok(())
    }
}
