// HTTP catalog client with time-based disk caching of JSON responses.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info, warn};

use super::Catalog;
use crate::config::{Config, BUNDLE_DIR_SUFFIX, HTTP_TIMEOUT_SECS};
use crate::error::DownloadError;
use crate::model::BuildData;

pub struct CatalogClient {
    client: Client,
    base_assets_url: String,
    chara_roster_url: String,
    assets_index_url: String,
    cache_path: PathBuf,
    use_cache: bool,
    cache_ttl: Duration,
}

impl CatalogClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_assets_url: config.base_assets_url.clone(),
            chara_roster_url: config.chara_roster_url.clone(),
            assets_index_url: config.assets_index_url.clone(),
            cache_path: PathBuf::from(&config.chara_cache_path),
            use_cache: config.use_chara_cache,
            cache_ttl: config.cache_ttl(),
        }
    }

    /// GET a JSON document, serving it from the disk cache while the cached
    /// copy is younger than the TTL.
    async fn fetch_json(
        &self,
        url: &str,
        cache_name: Option<&str>,
    ) -> Result<Value, DownloadError> {
        if self.use_cache {
            if let Some(name) = cache_name {
                let cache_file = self.cache_path.join(name);
                if let Some(value) = self.read_fresh_cache(&cache_file).await? {
                    return Ok(value);
                }
            }
        }

        info!("fetching {}", url);
        let resp = self
            .client
            .get(url)
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| DownloadError::Transport {
                url: url.to_string(),
                source: e,
            })?;

        let status = resp.status();
        if status != StatusCode::OK {
            warn!("unexpected status {} for {}", status, url);
            return Err(DownloadError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        let value: Value = resp.json().await.map_err(|e| {
            DownloadError::Format(format!("invalid json from {}: {}", url, e))
        })?;

        if self.use_cache {
            if let Some(name) = cache_name {
                self.write_cache(name, &value).await?;
            }
        }

        Ok(value)
    }

    /// Returns the cached document if it exists and is within the TTL.
    async fn read_fresh_cache(&self, cache_file: &Path) -> Result<Option<Value>, DownloadError> {
        let Ok(meta) = fs::metadata(cache_file).await else {
            return Ok(None);
        };

        let fresh = meta
            .modified()
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .map(|age| age < self.cache_ttl)
            .unwrap_or(false);
        if !fresh {
            debug!("cache expired for {}", cache_file.display());
            return Ok(None);
        }

        debug!("using cached data from {}", cache_file.display());
        let data = fs::read(cache_file)
            .await
            .map_err(|e| DownloadError::io(cache_file, e))?;
        let value = serde_json::from_slice(&data).map_err(|e| {
            DownloadError::Format(format!("invalid cache {}: {}", cache_file.display(), e))
        })?;
        Ok(Some(value))
    }

    async fn write_cache(&self, name: &str, value: &Value) -> Result<(), DownloadError> {
        fs::create_dir_all(&self.cache_path)
            .await
            .map_err(|e| DownloadError::io(&self.cache_path, e))?;

        let cache_file = self.cache_path.join(name);
        let data = serde_json::to_vec(value)
            .map_err(|e| DownloadError::Format(format!("cache serialization: {}", e)))?;
        fs::write(&cache_file, data)
            .await
            .map_err(|e| DownloadError::io(&cache_file, e))?;

        debug!("cached catalog data at {}", cache_file.display());
        Ok(())
    }
}

#[async_trait]
impl Catalog for CatalogClient {
    async fn model_manifest(&self, model_name: &str) -> Result<BuildData, DownloadError> {
        let url = format!(
            "{}/live2d/chara/{}{}/buildData.asset",
            self.base_assets_url, model_name, BUNDLE_DIR_SUFFIX
        );
        info!("fetching build manifest for {}", model_name);

        let data = match self.fetch_json(&url, None).await {
            Err(DownloadError::HttpStatus { status, .. }) if status == StatusCode::NOT_FOUND => {
                return Err(DownloadError::NotFound(model_name.to_string()));
            }
            other => other?,
        };

        let base = data
            .get("Base")
            .ok_or_else(|| DownloadError::Format("buildData payload has no Base section".into()))?;
        let mut build_data: BuildData = serde_json::from_value(base.clone())
            .map_err(|e| DownloadError::Format(format!("malformed buildData: {}", e)))?;
        build_data.normalize();

        Ok(build_data)
    }

    async fn chara(&self, chara_id: u32) -> Result<Value, DownloadError> {
        let url = format!("{}/{}.json", self.chara_roster_url, chara_id);
        let cache_name = format!("chara_{}.json", chara_id);
        self.fetch_json(&url, Some(&cache_name)).await
    }

    async fn chara_roster(&self) -> Result<Value, DownloadError> {
        let url = format!("{}/all.2.json", self.chara_roster_url);
        self.fetch_json(&url, Some("chara_roster.json")).await
    }

    async fn chara_costumes(&self, chara_id: u32) -> Result<Vec<String>, DownloadError> {
        let index = self.fetch_json(&self.assets_index_url, Some("assets_info.json")).await?;

        let chara_assets = index
            .get("live2d")
            .and_then(|v| v.get("chara"))
            .and_then(|v| v.as_object())
            .ok_or_else(|| DownloadError::Format("asset index has no live2d.chara section".into()))?;

        let prefix = format!("{:03}", chara_id);
        let mut costumes: Vec<String> = chara_assets
            .keys()
            .filter(|name| name.starts_with(&prefix) && !name.ends_with("general"))
            .cloned()
            .collect();

        costumes.sort_by(|a, b| compare_costumes(a, b));
        Ok(costumes)
    }
}

/// Display order for costume names: live-event models last, then by the
/// numeric segment after the first `_` when both sides have one, then
/// lexicographically.
fn compare_costumes(a: &str, b: &str) -> std::cmp::Ordering {
    let a_event = a.contains("live_event");
    let b_event = b.contains("live_event");
    if a_event != b_event {
        return a_event.cmp(&b_event);
    }

    if let (Some(a_id), Some(b_id)) = (costume_id(a), costume_id(b)) {
        return a_id.cmp(&b_id);
    }

    a.cmp(b)
}

fn costume_id(name: &str) -> Option<u64> {
    name.split('_').nth(1)?.parse().ok()
}
