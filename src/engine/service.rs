// Engine wiring: catalog lookups, path resolution, and model build dispatch.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::builder::ModelBuilder;
use super::fetcher::{AssetFetcher, FetchStatus};
use super::gate::ModelGate;
use super::pool::DownloadPool;
use super::stats::{DownloadStats, StatsSnapshot};
use crate::catalog::client::CatalogClient;
use crate::catalog::search::find_best_match;
use crate::catalog::Catalog;
use crate::config::{Config, BUNDLE_DIR_SUFFIX, DOWNLOAD_QUEUE_DEPTH};
use crate::error::DownloadError;
use crate::model::{BundleFile, MatchChara};
use crate::progress::{NullProgress, ProgressSink};

/// Orchestrates model downloads: one shared worker pool for files, one
/// admission gate for builds, one cancellation token for the whole run.
pub struct DownloadEngine {
    config: Config,
    catalog: Arc<dyn Catalog>,
    fetcher: Arc<AssetFetcher>,
    pool: Arc<DownloadPool>,
    gate: Arc<ModelGate>,
    progress: Arc<dyn ProgressSink>,
    stats: Arc<DownloadStats>,
    cancel: CancellationToken,
}

impl DownloadEngine {
    /// Engine with the default catalog client and no progress reporting.
    /// Must be constructed inside a tokio runtime.
    pub fn new(config: Config) -> Self {
        Self::with_progress(config, Arc::new(NullProgress))
    }

    pub fn with_progress(config: Config, progress: Arc<dyn ProgressSink>) -> Self {
        let catalog = Arc::new(CatalogClient::new(&config));
        Self::with_catalog(config, catalog, progress)
    }

    pub fn with_catalog(
        config: Config,
        catalog: Arc<dyn Catalog>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let stats = Arc::new(DownloadStats::new());
        let fetcher = Arc::new(AssetFetcher::new(&config, Arc::clone(&stats)));
        let pool = Arc::new(DownloadPool::new(
            Arc::clone(&fetcher),
            config.max_concurrent_downloads,
            DOWNLOAD_QUEUE_DEPTH,
            cancel.clone(),
            Arc::clone(&stats),
        ));
        let gate = Arc::new(ModelGate::new(config.max_concurrent_models));

        Self {
            config,
            catalog,
            fetcher,
            pool,
            gate,
            progress,
            stats,
            cancel,
        }
    }

    /// Download and assemble one model by name (e.g. `001_casual-2023`).
    pub async fn download_model(&self, model_name: &str) -> Result<(), DownloadError> {
        let model_name = model_name
            .strip_suffix(BUNDLE_DIR_SUFFIX)
            .unwrap_or(model_name);
        info!("downloading model {}", model_name);

        let build_data = self.catalog.model_manifest(model_name).await?;
        let model_root = self.resolve_model_root(model_name).await?;

        let builder = ModelBuilder::new(
            model_root,
            model_name,
            build_data,
            Arc::clone(&self.pool),
            Arc::clone(&self.gate),
            Arc::clone(&self.progress),
            self.cancel.clone(),
        );
        builder.construct().await?;

        self.stats.record_build();
        Ok(())
    }

    /// Download several models; the admission gate bounds how many build at
    /// once. Returns one result per requested name.
    pub async fn download_models(
        self: &Arc<Self>,
        model_names: &[String],
    ) -> Vec<(String, Result<(), DownloadError>)> {
        let mut handles = Vec::with_capacity(model_names.len());
        for name in model_names {
            let engine = Arc::clone(self);
            let name = name.clone();
            handles.push(tokio::spawn(async move {
                let result = engine.download_model(&name).await;
                (name, result)
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(pair) = handle.await {
                results.push(pair);
            }
        }
        results
    }

    /// Standalone single-file retrieval through the engine's fetcher.
    pub async fn download_bundle_file(
        &self,
        bundle_file: &BundleFile,
        dest: &Path,
        allow_missing: bool,
    ) -> Result<FetchStatus, DownloadError> {
        self.fetcher
            .fetch(bundle_file, dest, allow_missing, &self.cancel)
            .await
    }

    /// Fuzzy-search the roster for a character by name.
    pub async fn find_chara(&self, name: &str) -> Result<MatchChara, DownloadError> {
        let roster = self.catalog.chara_roster().await?;

        let mut candidates: BTreeMap<u32, Vec<String>> = BTreeMap::new();
        if let Some(entries) = roster.as_object() {
            for (id_str, info) in entries {
                let Ok(id) = id_str.parse::<u32>() else {
                    continue;
                };
                let Some(names) = info.get("characterName").and_then(|v| v.as_array()) else {
                    continue;
                };
                let names: Vec<String> = names
                    .iter()
                    .filter_map(|n| n.as_str())
                    .map(|n| n.to_string())
                    .collect();
                candidates.insert(id, names);
            }
        }

        let (id, name, _score) = find_best_match(name, &candidates)
            .ok_or_else(|| DownloadError::NotFound(format!("character {}", name)))?;
        let names = candidates.remove(&id).unwrap_or_default();

        Ok(MatchChara { id, name, names })
    }

    /// List the model names available for one character.
    pub async fn chara_costumes(&self, chara_id: u32) -> Result<Vec<String>, DownloadError> {
        self.catalog.chara_costumes(chara_id).await
    }

    /// Cancel the whole run: gate waits, queued and in-flight downloads, and
    /// builder wait loops all observe this.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn gate(&self) -> &ModelGate {
        &self.gate
    }

    /// Directory a model is assembled under. The character directory comes
    /// from the catalog record; a failed lookup falls back to an id-derived
    /// name and never fails the build.
    async fn resolve_model_root(&self, model_name: &str) -> Result<PathBuf, DownloadError> {
        let (chara_id, costume) = split_model_name(model_name)?;
        let chara_dir = self.character_directory(chara_id).await;
        Ok(Path::new(&self.config.save_path)
            .join(chara_dir)
            .join(costume))
    }

    async fn character_directory(&self, chara_id: u32) -> String {
        let fallback = || format!("chara_{:03}", chara_id);

        match self.catalog.chara(chara_id).await {
            Ok(chara) => match chara_first_name(&chara) {
                Some(name) => name.to_lowercase(),
                None => {
                    warn!("chara {} record has no usable name, using id directory", chara_id);
                    fallback()
                }
            },
            Err(err) => {
                warn!("chara {} lookup failed ({}), using id directory", chara_id, err);
                fallback()
            }
        }
    }
}

impl Drop for DownloadEngine {
    fn drop(&mut self) {
        // Workers holding the queue exit once the run is cancelled.
        self.cancel.cancel();
    }
}

/// Split `NNN_costume` into the character id and the costume part.
fn split_model_name(model_name: &str) -> Result<(u32, &str), DownloadError> {
    let (id_part, costume) = model_name
        .split_once('_')
        .ok_or_else(|| DownloadError::Format(format!("invalid model name: {}", model_name)))?;
    let chara_id = id_part.parse::<u32>().map_err(|_| {
        DownloadError::Format(format!("invalid character id in model name: {}", model_name))
    })?;
    Ok((chara_id, costume))
}

/// The display name entry used for directory names: `firstName[1]`.
fn chara_first_name(chara: &serde_json::Value) -> Option<&str> {
    chara.get("firstName")?.get(1)?.as_str()
}
