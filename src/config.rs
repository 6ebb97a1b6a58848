use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::DownloadError;

/// Path-segment marker appended to a bundle name in asset URLs.
pub const BUNDLE_DIR_SUFFIX: &str = "_rip";

/// Per-request HTTP timeout in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Capacity of the shared file-download task queue.
pub const DOWNLOAD_QUEUE_DEPTH: usize = 64;

/// Subdirectory of a model root holding the raw asset files.
pub const DATA_DIR: &str = "data";

/// Fixed on-disk name of the model file.
pub const MODEL_FILE_NAME: &str = "model.moc";

/// Fixed on-disk name of the physics file.
pub const PHYSICS_FILE_NAME: &str = "physics.json";

/// Subdirectory names for the per-category asset files.
pub const TEXTURES_DIR: &str = "textures";
pub const MOTIONS_DIR: &str = "motions";
pub const EXPRESSIONS_DIR: &str = "expressions";

/// File name of the generated output manifest.
pub const MANIFEST_FILE_NAME: &str = "model.json";

/// Top-level configuration for the fetch engine.
///
/// Passed by reference into each component at construction time; there is no
/// process-wide mutable configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root directory models are assembled under.
    pub save_path: String,
    /// Directory used for cached catalog responses.
    pub chara_cache_path: String,
    /// Whether catalog responses are cached on disk.
    pub use_chara_cache: bool,
    /// Age in seconds after which a cached catalog response is stale.
    pub cache_ttl_secs: u64,
    /// Base URL of the remote asset host.
    pub base_assets_url: String,
    /// Base URL of the character roster API.
    pub chara_roster_url: String,
    /// URL of the asset index document.
    pub assets_index_url: String,
    /// Number of concurrent file-download workers shared across all builds.
    pub max_concurrent_downloads: usize,
    /// Maximum number of model builds running at once.
    pub max_concurrent_models: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            save_path: "live2d_download".to_string(),
            chara_cache_path: "live2d_chara_cache".to_string(),
            use_chara_cache: true,
            cache_ttl_secs: 24 * 60 * 60,
            base_assets_url: "https://bestdori.com/assets/jp".to_string(),
            chara_roster_url: "https://bestdori.com/api/characters".to_string(),
            assets_index_url: "https://bestdori.com/api/explorer/jp/assets/_info.json".to_string(),
            max_concurrent_downloads: 20,
            max_concurrent_models: 3,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self, DownloadError> {
        let data = std::fs::read(path).map_err(|e| DownloadError::io(path, e))?;
        serde_json::from_slice(&data)
            .map_err(|e| DownloadError::Format(format!("invalid config {}: {}", path.display(), e)))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.max_concurrent_downloads, 20);
        assert_eq!(cfg.max_concurrent_models, 3);
        assert!(cfg.use_chara_cache);
        assert_eq!(cfg.cache_ttl(), Duration::from_secs(86400));
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let cfg: Config = serde_json::from_str(r#"{"max_concurrent_models": 5}"#).unwrap();
        assert_eq!(cfg.max_concurrent_models, 5);
        assert_eq!(cfg.save_path, "live2d_download");
    }
}
