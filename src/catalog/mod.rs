// Remote catalog access: character roster, costume listing, build manifests.

pub mod client;
pub mod search;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::DownloadError;
use crate::model::BuildData;

/// Seam between the engine and the remote catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Fetch and normalize the build manifest for a named model.
    async fn model_manifest(&self, model_name: &str) -> Result<BuildData, DownloadError>;

    /// Fetch the record for one character.
    async fn chara(&self, chara_id: u32) -> Result<Value, DownloadError>;

    /// Fetch the full character roster.
    async fn chara_roster(&self) -> Result<Value, DownloadError>;

    /// List the model names available for one character, in display order.
    async fn chara_costumes(&self, chara_id: u32) -> Result<Vec<String>, DownloadError>;
}
