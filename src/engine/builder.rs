// Assembles one model: plans the file set, downloads what is missing, and
// writes the generated manifest.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::fs;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::fetcher::FetchStatus;
use super::gate::ModelGate;
use super::pool::{DownloadOutcome, DownloadPool, DownloadTask};
use crate::config::{
    DATA_DIR, EXPRESSIONS_DIR, MANIFEST_FILE_NAME, MODEL_FILE_NAME, MOTIONS_DIR, PHYSICS_FILE_NAME,
    TEXTURES_DIR,
};
use crate::error::DownloadError;
use crate::model::{BuildData, BundleFile, Live2dModel, ModelManifest};
use crate::progress::ProgressSink;

/// One required file, before the existence scan decides whether it needs a
/// download task.
struct PlannedFile {
    bundle_file: BundleFile,
    abs_path: PathBuf,
    rel_path: String,
    allow_missing: bool,
}

/// Builds one model into its on-disk directory.
///
/// Single use: `construct` consumes the builder. A failed build is restarted
/// by creating a fresh builder; files that made it to disk are picked up by
/// the next run's existence scan.
pub struct ModelBuilder {
    model_name: String,
    model_root: PathBuf,
    data_path: PathBuf,
    build_data: BuildData,
    document: Live2dModel,
    completed_files: usize,
    pool: Arc<DownloadPool>,
    gate: Arc<ModelGate>,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
}

impl ModelBuilder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        model_root: impl Into<PathBuf>,
        model_name: impl Into<String>,
        build_data: BuildData,
        pool: Arc<DownloadPool>,
        gate: Arc<ModelGate>,
        progress: Arc<dyn ProgressSink>,
        cancel: CancellationToken,
    ) -> Self {
        let model_root = model_root.into();
        let data_path = model_root.join(DATA_DIR);
        Self {
            model_name: model_name.into(),
            model_root,
            data_path,
            build_data,
            document: Live2dModel::default(),
            completed_files: 0,
            pool,
            gate,
            progress,
            cancel,
        }
    }

    /// Run the whole build. The admission gate is held for the duration and
    /// released on every exit path.
    pub async fn construct(mut self) -> Result<(), DownloadError> {
        info!("building model {}", self.model_name);

        let _permit = self.gate.acquire(&self.cancel).await?;

        fs::create_dir_all(&self.data_path).await.map_err(|e| {
            let err = DownloadError::io(&self.data_path, e);
            self.progress.on_error(&self.model_name, &err);
            err
        })?;

        self.progress
            .on_total(&self.model_name, self.build_data.total_files());

        let (pending, existing) = self.partition_files().await;
        debug!(
            "model {}: {} files present, {} to download",
            self.model_name,
            existing.len(),
            pending.len()
        );

        for rel_path in existing {
            self.document.apply(&rel_path);
            self.advance();
        }

        if !pending.is_empty() {
            if let Err(err) = self.run_downloads(pending).await {
                warn!("model {} build failed: {}", self.model_name, err);
                self.progress.on_error(&self.model_name, &err);
                return Err(err);
            }
        }

        self.write_manifest().await
    }

    /// The full file set this build accounts for, with fixed destination
    /// names for the model and physics files.
    fn planned_files(&self) -> Vec<PlannedFile> {
        let mut planned = Vec::with_capacity(self.build_data.total_files());

        planned.push(self.plan(self.build_data.model.clone(), MODEL_FILE_NAME, None, false));
        planned.push(self.plan(self.build_data.physics.clone(), PHYSICS_FILE_NAME, None, true));

        for texture in &self.build_data.textures {
            planned.push(self.plan(texture.clone(), &texture.file_name, Some(TEXTURES_DIR), false));
        }
        for motion in &self.build_data.motions {
            planned.push(self.plan(motion.clone(), &motion.file_name, Some(MOTIONS_DIR), false));
        }
        for expression in &self.build_data.expressions {
            planned.push(self.plan(
                expression.clone(),
                &expression.file_name,
                Some(EXPRESSIONS_DIR),
                false,
            ));
        }

        planned
    }

    fn plan(
        &self,
        bundle_file: BundleFile,
        file_name: &str,
        subdir: Option<&str>,
        allow_missing: bool,
    ) -> PlannedFile {
        let (abs_path, rel_path) = match subdir {
            Some(dir) => (
                self.data_path.join(dir).join(file_name),
                format!("{}/{}/{}", DATA_DIR, dir, file_name),
            ),
            None => (
                self.data_path.join(file_name),
                format!("{}/{}", DATA_DIR, file_name),
            ),
        };
        PlannedFile {
            bundle_file,
            abs_path,
            rel_path,
            allow_missing,
        }
    }

    /// Split the planned set into files needing a download and files already
    /// on disk. The existence scan happens once, here, not per worker.
    async fn partition_files(&self) -> (Vec<PlannedFile>, Vec<String>) {
        let mut pending = Vec::new();
        let mut existing = Vec::new();

        for file in self.planned_files() {
            // Only a confirmed absence schedules a download; a stat failure
            // is treated as present and left alone.
            let absent = matches!(fs::try_exists(&file.abs_path).await, Ok(false));
            if absent {
                pending.push(file);
            } else {
                existing.push(file.rel_path);
            }
        }

        (pending, existing)
    }

    /// Dispatch the missing files through the shared pool and fold outcomes
    /// in task-creation order. The first error becomes the build result, but
    /// every remaining completion slot is still drained.
    async fn run_downloads(&mut self, pending: Vec<PlannedFile>) -> Result<(), DownloadError> {
        let mut waits = Vec::with_capacity(pending.len());
        let mut tasks = Vec::with_capacity(pending.len());

        for file in pending {
            let (done, wait) = oneshot::channel();
            waits.push(wait);
            tasks.push(DownloadTask {
                bundle_file: file.bundle_file,
                file_path: file.abs_path,
                rel_path: file.rel_path,
                allow_missing: file.allow_missing,
                done,
            });
        }

        let mut first_error: Option<DownloadError> = None;
        for task in tasks {
            if let Err(err) = self.pool.submit(task).await {
                // Unsubmitted tasks drop their completion slots below, which
                // the wait loop reads as cancelled outcomes.
                first_error = Some(err);
                break;
            }
        }

        for wait in waits {
            let outcome = wait.await.unwrap_or_else(|_| DownloadOutcome {
                rel_path: String::new(),
                status: Err(DownloadError::Cancelled),
            });

            if first_error.is_some() {
                // Drain only; values after the first error are discarded.
                continue;
            }

            match outcome.status {
                Ok(FetchStatus::Fetched) => {
                    self.document.apply(&outcome.rel_path);
                    self.advance();
                }
                Ok(FetchStatus::SkippedMissing) => {
                    // Tolerated 404: counts toward progress, never lands in
                    // the document.
                    self.advance();
                }
                Err(err) => first_error = Some(err),
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn advance(&mut self) {
        self.completed_files += 1;
        self.progress
            .on_progress(&self.model_name, self.completed_files);
    }

    /// Serialize the manifest and write it atomically into the model root.
    async fn write_manifest(&self) -> Result<(), DownloadError> {
        let manifest = ModelManifest::from_document(&self.document);
        let json = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| DownloadError::Format(format!("manifest serialization: {}", e)))?;

        let manifest_path = self.model_root.join(MANIFEST_FILE_NAME);
        let tmp_path = self.model_root.join(".model.json.tmp");

        fs::write(&tmp_path, &json)
            .await
            .map_err(|e| DownloadError::io(&tmp_path, e))?;
        fs::rename(&tmp_path, &manifest_path)
            .await
            .map_err(|e| DownloadError::io(&manifest_path, e))?;

        info!(
            "model {} manifest written to {}",
            self.model_name,
            manifest_path.display()
        );
        Ok(())
    }
}
