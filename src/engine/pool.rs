// Fixed-size worker pool draining a bounded queue of file-download tasks.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::fetcher::{AssetFetcher, FetchStatus};
use super::stats::DownloadStats;
use crate::error::DownloadError;
use crate::model::BundleFile;

/// One file to download, with its private completion slot.
pub struct DownloadTask {
    pub bundle_file: BundleFile,
    pub file_path: PathBuf,
    pub rel_path: String,
    pub allow_missing: bool,
    pub done: oneshot::Sender<DownloadOutcome>,
}

/// The single result produced for one task.
pub struct DownloadOutcome {
    pub rel_path: String,
    pub status: Result<FetchStatus, DownloadError>,
}

type SharedQueue = Arc<Mutex<mpsc::Receiver<DownloadTask>>>;

/// Shared pool of download workers.
///
/// All model builds submit into the same bounded queue, so in-flight
/// transfers are bounded by the worker count regardless of how many models
/// are building. Workers exit when the queue is closed and drained or when
/// the cancellation token fires while they are idle.
pub struct DownloadPool {
    queue: mpsc::Sender<DownloadTask>,
    cancel: CancellationToken,
}

impl DownloadPool {
    /// Spawn `workers` download workers. Must be called inside a tokio
    /// runtime.
    pub fn new(
        fetcher: Arc<AssetFetcher>,
        workers: usize,
        queue_depth: usize,
        cancel: CancellationToken,
        stats: Arc<DownloadStats>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let rx: SharedQueue = Arc::new(Mutex::new(rx));

        for _ in 0..workers.max(1) {
            tokio::spawn(worker_loop(
                Arc::clone(&rx),
                Arc::clone(&fetcher),
                cancel.clone(),
                Arc::clone(&stats),
            ));
        }

        Self { queue: tx, cancel }
    }

    /// Enqueue one task, waiting for queue space. Fails with `Cancelled` if
    /// the token fires first or the workers have already shut down.
    pub async fn submit(&self, task: DownloadTask) -> Result<(), DownloadError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(DownloadError::Cancelled),
            sent = self.queue.send(task) => sent.map_err(|_| DownloadError::Cancelled),
        }
    }
}

async fn worker_loop(
    queue: SharedQueue,
    fetcher: Arc<AssetFetcher>,
    cancel: CancellationToken,
    stats: Arc<DownloadStats>,
) {
    loop {
        let task = {
            let mut rx = queue.lock().await;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    // Answer anything still queued so every task yields its
                    // outcome, then exit.
                    while let Ok(task) = rx.try_recv() {
                        let DownloadTask { rel_path, done, .. } = task;
                        let _ = done.send(DownloadOutcome {
                            rel_path,
                            status: Err(DownloadError::Cancelled),
                        });
                    }
                    debug!("download worker exiting: cancelled");
                    return;
                }
                task = rx.recv() => task,
            }
        };

        // Queue closed and drained.
        let Some(task) = task else {
            return;
        };

        let DownloadTask {
            bundle_file,
            file_path,
            rel_path,
            allow_missing,
            done,
        } = task;

        stats.increment_workers();
        let status = fetcher
            .fetch(&bundle_file, &file_path, allow_missing, &cancel)
            .await;
        stats.decrement_workers();

        match &status {
            Ok(FetchStatus::Fetched) => stats.record_file(),
            Ok(FetchStatus::SkippedMissing) => stats.record_skipped(),
            Err(_) => {}
        }

        let _ = done.send(DownloadOutcome { rel_path, status });
    }
}
