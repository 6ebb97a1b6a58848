// Progress reporting seam between the engine and whatever front-end consumes it.

use tracing::{error, info};

use crate::error::DownloadError;

/// Receives per-model progress events from the engine.
///
/// All methods are fire-and-forget: the engine never blocks on the sink and
/// implementations must not panic. Every method has a no-op default, so a
/// sink only implements the events it cares about.
pub trait ProgressSink: Send + Sync {
    /// Total number of files the named model build accounts for.
    fn on_total(&self, _model_name: &str, _total_files: usize) {}

    /// Running count of resolved files for the named model.
    fn on_progress(&self, _model_name: &str, _completed_files: usize) {}

    /// Terminal error for the named model build.
    fn on_error(&self, _model_name: &str, _error: &DownloadError) {}
}

/// Sink that discards every event.
pub struct NullProgress;

impl ProgressSink for NullProgress {}

/// Sink that mirrors progress events onto the tracing subscriber.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_total(&self, model_name: &str, total_files: usize) {
        info!("model {} needs {} files", model_name, total_files);
    }

    fn on_progress(&self, model_name: &str, completed_files: usize) {
        info!("model {} resolved {} files", model_name, completed_files);
    }

    fn on_error(&self, model_name: &str, err: &DownloadError) {
        error!("model {} failed: {}", model_name, err);
    }
}
