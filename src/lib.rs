// Live2D model fetch engine: catalog lookup, bounded-concurrency asset
// download, and deterministic manifest assembly.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod model;
pub mod progress;

pub use config::Config;
pub use engine::service::DownloadEngine;
pub use error::DownloadError;
pub use progress::{LogProgress, NullProgress, ProgressSink};
