// Live download counters shared across the engine's workers and builders.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;

struct StatsSample {
    at: Instant,
    bytes_downloaded: u64,
}

#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub bytes_downloaded: u64,
    pub files_completed: u64,
    pub files_skipped: u64,
    pub builds_completed: u64,
    pub active_workers: u32,
    pub download_bps: u64,
}

pub struct DownloadStats {
    bytes_downloaded: AtomicU64,
    files_completed: AtomicU64,
    files_skipped: AtomicU64,
    builds_completed: AtomicU64,
    active_workers: AtomicU32,
    last_sample: Mutex<StatsSample>,
}

impl DownloadStats {
    pub fn new() -> Self {
        Self {
            bytes_downloaded: AtomicU64::new(0),
            files_completed: AtomicU64::new(0),
            files_skipped: AtomicU64::new(0),
            builds_completed: AtomicU64::new(0),
            active_workers: AtomicU32::new(0),
            last_sample: Mutex::new(StatsSample {
                at: Instant::now(),
                bytes_downloaded: 0,
            }),
        }
    }

    pub fn record_downloaded(&self, bytes: u64) {
        self.bytes_downloaded.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_file(&self) {
        self.files_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.files_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_build(&self) {
        self.builds_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_workers(&self) {
        self.active_workers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_workers(&self) {
        self.active_workers.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let now = Instant::now();
        let current_bytes = self.bytes_downloaded.load(Ordering::Relaxed);

        let download_bps = {
            let mut sample = self.last_sample.lock();
            let elapsed = now.duration_since(sample.at).as_secs_f64();

            let bps = if elapsed > 0.1 {
                ((current_bytes - sample.bytes_downloaded) as f64 / elapsed) as u64
            } else {
                0
            };

            sample.at = now;
            sample.bytes_downloaded = current_bytes;

            bps
        };

        StatsSnapshot {
            bytes_downloaded: current_bytes,
            files_completed: self.files_completed.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            builds_completed: self.builds_completed.load(Ordering::Relaxed),
            active_workers: self.active_workers.load(Ordering::Relaxed),
            download_bps,
        }
    }

    pub fn total_downloaded(&self) -> u64 {
        self.bytes_downloaded.load(Ordering::Relaxed)
    }
}

impl Default for DownloadStats {
    fn default() -> Self {
        Self::new()
    }
}
