// Admission gate bounding the number of model builds running at once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::error::DownloadError;

/// Counting admission control of fixed capacity.
///
/// `acquire` blocks until a slot is free or the cancellation token fires.
/// The returned permit releases its slot when dropped, so every exit path of
/// the guarded section (errors, cancellation, panics) gives the slot back.
pub struct ModelGate {
    semaphore: Arc<Semaphore>,
    held: Arc<AtomicUsize>,
}

pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
    held: Arc<AtomicUsize>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.held.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ModelGate {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity.max(1))),
            held: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wait for a free slot, bailing out if cancellation fires first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<GatePermit, DownloadError> {
        let permit = tokio::select! {
            permit = self.semaphore.clone().acquire_owned() => {
                permit.map_err(|_| DownloadError::Cancelled)?
            }
            _ = cancel.cancelled() => {
                return Err(DownloadError::Cancelled);
            }
        };

        self.held.fetch_add(1, Ordering::SeqCst);
        Ok(GatePermit {
            _permit: permit,
            held: Arc::clone(&self.held),
        })
    }

    /// Number of permits currently held.
    pub fn held(&self) -> usize {
        self.held.load(Ordering::SeqCst)
    }
}
