// Admission-bound and cancellation behavior of the model gate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use live2d_fetch_engine::engine::gate::ModelGate;

#[tokio::test]
async fn test_admission_bound_holds_under_load() {
    let gate = Arc::new(ModelGate::new(3));
    let max_held = Arc::new(AtomicUsize::new(0));
    let cancel = CancellationToken::new();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let gate = Arc::clone(&gate);
        let max_held = Arc::clone(&max_held);
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            let _permit = gate.acquire(&cancel).await.unwrap();
            max_held.fetch_max(gate.held(), Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    assert!(max_held.load(Ordering::SeqCst) <= 3);
    assert!(max_held.load(Ordering::SeqCst) >= 1);
    assert_eq!(gate.held(), 0);
}

#[tokio::test]
async fn test_acquire_cancelled_while_waiting() {
    let gate = Arc::new(ModelGate::new(1));
    let cancel = CancellationToken::new();

    let held = gate.acquire(&cancel).await.unwrap();

    let waiter = {
        let gate = Arc::clone(&gate);
        let cancel = cancel.clone();
        tokio::spawn(async move { gate.acquire(&cancel).await })
    };

    // Give the waiter time to block on the full gate, then cancel.
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("waiter did not observe cancellation")
        .unwrap();
    assert!(result.is_err());

    drop(held);
    assert_eq!(gate.held(), 0);
}
