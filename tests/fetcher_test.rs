// Integration tests for the asset fetcher against a fake asset host.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use live2d_fetch_engine::config::Config;
use live2d_fetch_engine::engine::fetcher::{AssetFetcher, FetchStatus};
use live2d_fetch_engine::engine::stats::DownloadStats;
use live2d_fetch_engine::error::DownloadError;
use live2d_fetch_engine::model::BundleFile;

/// Serve deterministic bytes for any asset path. Paths ending in
/// `physics.json` are absent (404) and `page.bin` is the host's HTML
/// "not found" page served with status 200.
async fn serve_asset(Path(path): Path<String>) -> impl IntoResponse {
    if path.ends_with("physics.json") {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    }
    if path.ends_with("page.bin") {
        return (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            "<html>asset does not exist</html>",
        )
            .into_response();
    }
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/octet-stream")],
        path.into_bytes(),
    )
        .into_response()
}

async fn start_asset_host() -> SocketAddr {
    let app = Router::new().route("/assets/{*path}", get(serve_asset));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    addr
}

fn fetcher_for(addr: SocketAddr) -> AssetFetcher {
    let config = Config {
        base_assets_url: format!("http://{}/assets", addr),
        ..Config::default()
    };
    AssetFetcher::new(&config, Arc::new(DownloadStats::new()))
}

#[tokio::test]
async fn test_fetch_writes_file() {
    let addr = start_asset_host().await;
    let fetcher = fetcher_for(addr);
    let dir = tempfile::tempdir().unwrap();

    let bundle_file = BundleFile::new("live2d/chara/001_casual", "model.moc");
    let dest = dir.path().join("data").join("model.moc");

    let status = fetcher
        .fetch(&bundle_file, &dest, false, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(status, FetchStatus::Fetched);

    // The fake host echoes the request path as the body.
    let body = std::fs::read(&dest).unwrap();
    assert_eq!(body, b"live2d/chara/001_casual_rip/model.moc");
}

#[tokio::test]
async fn test_fetch_not_found_tolerated_for_optional_file() {
    let addr = start_asset_host().await;
    let fetcher = fetcher_for(addr);
    let dir = tempfile::tempdir().unwrap();

    let bundle_file = BundleFile::new("live2d/chara/001_casual", "physics.json");
    let dest = dir.path().join("data").join("physics.json");

    let status = fetcher
        .fetch(&bundle_file, &dest, true, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(status, FetchStatus::SkippedMissing);
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_fetch_not_found_fails_mandatory_file() {
    let addr = start_asset_host().await;
    let fetcher = fetcher_for(addr);
    let dir = tempfile::tempdir().unwrap();

    let bundle_file = BundleFile::new("live2d/chara/001_casual", "physics.json");
    let dest = dir.path().join("data").join("physics.json");

    let err = fetcher
        .fetch(&bundle_file, &dest, false, &CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        DownloadError::HttpStatus { status, .. } => {
            assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
        }
        other => panic!("expected HttpStatus, got {:?}", other),
    }
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_fetch_rejects_html_error_page() {
    let addr = start_asset_host().await;
    let fetcher = fetcher_for(addr);
    let dir = tempfile::tempdir().unwrap();

    let bundle_file = BundleFile::new("live2d/chara/001_casual", "page.bin");
    let dest = dir.path().join("data").join("page.bin");

    let err = fetcher
        .fetch(&bundle_file, &dest, false, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DownloadError::ContentMismatch { .. }));
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_fetch_observes_prior_cancellation() {
    let addr = start_asset_host().await;
    let fetcher = fetcher_for(addr);
    let dir = tempfile::tempdir().unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let bundle_file = BundleFile::new("live2d/chara/001_casual", "model.moc");
    let dest = dir.path().join("data").join("model.moc");

    let err = fetcher.fetch(&bundle_file, &dest, false, &cancel).await.unwrap_err();
    assert!(err.is_cancelled());
    assert!(!dest.exists());
}
