//! Service wiring and the application run loop.

use std::path::PathBuf;
use std::sync::Arc;

use lodestone_api::{ApiServer, ApiState};
use lodestone_config::Settings;
use lodestone_data::TaskStore;
use lodestone_downloader::DownloadManager;
use lodestone_storage::{BlobStore, S3BlobStore, S3Config};
use lodestone_telemetry::LoggingConfig;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

/// Bootstrap the service and block until shutdown.
///
/// # Errors
///
/// Returns an error if configuration, persistence or the API listener fail
/// to come up.
pub async fn run_app() -> AppResult<()> {
    lodestone_telemetry::init_logging(&LoggingConfig::default())
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;

    let settings = Settings::load().map_err(|err| AppError::config("settings.load", err))?;
    settings
        .validate()
        .map_err(|err| AppError::config("settings.validate", err))?;
    let addr = settings
        .socket_addr()
        .map_err(|err| AppError::config("settings.addr", err))?;

    info!(
        bucket = %settings.storage.bucket,
        data_dir = %settings.download.data_dir,
        "lodestone starting"
    );

    let db_path = PathBuf::from(&settings.database.path);
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| AppError::Io {
                    operation: "create database dir",
                    path: Some(parent.to_path_buf()),
                    source,
                })?;
        }
    }
    let store = TaskStore::connect(&db_path)
        .await
        .map_err(|err| AppError::data("store.connect", err))?;
    store
        .init()
        .await
        .map_err(|err| AppError::data("store.init", err))?;

    let blobs: Arc<dyn BlobStore> = Arc::new(
        S3BlobStore::connect(S3Config {
            region: settings.storage.region.clone(),
            endpoint: settings.storage.endpoint.clone(),
        })
        .await,
    );

    let manager = build_manager(&settings, &store, &blobs).await?;
    if let Some(manager) = &manager {
        manager
            .start()
            .await
            .map_err(|err| AppError::manager("manager.start", err))?;
        if let Err(err) = manager.resume().await {
            warn!(error = %err, "resume sweep failed");
        }
    }

    let state = Arc::new(ApiState {
        store,
        manager: manager.clone(),
        blobs: Some(blobs),
        bucket: settings.storage.bucket.clone(),
        data_root: PathBuf::from(&settings.download.data_dir),
        api_token: settings.auth.api_token.clone(),
    });

    let api = ApiServer::new(state);
    api.serve_with_shutdown(addr, shutdown_signal())
        .await
        .map_err(|err| AppError::api_server("api_server.serve", err))?;

    info!("shutting down");
    if let Some(manager) = manager {
        manager.shutdown().await;
    }
    info!("bye");
    Ok(())
}

#[cfg(feature = "rqbit")]
async fn build_manager(
    settings: &Settings,
    store: &TaskStore,
    blobs: &Arc<dyn BlobStore>,
) -> AppResult<Option<DownloadManager>> {
    use lodestone_torrent::TorrentEngine;
    use lodestone_torrent_rqbit::RqbitEngine;

    let data_root = PathBuf::from(&settings.download.data_dir);
    tokio::fs::create_dir_all(&data_root)
        .await
        .map_err(|source| AppError::Io {
            operation: "create data root",
            path: Some(data_root.clone()),
            source,
        })?;
    let engine: Arc<dyn TorrentEngine> = Arc::new(
        RqbitEngine::new(data_root.clone())
            .await
            .map_err(|source| AppError::Engine {
                operation: "rqbit.session",
                source: source.into(),
            })?,
    );

    Ok(Some(DownloadManager::new(
        manager_config(settings, data_root),
        store.clone(),
        Arc::clone(blobs),
        engine,
    )))
}

#[cfg(not(feature = "rqbit"))]
async fn build_manager(
    _settings: &Settings,
    _store: &TaskStore,
    _blobs: &Arc<dyn BlobStore>,
) -> AppResult<Option<DownloadManager>> {
    warn!("built without a torrent engine; task execution is disabled");
    Ok(None)
}

#[cfg(feature = "rqbit")]
fn manager_config(settings: &Settings, data_root: PathBuf) -> lodestone_downloader::ManagerConfig {
    lodestone_downloader::ManagerConfig {
        data_root,
        max_concurrent: settings.download.max_concurrent,
        status_interval: settings.status_interval(),
        trackers: settings.download.trackers.clone(),
        bucket: settings.storage.bucket.clone(),
        key_prefix: settings.storage.key_prefix.clone(),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
    }
}
