#![forbid(unsafe_code)]

//! HTTP control surface: task lifecycle endpoints, storage listings and the
//! liveness probe.

mod auth;
mod errors;
mod handlers;
mod models;
mod router;

pub use models::{StorageObjectResponse, TaskFileResponse, TaskResponse};
pub use router::{ApiServer, ApiServerError};

use std::path::PathBuf;
use std::sync::Arc;

use lodestone_data::TaskStore;
use lodestone_downloader::DownloadManager;
use lodestone_storage::BlobStore;

/// Shared state handed to every request handler.
pub struct ApiState {
    /// Durable task repository.
    pub store: TaskStore,
    /// Scheduler driving task pipelines; `None` when no engine is wired.
    pub manager: Option<DownloadManager>,
    /// Blob store used for listings and remote deletion.
    pub blobs: Option<Arc<dyn BlobStore>>,
    /// Configured destination bucket.
    pub bucket: String,
    /// Download data root, used for local cleanup on delete.
    pub data_root: PathBuf,
    /// Optional static bearer token guarding the API.
    pub api_token: Option<String>,
}
