#![forbid(unsafe_code)]

//! Blob storage for completed downloads: directory upload, listing and
//! prefix deletion against an S3-compatible store.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

mod memory;
mod progress;
mod s3;

pub use memory::MemoryBlobStore;
pub use progress::ProgressReporter;
pub use s3::{S3BlobStore, S3Config};

use thiserror::Error;

/// Result alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Callback receiving `(done_bytes, total_bytes)` while an upload runs.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Errors raised by blob storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The destination bucket was missing from the request.
    #[error("storage bucket is required")]
    BucketRequired,
    /// The prefix was empty where one is mandatory.
    #[error("prefix is required")]
    PrefixRequired,
    /// The local path is unusable as an upload source.
    #[error("local path must be an existing directory")]
    NotADirectory {
        /// Offending path.
        path: std::path::PathBuf,
    },
    /// A filesystem operation failed.
    #[error("storage io failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// A remote call failed.
    #[error("remote storage operation failed")]
    Remote {
        /// Operation identifier.
        operation: &'static str,
        /// Backend-reported failure.
        detail: String,
    },
}

/// Metadata for one stored object.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    /// Full object key.
    pub key: String,
    /// Object size in bytes.
    pub size: i64,
    /// Last modification time when the backend reports one.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Destination and reporting knobs for a directory upload.
#[derive(Clone, Default)]
pub struct UploadOptions {
    /// Destination bucket; required.
    pub bucket: String,
    /// Key prefix objects are nested under (slashes trimmed).
    pub key_prefix: String,
    /// Invoked at most every 200 ms and exactly once at completion.
    pub progress: Option<ProgressFn>,
}

/// Uploads completed downloads to remote object storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Walk `local_dir` and upload every file under the configured prefix,
    /// preserving relative paths. Returns `s3://<bucket>/<key_prefix>`.
    async fn upload_directory(&self, local_dir: &Path, opts: &UploadOptions) -> Result<String>;

    /// List every object under `prefix` (paginated to exhaustion).
    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectInfo>>;

    /// Remove every object whose key begins with `prefix`.
    async fn delete_prefix(&self, bucket: &str, prefix: &str) -> Result<()>;
}

/// One file selected for upload, with its key-relative path.
#[derive(Debug, Clone)]
pub(crate) struct UploadEntry {
    pub(crate) path: std::path::PathBuf,
    pub(crate) rel: String,
    pub(crate) size: u64,
}

/// Collect regular files below `root` with slash-normalised relative paths.
pub(crate) fn collect_upload_entries(root: &Path) -> Result<Vec<UploadEntry>> {
    if !root.is_dir() {
        return Err(StorageError::NotADirectory {
            path: root.to_path_buf(),
        });
    }

    let mut entries = Vec::new();
    for entry in walkdir::WalkDir::new(root) {
        let entry = entry.map_err(|err| StorageError::Io {
            operation: "walk upload directory",
            source: err
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("walk aborted")),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(|_| StorageError::Io {
                operation: "relativise upload path",
                source: std::io::Error::other("path escaped upload root"),
            })?;
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let size = entry
            .metadata()
            .map_err(|err| StorageError::Io {
                operation: "stat upload file",
                source: err
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("metadata unavailable")),
            })?
            .len();
        entries.push(UploadEntry {
            path: entry.path().to_path_buf(),
            rel,
            size,
        });
    }
    entries.sort_by(|a, b| a.rel.cmp(&b.rel));
    Ok(entries)
}

/// Join a trimmed prefix with a relative key.
pub(crate) fn object_key(prefix: &str, rel: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        rel.to_string()
    } else if rel.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}/{rel}")
    }
}
