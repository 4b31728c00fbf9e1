//! In-memory blob store used by tests and offline runs.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    BlobStore, ObjectInfo, ProgressReporter, Result, StorageError, UploadOptions,
    collect_upload_entries, object_key,
};

type Object = (Vec<u8>, DateTime<Utc>);

/// Map-backed [`BlobStore`] with the same key semantics as the S3 backend.
#[derive(Default)]
pub struct MemoryBlobStore {
    buckets: RwLock<BTreeMap<String, BTreeMap<String, Object>>>,
}

impl MemoryBlobStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch one object's bytes, if present.
    pub async fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        let buckets = self.buckets.read().await;
        buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|(data, _)| data.clone())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload_directory(&self, local_dir: &Path, opts: &UploadOptions) -> Result<String> {
        if opts.bucket.is_empty() {
            return Err(StorageError::BucketRequired);
        }
        let entries = collect_upload_entries(local_dir)?;
        let total: u64 = entries.iter().map(|entry| entry.size).sum();
        let reporter = opts
            .progress
            .clone()
            .map(|callback| ProgressReporter::new(total, callback));

        let prefix = opts.key_prefix.trim_matches('/').to_string();
        for entry in entries {
            let data = tokio::fs::read(&entry.path)
                .await
                .map_err(|source| StorageError::Io {
                    operation: "read upload file",
                    source,
                })?;
            let key = object_key(&prefix, &entry.rel);
            let mut buckets = self.buckets.write().await;
            buckets
                .entry(opts.bucket.clone())
                .or_default()
                .insert(key, (data, Utc::now()));
            drop(buckets);
            if let Some(reporter) = reporter.as_ref() {
                reporter.add(entry.size);
            }
        }

        if let Some(reporter) = reporter.as_ref() {
            reporter.flush();
        }
        Ok(format!("s3://{}/{}", opts.bucket, prefix))
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectInfo>> {
        if bucket.is_empty() {
            return Err(StorageError::BucketRequired);
        }
        let buckets = self.buckets.read().await;
        let Some(objects) = buckets.get(bucket) else {
            return Ok(Vec::new());
        };
        Ok(objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, (data, modified))| ObjectInfo {
                key: key.clone(),
                size: data.len() as i64,
                last_modified: Some(*modified),
            })
            .collect())
    }

    async fn delete_prefix(&self, bucket: &str, prefix: &str) -> Result<()> {
        if bucket.is_empty() {
            return Err(StorageError::BucketRequired);
        }
        let trimmed = prefix.trim();
        if trimmed.is_empty() {
            return Err(StorageError::PrefixRequired);
        }
        let mut buckets = self.buckets.write().await;
        if let Some(objects) = buckets.get_mut(bucket) {
            objects.retain(|key, _| !key.starts_with(trimmed));
        }
        Ok(())
    }
}
