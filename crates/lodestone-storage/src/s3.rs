//! S3-compatible blob store backend.

use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectCannedAcl, ObjectIdentifier};
use chrono::{DateTime, Utc};

use crate::{
    BlobStore, ObjectInfo, ProgressReporter, Result, StorageError, UploadOptions,
    collect_upload_entries, object_key,
};

/// Connection parameters for the S3 backend.
#[derive(Debug, Clone, Default)]
pub struct S3Config {
    /// Region handed to the client; empty defers to the environment.
    pub region: String,
    /// Custom endpoint for S3-compatible services; enables path-style
    /// addressing when set.
    pub endpoint: String,
}

/// Uploads task data to Amazon S3 or compatible APIs.
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
}

impl S3BlobStore {
    /// Build a client from the ambient AWS environment plus `config`.
    pub async fn connect(config: S3Config) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if !config.region.is_empty() {
            loader = loader.region(Region::new(config.region.clone()));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if !config.endpoint.is_empty() {
            builder = builder.endpoint_url(&config.endpoint).force_path_style(true);
        }
        Self {
            client: Client::from_conf(builder.build()),
        }
    }

    /// Wrap an already-configured client.
    #[must_use]
    pub const fn from_client(client: Client) -> Self {
        Self { client }
    }
}

fn remote_err<E>(operation: &'static str) -> impl FnOnce(E) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    move |source| StorageError::Remote {
        operation,
        detail: format!("{}", DisplayErrorContext(source)),
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
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
            let key = object_key(&prefix, &entry.rel);
            let body = ByteStream::from_path(&entry.path)
                .await
                .map_err(|source| StorageError::Io {
                    operation: "open upload file",
                    source: std::io::Error::other(source),
                })?;
            self.client
                .put_object()
                .bucket(&opts.bucket)
                .key(&key)
                .acl(ObjectCannedAcl::Private)
                .body(body)
                .send()
                .await
                .map_err(remote_err("put object"))?;
            tracing::debug!(key = %key, size = entry.size, "uploaded object");
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

        let trimmed = prefix.trim();
        let mut objects = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let mut request = self.client.list_objects_v2().bucket(bucket);
            if !trimmed.is_empty() {
                request = request.prefix(trimmed);
            }
            if let Some(continuation) = &token {
                request = request.continuation_token(continuation);
            }
            let output = request.send().await.map_err(remote_err("list objects"))?;

            for object in output.contents() {
                objects.push(ObjectInfo {
                    key: object.key().unwrap_or_default().to_string(),
                    size: object.size().unwrap_or_default(),
                    last_modified: object.last_modified().and_then(to_chrono),
                });
            }

            if !output.is_truncated().unwrap_or(false) {
                break;
            }
            match output.next_continuation_token() {
                Some(next) => token = Some(next.to_string()),
                None => break,
            }
        }

        Ok(objects)
    }

    async fn delete_prefix(&self, bucket: &str, prefix: &str) -> Result<()> {
        if bucket.is_empty() {
            return Err(StorageError::BucketRequired);
        }
        let trimmed = prefix.trim();
        if trimmed.is_empty() {
            return Err(StorageError::PrefixRequired);
        }

        let mut token: Option<String> = None;
        loop {
            let mut request = self.client.list_objects_v2().bucket(bucket).prefix(trimmed);
            if let Some(continuation) = &token {
                request = request.continuation_token(continuation);
            }
            let output = request
                .send()
                .await
                .map_err(remote_err("list objects for delete"))?;

            let mut identifiers = Vec::with_capacity(output.contents().len());
            for object in output.contents() {
                let identifier = ObjectIdentifier::builder()
                    .key(object.key().unwrap_or_default())
                    .build()
                    .map_err(remote_err("build delete identifier"))?;
                identifiers.push(identifier);
            }
            if !identifiers.is_empty() {
                let delete = Delete::builder()
                    .set_objects(Some(identifiers))
                    .quiet(true)
                    .build()
                    .map_err(remote_err("build delete request"))?;
                self.client
                    .delete_objects()
                    .bucket(bucket)
                    .delete(delete)
                    .send()
                    .await
                    .map_err(remote_err("delete objects"))?;
            }

            if !output.is_truncated().unwrap_or(false) {
                break;
            }
            match output.next_continuation_token() {
                Some(next) => token = Some(next.to_string()),
                None => break,
            }
        }

        Ok(())
    }
}

fn to_chrono(stamp: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(stamp.secs(), stamp.subsec_nanos())
}
