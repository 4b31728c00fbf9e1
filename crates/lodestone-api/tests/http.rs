//! Control-surface behaviour exercised through the router.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use lodestone_api::{ApiServer, ApiState};
use lodestone_data::TaskStore;
use lodestone_downloader::{DownloadManager, ManagerConfig};
use lodestone_storage::{BlobStore, MemoryBlobStore, UploadOptions};
use lodestone_torrent::{SwarmSnapshot, TorrentEngine, TorrentHandle, TorrentInfo};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

const BUCKET: &str = "test-bucket";

/// Engine whose torrents never resolve metadata; keeps pipelines parked.
struct ParkedEngine;

struct ParkedHandle;

#[async_trait]
impl TorrentHandle for ParkedHandle {
    async fn wait_info(&self) -> anyhow::Result<()> {
        std::future::pending::<anyhow::Result<()>>().await
    }

    fn info(&self) -> Option<TorrentInfo> {
        None
    }

    fn download_all(&self) {}

    fn snapshot(&self) -> SwarmSnapshot {
        SwarmSnapshot::default()
    }

    async fn add_trackers(&self, _trackers: &[String]) {}

    fn drop_torrent(&self) {}
}

#[async_trait]
impl TorrentEngine for ParkedEngine {
    async fn add_magnet(&self, _uri: &str) -> anyhow::Result<Arc<dyn TorrentHandle>> {
        Ok(Arc::new(ParkedHandle))
    }

    async fn close(&self) {}
}

struct Harness {
    _dir: TempDir,
    store: TaskStore,
    blobs: Arc<MemoryBlobStore>,
    data_root: PathBuf,
    manager: Option<DownloadManager>,
}

impl Harness {
    async fn new(with_manager: bool) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let data_root = dir.path().join("downloads");
        tokio::fs::create_dir_all(&data_root)
            .await
            .expect("data root");
        let store = TaskStore::connect(&dir.path().join("tasks.db"))
            .await
            .expect("open store");
        store.init().await.expect("init store");
        let blobs = Arc::new(MemoryBlobStore::new());

        let manager = if with_manager {
            let manager = DownloadManager::new(
                ManagerConfig {
                    data_root: data_root.clone(),
                    max_concurrent: 2,
                    status_interval: Duration::from_millis(25),
                    trackers: Vec::new(),
                    bucket: BUCKET.to_string(),
                    key_prefix: "magnet-tasks".to_string(),
                },
                store.clone(),
                blobs.clone(),
                Arc::new(ParkedEngine),
            );
            manager.start().await.expect("start manager");
            Some(manager)
        } else {
            None
        };

        Self {
            _dir: dir,
            store,
            blobs,
            data_root,
            manager,
        }
    }

    fn router(&self, api_token: Option<String>) -> Router {
        let state = Arc::new(ApiState {
            store: self.store.clone(),
            manager: self.manager.clone(),
            blobs: Some(self.blobs.clone() as Arc<dyn BlobStore>),
            bucket: BUCKET.to_string(),
            data_root: self.data_root.clone(),
            api_token,
        });
        ApiServer::new(state).router()
    }

    async fn seed_remote_objects(&self, prefix: &str) {
        let staging = self._dir.path().join("seed");
        tokio::fs::create_dir_all(&staging).await.expect("staging");
        tokio::fs::write(staging.join("artifact.bin"), vec![9u8; 128])
            .await
            .expect("payload");
        self.blobs
            .upload_directory(
                &staging,
                &UploadOptions {
                    bucket: BUCKET.to_string(),
                    key_prefix: prefix.to_string(),
                    progress: None,
                },
            )
            .await
            .expect("seed upload");
    }
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, body)
}

fn json_post(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

#[tokio::test]
async fn health_answers_accepted() {
    let harness = Harness::new(false).await;
    let (status, body) = send(harness.router(None), get("/api/health")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["ok"], "ok");
}

#[tokio::test]
async fn create_task_returns_accepted_view() {
    let harness = Harness::new(true).await;
    let (status, body) = send(
        harness.router(None),
        json_post(
            "/api/tasks",
            &serde_json::json!({ "magnet": "magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["id"], 1);
    assert_eq!(body["status"], "pending");
    assert!(body["local_path"].as_str().expect("path").ends_with("task-1"));

    if let Some(manager) = &harness.manager {
        manager.shutdown().await;
    }
}

#[tokio::test]
async fn create_task_rejects_blank_magnet() {
    let harness = Harness::new(true).await;
    let (status, body) = send(
        harness.router(None),
        json_post("/api/tasks", &serde_json::json!({ "magnet": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "magnet is required");

    if let Some(manager) = &harness.manager {
        manager.shutdown().await;
    }
}

#[tokio::test]
async fn create_task_without_manager_is_unavailable() {
    let harness = Harness::new(false).await;
    let (status, _) = send(
        harness.router(None),
        json_post(
            "/api/tasks",
            &serde_json::json!({ "magnet": "magnet:?xt=urn:btih:demo" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(
        harness.store.list_tasks().await.expect("list").is_empty(),
        "no row may be created when the scheduler is missing"
    );
}

#[tokio::test]
async fn get_task_validates_and_reports_missing() {
    let harness = Harness::new(false).await;
    let router = harness.router(None);

    let (status, _) = send(router.clone(), get("/api/tasks/0")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(router, get("/api/tasks/42")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "task not found");
}

#[tokio::test]
async fn list_tasks_orders_newest_first() {
    let harness = Harness::new(false).await;
    for n in 0..3 {
        harness
            .store
            .create_task(
                &format!("magnet:?xt=urn:btih:{n:040x}"),
                &harness.data_root.display().to_string(),
            )
            .await
            .expect("create");
    }

    let (status, body) = send(harness.router(None), get("/api/tasks")).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = body
        .as_array()
        .expect("array")
        .iter()
        .map(|task| task["id"].as_i64().expect("id"))
        .collect();
    assert_eq!(ids, vec![3, 2, 1]);
}

#[tokio::test]
async fn delete_with_bucket_mismatch_keeps_row() {
    let harness = Harness::new(false).await;
    let task = harness
        .store
        .create_task(
            "magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567",
            &harness.data_root.display().to_string(),
        )
        .await
        .expect("create");
    harness
        .store
        .mark_uploaded(task.id, "s3://other-bucket/magnet-tasks/task-1")
        .await
        .expect("seed location");

    let (status, body) = send(
        harness.router(None),
        delete(&format!("/api/tasks/{}?delete_remote=true", task.id)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "s3 bucket mismatch");
    assert!(harness.store.get_task(task.id).await.is_ok());
}

#[tokio::test]
async fn delete_with_matching_bucket_removes_row_and_prefix() {
    let harness = Harness::new(false).await;
    let task = harness
        .store
        .create_task(
            "magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567",
            &harness.data_root.display().to_string(),
        )
        .await
        .expect("create");
    let prefix = format!("magnet-tasks/task-{}", task.id);
    harness
        .store
        .mark_uploaded(task.id, &format!("s3://{BUCKET}/{prefix}"))
        .await
        .expect("seed location");
    harness.seed_remote_objects(&prefix).await;

    let (status, body) = send(
        harness.router(None),
        delete(&format!("/api/tasks/{}?delete_remote=true", task.id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], task.id);
    assert!(
        body.get("warnings").is_none(),
        "clean deletes omit warnings: {body}"
    );

    assert!(harness.store.get_task(task.id).await.is_err());
    assert!(harness
        .blobs
        .list_objects(BUCKET, &prefix)
        .await
        .expect("list")
        .is_empty());
}

#[tokio::test]
async fn storage_objects_endpoint_filters_by_prefix() {
    let harness = Harness::new(false).await;
    harness.seed_remote_objects("magnet-tasks/task-1").await;
    harness.seed_remote_objects("magnet-tasks/task-2").await;

    let (status, body) = send(
        harness.router(None),
        get("/api/storage/objects?prefix=magnet-tasks/task-1"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let keys: Vec<&str> = body
        .as_array()
        .expect("array")
        .iter()
        .map(|obj| obj["key"].as_str().expect("key"))
        .collect();
    assert_eq!(keys, vec!["magnet-tasks/task-1/artifact.bin"]);
}

#[tokio::test]
async fn bearer_token_guards_task_routes_but_not_health() {
    let harness = Harness::new(false).await;
    let router = harness.router(Some("sesame".to_string()));

    let (status, _) = send(router.clone(), get("/api/tasks")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let authed = Request::builder()
        .uri("/api/tasks")
        .header(header::AUTHORIZATION, "Bearer sesame")
        .body(Body::empty())
        .expect("request");
    let (status, _) = send(router.clone(), authed).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(router, get("/api/health")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
}
