//! Request handlers for the task and storage endpoints.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::{Path as AxumPath, Query, State};
use axum::http::StatusCode;
use lodestone_data::DataError;
use lodestone_torrent::magnet::info_hash_from_magnet;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::ApiState;
use crate::errors::ApiError;
use crate::models::{CreateTaskRequest, StorageObjectResponse, TaskResponse};

/// Bound on how long a delete waits for the task's pipeline to exit.
const CANCEL_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) async fn health() -> (StatusCode, Json<Value>) {
    (StatusCode::ACCEPTED, Json(json!({ "ok": "ok" })))
}

pub(crate) async fn create_task(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskResponse>), ApiError> {
    let magnet = request.magnet.trim();
    if magnet.is_empty() {
        return Err(ApiError::bad_request("magnet is required"));
    }
    let Some(manager) = state.manager.as_ref() else {
        return Err(ApiError::service_unavailable(
            "download manager not configured",
        ));
    };

    let task = state
        .store
        .create_task(magnet, &state.data_root.display().to_string())
        .await
        .map_err(|err| {
            warn!(error = %err, "failed to create task");
            ApiError::internal("could not create task")
        })?;

    manager.enqueue(task.id).await.map_err(|err| {
        warn!(error = %err, task_id = task.id, "failed to enqueue task");
        ApiError::internal("could not enqueue task")
    })?;

    info!(task_id = task.id, "task submitted");
    Ok((StatusCode::ACCEPTED, Json(TaskResponse::from(task))))
}

pub(crate) async fn list_tasks(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<Vec<TaskResponse>>, ApiError> {
    let tasks = state.store.list_tasks().await.map_err(|err| {
        warn!(error = %err, "failed to list tasks");
        ApiError::internal("could not list tasks")
    })?;
    Ok(Json(tasks.into_iter().map(TaskResponse::from).collect()))
}

pub(crate) async fn get_task(
    State(state): State<Arc<ApiState>>,
    AxumPath(id): AxumPath<i64>,
) -> Result<Json<TaskResponse>, ApiError> {
    if id <= 0 {
        return Err(ApiError::bad_request("invalid task id"));
    }
    let task = state.store.get_task(id).await.map_err(task_fetch_error)?;
    Ok(Json(TaskResponse::from(task)))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DeleteTaskQuery {
    #[serde(default)]
    delete_remote: bool,
}

pub(crate) async fn delete_task(
    State(state): State<Arc<ApiState>>,
    AxumPath(id): AxumPath<i64>,
    Query(query): Query<DeleteTaskQuery>,
) -> Result<Json<Value>, ApiError> {
    if id <= 0 {
        return Err(ApiError::bad_request("invalid task id"));
    }
    let task = state.store.get_task(id).await.map_err(task_fetch_error)?;

    let mut warnings = Vec::new();
    if let Some(manager) = state.manager.as_ref() {
        if let Err(err) = manager.cancel(task.id, CANCEL_TIMEOUT).await {
            warnings.push(format!("cancel task: {err}"));
        }
    }

    if query.delete_remote {
        let Some(blobs) = state.blobs.as_ref() else {
            return Err(ApiError::bad_request("storage service not configured"));
        };
        if state.bucket.is_empty() {
            return Err(ApiError::bad_request("storage service not configured"));
        }
        if !task.s3_location.is_empty() {
            let prefix = extract_s3_prefix(&task.s3_location, &state.bucket)
                .map_err(ApiError::bad_request)?;
            if !prefix.is_empty() {
                if let Err(err) = blobs.delete_prefix(&state.bucket, &prefix).await {
                    warnings.push(format!("delete remote data: {err}"));
                }
            }
        }
    }

    warnings.extend(cleanup_local_data(&state.data_root, &task.local_path, &task.magnet_uri).await);

    state.store.delete_task(task.id).await.map_err(|err| {
        warn!(error = %err, task_id = task.id, "failed to delete task row");
        ApiError::internal("could not delete task")
    })?;

    info!(task_id = task.id, "task deleted");
    let mut body = json!({ "deleted": task.id });
    if !warnings.is_empty() {
        body["warnings"] = json!(warnings);
    }
    Ok(Json(body))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListObjectsQuery {
    #[serde(default)]
    prefix: String,
}

pub(crate) async fn list_objects(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<ListObjectsQuery>,
) -> Result<Json<Vec<StorageObjectResponse>>, ApiError> {
    let Some(blobs) = state.blobs.as_ref() else {
        return Err(ApiError::internal("storage service not configured"));
    };
    if state.bucket.is_empty() {
        return Err(ApiError::internal("storage service not configured"));
    }

    let objects = blobs
        .list_objects(&state.bucket, &query.prefix)
        .await
        .map_err(|err| {
            warn!(error = %err, "failed to list objects");
            ApiError::internal("could not list objects")
        })?;
    Ok(Json(
        objects
            .into_iter()
            .map(StorageObjectResponse::from)
            .collect(),
    ))
}

fn task_fetch_error(err: DataError) -> ApiError {
    match err {
        DataError::NotFound { .. } => ApiError::not_found("task not found"),
        other => {
            warn!(error = %other, "failed to load task");
            ApiError::internal("could not load task")
        }
    }
}

/// Remove local artifacts for a deleted task: the recorded staging path plus
/// the info-hash directory some engines create under the data root. Paths
/// derived from the magnet are confined to the data root.
async fn cleanup_local_data(data_root: &Path, local_path: &str, magnet: &str) -> Vec<String> {
    let mut warnings = Vec::new();
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut targets: Vec<PathBuf> = Vec::new();

    if !local_path.is_empty() {
        let candidate = PathBuf::from(local_path);
        if candidate != data_root {
            targets.push(candidate);
        }
    }
    if let Ok(info_hash) = info_hash_from_magnet(magnet) {
        let candidate = data_root.join(info_hash);
        if candidate.strip_prefix(data_root).is_ok() && candidate != data_root {
            targets.push(candidate);
        }
    }

    for target in targets {
        if !seen.insert(target.clone()) {
            continue;
        }
        match tokio::fs::remove_dir_all(&target).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(dir_err) => {
                // A staged single file is not a directory; retry as a file.
                match tokio::fs::remove_file(&target).await {
                    Ok(()) => {}
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                    Err(_) => {
                        warnings.push(format!(
                            "remove local data {}: {dir_err}",
                            target.display()
                        ));
                    }
                }
            }
        }
    }

    warnings
}

/// Split an `s3://bucket/prefix` URL, enforcing a bucket match.
fn extract_s3_prefix(location: &str, bucket: &str) -> Result<String, String> {
    let Some(rest) = location.strip_prefix("s3://") else {
        return Err("invalid s3 location".to_string());
    };
    let (found_bucket, prefix) = match rest.split_once('/') {
        Some((found_bucket, prefix)) => (found_bucket, prefix),
        None => (rest, ""),
    };
    if found_bucket.is_empty() {
        return Err("invalid s3 location".to_string());
    }
    if !bucket.is_empty() && found_bucket != bucket {
        return Err("s3 bucket mismatch".to_string());
    }
    if prefix.is_empty() {
        return Err("s3 prefix missing".to_string());
    }
    Ok(prefix.trim_start_matches('/').to_string())
}
