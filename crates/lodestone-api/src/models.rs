//! Wire-facing view models for tasks and storage objects.

use chrono::{DateTime, SecondsFormat, Utc};
use lodestone_data::{Task, TaskFile, TaskStatus};
use lodestone_storage::ObjectInfo;
use serde::{Deserialize, Serialize};

/// Body of `POST /api/tasks`.
#[derive(Debug, Deserialize)]
pub(crate) struct CreateTaskRequest {
    /// Magnet URI to download.
    pub(crate) magnet: String,
}

/// JSON view of a task.
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    /// Task identifier.
    pub id: i64,
    /// Magnet URI as submitted.
    pub magnet: String,
    /// Lowercase lifecycle state.
    pub status: TaskStatus,
    /// Download progress, 0..=100.
    pub progress: i64,
    /// Most recent byte rate in bytes per second.
    pub speed: i64,
    /// Bytes downloaded so far.
    pub downloaded_bytes: i64,
    /// Total payload size in bytes.
    pub total_size: i64,
    /// Peers known to the swarm.
    pub total_peers: i64,
    /// Peers with an active connection.
    pub active_peers: i64,
    /// Peers queued for connection attempts.
    pub pending_peers: i64,
    /// Connected peers that are seeding.
    pub connected_seeders: i64,
    /// Connections currently mid-handshake.
    pub half_open_peers: i64,
    /// Display name reported by the engine.
    pub torrent_name: String,
    /// Local staging path.
    pub local_path: String,
    /// Remote location once completed.
    pub s3_location: String,
    /// Last failure reason.
    pub error_message: String,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// RFC 3339 last update time.
    pub updated_at: String,
    /// RFC 3339 download completion time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloaded_at: Option<String>,
    /// RFC 3339 upload completion time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<String>,
    /// Files discovered in the torrent.
    pub files: Vec<TaskFileResponse>,
}

/// JSON view of one torrent file.
#[derive(Debug, Serialize)]
pub struct TaskFileResponse {
    /// Row identifier.
    pub id: i64,
    /// Owning task.
    pub task_id: i64,
    /// Display name.
    pub name: String,
    /// Path relative to the torrent root.
    pub relative_path: String,
    /// Size in bytes.
    pub size: i64,
    /// Download priority.
    pub priority: i64,
}

/// JSON view of one stored object.
#[derive(Debug, Serialize)]
pub struct StorageObjectResponse {
    /// Full object key.
    pub key: String,
    /// Object size in bytes.
    pub size: i64,
    /// RFC 3339 modification time when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

fn rfc3339(stamp: DateTime<Utc>) -> String {
    stamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            magnet: task.magnet_uri,
            status: task.status,
            progress: task.progress,
            speed: task.speed,
            downloaded_bytes: task.downloaded_bytes,
            total_size: task.total_size,
            total_peers: task.total_peers,
            active_peers: task.active_peers,
            pending_peers: task.pending_peers,
            connected_seeders: task.connected_seeders,
            half_open_peers: task.half_open_peers,
            torrent_name: task.torrent_name,
            local_path: task.local_path,
            s3_location: task.s3_location,
            error_message: task.error_message,
            created_at: rfc3339(task.created_at),
            updated_at: rfc3339(task.updated_at),
            downloaded_at: task.downloaded_at.map(rfc3339),
            uploaded_at: task.uploaded_at.map(rfc3339),
            files: task.files.into_iter().map(TaskFileResponse::from).collect(),
        }
    }
}

impl From<TaskFile> for TaskFileResponse {
    fn from(file: TaskFile) -> Self {
        Self {
            id: file.id,
            task_id: file.task_id,
            name: file.name,
            relative_path: file.relative_path,
            size: file.size,
            priority: file.priority,
        }
    }
}

impl From<ObjectInfo> for StorageObjectResponse {
    fn from(object: ObjectInfo) -> Self {
        Self {
            key: object.key,
            size: object.size,
            last_modified: object.last_modified.map(rfc3339),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_task() -> Task {
        Task {
            id: 1,
            magnet_uri: "magnet:?xt=urn:btih:demo".to_string(),
            status: TaskStatus::Downloading,
            progress: 40,
            speed: 1024,
            downloaded_bytes: 400,
            total_size: 1000,
            total_peers: 5,
            active_peers: 3,
            pending_peers: 1,
            connected_seeders: 2,
            half_open_peers: 0,
            torrent_name: "demo".to_string(),
            local_path: "/data/demo".to_string(),
            s3_location: String::new(),
            error_message: String::new(),
            created_at: Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2025, 5, 1, 12, 5, 0).unwrap(),
            downloaded_at: None,
            uploaded_at: None,
            files: vec![TaskFile {
                id: 9,
                task_id: 1,
                name: "demo.bin".to_string(),
                relative_path: "demo.bin".to_string(),
                size: 1000,
                priority: 1,
            }],
        }
    }

    #[test]
    fn task_view_uses_rfc3339_and_lowercase_status() {
        let view = TaskResponse::from(sample_task());
        let json = serde_json::to_value(&view).expect("serialise");
        assert_eq!(json["status"], "downloading");
        assert_eq!(json["created_at"], "2025-05-01T12:00:00Z");
        assert_eq!(json["magnet"], "magnet:?xt=urn:btih:demo");
        assert_eq!(json["files"][0]["relative_path"], "demo.bin");
        assert!(json.get("downloaded_at").is_none());
    }

    #[test]
    fn optional_timestamps_appear_once_set() {
        let mut task = sample_task();
        task.downloaded_at = Some(Utc.with_ymd_and_hms(2025, 5, 1, 13, 0, 0).unwrap());
        let json = serde_json::to_value(TaskResponse::from(task)).expect("serialise");
        assert_eq!(json["downloaded_at"], "2025-05-01T13:00:00Z");
    }
}
