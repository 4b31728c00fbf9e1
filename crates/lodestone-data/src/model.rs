//! Task aggregate and per-file metadata models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a download task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Created, not yet picked up by a pipeline.
    Pending,
    /// A pipeline is fetching bytes from the swarm.
    Downloading,
    /// Held by the operator; not scheduled.
    Paused,
    /// All bytes on disk, upload not started.
    Downloaded,
    /// Mirroring the staged payload to the object store.
    Uploading,
    /// Uploaded; the remote location is authoritative.
    Completed,
    /// Terminally failed; `error_message` carries the reason.
    Failed,
}

impl TaskStatus {
    /// Lowercase label stored in the database and rendered over the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Paused => "paused",
            Self::Downloaded => "downloaded",
            Self::Uploading => "uploading",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse a stored label, tolerating unknown values.
    #[must_use]
    pub fn parse(label: &str) -> Self {
        match label {
            "pending" => Self::Pending,
            "downloading" => Self::Downloading,
            "paused" => Self::Paused,
            "downloaded" => Self::Downloaded,
            "uploading" => Self::Uploading,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            other => {
                tracing::warn!(status = %other, "unknown task status in store");
                Self::Failed
            }
        }
    }
}

/// A magnet download task tracked by the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Monotonically assigned row id.
    pub id: i64,
    /// Magnet URI as submitted.
    pub magnet_uri: String,
    /// Current lifecycle state.
    pub status: TaskStatus,
    /// Download progress, 0..=100.
    pub progress: i64,
    /// Most recent observed byte rate in bytes per second.
    pub speed: i64,
    /// Bytes downloaded so far.
    pub downloaded_bytes: i64,
    /// Total payload size; zero until metainfo resolves.
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
    /// Display name reported by the torrent engine.
    pub torrent_name: String,
    /// On-disk staging location for this task.
    pub local_path: String,
    /// Final object-store URL (`s3://bucket/prefix`), empty until completed.
    pub s3_location: String,
    /// Last failure reason; empty on success paths.
    pub error_message: String,
    /// Creation timestamp (UTC).
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp (UTC).
    pub updated_at: DateTime<Utc>,
    /// First time the payload finished downloading.
    pub downloaded_at: Option<DateTime<Utc>>,
    /// Time the payload finished uploading.
    pub uploaded_at: Option<DateTime<Utc>>,
    /// Files discovered in the torrent.
    pub files: Vec<TaskFile>,
}

/// An individual file discovered within a torrent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFile {
    /// Row id.
    pub id: i64,
    /// Owning task.
    pub task_id: i64,
    /// Display name.
    pub name: String,
    /// Path relative to the torrent root.
    pub relative_path: String,
    /// File size in bytes.
    pub size: i64,
    /// Download priority, at least 1.
    pub priority: i64,
}

/// File metadata to persist for a task (ids are assigned on insert).
#[derive(Debug, Clone)]
pub struct NewTaskFile {
    /// Display name.
    pub name: String,
    /// Path relative to the torrent root.
    pub relative_path: String,
    /// File size in bytes.
    pub size: i64,
    /// Download priority, at least 1.
    pub priority: i64,
}

/// One progress snapshot persisted per status tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressUpdate {
    /// Download progress, 0..=100.
    pub progress: i64,
    /// Observed byte rate in bytes per second.
    pub speed: i64,
    /// Bytes downloaded so far.
    pub downloaded_bytes: i64,
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_labels_round_trip() {
        let variants = [
            TaskStatus::Pending,
            TaskStatus::Downloading,
            TaskStatus::Paused,
            TaskStatus::Downloaded,
            TaskStatus::Uploading,
            TaskStatus::Completed,
            TaskStatus::Failed,
        ];
        for status in variants {
            assert_eq!(TaskStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn unknown_status_label_degrades_to_failed() {
        assert_eq!(TaskStatus::parse("seeding"), TaskStatus::Failed);
    }

    #[test]
    fn status_serialises_lowercase() {
        let json = serde_json::to_string(&TaskStatus::Downloading).expect("serialise");
        assert_eq!(json, "\"downloading\"");
    }
}
