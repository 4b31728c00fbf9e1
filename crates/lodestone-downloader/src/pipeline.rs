//! Per-task pipeline: the download-then-upload state machine.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lodestone_data::{NewTaskFile, ProgressUpdate, Task, TaskStatus};
use lodestone_storage::{ProgressFn, UploadOptions};
use lodestone_torrent::TorrentHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::manager::Inner;

/// Minimum interval between upload progress log lines.
const UPLOAD_LOG_INTERVAL: Duration = Duration::from_millis(500);

/// Tagged result of one pipeline phase. A single dispatcher persists the
/// `failed` transition so status writes stay auditable.
enum PhaseOutcome {
    /// The phase finished; the next one may run.
    Advanced,
    /// The phase exited without a terminal effect (cancellation, or a status
    /// write that must be retried by the next resume sweep).
    Stopped,
    /// Unrecoverable failure; the task transitions to `failed`.
    Failed(String),
}

/// Drops the torrent handle when the download phase exits on any path.
struct HandleGuard(Arc<dyn TorrentHandle>);

impl Drop for HandleGuard {
    fn drop(&mut self) {
        self.0.drop_torrent();
    }
}

/// Drive one task through its state machine. Runs under a semaphore permit
/// held by the caller.
pub(crate) async fn run(inner: &Inner, mut task: Task, cancel: &CancellationToken) {
    let outcome = match task.status {
        TaskStatus::Completed => {
            debug!(task_id = task.id, "task already completed, skipping");
            return;
        }
        TaskStatus::Downloaded | TaskStatus::Uploading => {
            info!(task_id = task.id, "resuming upload");
            upload_phase(inner, &mut task, cancel).await
        }
        _ => match download_phase(inner, &mut task, cancel).await {
            PhaseOutcome::Advanced => upload_phase(inner, &mut task, cancel).await,
            other => other,
        },
    };

    if let PhaseOutcome::Failed(message) = outcome {
        fail_task(inner, task.id, &message).await;
    }
}

async fn download_phase(
    inner: &Inner,
    task: &mut Task,
    cancel: &CancellationToken,
) -> PhaseOutcome {
    let task_id = task.id;
    if let Err(err) = inner
        .store
        .update_status(task_id, TaskStatus::Downloading, None)
        .await
    {
        error!(task_id, error = %err, "failed to persist downloading status");
        return PhaseOutcome::Stopped;
    }
    task.status = TaskStatus::Downloading;

    let handle = match inner.engine.add_magnet(&task.magnet_uri).await {
        Ok(handle) => handle,
        Err(err) => return PhaseOutcome::Failed(format!("add magnet: {err:#}")),
    };
    let _guard = HandleGuard(Arc::clone(&handle));
    inner.attach_handle(task_id, Arc::clone(&handle));

    handle.add_trackers(&inner.cfg.trackers).await;

    tokio::select! {
        () = cancel.cancelled() => {
            info!(task_id, "task cancelled before fetching metadata");
            return PhaseOutcome::Stopped;
        }
        resolved = handle.wait_info() => {
            if let Err(err) = resolved {
                return PhaseOutcome::Failed(format!("await metadata: {err:#}"));
            }
        }
    }

    let Some(torrent) = handle.info() else {
        return PhaseOutcome::Failed("missing torrent info".to_string());
    };

    let local_path = inner.cfg.data_root.join(&torrent.name);
    task.torrent_name = torrent.name.clone();
    task.local_path = local_path.display().to_string();
    task.total_size = torrent.total_length;
    if let Err(err) = inner
        .store
        .update_download_info(task_id, &torrent.name, &task.local_path, torrent.total_length)
        .await
    {
        error!(task_id, error = %err, "failed to persist download info");
    }

    let files: Vec<NewTaskFile> = torrent
        .files
        .iter()
        .map(|file| NewTaskFile {
            name: file.display_path.clone(),
            relative_path: file.relative_path.clone(),
            size: file.length,
            priority: file.priority.max(1),
        })
        .collect();
    if let Err(err) = inner.store.replace_files(task_id, &files).await {
        warn!(task_id, error = %err, "failed to persist file list");
    }

    handle.download_all();

    let mut last_bytes: i64 = 0;
    let mut last_tick = Instant::now();
    let mut ticker = tokio::time::interval_at(
        tokio::time::Instant::now() + inner.cfg.status_interval,
        inner.cfg.status_interval,
    );
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                info!(task_id, "task cancelled");
                return PhaseOutcome::Stopped;
            }
            _ = ticker.tick() => {}
        }

        let snapshot = handle.snapshot();
        let progress = if task.total_size > 0 {
            snapshot.bytes_completed * 100 / task.total_size
        } else {
            0
        };
        let elapsed = last_tick.elapsed().as_secs_f64();
        let speed = if elapsed > 0.0 {
            (((snapshot.bytes_completed - last_bytes) as f64) / elapsed).max(0.0) as i64
        } else {
            0
        };
        last_bytes = snapshot.bytes_completed;
        last_tick = Instant::now();

        let update = ProgressUpdate {
            progress,
            speed,
            downloaded_bytes: snapshot.bytes_completed,
            total_peers: snapshot.total_peers,
            active_peers: snapshot.active_peers,
            pending_peers: snapshot.pending_peers,
            connected_seeders: snapshot.connected_seeders,
            half_open_peers: snapshot.half_open_peers,
        };
        if let Err(err) = inner.store.update_progress(task_id, &update).await {
            warn!(task_id, error = %err, "failed to persist progress");
        }

        if progress >= 100 || snapshot.bytes_missing == 0 {
            if let Err(err) = inner.store.mark_downloaded(task_id).await {
                warn!(task_id, error = %err, "failed to mark downloaded");
            }
            task.status = TaskStatus::Downloaded;
            info!(task_id, "download completed");
            return PhaseOutcome::Advanced;
        }
    }
}

async fn upload_phase(inner: &Inner, task: &mut Task, cancel: &CancellationToken) -> PhaseOutcome {
    let task_id = task.id;
    if let Err(err) = inner
        .store
        .update_status(task_id, TaskStatus::Uploading, None)
        .await
    {
        error!(task_id, error = %err, "failed to persist uploading status");
        return PhaseOutcome::Stopped;
    }
    task.status = TaskStatus::Uploading;

    let mut local_path = if task.local_path.is_empty() {
        inner.cfg.data_root.join(format!("task-{task_id}"))
    } else {
        PathBuf::from(&task.local_path)
    };

    let metadata = match tokio::fs::metadata(&local_path).await {
        Ok(metadata) => metadata,
        Err(err) => {
            // The engine may have materialised the payload under the torrent
            // name rather than the recorded path.
            let fallback = inner.cfg.data_root.join(&task.torrent_name);
            if task.torrent_name.is_empty() || fallback == local_path {
                return PhaseOutcome::Failed(format!("local data missing: {err}"));
            }
            match tokio::fs::metadata(&fallback).await {
                Ok(metadata) => {
                    local_path = fallback;
                    task.local_path = local_path.display().to_string();
                    if let Err(err) = inner
                        .store
                        .update_download_info(
                            task_id,
                            &task.torrent_name,
                            &task.local_path,
                            task.total_size,
                        )
                        .await
                    {
                        warn!(task_id, error = %err, "failed to refresh local path");
                    }
                    metadata
                }
                Err(_) => return PhaseOutcome::Failed(format!("local data missing: {err}")),
            }
        }
    };

    if metadata.is_file() {
        match stage_single_file(&inner.cfg.data_root, task_id, &local_path).await {
            Ok(staging_dir) => {
                local_path = staging_dir;
                task.local_path = local_path.display().to_string();
                if let Err(err) = inner
                    .store
                    .update_download_info(
                        task_id,
                        &task.torrent_name,
                        &task.local_path,
                        task.total_size,
                    )
                    .await
                {
                    warn!(task_id, error = %err, "failed to refresh staging path");
                }
            }
            Err(message) => return PhaseOutcome::Failed(message),
        }
    }

    let trimmed = inner.cfg.key_prefix.trim_matches('/');
    let key_prefix = if trimmed.is_empty() {
        format!("task-{task_id}")
    } else {
        format!("{trimmed}/task-{task_id}")
    };

    let opts = UploadOptions {
        bucket: inner.cfg.bucket.clone(),
        key_prefix,
        progress: Some(upload_progress_logger(task_id)),
    };

    info!(task_id, path = %local_path.display(), "upload started");

    let destination = tokio::select! {
        () = cancel.cancelled() => {
            info!(task_id, "task cancelled during upload");
            return PhaseOutcome::Stopped;
        }
        uploaded = inner.blobs.upload_directory(&local_path, &opts) => match uploaded {
            Ok(destination) => destination,
            Err(err) => {
                if cancel.is_cancelled() {
                    info!(task_id, "task cancelled during upload");
                    return PhaseOutcome::Stopped;
                }
                return PhaseOutcome::Failed(format!("upload: {err}"));
            }
        }
    };

    if let Err(err) = inner.store.mark_uploaded(task_id, &destination).await {
        error!(task_id, error = %err, "failed to mark uploaded");
        return PhaseOutcome::Stopped;
    }
    task.status = TaskStatus::Completed;

    if let Err(err) = tokio::fs::remove_dir_all(&local_path).await {
        warn!(task_id, error = %err, "failed to clean staged data");
    }

    info!(task_id, destination = %destination, "task completed");
    PhaseOutcome::Advanced
}

/// Move a single-file payload into `data_root/task-<id>/` so the uploader
/// always walks a directory. Falls back to copy-then-delete when rename
/// crosses filesystems.
async fn stage_single_file(
    data_root: &Path,
    task_id: i64,
    source: &Path,
) -> std::result::Result<PathBuf, String> {
    let staging_dir = data_root.join(format!("task-{task_id}"));
    tokio::fs::create_dir_all(&staging_dir)
        .await
        .map_err(|err| format!("create staging dir: {err}"))?;

    let file_name = source
        .file_name()
        .ok_or_else(|| "prepare upload data: source has no file name".to_string())?;
    let dest = staging_dir.join(file_name);

    if tokio::fs::rename(source, &dest).await.is_err() {
        copy_durable(source, &dest)
            .await
            .map_err(|err| format!("prepare upload data: {err}"))?;
        if let Err(err) = tokio::fs::remove_file(source).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(task_id, error = %err, "failed to remove original after copy");
            }
        }
    }

    Ok(staging_dir)
}

async fn copy_durable(source: &Path, dest: &Path) -> std::io::Result<()> {
    let mut reader = tokio::fs::File::open(source).await?;
    let mut writer = tokio::fs::File::create(dest).await?;
    tokio::io::copy(&mut reader, &mut writer).await?;
    writer.sync_all().await?;
    Ok(())
}

async fn fail_task(inner: &Inner, task_id: i64, message: &str) {
    if let Err(err) = inner
        .store
        .update_status(task_id, TaskStatus::Failed, Some(message))
        .await
    {
        error!(task_id, error = %err, "failed to persist failure status");
    }
    error!(task_id, "{message}");
}

/// Progress callback that logs upload advancement on a bounded cadence.
fn upload_progress_logger(task_id: i64) -> ProgressFn {
    let last_log: Mutex<Option<Instant>> = Mutex::new(None);
    Arc::new(move |done, total| {
        let Ok(mut last) = last_log.lock() else {
            return;
        };
        let now = Instant::now();
        let due = last.is_none_or(|at| now.duration_since(at) >= UPLOAD_LOG_INTERVAL);

        if total == 0 {
            if !due && done != 0 {
                return;
            }
            *last = Some(now);
            info!(task_id, "upload progress: {} uploaded", format_bytes(done));
            return;
        }

        if !due && done != total {
            return;
        }
        *last = Some(now);
        let percent = (done as f64) / (total as f64) * 100.0;
        info!(
            task_id,
            "upload progress: {percent:.1}% ({}/{})",
            format_bytes(done),
            format_bytes(total)
        );
    })
}

fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{bytes}B");
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let units = ['K', 'M', 'G', 'T', 'P', 'E'];
    format!("{:.1}{}iB", (bytes as f64) / (div as f64), units[exp])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_bytes_scales_units() {
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(2048), "2.0KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0MiB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0GiB");
    }

    #[tokio::test]
    async fn stage_single_file_moves_into_task_dir() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let source = dir.path().join("sample.bin");
        tokio::fs::write(&source, vec![7u8; 64])
            .await
            .expect("write");

        let staged = stage_single_file(dir.path(), 9, &source)
            .await
            .expect("stage");
        assert_eq!(staged, dir.path().join("task-9"));
        assert!(!source.exists());
        let moved = staged.join("sample.bin");
        let data = tokio::fs::read(&moved).await.expect("read");
        assert_eq!(data.len(), 64);
    }

    #[tokio::test]
    async fn copy_durable_preserves_contents() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let source = dir.path().join("in.bin");
        let dest = dir.path().join("out.bin");
        tokio::fs::write(&source, b"payload").await.expect("write");

        copy_durable(&source, &dest).await.expect("copy");
        assert_eq!(tokio::fs::read(&dest).await.expect("read"), b"payload");
        assert!(source.exists());
    }
}
