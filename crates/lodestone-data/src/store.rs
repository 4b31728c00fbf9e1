//! SQLite-backed task repository with atomic status transitions.

use std::path::Path;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::error::{DataError, Result};
use crate::model::{NewTaskFile, ProgressUpdate, Task, TaskFile, TaskStatus};

const CREATE_TASKS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    magnet_uri TEXT NOT NULL,
    status TEXT NOT NULL,
    progress INTEGER NOT NULL DEFAULT 0,
    speed INTEGER NOT NULL DEFAULT 0,
    downloaded_bytes INTEGER NOT NULL DEFAULT 0,
    total_size INTEGER NOT NULL DEFAULT 0,
    total_peers INTEGER NOT NULL DEFAULT 0,
    active_peers INTEGER NOT NULL DEFAULT 0,
    pending_peers INTEGER NOT NULL DEFAULT 0,
    connected_seeders INTEGER NOT NULL DEFAULT 0,
    half_open_peers INTEGER NOT NULL DEFAULT 0,
    torrent_name TEXT NOT NULL DEFAULT '',
    local_path TEXT NOT NULL DEFAULT '',
    s3_location TEXT NOT NULL DEFAULT '',
    error_message TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    downloaded_at TEXT NULL,
    uploaded_at TEXT NULL
)";

const CREATE_TASK_FILES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS task_files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    relative_path TEXT NOT NULL,
    size INTEGER NOT NULL,
    priority INTEGER NOT NULL DEFAULT 1,
    FOREIGN KEY(task_id) REFERENCES tasks(id) ON DELETE CASCADE
)";

const CREATE_TASK_FILES_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_task_files_task_id ON task_files(task_id)";

const TASK_COLUMNS: &str = "id, magnet_uri, status, progress, speed, downloaded_bytes, total_size, \
     total_peers, active_peers, pending_peers, connected_seeders, half_open_peers, \
     torrent_name, local_path, s3_location, error_message, \
     created_at, updated_at, downloaded_at, uploaded_at";

/// Peer-counter columns added after the initial schema shipped; each is added
/// with `ALTER TABLE` only when missing so `init` stays rerunnable.
const PEER_COLUMNS: &[(&str, &str)] = &[
    (
        "total_peers",
        "ALTER TABLE tasks ADD COLUMN total_peers INTEGER NOT NULL DEFAULT 0",
    ),
    (
        "active_peers",
        "ALTER TABLE tasks ADD COLUMN active_peers INTEGER NOT NULL DEFAULT 0",
    ),
    (
        "pending_peers",
        "ALTER TABLE tasks ADD COLUMN pending_peers INTEGER NOT NULL DEFAULT 0",
    ),
    (
        "connected_seeders",
        "ALTER TABLE tasks ADD COLUMN connected_seeders INTEGER NOT NULL DEFAULT 0",
    ),
    (
        "half_open_peers",
        "ALTER TABLE tasks ADD COLUMN half_open_peers INTEGER NOT NULL DEFAULT 0",
    ),
];

fn map_query_err(operation: &'static str) -> impl FnOnce(sqlx::Error) -> DataError {
    move |source| DataError::QueryFailed { operation, source }
}

/// Database-backed repository for tasks and their file metadata.
///
/// Writes are serialised through a single connection; every write is atomic
/// at task granularity.
#[derive(Clone)]
pub struct TaskStore {
    pool: SqlitePool,
}

impl TaskStore {
    /// Open (creating if necessary) the database file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub async fn connect(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(map_query_err("open database"))?;
        Ok(Self { pool })
    }

    /// Create tables and apply additive column migrations. Safe to rerun.
    ///
    /// # Errors
    ///
    /// Returns an error if schema statements fail.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(CREATE_TASKS_TABLE)
            .execute(&self.pool)
            .await
            .map_err(map_query_err("create tasks table"))?;
        sqlx::query(CREATE_TASK_FILES_TABLE)
            .execute(&self.pool)
            .await
            .map_err(map_query_err("create task_files table"))?;
        sqlx::query(CREATE_TASK_FILES_INDEX)
            .execute(&self.pool)
            .await
            .map_err(map_query_err("create task_files index"))?;
        self.ensure_task_columns().await
    }

    async fn ensure_task_columns(&self) -> Result<()> {
        let rows = sqlx::query("PRAGMA table_info(tasks)")
            .fetch_all(&self.pool)
            .await
            .map_err(map_query_err("describe tasks table"))?;

        let mut present = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row.try_get("name")?;
            present.push(name);
        }

        for (column, statement) in PEER_COLUMNS {
            if present.iter().any(|name| name == column) {
                continue;
            }
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(map_query_err("add peer counter column"))?;
        }
        Ok(())
    }

    /// Insert a `pending` task and record its deterministic staging path.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn create_task(&self, magnet: &str, staging_root: &str) -> Result<Task> {
        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(map_query_err("begin create task"))?;

        let inserted = sqlx::query(
            "INSERT INTO tasks (magnet_uri, status, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(magnet)
        .bind(TaskStatus::Pending.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_query_err("insert task"))?;

        let id = inserted.last_insert_rowid();
        let local_path = Path::new(staging_root)
            .join(format!("task-{id}"))
            .display()
            .to_string();
        sqlx::query("UPDATE tasks SET local_path=? WHERE id=?")
            .bind(&local_path)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_query_err("record staging path"))?;

        tx.commit()
            .await
            .map_err(map_query_err("commit create task"))?;

        self.get_task(id).await
    }

    /// Fetch one task with its files.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::NotFound`] for an absent id, or a query error.
    pub async fn get_task(&self, id: i64) -> Result<Task> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id=?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_query_err("fetch task"))?
            .ok_or(DataError::NotFound { task_id: id })?;

        let mut task = scan_task(&row)?;
        task.files = self.files_for_task(id).await?;
        Ok(task)
    }

    /// List every task, newest first, with files embedded.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY id DESC");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_query_err("list tasks"))?;

        let mut tasks = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut task = scan_task(row)?;
            task.files = self.files_for_task(task.id).await?;
            tasks.push(task);
        }
        Ok(tasks)
    }

    /// List tasks in any of the given statuses, oldest first (resume order).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_by_statuses(&self, statuses: &[TaskStatus]) -> Result<Vec<Task>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; statuses.len()].join(",");
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE status IN ({placeholders}) ORDER BY id ASC"
        );
        let mut query = sqlx::query(&sql);
        for status in statuses {
            query = query.bind(status.as_str());
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(map_query_err("list tasks by status"))?;

        let mut tasks = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut task = scan_task(row)?;
            task.files = self.files_for_task(task.id).await?;
            tasks.push(task);
        }
        Ok(tasks)
    }

    /// Set the task status, replacing the stored error message.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn update_status(
        &self,
        id: i64,
        status: TaskStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        sqlx::query("UPDATE tasks SET status=?, error_message=?, updated_at=? WHERE id=?")
            .bind(status.as_str())
            .bind(error_message.unwrap_or_default())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_query_err("update task status"))?;
        Ok(())
    }

    /// Record name, staging path and payload size once metainfo resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn update_download_info(
        &self,
        id: i64,
        torrent_name: &str,
        local_path: &str,
        total_size: i64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE tasks SET torrent_name=?, local_path=?, total_size=?, updated_at=? WHERE id=?",
        )
        .bind(torrent_name)
        .bind(local_path)
        .bind(total_size)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_query_err("update download info"))?;
        Ok(())
    }

    /// Persist one progress snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn update_progress(&self, id: i64, update: &ProgressUpdate) -> Result<()> {
        sqlx::query(
            "UPDATE tasks SET progress=?, speed=?, downloaded_bytes=?, total_peers=?, \
             active_peers=?, pending_peers=?, connected_seeders=?, half_open_peers=?, \
             updated_at=? WHERE id=?",
        )
        .bind(update.progress)
        .bind(update.speed)
        .bind(update.downloaded_bytes)
        .bind(update.total_peers)
        .bind(update.active_peers)
        .bind(update.pending_peers)
        .bind(update.connected_seeders)
        .bind(update.half_open_peers)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_query_err("update task progress"))?;
        Ok(())
    }

    /// Transition to `downloaded`, stamping `downloaded_at` only on the
    /// first transition (replays keep the original instant).
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn mark_downloaded(&self, id: i64) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE tasks SET status=?, downloaded_at=COALESCE(downloaded_at, ?), updated_at=? \
             WHERE id=?",
        )
        .bind(TaskStatus::Downloaded.as_str())
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_query_err("mark downloaded"))?;
        Ok(())
    }

    /// Transition to `completed`, recording the remote location.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn mark_uploaded(&self, id: i64, s3_location: &str) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE tasks SET status=?, s3_location=?, uploaded_at=?, updated_at=? WHERE id=?",
        )
        .bind(TaskStatus::Completed.as_str())
        .bind(s3_location)
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_query_err("mark uploaded"))?;
        Ok(())
    }

    /// Delete a task and its files in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::NotFound`] when the id is absent.
    pub async fn delete_task(&self, id: i64) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(map_query_err("begin delete task"))?;

        sqlx::query("DELETE FROM task_files WHERE task_id=?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_query_err("delete task files"))?;

        let deleted = sqlx::query("DELETE FROM tasks WHERE id=?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_query_err("delete task"))?;
        if deleted.rows_affected() == 0 {
            return Err(DataError::NotFound { task_id: id });
        }

        tx.commit()
            .await
            .map_err(map_query_err("commit delete task"))?;
        Ok(())
    }

    /// Replace the file list for a task (transactional delete-then-insert).
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails.
    pub async fn replace_files(&self, task_id: i64, files: &[NewTaskFile]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(map_query_err("begin replace files"))?;

        sqlx::query("DELETE FROM task_files WHERE task_id=?")
            .bind(task_id)
            .execute(&mut *tx)
            .await
            .map_err(map_query_err("clear task files"))?;

        for file in files {
            sqlx::query(
                "INSERT INTO task_files (task_id, name, relative_path, size, priority) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(task_id)
            .bind(&file.name)
            .bind(&file.relative_path)
            .bind(file.size)
            .bind(file.priority)
            .execute(&mut *tx)
            .await
            .map_err(map_query_err("insert task file"))?;
        }

        tx.commit()
            .await
            .map_err(map_query_err("commit replace files"))?;
        Ok(())
    }

    /// Fetch the file list for a task, ordered by insertion.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn files_for_task(&self, task_id: i64) -> Result<Vec<TaskFile>> {
        let rows = sqlx::query(
            "SELECT id, task_id, name, relative_path, size, priority FROM task_files \
             WHERE task_id=? ORDER BY id ASC",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_query_err("list task files"))?;

        let mut files = Vec::with_capacity(rows.len());
        for row in rows {
            files.push(TaskFile {
                id: row.try_get("id")?,
                task_id: row.try_get("task_id")?,
                name: row.try_get("name")?,
                relative_path: row.try_get("relative_path")?,
                size: row.try_get("size")?,
                priority: row.try_get("priority")?,
            });
        }
        Ok(files)
    }
}

fn scan_task(row: &SqliteRow) -> Result<Task> {
    let status: String = row.try_get("status")?;
    Ok(Task {
        id: row.try_get("id")?,
        magnet_uri: row.try_get("magnet_uri")?,
        status: TaskStatus::parse(&status),
        progress: row.try_get("progress")?,
        speed: row.try_get("speed")?,
        downloaded_bytes: row.try_get("downloaded_bytes")?,
        total_size: row.try_get("total_size")?,
        total_peers: row.try_get("total_peers")?,
        active_peers: row.try_get("active_peers")?,
        pending_peers: row.try_get("pending_peers")?,
        connected_seeders: row.try_get("connected_seeders")?,
        half_open_peers: row.try_get("half_open_peers")?,
        torrent_name: row.try_get("torrent_name")?,
        local_path: row.try_get("local_path")?,
        s3_location: row.try_get("s3_location")?,
        error_message: row.try_get("error_message")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        downloaded_at: row.try_get("downloaded_at")?,
        uploaded_at: row.try_get("uploaded_at")?,
        files: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_store(dir: &TempDir) -> TaskStore {
        let store = TaskStore::connect(&dir.path().join("tasks.db"))
            .await
            .expect("open");
        store.init().await.expect("init");
        store
    }

    fn sample_files() -> Vec<NewTaskFile> {
        vec![
            NewTaskFile {
                name: "sample.bin".to_string(),
                relative_path: "sample.bin".to_string(),
                size: 1024,
                priority: 1,
            },
            NewTaskFile {
                name: "notes.txt".to_string(),
                relative_path: "docs/notes.txt".to_string(),
                size: 64,
                priority: 2,
            },
        ]
    }

    #[tokio::test]
    async fn create_task_records_staging_path() {
        let dir = TempDir::new().expect("tempdir");
        let store = open_store(&dir).await;

        let task = store
            .create_task("magnet:?xt=urn:btih:demo", "/data/downloads")
            .await
            .expect("create");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.local_path, format!("/data/downloads/task-{}", task.id));
        assert!(task.downloaded_at.is_none());
        assert!(task.files.is_empty());
    }

    #[tokio::test]
    async fn init_is_rerunnable_and_backfills_peer_columns() {
        let dir = TempDir::new().expect("tempdir");
        let store = TaskStore::connect(&dir.path().join("tasks.db"))
            .await
            .expect("open");

        // Simulate a database created before the peer counters existed.
        sqlx::query(
            "CREATE TABLE tasks (\
             id INTEGER PRIMARY KEY AUTOINCREMENT, magnet_uri TEXT NOT NULL, \
             status TEXT NOT NULL, progress INTEGER NOT NULL DEFAULT 0, \
             speed INTEGER NOT NULL DEFAULT 0, downloaded_bytes INTEGER NOT NULL DEFAULT 0, \
             total_size INTEGER NOT NULL DEFAULT 0, torrent_name TEXT NOT NULL DEFAULT '', \
             local_path TEXT NOT NULL DEFAULT '', s3_location TEXT NOT NULL DEFAULT '', \
             error_message TEXT NOT NULL DEFAULT '', created_at TEXT NOT NULL, \
             updated_at TEXT NOT NULL, downloaded_at TEXT NULL, uploaded_at TEXT NULL)",
        )
        .execute(&store.pool)
        .await
        .expect("legacy schema");

        store.init().await.expect("first init");
        store.init().await.expect("second init");

        let task = store
            .create_task("magnet:?xt=urn:btih:demo", "/tmp")
            .await
            .expect("create after migration");
        assert_eq!(task.total_peers, 0);
        assert_eq!(task.half_open_peers, 0);
    }

    #[tokio::test]
    async fn list_orders_descending_and_resume_orders_ascending() {
        let dir = TempDir::new().expect("tempdir");
        let store = open_store(&dir).await;

        for n in 0..3 {
            store
                .create_task(&format!("magnet:?xt=urn:btih:{n}"), "/tmp")
                .await
                .expect("create");
        }

        let listed = store.list_tasks().await.expect("list");
        let ids: Vec<i64> = listed.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);

        let resumable = store
            .list_by_statuses(&[TaskStatus::Pending])
            .await
            .expect("by status");
        let ids: Vec<i64> = resumable.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        assert!(store.list_by_statuses(&[]).await.expect("empty").is_empty());
    }

    #[tokio::test]
    async fn update_status_replaces_error_message() {
        let dir = TempDir::new().expect("tempdir");
        let store = open_store(&dir).await;
        let task = store
            .create_task("magnet:?xt=urn:btih:demo", "/tmp")
            .await
            .expect("create");

        store
            .update_status(task.id, TaskStatus::Failed, Some("upload: timeout"))
            .await
            .expect("fail");
        let failed = store.get_task(task.id).await.expect("get");
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(failed.error_message, "upload: timeout");

        store
            .update_status(task.id, TaskStatus::Downloading, None)
            .await
            .expect("clear");
        let cleared = store.get_task(task.id).await.expect("get");
        assert_eq!(cleared.status, TaskStatus::Downloading);
        assert!(cleared.error_message.is_empty());
        assert!(cleared.updated_at >= failed.updated_at);
    }

    #[tokio::test]
    async fn progress_and_download_info_round_trip() {
        let dir = TempDir::new().expect("tempdir");
        let store = open_store(&dir).await;
        let task = store
            .create_task("magnet:?xt=urn:btih:demo", "/tmp")
            .await
            .expect("create");

        store
            .update_download_info(task.id, "big-dataset", "/tmp/big-dataset", 4096)
            .await
            .expect("info");
        store
            .update_progress(
                task.id,
                &ProgressUpdate {
                    progress: 42,
                    speed: 2048,
                    downloaded_bytes: 1720,
                    total_peers: 11,
                    active_peers: 5,
                    pending_peers: 3,
                    connected_seeders: 2,
                    half_open_peers: 1,
                },
            )
            .await
            .expect("progress");

        let fetched = store.get_task(task.id).await.expect("get");
        assert_eq!(fetched.torrent_name, "big-dataset");
        assert_eq!(fetched.total_size, 4096);
        assert_eq!(fetched.progress, 42);
        assert_eq!(fetched.speed, 2048);
        assert_eq!(fetched.total_peers, 11);
        assert_eq!(fetched.half_open_peers, 1);
    }

    #[tokio::test]
    async fn mark_downloaded_preserves_first_timestamp() {
        let dir = TempDir::new().expect("tempdir");
        let store = open_store(&dir).await;
        let task = store
            .create_task("magnet:?xt=urn:btih:demo", "/tmp")
            .await
            .expect("create");

        store.mark_downloaded(task.id).await.expect("first");
        let first = store
            .get_task(task.id)
            .await
            .expect("get")
            .downloaded_at
            .expect("stamped");

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        store.mark_downloaded(task.id).await.expect("replay");
        let replayed = store.get_task(task.id).await.expect("get");
        assert_eq!(replayed.status, TaskStatus::Downloaded);
        assert_eq!(replayed.downloaded_at, Some(first));
    }

    #[tokio::test]
    async fn mark_uploaded_completes_the_task() {
        let dir = TempDir::new().expect("tempdir");
        let store = open_store(&dir).await;
        let task = store
            .create_task("magnet:?xt=urn:btih:demo", "/tmp")
            .await
            .expect("create");

        store.mark_downloaded(task.id).await.expect("downloaded");
        store
            .mark_uploaded(task.id, "s3://bucket/magnet-tasks/task-1")
            .await
            .expect("uploaded");

        let done = store.get_task(task.id).await.expect("get");
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.s3_location, "s3://bucket/magnet-tasks/task-1");
        let downloaded_at = done.downloaded_at.expect("downloaded_at");
        let uploaded_at = done.uploaded_at.expect("uploaded_at");
        assert!(downloaded_at <= uploaded_at);
    }

    #[tokio::test]
    async fn delete_cascades_files_and_errors_on_missing() {
        let dir = TempDir::new().expect("tempdir");
        let store = open_store(&dir).await;
        let task = store
            .create_task("magnet:?xt=urn:btih:demo", "/tmp")
            .await
            .expect("create");
        store
            .replace_files(task.id, &sample_files())
            .await
            .expect("files");

        store.delete_task(task.id).await.expect("delete");
        assert!(store
            .files_for_task(task.id)
            .await
            .expect("files")
            .is_empty());
        assert!(matches!(
            store.get_task(task.id).await,
            Err(DataError::NotFound { .. })
        ));
        assert!(matches!(
            store.delete_task(task.id).await,
            Err(DataError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn replace_files_is_a_full_swap() {
        let dir = TempDir::new().expect("tempdir");
        let store = open_store(&dir).await;
        let task = store
            .create_task("magnet:?xt=urn:btih:demo", "/tmp")
            .await
            .expect("create");

        store
            .replace_files(task.id, &sample_files())
            .await
            .expect("first");
        store
            .replace_files(
                task.id,
                &[NewTaskFile {
                    name: "only.bin".to_string(),
                    relative_path: "only.bin".to_string(),
                    size: 10,
                    priority: 1,
                }],
            )
            .await
            .expect("second");

        let files = store.files_for_task(task.id).await.expect("files");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "only.bin");
        assert_eq!(files[0].task_id, task.id);
    }
}
