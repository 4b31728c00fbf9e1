//! Admission-controlled scheduler for task pipelines.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lodestone_data::{Task, TaskStatus, TaskStore};
use lodestone_storage::BlobStore;
use lodestone_torrent::{TorrentEngine, TorrentHandle};
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{ManagerError, Result, pipeline, trackers};

/// Statuses the resume sweep re-launches pipelines for.
const RESUMABLE: [TaskStatus; 4] = [
    TaskStatus::Pending,
    TaskStatus::Downloading,
    TaskStatus::Downloaded,
    TaskStatus::Uploading,
];

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Root directory the torrent engine writes pieces under.
    pub data_root: PathBuf,
    /// Maximum number of concurrently running pipelines.
    pub max_concurrent: usize,
    /// Interval between progress snapshots while downloading.
    pub status_interval: Duration,
    /// Trackers announced for every torrent; empty selects the built-in list.
    pub trackers: Vec<String>,
    /// Destination bucket for uploads.
    pub bucket: String,
    /// Key prefix task uploads are nested under.
    pub key_prefix: String,
}

pub(crate) struct ActiveTask {
    pub(crate) cancel: CancellationToken,
    pub(crate) handle: Option<Arc<dyn TorrentHandle>>,
    pub(crate) done: watch::Receiver<bool>,
}

pub(crate) struct Inner {
    pub(crate) cfg: ManagerConfig,
    pub(crate) store: TaskStore,
    pub(crate) blobs: Arc<dyn BlobStore>,
    pub(crate) engine: Arc<dyn TorrentEngine>,
    pub(crate) semaphore: Arc<Semaphore>,
    pub(crate) root: CancellationToken,
    active: Mutex<HashMap<i64, ActiveTask>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Inner {
    /// Register a fresh slot; refuses when a pipeline is already active for
    /// the task (at most one pipeline per task).
    fn register(&self, task_id: i64, slot: ActiveTask) -> bool {
        let Ok(mut active) = self.active.lock() else {
            return false;
        };
        if active.contains_key(&task_id) {
            return false;
        }
        active.insert(task_id, slot);
        true
    }

    fn unregister(&self, task_id: i64) {
        if let Ok(mut active) = self.active.lock() {
            active.remove(&task_id);
        }
    }

    /// Publish the torrent handle so a concurrent cancel can drop it.
    pub(crate) fn attach_handle(&self, task_id: i64, handle: Arc<dyn TorrentHandle>) {
        if let Ok(mut active) = self.active.lock() {
            if let Some(slot) = active.get_mut(&task_id) {
                slot.handle = Some(handle);
            }
        }
    }

    #[allow(clippy::type_complexity)]
    fn lookup(
        &self,
        task_id: i64,
    ) -> Option<(
        CancellationToken,
        Option<Arc<dyn TorrentHandle>>,
        watch::Receiver<bool>,
    )> {
        let active = self.active.lock().ok()?;
        active
            .get(&task_id)
            .map(|slot| (slot.cancel.clone(), slot.handle.clone(), slot.done.clone()))
    }
}

/// Coordinates torrent downloads, progress tracking, and upload lifecycle.
#[derive(Clone)]
pub struct DownloadManager {
    inner: Arc<Inner>,
}

impl DownloadManager {
    /// Construct a manager; zeroed knobs fall back to documented defaults.
    #[must_use]
    pub fn new(
        mut cfg: ManagerConfig,
        store: TaskStore,
        blobs: Arc<dyn BlobStore>,
        engine: Arc<dyn TorrentEngine>,
    ) -> Self {
        if cfg.max_concurrent == 0 {
            cfg.max_concurrent = 3;
        }
        if cfg.status_interval.is_zero() {
            cfg.status_interval = Duration::from_secs(2);
        }
        if cfg.trackers.is_empty() {
            cfg.trackers = trackers::default_trackers();
        }

        let semaphore = Arc::new(Semaphore::new(cfg.max_concurrent));
        Self {
            inner: Arc::new(Inner {
                cfg,
                store,
                blobs,
                engine,
                semaphore,
                root: CancellationToken::new(),
                active: Mutex::new(HashMap::new()),
                workers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Create the data root and mark the scheduler ready.
    ///
    /// # Errors
    ///
    /// Returns an error if the data root cannot be created.
    pub async fn start(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.inner.cfg.data_root)
            .await
            .map_err(|source| ManagerError::DataRoot { source })?;
        info!(data_root = %self.inner.cfg.data_root.display(), "download manager started");
        Ok(())
    }

    /// Load a task and schedule its pipeline. Returns once the spawn is
    /// scheduled; dispatch is asynchronous.
    ///
    /// # Errors
    ///
    /// Returns an error when the task cannot be loaded.
    pub async fn enqueue(&self, task_id: i64) -> Result<()> {
        let task = self.inner.store.get_task(task_id).await?;
        self.spawn_task(task);
        Ok(())
    }

    /// Re-launch pipelines for every non-terminal task, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error when the resumable set cannot be listed.
    pub async fn resume(&self) -> Result<()> {
        let tasks = self.inner.store.list_by_statuses(&RESUMABLE).await?;
        for task in tasks {
            self.spawn_task(task);
        }
        Ok(())
    }

    /// Cancel the pipeline for `task_id` and wait for it to exit.
    ///
    /// Unknown ids succeed (cancellation is idempotent).
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::CancelTimeout`] when the pipeline does not
    /// exit within `wait`.
    pub async fn cancel(&self, task_id: i64, wait: Duration) -> Result<()> {
        let Some((cancel, handle, mut done)) = self.inner.lookup(task_id) else {
            return Ok(());
        };

        cancel.cancel();
        if let Some(handle) = handle {
            handle.drop_torrent();
        }

        let drained = tokio::time::timeout(wait, async {
            loop {
                if *done.borrow_and_update() {
                    break;
                }
                if done.changed().await.is_err() {
                    break;
                }
            }
        })
        .await;
        drained.map_err(|_| ManagerError::CancelTimeout { task_id })
    }

    /// Cancel everything, drain all pipelines, and close the engine.
    pub async fn shutdown(&self) {
        self.inner.root.cancel();
        let workers = {
            let Ok(mut workers) = self.inner.workers.lock() else {
                return;
            };
            std::mem::take(&mut *workers)
        };
        for worker in workers {
            if let Err(err) = worker.await {
                warn!(error = %err, "pipeline worker join failed");
            }
        }
        self.inner.engine.close().await;
        info!("download manager stopped");
    }

    fn spawn_task(&self, task: Task) {
        let task_id = task.id;
        let token = self.inner.root.child_token();
        let (done_tx, done_rx) = watch::channel(false);
        let registered = self.inner.register(
            task_id,
            ActiveTask {
                cancel: token.clone(),
                handle: None,
                done: done_rx,
            },
        );
        if !registered {
            warn!(task_id, "pipeline already active, skipping spawn");
            return;
        }

        let inner = Arc::clone(&self.inner);
        let worker = tokio::spawn(async move {
            // The task token is a child of the root token, so either a task
            // cancel or a global shutdown releases a queued spawn before it
            // ever holds a permit.
            tokio::select! {
                () = token.cancelled() => {}
                permit = inner.semaphore.clone().acquire_owned() => {
                    if let Ok(_permit) = permit {
                        pipeline::run(&inner, task, &token).await;
                    }
                }
            }
            inner.unregister(task_id);
            let _ = done_tx.send(true);
        });

        if let Ok(mut workers) = self.inner.workers.lock() {
            workers.push(worker);
        }
    }
}
