//! Session and handle adapters over librqbit.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, bail};
use async_trait::async_trait;
use librqbit::{AddTorrent, AddTorrentOptions, AddTorrentResponse, ManagedTorrent, Session};
use tracing::{debug, warn};

use lodestone_torrent::{
    SwarmSnapshot, TorrentEngine, TorrentFileInfo, TorrentHandle, TorrentInfo,
};

/// Torrent engine backed by a shared librqbit session.
pub struct RqbitEngine {
    session: Arc<Session>,
}

impl RqbitEngine {
    /// Start a session writing pieces under `data_root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be initialised.
    pub async fn new(data_root: PathBuf) -> anyhow::Result<Self> {
        let session = Session::new(data_root)
            .await
            .context("create rqbit session")?;
        Ok(Self { session })
    }
}

#[async_trait]
impl TorrentEngine for RqbitEngine {
    async fn add_magnet(
        &self,
        uri: &str,
    ) -> anyhow::Result<Arc<dyn lodestone_torrent::TorrentHandle>> {
        let response = self
            .session
            .add_torrent(
                AddTorrent::from_url(uri),
                Some(AddTorrentOptions {
                    overwrite: true,
                    ..AddTorrentOptions::default()
                }),
            )
            .await
            .context("add magnet")?;

        let (id, managed) = match response {
            AddTorrentResponse::Added(id, managed)
            | AddTorrentResponse::AlreadyManaged(id, managed) => (id, managed),
            AddTorrentResponse::ListOnly(_) => bail!("engine returned a list-only response"),
        };

        Ok(Arc::new(RqbitHandle {
            session: Arc::clone(&self.session),
            managed,
            id,
            dropped: AtomicBool::new(false),
        }))
    }

    async fn close(&self) {
        self.session.stop().await;
    }
}

struct RqbitHandle {
    session: Arc<Session>,
    managed: Arc<ManagedTorrent>,
    id: usize,
    dropped: AtomicBool,
}

#[async_trait]
impl TorrentHandle for RqbitHandle {
    async fn wait_info(&self) -> anyhow::Result<()> {
        self.managed
            .wait_until_initialized()
            .await
            .context("await torrent metadata")
    }

    fn info(&self) -> Option<TorrentInfo> {
        let metadata = self.managed.metadata.load();
        let metadata = metadata.as_ref()?;

        let files: Vec<TorrentFileInfo> = metadata
            .file_infos
            .iter()
            .map(|file| {
                let relative = file.relative_filename.display().to_string();
                TorrentFileInfo {
                    display_path: relative.clone(),
                    relative_path: relative,
                    length: i64::try_from(file.len).unwrap_or(i64::MAX),
                    priority: 0,
                }
            })
            .collect();
        let total_length: i64 = files.iter().map(|file| file.length).sum();

        Some(TorrentInfo {
            name: self.managed.name().unwrap_or_else(|| {
                format!("torrent-{}", self.id)
            }),
            total_length,
            files,
        })
    }

    fn download_all(&self) {
        // rqbit wants every piece unless a file filter was supplied at
        // admission, so there is nothing to flip here.
        debug!(torrent = self.id, "download_all is implicit for rqbit");
    }

    fn snapshot(&self) -> SwarmSnapshot {
        let stats = self.managed.stats();
        let completed = i64::try_from(stats.progress_bytes).unwrap_or(i64::MAX);
        let total = i64::try_from(stats.total_bytes).unwrap_or(i64::MAX);

        let mut snapshot = SwarmSnapshot {
            bytes_completed: completed,
            bytes_missing: (total - completed).max(0),
            ..SwarmSnapshot::default()
        };
        if let Some(live) = stats.live.as_ref() {
            let peers = &live.snapshot.peer_stats;
            snapshot.total_peers = i64::try_from(peers.seen).unwrap_or_default();
            snapshot.active_peers = i64::try_from(peers.live).unwrap_or_default();
            snapshot.pending_peers = i64::try_from(peers.queued).unwrap_or_default();
            snapshot.half_open_peers = i64::try_from(peers.connecting).unwrap_or_default();
            // rqbit does not split seeders out of the live peer set.
            snapshot.connected_seeders = 0;
        }
        snapshot
    }

    async fn add_trackers(&self, trackers: &[String]) {
        // rqbit fixes the tracker set at admission time; extra trackers
        // belong in the magnet URI itself.
        if !trackers.is_empty() {
            debug!(
                torrent = self.id,
                count = trackers.len(),
                "ignoring post-admission tracker update"
            );
        }
    }

    fn drop_torrent(&self) {
        if self.dropped.swap(true, Ordering::SeqCst) {
            return;
        }
        let session = Arc::clone(&self.session);
        let id = self.id;
        tokio::spawn(async move {
            if let Err(err) = session
                .delete(librqbit::api::TorrentIdOrHash::Id(id), false)
                .await
            {
                warn!(torrent = id, error = %err, "failed to release torrent");
            }
        });
    }
}
