//! Engine-agnostic torrent interfaces and DTOs shared across the workspace.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod magnet;

/// Metadata describing a resolved torrent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentInfo {
    /// Display name chosen by the engine for the torrent.
    pub name: String,
    /// Total payload size in bytes.
    pub total_length: i64,
    /// Files contained in the torrent, in metainfo order.
    pub files: Vec<TorrentFileInfo>,
}

/// Individual file exposed by a torrent's metainfo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentFileInfo {
    /// Human-readable path shown in listings.
    pub display_path: String,
    /// Path relative to the torrent root on disk.
    pub relative_path: String,
    /// File size in bytes.
    pub length: i64,
    /// Engine-reported priority; zero means unset.
    pub priority: i64,
}

/// O(1) sample of a swarm's transfer and peer counters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SwarmSnapshot {
    /// Bytes downloaded and verified so far.
    pub bytes_completed: i64,
    /// Bytes still wanted; zero once the payload is complete.
    pub bytes_missing: i64,
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

/// Primary engine trait implemented by adapters (e.g. librqbit).
#[async_trait]
pub trait TorrentEngine: Send + Sync {
    /// Begin resolving a magnet URI; returns once the swarm is admitted.
    async fn add_magnet(&self, uri: &str) -> anyhow::Result<Arc<dyn TorrentHandle>>;

    /// Release all engine resources. Called exactly once at shutdown.
    async fn close(&self);
}

/// Handle to one admitted torrent.
#[async_trait]
pub trait TorrentHandle: Send + Sync {
    /// Resolve once metainfo is available. Callers race this against their
    /// cancellation token.
    async fn wait_info(&self) -> anyhow::Result<()>;

    /// Metadata for the torrent, `None` until [`TorrentHandle::wait_info`]
    /// has resolved.
    fn info(&self) -> Option<TorrentInfo>;

    /// Mark every piece as wanted.
    fn download_all(&self);

    /// Sample the current transfer counters.
    fn snapshot(&self) -> SwarmSnapshot;

    /// Augment the swarm's tracker set.
    async fn add_trackers(&self, trackers: &[String]);

    /// Idempotently release the swarm and any engine-side resources.
    fn drop_torrent(&self);
}
