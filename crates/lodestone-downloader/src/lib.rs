#![forbid(unsafe_code)]

//! Task lifecycle engine for Lodestone.
//!
//! The [`DownloadManager`] admits task pipelines under a concurrency budget;
//! each pipeline drives one task through download, staging and upload, and
//! persists every transition through the task store.

mod manager;
mod pipeline;
pub mod trackers;

pub use manager::{DownloadManager, ManagerConfig};

use thiserror::Error;

/// Result alias for scheduler operations.
pub type Result<T> = std::result::Result<T, ManagerError>;

/// Errors surfaced by the download manager.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// Task lookup or listing failed.
    #[error("task store operation failed")]
    Data {
        /// Underlying store error.
        #[source]
        source: lodestone_data::DataError,
    },
    /// The download root could not be created.
    #[error("failed to create data root")]
    DataRoot {
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// A pipeline did not acknowledge cancellation in time.
    #[error("cancellation timed out")]
    CancelTimeout {
        /// Task whose pipeline is still running.
        task_id: i64,
    },
}

impl From<lodestone_data::DataError> for ManagerError {
    fn from(source: lodestone_data::DataError) -> Self {
        Self::Data { source }
    }
}
