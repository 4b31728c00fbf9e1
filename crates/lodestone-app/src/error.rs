//! # Design
//!
//! - Centralize application-level errors for bootstrap and shutdown.
//! - Keep error messages constant while carrying context fields.
//! - Preserve source errors without re-logging at call sites.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration operations failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        #[source]
        source: lodestone_config::ConfigError,
    },
    /// Telemetry initialisation failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// Task store operations failed.
    #[error("task store operation failed")]
    Data {
        /// Operation identifier.
        operation: &'static str,
        /// Source data error.
        #[source]
        source: lodestone_data::DataError,
    },
    /// Download manager operations failed.
    #[error("download manager operation failed")]
    Manager {
        /// Operation identifier.
        operation: &'static str,
        /// Source manager error.
        #[source]
        source: lodestone_downloader::ManagerError,
    },
    /// API server operations failed.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source API server error.
        #[source]
        source: lodestone_api::ApiServerError,
    },
    /// IO operations failed.
    #[error("io operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Optional path involved in the failure.
        path: Option<PathBuf>,
        /// Source IO error.
        #[source]
        source: io::Error,
    },
    /// An engine failed to start.
    #[error("torrent engine initialisation failed")]
    Engine {
        /// Operation identifier.
        operation: &'static str,
        /// Source engine error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: lodestone_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) fn telemetry(operation: &'static str, source: anyhow::Error) -> Self {
        Self::Telemetry {
            operation,
            source: source.into(),
        }
    }

    pub(crate) const fn data(operation: &'static str, source: lodestone_data::DataError) -> Self {
        Self::Data { operation, source }
    }

    pub(crate) const fn manager(
        operation: &'static str,
        source: lodestone_downloader::ManagerError,
    ) -> Self {
        Self::Manager { operation, source }
    }

    pub(crate) const fn api_server(
        operation: &'static str,
        source: lodestone_api::ApiServerError,
    ) -> Self {
        Self::ApiServer { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_error_helpers_build_variants() {
        let config = AppError::config(
            "settings.load",
            lodestone_config::ConfigError::MissingField {
                field: "storage.bucket",
            },
        );
        assert!(matches!(config, AppError::Config { .. }));
        assert_eq!(config.to_string(), "configuration operation failed");

        let data = AppError::data(
            "store.init",
            lodestone_data::DataError::NotFound { task_id: 1 },
        );
        assert!(matches!(data, AppError::Data { .. }));

        let manager = AppError::manager(
            "manager.cancel",
            lodestone_downloader::ManagerError::CancelTimeout { task_id: 1 },
        );
        assert!(matches!(manager, AppError::Manager { .. }));
    }
}
