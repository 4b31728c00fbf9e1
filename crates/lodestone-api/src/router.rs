//! Router construction and server host for the API.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::Method;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::routing::get;
use axum::{Router, middleware};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::ApiState;
use crate::auth::require_bearer_token;
use crate::handlers::{create_task, delete_task, get_task, health, list_objects, list_tasks};

/// Errors raised while serving the API.
#[derive(Debug, Error)]
pub enum ApiServerError {
    /// Binding the listener failed.
    #[error("failed to bind api listener")]
    Bind {
        /// Address attempted.
        addr: SocketAddr,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// Serving terminated unexpectedly.
    #[error("api server terminated unexpectedly")]
    Serve {
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Axum router wrapper hosting the control API.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Build the router around shared state.
    #[must_use]
    pub fn new(state: Arc<ApiState>) -> Self {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

        let guarded = Router::new()
            .route("/api/tasks", get(list_tasks).post(create_task))
            .route("/api/tasks/{id}", get(get_task).delete(delete_task))
            .route("/api/storage/objects", get(list_objects))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_bearer_token,
            ));

        let router = guarded
            .route("/api/health", get(health))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        Self { router }
    }

    /// Serve until the socket closes.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails to bind or serving aborts.
    pub async fn serve(self, addr: SocketAddr) -> Result<(), ApiServerError> {
        self.serve_with_shutdown(addr, std::future::pending()).await
    }

    /// Serve until `shutdown` resolves, then drain gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails to bind or serving aborts.
    pub async fn serve_with_shutdown(
        self,
        addr: SocketAddr,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), ApiServerError> {
        tracing::info!(addr = %addr, "starting api listener");
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })?;
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|source| ApiServerError::Serve { source })
    }

    /// Router handle for in-process tests.
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}
