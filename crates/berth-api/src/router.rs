//! Router construction and serving.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use berth_runtime::coordinator::Coordinator;
use berth_runtime::translate::PortTranslator;

use crate::handlers;

/// State shared with every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Lifecycle coordinator; also owns the registry.
    pub coordinator: Arc<Coordinator>,
    /// Translator for host-facing addresses.
    pub translator: PortTranslator,
}

/// Creates the API router.
#[must_use]
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/version", get(handlers::version))
        .route("/api/projects", get(handlers::list_projects))
        .route("/api/refresh", post(handlers::refresh))
        .route("/api/images", get(handlers::list_images))
        .route(
            "/api/containers",
            get(handlers::list_containers).post(handlers::run_container),
        )
        .route(
            "/api/containers/{id}",
            get(handlers::get_container)
                .put(handlers::update_container)
                .delete(handlers::remove_container),
        )
        .route("/api/containers/{id}/start", post(handlers::start_container))
        .route("/api/containers/{id}/stop", post(handlers::stop_container))
        .route("/api/containers/{id}/clone", get(handlers::clone_container))
        .route("/api/containers/{id}/logs", get(handlers::container_logs))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the API on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the server fails while accepting connections.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(addr = %addr, "api listening");
    }
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
