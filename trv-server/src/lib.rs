//! trv-server library - transcript review backend
//!
//! Serves the review table over HTTP, streams media files and pushes
//! periodic "update" notifications over WebSocket.

use std::sync::Arc;

use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use trv_common::ServerConfig;

pub mod api;
pub mod notifier;

use notifier::Notifier;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Resolved configuration (table, media directory, variant)
    pub config: Arc<ServerConfig>,
    /// Live-update channel registry
    pub notifier: Arc<Notifier>,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, config: ServerConfig, notifier: Arc<Notifier>) -> Self {
        Self {
            db,
            config: Arc::new(config),
            notifier,
        }
    }
}

/// Build application router
///
/// The media route prefix follows the configured variant.
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, put};

    let media_route = format!("{}/*path", state.config.variant.media_prefix());

    Router::new()
        .route("/rows", get(api::list_rows))
        .route("/rows/:row_id", put(api::update_row))
        .route(&media_route, get(api::serve_media))
        .route("/ws", get(api::ws_handler))
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
