//! Web server module.

mod handlers;

pub use handlers::*;

use crate::aggregator::SnapshotAggregator;
use crate::config::ServerConfig;
use crate::counter::WaterCounter;
use crate::db::Store;
use crate::timeline::TimelineProvider;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<Store>,
    pub aggregator: Arc<SnapshotAggregator>,
    pub counter: Arc<WaterCounter>,
    pub timeline: Arc<TimelineProvider>,
}

/// Web server for Nutrivance.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

        Router::new()
            // Health snapshots
            .route("/api/snapshot", get(handlers::handle_get_snapshot))
            .route("/api/snapshot", post(handlers::handle_post_snapshot))
            // Water counter
            .route("/api/water", get(handlers::handle_get_water))
            .route("/api/water", post(handlers::handle_add_water))
            .route("/api/water", put(handlers::handle_set_water))
            .route("/api/water/increment", post(handlers::handle_increment_water))
            .route("/api/water/timeline", get(handlers::handle_get_timeline))
            // Nutrient log
            .route("/api/nutrients", get(handlers::handle_get_nutrients))
            .route("/api/nutrients", post(handlers::handle_log_nutrients))
            // Static content
            .route("/api/plans", get(handlers::handle_get_plans))
            .route("/api/recommendations", get(handlers::handle_get_recommendations))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB
            .with_state(self.state.clone())
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
