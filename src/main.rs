//! Nutrivance - nutrition and hydration tracking service.
//!
//! Serves health snapshots aggregated from a health-data provider and the
//! shared daily water-intake counter used by the home-screen widget.

mod aggregator;
mod config;
mod counter;
mod db;
mod health;
mod plans;
mod timeline;
mod web;

use aggregator::SnapshotAggregator;
use config::{ProviderKind, ServerConfig};
use counter::WaterCounter;
use db::Store;
use health::{HealthDataProvider, HttpHealthProvider, LocalHealthProvider};
use timeline::TimelineProvider;
use web::{AppState, Server};

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("nutrivance=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting Nutrivance on port {}...", cfg.http_port);
    tracing::info!("Using database at {}", cfg.db_path);

    // Initialize database
    let store = Arc::new(Store::new(&cfg.db_path)?);
    tracing::info!("Database initialized successfully");

    let provider: Arc<dyn HealthDataProvider> = match &cfg.provider {
        ProviderKind::Local => {
            tracing::info!("Reading health data from the local sample log");
            Arc::new(LocalHealthProvider::new(store.clone()))
        }
        ProviderKind::Http { url } => {
            let remote = HttpHealthProvider::new(url, cfg.provider_timeout)?;
            tracing::info!("Reading health data from {}", remote.base_url());
            Arc::new(remote)
        }
    };
    let aggregator = Arc::new(SnapshotAggregator::new(provider));

    let counter = Arc::new(WaterCounter::new(store.clone(), cfg.refresh_interval));
    let initial = counter.read().await;
    tracing::info!("Water intake today: {} cups", initial.count);

    // Start widget timeline refresh
    let timeline = Arc::new(TimelineProvider::new(counter.clone()));
    timeline.start().await;

    // Start web server
    let server = Server::new(AppState {
        config: cfg,
        store,
        aggregator,
        counter,
        timeline: timeline.clone(),
    });
    server.start().await?;

    timeline.stop().await;
    tracing::info!("Shutdown complete");

    Ok(())
}
