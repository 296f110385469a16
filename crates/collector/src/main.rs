//! Usage Collector - JupyterHub container usage tracking
//!
//! Periodically samples the hub's user pods, reconstructs usage sessions
//! from the samples, and serves aggregates to the dashboards.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use usage_lib::{
    aggregates::AggregateMaintainer,
    health::{components, HealthRegistry},
    observability::{EngineMetrics, StructuredLogger},
    query::QueryService,
    sampler::{CollectorLoop, SamplerClient},
    store::MemoryStore,
};

mod api;
mod config;
mod sampler;

const COLLECTOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting usage-collector");

    // Load configuration
    let config = config::CollectorConfig::load()?;
    info!(namespace = %config.namespace, "Collector configured");

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::SAMPLER).await;
    health_registry.register(components::RECONCILER).await;
    health_registry.register(components::STORE).await;
    health_registry.register(components::AGGREGATES).await;

    // Initialize metrics and structured logger
    let metrics = EngineMetrics::new();
    let logger = StructuredLogger::new(&config.namespace);
    logger.log_startup(COLLECTOR_VERSION, config.sample_interval_secs);

    // Wire the engine
    let store = Arc::new(MemoryStore::new());
    let maintainer = Arc::new(AggregateMaintainer::new(
        store.clone(),
        config.aggregate_policy(),
    ));
    let platform = Arc::new(sampler::KubePodSampler::new(&config.namespace).await?);
    let sampler_client = SamplerClient::new(platform, config.sampler_config());

    let collector = CollectorLoop::new(
        sampler_client,
        store.clone(),
        maintainer.clone(),
        config.cycle_config(),
        health_registry.clone(),
        metrics.clone(),
        logger.clone(),
    );

    // Shared application state for the API server
    let query = Arc::new(QueryService::new(store, maintainer));
    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics.clone(),
        query,
    ));

    // Mark collector as ready after initialization
    health_registry.set_ready(true).await;

    // Start the API server and the collection loop
    let _api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let loop_handle = tokio::spawn(collector.run(shutdown_rx));

    // Wait for shutdown signal; the loop observes it between cycles
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    let _ = shutdown_tx.send(());
    let _ = loop_handle.await;

    info!("Shutdown complete");
    Ok(())
}
