//! HTTP API: health checks, Prometheus metrics, and the read-only
//! query surface consumed by the dashboards

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, TimeZone, Utc};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use usage_lib::{
    health::{ComponentStatus, HealthRegistry},
    observability::EngineMetrics,
    query::QueryService,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: EngineMetrics,
    pub query: Arc<QueryService>,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: EngineMetrics,
        query: Arc<QueryService>,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            query,
        }
    }
}

/// Closed time range, defaulting to all of history up to now
#[derive(Debug, Deserialize)]
pub struct RangeParams {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl RangeParams {
    fn bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let from = self
            .from
            .unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap());
        let to = self.to.unwrap_or_else(Utc::now);
        (from, to)
    }
}

/// Session query: identity is required, range is optional
#[derive(Debug, Deserialize)]
pub struct SessionParams {
    pub user: String,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Health check - returns 200 if healthy/degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder.encode(&metric_families, &mut buffer).unwrap();

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

async fn users(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.query.users().await {
        Ok(users) => (StatusCode::OK, Json(users)).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn user_totals(
    State(state): State<Arc<AppState>>,
    Query(range): Query<RangeParams>,
) -> impl IntoResponse {
    let (from, to) = range.bounds();
    Json(state.query.user_totals(from, to).await)
}

async fn sessions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SessionParams>,
) -> impl IntoResponse {
    let from = params
        .from
        .unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap());
    let to = params.to.unwrap_or_else(Utc::now);
    Json(state.query.sessions_for_user(&params.user, from, to).await)
}

async fn node_rollup(
    State(state): State<Arc<AppState>>,
    Query(range): Query<RangeParams>,
) -> impl IntoResponse {
    let (from, to) = range.bounds();
    Json(state.query.node_hourly(from, to).await)
}

async fn image_rollup(
    State(state): State<Arc<AppState>>,
    Query(range): Query<RangeParams>,
) -> impl IntoResponse {
    let (from, to) = range.bounds();
    Json(state.query.image_hourly(from, to).await)
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/users", get(users))
        .route("/api/v1/users/totals", get(user_totals))
        .route("/api/v1/sessions", get(sessions))
        .route("/api/v1/rollups/nodes", get(node_rollup))
        .route("/api/v1/rollups/images", get(image_rollup))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
