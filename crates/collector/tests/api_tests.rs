//! Integration tests for the collector API endpoints

use axum::{
    body::Body,
    extract::{Query, State},
    http::{Request, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, TimeZone, Utc};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use std::sync::Arc;
use tower::ServiceExt;
use usage_lib::{
    aggregates::{AggregateMaintainer, AggregatePolicy},
    health::{components, ComponentStatus, HealthRegistry},
    models::Observation,
    observability::EngineMetrics,
    query::QueryService,
    store::{MemoryStore, Storage},
};

#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: EngineMetrics,
    pub query: Arc<QueryService>,
}

#[derive(Debug, Deserialize)]
struct RangeParams {
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct SessionParams {
    user: String,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

fn bounds(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> (DateTime<Utc>, DateTime<Utc>) {
    (
        from.unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap()),
        to.unwrap_or_else(Utc::now),
    )
}

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;
    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;
    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(readiness))
}

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

async fn sessions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SessionParams>,
) -> impl IntoResponse {
    let (from, to) = bounds(params.from, params.to);
    Json(state.query.sessions_for_user(&params.user, from, to).await)
}

async fn user_totals(
    State(state): State<Arc<AppState>>,
    Query(range): Query<RangeParams>,
) -> impl IntoResponse {
    let (from, to) = bounds(range.from, range.to);
    Json(state.query.user_totals(from, to).await)
}

async fn node_rollup(
    State(state): State<Arc<AppState>>,
    Query(range): Query<RangeParams>,
) -> impl IntoResponse {
    let (from, to) = bounds(range.from, range.to);
    Json(state.query.node_hourly(from, to).await)
}

fn create_test_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/sessions", get(sessions))
        .route("/api/v1/users/totals", get(user_totals))
        .route("/api/v1/rollups/nodes", get(node_rollup))
        .with_state(state)
}

const T0: i64 = 1_700_000_000;

fn obs(email: &str, pod: &str, node: &str, offset_secs: i64) -> Observation {
    Observation {
        sampled_at: Utc.timestamp_opt(T0 + offset_secs, 0).unwrap(),
        user_email: email.to_string(),
        user_name: "Test".to_string(),
        node_name: node.to_string(),
        container_image: "hub/scipy:1".to_string(),
        container_base: "scipy".to_string(),
        container_version: "1".to_string(),
        age_seconds: offset_secs,
        pod_name: pod.to_string(),
    }
}

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let store = Arc::new(MemoryStore::new());
    store
        .append_observations(vec![
            obs("alice@x.edu", "jupyter-alice-a1", "node-a", 0),
            obs("alice@x.edu", "jupyter-alice-a1", "node-a", 600),
            obs("bob@x.edu", "jupyter-bob-b1", "gpu-1", 300),
        ])
        .await
        .unwrap();

    let maintainer = Arc::new(AggregateMaintainer::new(
        store.clone(),
        AggregatePolicy::default(),
    ));
    maintainer.refresh().await.unwrap();

    let health_registry = HealthRegistry::new();
    health_registry.register(components::SAMPLER).await;
    health_registry.register(components::STORE).await;

    let metrics = EngineMetrics::new();
    let query = Arc::new(QueryService::new(store, maintainer));
    let state = Arc::new(AppState {
        health_registry,
        metrics,
        query,
    });
    let router = create_test_router(state.clone());

    (router, state)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let (status, health) = get_json(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_degraded(components::SAMPLER, "Hub API slow")
        .await;

    let (status, health) = get_json(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_unhealthy(components::STORE, "append failed")
        .await;

    let (status, _health) = get_json(app, "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_readyz_tracks_readiness() {
    let (app, state) = setup_test_app().await;

    let (status, _) = get_json(app.clone(), "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    state.health_registry.set_ready(true).await;
    let (status, _) = get_json(app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_collector_metrics() {
    let (app, state) = setup_test_app().await;
    state.metrics.set_pods_sampled(3);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("usage_collector_pods_sampled"));
}

#[tokio::test]
async fn test_sessions_endpoint_returns_user_sessions() {
    let (app, _state) = setup_test_app().await;

    let (status, sessions) = get_json(app, "/api/v1/sessions?user=alice@x.edu").await;
    assert_eq!(status, StatusCode::OK);

    let rows = sessions.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["user_email"], "alice@x.edu");
    assert_eq!(rows[0]["session_seq"], 1);
}

#[tokio::test]
async fn test_sessions_endpoint_requires_user_param() {
    let (app, _state) = setup_test_app().await;

    let (status, _) = get_json(app, "/api/v1/sessions").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_user_totals_split_by_resource_class() {
    let (app, _state) = setup_test_app().await;

    let (status, totals) = get_json(app, "/api/v1/users/totals").await;
    assert_eq!(status, StatusCode::OK);

    let rows = totals.as_array().unwrap();
    assert_eq!(rows.len(), 2);

    // Sorted by email: alice (cpu node), bob (gpu node)
    assert_eq!(rows[0]["email"], "alice@x.edu");
    assert!(rows[0]["gpu_hours"].as_f64().unwrap() == 0.0);
    assert_eq!(rows[1]["email"], "bob@x.edu");
    assert!(rows[1]["cpu_hours"].as_f64().unwrap() == 0.0);
}

#[tokio::test]
async fn test_node_rollup_counts_distinct_presence() {
    let (app, _state) = setup_test_app().await;

    let (status, rollup) = get_json(app, "/api/v1/rollups/nodes").await;
    assert_eq!(status, StatusCode::OK);

    let rows = rollup.as_array().unwrap();
    assert_eq!(rows.len(), 2);

    let node_a = rows
        .iter()
        .find(|r| r["node_name"] == "node-a")
        .unwrap();
    assert_eq!(node_a["active_users"], 1);
    assert_eq!(node_a["active_pods"], 1);
}
