//! Observability infrastructure for the usage collector
//!
//! Provides:
//! - Prometheus metrics (cycle/refresh latency, insert accounting, fleet gauges)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for per-cycle latency (in seconds)
const CYCLE_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

struct EngineMetricsInner {
    cycle_latency_seconds: Histogram,
    refresh_latency_seconds: Histogram,
    observations_appended_total: IntCounter,
    duplicates_absorbed_total: IntCounter,
    sample_errors_total: IntCounter,
    store_errors_total: IntCounter,
    refresh_errors_total: IntCounter,
    pods_sampled: IntGauge,
    users_tracked: IntGauge,
    sessions_materialized: IntGauge,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            cycle_latency_seconds: register_histogram!(
                "usage_collector_cycle_latency_seconds",
                "Wall-clock time of one sample-store-refresh cycle",
                CYCLE_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_latency_seconds"),

            refresh_latency_seconds: register_histogram!(
                "usage_collector_refresh_latency_seconds",
                "Time spent rebuilding and publishing the aggregate snapshot",
                CYCLE_BUCKETS.to_vec()
            )
            .expect("Failed to register refresh_latency_seconds"),

            observations_appended_total: register_int_counter!(
                "usage_collector_observations_appended_total",
                "New observation rows committed to the store"
            )
            .expect("Failed to register observations_appended_total"),

            duplicates_absorbed_total: register_int_counter!(
                "usage_collector_duplicates_absorbed_total",
                "Observation rows silently absorbed as duplicates"
            )
            .expect("Failed to register duplicates_absorbed_total"),

            sample_errors_total: register_int_counter!(
                "usage_collector_sample_errors_total",
                "Cycles abandoned because the platform listing failed or timed out"
            )
            .expect("Failed to register sample_errors_total"),

            store_errors_total: register_int_counter!(
                "usage_collector_store_errors_total",
                "Cycles abandoned because the store append failed or timed out"
            )
            .expect("Failed to register store_errors_total"),

            refresh_errors_total: register_int_counter!(
                "usage_collector_refresh_errors_total",
                "Aggregate refresh failures (last-good snapshot kept)"
            )
            .expect("Failed to register refresh_errors_total"),

            pods_sampled: register_int_gauge!(
                "usage_collector_pods_sampled",
                "User pods observed in the most recent cycle"
            )
            .expect("Failed to register pods_sampled"),

            users_tracked: register_int_gauge!(
                "usage_collector_users_tracked",
                "Distinct users present in the published snapshot"
            )
            .expect("Failed to register users_tracked"),

            sessions_materialized: register_int_gauge!(
                "usage_collector_sessions_materialized",
                "Sessions present in the published snapshot"
            )
            .expect("Failed to register sessions_materialized"),
        }
    }
}

/// Collector metrics for Prometheus exposition.
///
/// Lightweight handle to the global instance; clones share state.
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_cycle_latency(&self, duration_secs: f64) {
        self.inner().cycle_latency_seconds.observe(duration_secs);
    }

    pub fn observe_refresh_latency(&self, duration_secs: f64) {
        self.inner().refresh_latency_seconds.observe(duration_secs);
    }

    pub fn add_observations_appended(&self, count: u64) {
        self.inner().observations_appended_total.inc_by(count);
    }

    pub fn add_duplicates_absorbed(&self, count: u64) {
        self.inner().duplicates_absorbed_total.inc_by(count);
    }

    pub fn inc_sample_errors(&self) {
        self.inner().sample_errors_total.inc();
    }

    pub fn inc_store_errors(&self) {
        self.inner().store_errors_total.inc();
    }

    pub fn inc_refresh_errors(&self) {
        self.inner().refresh_errors_total.inc();
    }

    pub fn set_pods_sampled(&self, count: i64) {
        self.inner().pods_sampled.set(count);
    }

    pub fn set_users_tracked(&self, count: i64) {
        self.inner().users_tracked.set(count);
    }

    pub fn set_sessions_materialized(&self, count: i64) {
        self.inner().sessions_materialized.set(count);
    }
}

/// Structured logger for collector lifecycle events
#[derive(Clone)]
pub struct StructuredLogger {
    namespace: String,
}

impl StructuredLogger {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn log_startup(&self, version: &str, interval_secs: u64) {
        info!(
            event = "collector_started",
            namespace = %self.namespace,
            collector_version = %version,
            interval_secs = interval_secs,
            "Usage collector started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "collector_shutdown",
            namespace = %self.namespace,
            reason = %reason,
            "Usage collector shutting down"
        );
    }

    pub fn log_cycle(&self, pods: usize, inserted: usize, absorbed: usize, new_users: usize) {
        info!(
            event = "cycle_complete",
            namespace = %self.namespace,
            pods = pods,
            inserted = inserted,
            absorbed = absorbed,
            new_users = new_users,
            "Collection cycle complete"
        );
    }

    pub fn log_refresh(&self, sessions: usize, users: usize, elapsed_ms: u128) {
        info!(
            event = "snapshot_published",
            namespace = %self.namespace,
            sessions = sessions,
            users = users,
            elapsed_ms = elapsed_ms,
            "Aggregate snapshot published"
        );
    }

    pub fn log_sampler_failure(&self, error: &str) {
        warn!(
            event = "sampler_failure",
            namespace = %self.namespace,
            error = %error,
            "Pod sampling failed, will retry next cycle"
        );
    }
}
