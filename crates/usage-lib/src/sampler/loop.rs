//! Periodic collection cycle driver
//!
//! One cycle = sample the fleet, reconcile identities, append the
//! observation batch, then rebuild and publish aggregates. Shutdown is
//! observed only between cycles so a cycle never leaves a partial write
//! behind, and every external call is time-bounded so a stuck cycle is
//! abandoned rather than stalling the loop.

use super::SamplerClient;
use crate::aggregates::AggregateMaintainer;
use crate::health::{components, HealthRegistry};
use crate::identity;
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::store::Storage;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, timeout, Instant};
use tracing::{info, warn};

/// Timing configuration for the collection cycle
#[derive(Debug, Clone)]
pub struct CycleConfig {
    /// Base sampling interval (default: 300 seconds)
    pub interval: Duration,
    /// Upper bound on one platform listing call
    pub sample_timeout: Duration,
    /// Upper bound on one storage call
    pub store_timeout: Duration,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            sample_timeout: Duration::from_secs(60),
            store_timeout: Duration::from_secs(60),
        }
    }
}

/// Drives the sample-store-refresh cycle at a fixed interval
pub struct CollectorLoop {
    sampler: SamplerClient,
    store: Arc<dyn Storage>,
    maintainer: Arc<AggregateMaintainer>,
    config: CycleConfig,
    health: HealthRegistry,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl CollectorLoop {
    pub fn new(
        sampler: SamplerClient,
        store: Arc<dyn Storage>,
        maintainer: Arc<AggregateMaintainer>,
        config: CycleConfig,
        health: HealthRegistry,
        metrics: EngineMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            sampler,
            store,
            maintainer,
            config,
            health,
            metrics,
            logger,
        }
    }

    /// Run until the shutdown signal fires.
    pub async fn run(self, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "Starting collection loop"
        );

        let mut ticker = interval(self.config.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let start = Instant::now();
                    self.run_cycle().await;
                    self.metrics
                        .observe_cycle_latency(start.elapsed().as_secs_f64());
                }
                _ = shutdown.recv() => {
                    info!("Shutting down collection loop");
                    break;
                }
            }
        }
    }

    /// One full cycle. Never returns an error: every failure mode is
    /// logged and retried at the next tick.
    async fn run_cycle(&self) {
        // 1. Sample the fleet
        let batch = match timeout(self.config.sample_timeout, self.sampler.collect()).await {
            Ok(Ok(batch)) => {
                self.health.set_healthy(components::SAMPLER).await;
                batch
            }
            Ok(Err(e)) => {
                self.logger.log_sampler_failure(&e.to_string());
                self.metrics.inc_sample_errors();
                self.health
                    .set_degraded(components::SAMPLER, e.to_string())
                    .await;
                return;
            }
            Err(_) => {
                self.logger.log_sampler_failure("platform listing timed out");
                self.metrics.inc_sample_errors();
                self.health
                    .set_degraded(components::SAMPLER, "platform listing timed out")
                    .await;
                return;
            }
        };

        self.metrics.set_pods_sampled(batch.len() as i64);

        // 2. Reconcile identities. A failure here must not prevent
        //    observation storage.
        let candidates = identity::users_from_batch(&batch, &self.sampler.config().pod_prefix);
        let mut new_users = 0;
        if !candidates.is_empty() {
            match timeout(
                self.config.store_timeout,
                self.store.upsert_users(candidates),
            )
            .await
            {
                Ok(Ok(count)) => {
                    new_users = count;
                    self.health.set_healthy(components::RECONCILER).await;
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "User reconciliation failed, storing observations anyway");
                    self.health
                        .set_degraded(components::RECONCILER, e.to_string())
                        .await;
                }
                Err(_) => {
                    warn!("User reconciliation timed out, storing observations anyway");
                    self.health
                        .set_degraded(components::RECONCILER, "upsert timed out")
                        .await;
                }
            }
        }

        // 3. Append the batch atomically
        let total = batch.len();
        let inserted = match timeout(
            self.config.store_timeout,
            self.store.append_observations(batch),
        )
        .await
        {
            Ok(Ok(inserted)) => {
                self.health.set_healthy(components::STORE).await;
                inserted
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Observation append failed, cycle abandoned");
                self.metrics.inc_store_errors();
                self.health
                    .set_degraded(components::STORE, e.to_string())
                    .await;
                return;
            }
            Err(_) => {
                warn!("Observation append timed out, cycle abandoned");
                self.metrics.inc_store_errors();
                self.health
                    .set_degraded(components::STORE, "append timed out")
                    .await;
                return;
            }
        };

        self.metrics.add_observations_appended(inserted as u64);
        self.metrics
            .add_duplicates_absorbed((total - inserted) as u64);

        // 4. Rebuild and publish aggregates from the committed state
        let refresh_start = Instant::now();
        match self.maintainer.refresh().await {
            Ok(stats) => {
                let elapsed = refresh_start.elapsed();
                self.metrics
                    .observe_refresh_latency(elapsed.as_secs_f64());
                self.metrics.set_sessions_materialized(stats.sessions as i64);
                self.metrics.set_users_tracked(stats.users as i64);
                self.health.set_healthy(components::AGGREGATES).await;
                self.logger
                    .log_refresh(stats.sessions, stats.users, elapsed.as_millis());
            }
            Err(e) => {
                warn!(error = %e, "Aggregate refresh failed, keeping last-good snapshot");
                self.metrics.inc_refresh_errors();
                self.health
                    .set_degraded(components::AGGREGATES, e.to_string())
                    .await;
            }
        }

        self.logger
            .log_cycle(total, inserted, total - inserted, new_users);
    }
}
