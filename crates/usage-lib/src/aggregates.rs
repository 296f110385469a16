//! Aggregate maintenance with atomic snapshot publishing
//!
//! After each successful append cycle the maintainer rebuilds every
//! derived view (sessions, per-user totals, hourly node/image rollups)
//! into a fresh shadow structure from a snapshot-consistent read of the
//! store, then publishes it with a single pointer swap. Readers hold an
//! `Arc` to whichever snapshot was current when they asked and are never
//! exposed to a half-rebuilt state.

use crate::models::{ImageHourlyStat, NodeHourlyStat, Observation, Session, UserTotals};
use crate::sessions::{self, DEFAULT_GAP_TOLERANCE_SECS};
use crate::store::Storage;
use anyhow::Result;
use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Policy constants for aggregation.
///
/// Both values are inherited from the deployment being observed rather
/// than derived from first principles, so they stay configurable.
#[derive(Debug, Clone)]
pub struct AggregatePolicy {
    /// Maximum gap between samples of one session
    pub gap_tolerance: Duration,
    /// Substring of a node name that marks it as accelerator-backed
    pub gpu_node_pattern: String,
}

impl Default for AggregatePolicy {
    fn default() -> Self {
        Self {
            gap_tolerance: Duration::seconds(DEFAULT_GAP_TOLERANCE_SECS),
            gpu_node_pattern: "gpu".to_string(),
        }
    }
}

/// Resource-class predicate: purely textual, applied at aggregation time.
pub fn is_gpu_node(node_name: &str, pattern: &str) -> bool {
    node_name
        .to_ascii_lowercase()
        .contains(&pattern.to_ascii_lowercase())
}

/// One point-in-time consistent set of derived rollups
#[derive(Debug, Clone, Serialize)]
pub struct AggregateSnapshot {
    pub generated_at: DateTime<Utc>,
    pub sessions: Vec<Session>,
    pub user_totals: Vec<UserTotals>,
    pub node_hourly: Vec<NodeHourlyStat>,
    pub image_hourly: Vec<ImageHourlyStat>,
}

impl AggregateSnapshot {
    fn empty() -> Self {
        Self {
            generated_at: Utc::now(),
            sessions: Vec::new(),
            user_totals: Vec::new(),
            node_hourly: Vec::new(),
            image_hourly: Vec::new(),
        }
    }
}

/// Counters from one refresh pass
#[derive(Debug, Clone, Copy)]
pub struct RefreshStats {
    pub observations: usize,
    pub sessions: usize,
    pub users: usize,
}

/// Owns the published snapshot and the refresh protocol
pub struct AggregateMaintainer {
    store: Arc<dyn Storage>,
    policy: AggregatePolicy,
    snapshot: RwLock<Arc<AggregateSnapshot>>,
}

impl AggregateMaintainer {
    pub fn new(store: Arc<dyn Storage>, policy: AggregatePolicy) -> Self {
        Self {
            store,
            policy,
            snapshot: RwLock::new(Arc::new(AggregateSnapshot::empty())),
        }
    }

    pub fn policy(&self) -> &AggregatePolicy {
        &self.policy
    }

    /// Current published snapshot. Cheap; clones an `Arc`.
    pub async fn snapshot(&self) -> Arc<AggregateSnapshot> {
        self.snapshot.read().await.clone()
    }

    /// Rebuild all derived views and publish atomically.
    ///
    /// A failure anywhere before the final swap leaves the last-good
    /// snapshot in place; the caller retries on the next cycle.
    pub async fn refresh(&self) -> Result<RefreshStats> {
        let observations = self.store.observations().await?;
        let sessions = sessions::reconstruct(&observations, self.policy.gap_tolerance);
        let user_totals = user_totals(&sessions, &self.policy.gpu_node_pattern);
        let node_hourly = node_hourly(&observations);
        let image_hourly = image_hourly(&observations);

        let stats = RefreshStats {
            observations: observations.len(),
            sessions: sessions.len(),
            users: user_totals.len(),
        };

        let next = Arc::new(AggregateSnapshot {
            generated_at: Utc::now(),
            sessions,
            user_totals,
            node_hourly,
            image_hourly,
        });

        *self.snapshot.write().await = next;

        debug!(
            observations = stats.observations,
            sessions = stats.sessions,
            users = stats.users,
            "Published aggregate snapshot"
        );

        Ok(stats)
    }
}

/// Fold sessions into per-user totals, split by resource class.
pub fn user_totals(sessions: &[Session], gpu_pattern: &str) -> Vec<UserTotals> {
    let mut totals: BTreeMap<&str, UserTotals> = BTreeMap::new();

    for session in sessions {
        let entry = totals
            .entry(session.user_email.as_str())
            .or_insert_with(|| UserTotals {
                email: session.user_email.clone(),
                ..UserTotals::default()
            });

        entry.total_hours += session.runtime_hours;
        entry.session_count += 1;
        if is_gpu_node(&session.node_name, gpu_pattern) {
            entry.gpu_hours += session.runtime_hours;
        } else {
            entry.cpu_hours += session.runtime_hours;
        }
    }

    totals.into_values().collect()
}

/// Hourly distinct-presence rollup by node.
///
/// Computed from observations rather than sessions: these are presence
/// counts per hour bucket, not duration sums.
pub fn node_hourly(observations: &[Observation]) -> Vec<NodeHourlyStat> {
    let mut buckets: BTreeMap<(DateTime<Utc>, &str), (BTreeSet<&str>, BTreeSet<&str>)> =
        BTreeMap::new();

    for obs in observations {
        let (users, pods) = buckets
            .entry((hour_bucket(obs.sampled_at), obs.node_name.as_str()))
            .or_default();
        users.insert(obs.user_email.as_str());
        pods.insert(obs.pod_name.as_str());
    }

    buckets
        .into_iter()
        .map(|((bucket, node_name), (users, pods))| NodeHourlyStat {
            bucket,
            node_name: node_name.to_string(),
            active_users: users.len() as u64,
            active_pods: pods.len() as u64,
        })
        .collect()
}

/// Hourly distinct-presence rollup by image base/version.
pub fn image_hourly(observations: &[Observation]) -> Vec<ImageHourlyStat> {
    let mut buckets: BTreeMap<(DateTime<Utc>, &str, &str), (BTreeSet<&str>, BTreeSet<&str>)> =
        BTreeMap::new();

    for obs in observations {
        let (users, pods) = buckets
            .entry((
                hour_bucket(obs.sampled_at),
                obs.container_base.as_str(),
                obs.container_version.as_str(),
            ))
            .or_default();
        users.insert(obs.user_email.as_str());
        pods.insert(obs.pod_name.as_str());
    }

    buckets
        .into_iter()
        .map(
            |((bucket, base, version), (users, pods))| ImageHourlyStat {
                bucket,
                container_base: base.to_string(),
                container_version: version.to_string(),
                active_users: users.len() as u64,
                active_pods: pods.len() as u64,
            },
        )
        .collect()
}

fn hour_bucket(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(Duration::hours(1)).unwrap_or(ts)
}
