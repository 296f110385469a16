//! Read-only query surface
//!
//! Serves the visualization layer: sessions for one user, user totals,
//! and the hourly rollups, each over a closed time range. Every call
//! reads either the user directory in the store or the published
//! aggregate snapshot; nothing here mutates state.

use crate::aggregates::{self, AggregateMaintainer};
use crate::models::{ImageHourlyStat, NodeHourlyStat, Session, User, UserTotals};
use crate::store::{Storage, StoreError};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub struct QueryService {
    store: Arc<dyn Storage>,
    maintainer: Arc<AggregateMaintainer>,
}

impl QueryService {
    pub fn new(store: Arc<dyn Storage>, maintainer: Arc<AggregateMaintainer>) -> Self {
        Self { store, maintainer }
    }

    /// Sessions for one identity whose interval intersects `[from, to]`.
    pub async fn sessions_for_user(
        &self,
        email: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<Session> {
        let snapshot = self.maintainer.snapshot().await;
        snapshot
            .sessions
            .iter()
            .filter(|s| s.user_email == email && overlaps(s, from, to))
            .cloned()
            .collect()
    }

    /// Per-user totals over sessions intersecting `[from, to]`.
    ///
    /// An unbounded range reproduces the snapshot's own totals exactly.
    pub async fn user_totals(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<UserTotals> {
        let snapshot = self.maintainer.snapshot().await;
        let in_range: Vec<Session> = snapshot
            .sessions
            .iter()
            .filter(|s| overlaps(s, from, to))
            .cloned()
            .collect();
        aggregates::user_totals(&in_range, &self.maintainer.policy().gpu_node_pattern)
    }

    /// Hourly node rollup rows with buckets inside `[from, to]`.
    pub async fn node_hourly(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<NodeHourlyStat> {
        let snapshot = self.maintainer.snapshot().await;
        snapshot
            .node_hourly
            .iter()
            .filter(|row| row.bucket >= from && row.bucket <= to)
            .cloned()
            .collect()
    }

    /// Hourly image rollup rows with buckets inside `[from, to]`.
    pub async fn image_hourly(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<ImageHourlyStat> {
        let snapshot = self.maintainer.snapshot().await;
        snapshot
            .image_hourly
            .iter()
            .filter(|row| row.bucket >= from && row.bucket <= to)
            .cloned()
            .collect()
    }

    /// The user directory, ordered by email.
    pub async fn users(&self) -> Result<Vec<User>, StoreError> {
        self.store.users().await
    }

    /// When the current snapshot was published (freshness indicator).
    pub async fn snapshot_generated_at(&self) -> DateTime<Utc> {
        self.maintainer.snapshot().await.generated_at
    }
}

fn overlaps(session: &Session, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
    session.start_at <= to && session.end_at >= from
}
