//! In-process storage backend

use super::{async_trait, Storage, StoreError};
use crate::identity;
use crate::models::{Observation, User};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Uniqueness key for one observation row
type ObservationKey = (String, String, DateTime<Utc>);

/// In-memory [`Storage`] implementation.
///
/// Observations live in an ordered map under a single write lock, which
/// gives both per-cycle append atomicity and snapshot-consistent reads
/// (readers clone under the read lock, so a concurrent append can never
/// mutate a result mid-computation).
#[derive(Default)]
pub struct MemoryStore {
    observations: RwLock<BTreeMap<ObservationKey, Observation>>,
    users: DashMap<String, User>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn append_observations(&self, batch: Vec<Observation>) -> Result<usize, StoreError> {
        let mut rows = self.observations.write().await;
        let mut inserted = 0usize;
        let total = batch.len();

        for obs in batch {
            let key = (
                obs.user_email.clone(),
                obs.pod_name.clone(),
                obs.sampled_at,
            );
            if let std::collections::btree_map::Entry::Vacant(slot) = rows.entry(key) {
                slot.insert(obs);
                inserted += 1;
            }
        }

        debug!(
            inserted = inserted,
            absorbed = total - inserted,
            total_rows = rows.len(),
            "Appended observation batch"
        );

        Ok(inserted)
    }

    async fn upsert_users(&self, users: Vec<User>) -> Result<usize, StoreError> {
        let mut new_users = 0usize;

        for user in users {
            match self.users.entry(user.email.clone()) {
                dashmap::mapref::entry::Entry::Occupied(mut slot) => {
                    let merged = identity::merge(Some(slot.get()), user);
                    slot.insert(merged);
                }
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    slot.insert(identity::merge(None, user));
                    new_users += 1;
                }
            }
        }

        Ok(new_users)
    }

    async fn observations(&self) -> Result<Vec<Observation>, StoreError> {
        let rows = self.observations.read().await;
        Ok(rows.values().cloned().collect())
    }

    async fn users(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.users.iter().map(|r| r.value().clone()).collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    async fn user(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(email).map(|r| r.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn obs(email: &str, pod: &str, at: i64) -> Observation {
        Observation {
            sampled_at: Utc.timestamp_opt(at, 0).unwrap(),
            user_email: email.to_string(),
            user_name: "Test".to_string(),
            node_name: "node-a".to_string(),
            container_image: "img:1".to_string(),
            container_base: "img".to_string(),
            container_version: "1".to_string(),
            age_seconds: 0,
            pod_name: pod.to_string(),
        }
    }

    fn user(email: &str, at: i64) -> User {
        User {
            email: email.to_string(),
            user_id: "u".to_string(),
            full_name: "Test User".to_string(),
            first_seen: Utc.timestamp_opt(at, 0).unwrap(),
            last_seen: Utc.timestamp_opt(at, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_append_is_idempotent() {
        let store = MemoryStore::new();
        let batch = vec![obs("a@x.edu", "jupyter-a-1", 1000), obs("a@x.edu", "jupyter-a-1", 1300)];

        let first = store.append_observations(batch.clone()).await.unwrap();
        let second = store.append_observations(batch).await.unwrap();

        assert_eq!(first, 2);
        assert_eq!(second, 0);
        assert_eq!(store.observations().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_append_absorbs_in_batch_duplicates() {
        let store = MemoryStore::new();
        let batch = vec![obs("a@x.edu", "jupyter-a-1", 1000), obs("a@x.edu", "jupyter-a-1", 1000)];

        let inserted = store.append_observations(batch).await.unwrap();
        assert_eq!(inserted, 1);
    }

    #[tokio::test]
    async fn test_observations_ordered_by_key() {
        let store = MemoryStore::new();
        store
            .append_observations(vec![
                obs("b@x.edu", "jupyter-b-1", 2000),
                obs("a@x.edu", "jupyter-a-1", 3000),
                obs("a@x.edu", "jupyter-a-1", 1000),
            ])
            .await
            .unwrap();

        let rows = store.observations().await.unwrap();
        assert_eq!(rows[0].user_email, "a@x.edu");
        assert_eq!(rows[0].sampled_at.timestamp(), 1000);
        assert_eq!(rows[1].sampled_at.timestamp(), 3000);
        assert_eq!(rows[2].user_email, "b@x.edu");
    }

    #[tokio::test]
    async fn test_snapshot_read_is_isolated_from_later_appends() {
        let store = MemoryStore::new();
        store
            .append_observations(vec![obs("a@x.edu", "jupyter-a-1", 1000)])
            .await
            .unwrap();

        let snapshot = store.observations().await.unwrap();
        store
            .append_observations(vec![obs("a@x.edu", "jupyter-a-1", 2000)])
            .await
            .unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.observations().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_users_counts_new_rows_only() {
        let store = MemoryStore::new();

        let first = store.upsert_users(vec![user("a@x.edu", 1000)]).await.unwrap();
        let second = store.upsert_users(vec![user("a@x.edu", 2000)]).await.unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 0);

        let stored = store.user("a@x.edu").await.unwrap().unwrap();
        assert_eq!(stored.first_seen.timestamp(), 1000);
        assert_eq!(stored.last_seen.timestamp(), 2000);
    }
}
