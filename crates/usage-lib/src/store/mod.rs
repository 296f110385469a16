//! Observation and user persistence
//!
//! The engine talks to storage through the [`Storage`] trait: idempotent
//! batch insert keyed on `(user_email, pod_name, sampled_at)`, merge-upsert
//! for user rows, and snapshot-consistent reads for the reconstructor. A
//! production deployment backs this with a time-series database; the
//! bundled [`MemoryStore`] implements the same contract in process.

mod memory;

pub use memory::MemoryStore;

use crate::models::{Observation, User};
use thiserror::Error;

pub use async_trait::async_trait;

/// Storage failure taxonomy.
///
/// Every variant is retryable at the next cycle; none is fatal to the
/// collector process.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage query failed: {0}")]
    Query(String),
}

/// Trait for observation/user persistence backends
#[async_trait]
pub trait Storage: Send + Sync {
    /// Append an observation batch atomically.
    ///
    /// Duplicates of already-stored rows (and within the batch) are
    /// silently absorbed; the return value counts genuinely new rows.
    /// Either the whole batch becomes visible or none of it does.
    async fn append_observations(&self, batch: Vec<Observation>) -> Result<usize, StoreError>;

    /// Upsert user rows with the non-regressing identity merge.
    /// Returns the number of previously unseen users.
    async fn upsert_users(&self, users: Vec<User>) -> Result<usize, StoreError>;

    /// All observations, ordered by `(user_email, pod_name, sampled_at)`.
    ///
    /// The result is a point-in-time snapshot: appends that commit while
    /// the caller is still working never mutate it.
    async fn observations(&self) -> Result<Vec<Observation>, StoreError>;

    /// All known users, ordered by email.
    async fn users(&self) -> Result<Vec<User>, StoreError>;

    /// Look up one user by identity key.
    async fn user(&self, email: &str) -> Result<Option<User>, StoreError>;
}
