//! Core data models for the usage engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One point-in-time sample of one running user pod.
///
/// Observations are unique on `(user_email, pod_name, sampled_at)` and
/// immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub sampled_at: DateTime<Utc>,
    pub user_email: String,
    pub user_name: String,
    pub node_name: String,
    pub container_image: String,
    pub container_base: String,
    pub container_version: String,
    pub age_seconds: i64,
    pub pod_name: String,
}

/// Stable user identity, accumulated across observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub user_id: String,
    pub full_name: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// A reconstructed contiguous usage interval.
///
/// Sessions for the same `(user_email, pod_name, node_name)` partition are
/// non-overlapping and numbered by `session_seq` in start-time order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_email: String,
    pub pod_name: String,
    pub node_name: String,
    pub session_seq: u32,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub runtime_hours: f64,
    pub container_base: String,
    pub container_version: String,
}

/// Per-user runtime totals derived from sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserTotals {
    pub email: String,
    pub total_hours: f64,
    pub gpu_hours: f64,
    pub cpu_hours: f64,
    pub session_count: u64,
}

/// Distinct active users/pods per hour bucket on one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeHourlyStat {
    pub bucket: DateTime<Utc>,
    pub node_name: String,
    pub active_users: u64,
    pub active_pods: u64,
}

/// Distinct active users/pods per hour bucket for one image base/version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageHourlyStat {
    pub bucket: DateTime<Utc>,
    pub container_base: String,
    pub container_version: String,
    pub active_users: u64,
    pub active_pods: u64,
}
