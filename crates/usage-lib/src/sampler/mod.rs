//! Pod sampling and observation normalization
//!
//! This module turns the orchestration platform's view of currently
//! running pods into normalized [`Observation`](crate::models::Observation)
//! rows, and drives the periodic collection cycle. The platform query
//! itself sits behind the [`PodSampler`] trait so the engine never depends
//! on a specific cluster API.

mod client;
mod parse;
mod r#loop;

pub use client::{SamplerClient, SamplerConfig};
pub use parse::{
    display_name_for, email_for, split_image_ref, user_id_from_pod, DEFAULT_VERSION, UNKNOWN,
};
pub use r#loop::{CollectorLoop, CycleConfig};

use anyhow::Result;
use chrono::{DateTime, Utc};

pub use async_trait::async_trait;

/// Raw pod listing as reported by the orchestration platform.
///
/// This is the wire-level shape before any naming-convention or image-ref
/// extraction is applied.
#[derive(Debug, Clone)]
pub struct PodRecord {
    /// Ephemeral pod name (e.g. `jupyter-alice-5f4x`)
    pub pod_name: String,
    /// Node the pod is scheduled on
    pub node_name: String,
    /// Full container image reference
    pub image: String,
    /// Pod creation time
    pub started_at: DateTime<Utc>,
}

/// Trait for listing currently running pods on the platform
#[async_trait]
pub trait PodSampler: Send + Sync {
    /// List the pods that are currently running in the hub namespace.
    ///
    /// An empty list is a valid result (no one is using the hub).
    async fn list_running_pods(&self) -> Result<Vec<PodRecord>>;
}
