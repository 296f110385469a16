//! Sampler client: platform listing -> normalized observation batch

use super::{parse, PodRecord, PodSampler};
use crate::models::Observation;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

/// Normalization settings for the hub deployment being sampled
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Pod name prefix that marks a user pod (spawner convention)
    pub pod_prefix: String,
    /// Mail domain used to build identity keys from user ids
    pub email_domain: String,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            pod_prefix: "jupyter-".to_string(),
            email_domain: "illinois.edu".to_string(),
        }
    }
}

/// Produces one observation batch per collection cycle.
///
/// Normalization only; the client never writes to storage.
pub struct SamplerClient {
    platform: Arc<dyn PodSampler>,
    config: SamplerConfig,
}

impl SamplerClient {
    pub fn new(platform: Arc<dyn PodSampler>, config: SamplerConfig) -> Self {
        Self { platform, config }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Sample the fleet once.
    ///
    /// Non-user pods (hub, proxy, ...) are dropped; malformed fields
    /// degrade to sentinels instead of failing the batch.
    pub async fn collect(&self) -> Result<Vec<Observation>> {
        let pods = self.platform.list_running_pods().await?;
        let sampled_at = Utc::now();

        let listed = pods.len();
        let batch: Vec<Observation> = pods
            .into_iter()
            .filter_map(|pod| self.normalize(pod, sampled_at))
            .collect();

        debug!(
            listed = listed,
            observations = batch.len(),
            "Sampled running pods"
        );

        Ok(batch)
    }

    fn normalize(&self, pod: PodRecord, sampled_at: DateTime<Utc>) -> Option<Observation> {
        if !pod.pod_name.starts_with(&self.config.pod_prefix) {
            return None;
        }

        let (user_email, user_name) =
            match parse::user_id_from_pod(&pod.pod_name, &self.config.pod_prefix) {
                Some(user_id) => (
                    parse::email_for(&user_id, &self.config.email_domain),
                    parse::display_name_for(&user_id),
                ),
                None => (
                    parse::email_for(parse::UNKNOWN, &self.config.email_domain),
                    "Unknown User".to_string(),
                ),
            };

        let (container_base, container_version) = parse::split_image_ref(&pod.image);
        let age_seconds = (sampled_at - pod.started_at).num_seconds().max(0);

        Some(Observation {
            sampled_at,
            user_email,
            user_name,
            node_name: pod.node_name,
            container_image: pod.image,
            container_base,
            container_version,
            age_seconds,
            pod_name: pod.pod_name,
        })
    }
}
