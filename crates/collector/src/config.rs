//! Collector configuration

use anyhow::Result;
use serde::Deserialize;
use usage_lib::aggregates::AggregatePolicy;
use usage_lib::sampler::{CycleConfig, SamplerConfig};

/// Collector configuration, loaded from `COLLECTOR_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    /// Namespace the hub spawns user pods into
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Pod name prefix marking a user pod
    #[serde(default = "default_pod_prefix")]
    pub pod_prefix: String,

    /// Mail domain for identity keys
    #[serde(default = "default_email_domain")]
    pub email_domain: String,

    /// API server port for health/metrics/query endpoints
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Sampling interval in seconds
    #[serde(default = "default_sample_interval")]
    pub sample_interval_secs: u64,

    /// Upper bound on one platform listing call, in seconds
    #[serde(default = "default_sample_timeout")]
    pub sample_timeout_secs: u64,

    /// Upper bound on one storage call, in seconds
    #[serde(default = "default_store_timeout")]
    pub store_timeout_secs: u64,

    /// Maximum gap between samples of one session, in seconds
    #[serde(default = "default_gap_tolerance")]
    pub gap_tolerance_secs: i64,

    /// Node-name substring marking accelerator-backed placements
    #[serde(default = "default_gpu_pattern")]
    pub gpu_node_pattern: String,
}

fn default_namespace() -> String {
    "jupyterhub".to_string()
}

fn default_pod_prefix() -> String {
    "jupyter-".to_string()
}

fn default_email_domain() -> String {
    "illinois.edu".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_sample_interval() -> u64 {
    300
}

fn default_sample_timeout() -> u64 {
    60
}

fn default_store_timeout() -> u64 {
    60
}

fn default_gap_tolerance() -> i64 {
    3600
}

fn default_gpu_pattern() -> String {
    "gpu".to_string()
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            pod_prefix: default_pod_prefix(),
            email_domain: default_email_domain(),
            api_port: default_api_port(),
            sample_interval_secs: default_sample_interval(),
            sample_timeout_secs: default_sample_timeout(),
            store_timeout_secs: default_store_timeout(),
            gap_tolerance_secs: default_gap_tolerance(),
            gpu_node_pattern: default_gpu_pattern(),
        }
    }
}

impl CollectorConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("COLLECTOR"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_default())
    }

    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            pod_prefix: self.pod_prefix.clone(),
            email_domain: self.email_domain.clone(),
        }
    }

    pub fn cycle_config(&self) -> CycleConfig {
        CycleConfig {
            interval: std::time::Duration::from_secs(self.sample_interval_secs),
            sample_timeout: std::time::Duration::from_secs(self.sample_timeout_secs),
            store_timeout: std::time::Duration::from_secs(self.store_timeout_secs),
        }
    }

    pub fn aggregate_policy(&self) -> AggregatePolicy {
        AggregatePolicy {
            gap_tolerance: chrono::Duration::seconds(self.gap_tolerance_secs),
            gpu_node_pattern: self.gpu_node_pattern.clone(),
        }
    }
}
