//! Kubernetes pod listing for the sampler seam

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::api::core::v1::Pod;
use kube::{
    api::{Api, ListParams},
    Client,
};
use tracing::debug;
use usage_lib::sampler::{PodRecord, PodSampler, UNKNOWN};

/// Lists running pods in the hub namespace via the Kubernetes API
pub struct KubePodSampler {
    pods: Api<Pod>,
}

impl KubePodSampler {
    /// Connect using in-cluster configuration (or local kubeconfig when
    /// running outside the cluster).
    pub async fn new(namespace: &str) -> Result<Self> {
        let client = Client::try_default()
            .await
            .context("Failed to build Kubernetes client")?;
        Ok(Self {
            pods: Api::namespaced(client, namespace),
        })
    }
}

#[async_trait]
impl PodSampler for KubePodSampler {
    async fn list_running_pods(&self) -> Result<Vec<PodRecord>> {
        let params = ListParams::default().fields("status.phase=Running");
        let listing = self
            .pods
            .list(&params)
            .await
            .context("Pod listing failed")?;

        let records: Vec<PodRecord> = listing.items.iter().filter_map(pod_to_record).collect();
        debug!(pods = records.len(), "Listed running pods");
        Ok(records)
    }
}

/// Flatten the API object into the sampler's wire shape.
///
/// Missing placement or image attributes degrade to the unknown sentinel;
/// only a missing name drops the pod entirely.
fn pod_to_record(pod: &Pod) -> Option<PodRecord> {
    let pod_name = pod.metadata.name.clone()?;

    let node_name = pod
        .spec
        .as_ref()
        .and_then(|spec| spec.node_name.clone())
        .unwrap_or_else(|| UNKNOWN.to_string());

    let image = pod
        .spec
        .as_ref()
        .and_then(|spec| spec.containers.first())
        .and_then(|container| container.image.clone())
        .unwrap_or_else(|| UNKNOWN.to_string());

    let started_at = pod
        .metadata
        .creation_timestamp
        .as_ref()
        .map(|t| t.0)
        .unwrap_or_else(Utc::now);

    Some(PodRecord {
        pod_name,
        node_name,
        image,
        started_at,
    })
}
