//! Session reconstruction from discrete observations
//!
//! A session is a maximal run of samples for one
//! `(user_email, pod_name, node_name)` partition in which consecutive
//! samples are no further apart than the gap tolerance. Because the node
//! is part of the partition key, a placement change always starts a new
//! session even when the time gap is zero.
//!
//! Reconstruction is a pure function over the observation set: running it
//! twice over the same rows yields identical session sets, so the derived
//! view can be rebuilt from scratch at any time.

use crate::models::{Observation, Session};
use chrono::Duration;
use std::collections::BTreeMap;

/// Default maximum gap between samples of one session (1 hour)
pub const DEFAULT_GAP_TOLERANCE_SECS: i64 = 3600;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Partition scope for session-boundary detection
type PartitionKey = (String, String, String);

/// Rebuild the full session set from an observation snapshot.
///
/// Input order does not matter; observations are grouped by partition and
/// sorted by sample time internally. Samples sharing a timestamp within a
/// partition are collapsed to one.
pub fn reconstruct(observations: &[Observation], gap_tolerance: Duration) -> Vec<Session> {
    let mut partitions: BTreeMap<PartitionKey, Vec<&Observation>> = BTreeMap::new();
    for obs in observations {
        let key = (
            obs.user_email.clone(),
            obs.pod_name.clone(),
            obs.node_name.clone(),
        );
        partitions.entry(key).or_default().push(obs);
    }

    let mut sessions = Vec::new();
    for ((email, pod, node), mut samples) in partitions {
        samples.sort_by_key(|o| o.sampled_at);
        samples.dedup_by_key(|o| o.sampled_at);

        let mut seq = 0u32;
        let mut run: Vec<&Observation> = Vec::new();
        for obs in samples {
            if let Some(prev) = run.last() {
                if obs.sampled_at - prev.sampled_at > gap_tolerance {
                    seq += 1;
                    sessions.push(close_run(&email, &pod, &node, seq, &run));
                    run.clear();
                }
            }
            run.push(obs);
        }
        if !run.is_empty() {
            seq += 1;
            sessions.push(close_run(&email, &pod, &node, seq, &run));
        }
    }

    sessions
}

/// Close one run of samples into a session record.
///
/// Runtime is the wall-clock span between the first and last sample of
/// the run. Summing per-sample ages would restate cumulative uptime at
/// every sample and over-count.
fn close_run(email: &str, pod: &str, node: &str, seq: u32, run: &[&Observation]) -> Session {
    let start_at = run[0].sampled_at;
    let end_at = run[run.len() - 1].sampled_at;
    let (container_base, container_version) = image_mode(run);

    Session {
        user_email: email.to_string(),
        pod_name: pod.to_string(),
        node_name: node.to_string(),
        session_seq: seq,
        start_at,
        end_at,
        runtime_hours: (end_at - start_at).num_seconds() as f64 / SECONDS_PER_HOUR,
        container_base,
        container_version,
    }
}

/// Most frequent `(base, version)` pair within a run, ties broken by
/// lexical order for determinism.
fn image_mode(run: &[&Observation]) -> (String, String) {
    let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for obs in run {
        *counts
            .entry((obs.container_base.as_str(), obs.container_version.as_str()))
            .or_default() += 1;
    }

    let mut best = ("", "", 0usize);
    for ((base, version), count) in counts {
        // Strictly greater keeps the lexically smallest pair on a tie,
        // since the map iterates in key order.
        if count > best.2 {
            best = (base, version, count);
        }
    }
    (best.0.to_string(), best.1.to_string())
}
