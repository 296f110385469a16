//! Engine library for JupyterHub container usage tracking
//!
//! This crate provides the core functionality for:
//! - Periodic pod sampling and observation normalization
//! - Identity reconciliation (ephemeral pod names to stable users)
//! - Idempotent observation storage
//! - Session reconstruction from discrete samples
//! - Aggregate maintenance with atomic snapshot publishing
//! - Health checks and observability

pub mod aggregates;
pub mod health;
pub mod identity;
pub mod models;
pub mod observability;
pub mod query;
pub mod sampler;
pub mod sessions;
pub mod store;

pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{EngineMetrics, StructuredLogger};
