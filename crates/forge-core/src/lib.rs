//! Forge Core Library
//!
//! This crate provides the core of Forge, a resource-locking, layered
//! execution engine for blueprint-driven build work:
//! - Lock registry with deadlock-avoidance ordering, wait queues and expiry
//! - Layered batch scheduler with pre/post review gates
//! - Result validation and cross-reference conflict detection
//! - Agent and review-oracle interfaces, with process-backed adapters
//! - Configuration with file persistence

pub mod agents;
pub mod config;
pub mod domain;
pub mod error;
pub mod scheduler;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::agents::{ReviewKind, ReviewOracle, TaskAgent, Verdict};
    pub use crate::config::Config;
    pub use crate::domain::blueprint::{Blueprint, BlueprintResources, BlueprintType, ExecutionPlan};
    pub use crate::domain::locking::{LockConfig, LockManager, ResourceId};
    pub use crate::error::{Error, Result};
    pub use crate::scheduler::{GateMode, LayerScheduler, RunReport, SchedulerConfig, TaskStatus};
}
