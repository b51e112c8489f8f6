//! Layered batch scheduler
//!
//! Turns an [`ExecutionPlan`](crate::domain::blueprint::ExecutionPlan) into
//! sequential layers of bounded, optionally parallel batches. Every batch goes
//! through the same steps:
//!
//! 1. Pre-validation of each specification by the review oracle
//! 2. Dispatch: acquire locks, invoke the agent, release locks
//! 3. Result validation heuristics on each summary
//! 4. Cross-referencing of the batch's results
//! 5. Post-verification of each successful summary
//!
//! A layer is done only when all of its batches are.

pub mod batch;
pub mod cross_reference;
pub mod executor;
pub mod report;
pub mod validation;

pub use batch::split_into_batches;
pub use cross_reference::{
    CrossReferenceReport, FileConflict, IntegrationLink, LinkKind, cross_reference,
};
pub use executor::LayerScheduler;
pub use report::{BatchReport, LayerReport, RunReport, TaskReport, TaskStatus};
pub use validation::{ResultCheck, check_result, evidence_path};

use serde::{Deserialize, Serialize};

/// Default number of tasks per batch
pub const DEFAULT_MAX_CONCURRENCY: usize = 3;

/// Summaries longer than this many lines draw a warning
pub const DEFAULT_MAX_SUMMARY_LINES: usize = 7;

/// What a non-approving review verdict does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateMode {
    /// Log the verdict and carry on
    #[default]
    Advisory,
    /// Reject the task
    Blocking,
}

impl GateMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Advisory => "advisory",
            Self::Blocking => "blocking",
        }
    }
}

impl std::fmt::Display for GateMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for GateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "advisory" => Ok(Self::Advisory),
            "blocking" => Ok(Self::Blocking),
            other => Err(format!(
                "Invalid gate mode: {}. Valid options: advisory, blocking",
                other
            )),
        }
    }
}

/// Scheduler settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Batch size within a layer
    pub max_concurrency: usize,
    /// Run a batch's tasks concurrently; otherwise in array order
    pub parallel: bool,
    /// Send specifications to the review oracle before dispatch
    pub pre_validate: bool,
    /// Send successful summaries to the review oracle after dispatch
    pub post_verify: bool,
    pub gate_mode: GateMode,
    pub max_summary_lines: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            parallel: true,
            pre_validate: true,
            post_verify: true,
            gate_mode: GateMode::Advisory,
            max_summary_lines: DEFAULT_MAX_SUMMARY_LINES,
        }
    }
}

impl SchedulerConfig {
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_pre_validate(mut self, enabled: bool) -> Self {
        self.pre_validate = enabled;
        self
    }

    pub fn with_post_verify(mut self, enabled: bool) -> Self {
        self.post_verify = enabled;
        self
    }

    pub fn with_gate_mode(mut self, gate_mode: GateMode) -> Self {
        self.gate_mode = gate_mode;
        self
    }
}
