//! Agent and review-oracle traits
//!
//! Both are injected into the scheduler so it can run against real
//! processes or scripted fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::blueprint::Blueprint;
use crate::error::Result;

/// What the review oracle is being asked to judge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewKind {
    /// A blueprint's specification, before it runs
    PreValidation,
    /// A task's result summary, after it ran
    PostVerification,
}

impl ReviewKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreValidation => "pre-validation",
            Self::PostVerification => "post-verification",
        }
    }
}

impl std::fmt::Display for ReviewKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The boundary through which task work is delegated
///
/// Implementations may take arbitrarily long and return unstructured text.
/// An `Err` marks the task failed; siblings keep running.
#[async_trait]
pub trait TaskAgent: Send + Sync {
    async fn invoke(&self, blueprint: &Blueprint) -> Result<String>;
}

/// External reviewer consulted before and after task execution
///
/// An `Err` is a `ReviewOracleFailure` and propagates to the caller.
#[async_trait]
pub trait ReviewOracle: Send + Sync {
    async fn review(&self, kind: ReviewKind, content: &str) -> Result<String>;
}
