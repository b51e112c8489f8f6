//! Agents and review oracles
//!
//! The scheduler never talks to a model directly. Work goes through a
//! [`TaskAgent`] and judgement through a [`ReviewOracle`]; both are traits so
//! a run can be driven by external commands or by scripted fakes.

pub mod command;
pub mod traits;
pub mod verdict;

pub use command::{CommandAgent, CommandError, CommandReviewOracle, CommandRunner};
pub use traits::{ReviewKind, ReviewOracle, TaskAgent};
pub use verdict::{is_approval, Verdict};
