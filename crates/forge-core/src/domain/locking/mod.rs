//! Resource locking for concurrent blueprint execution
//!
//! This module guarantees that concurrently running tasks never hold
//! conflicting locks on a shared resource, never deadlock while waiting, and
//! that a stuck holder is reclaimed after a bounded time.
//!
//! # Architecture
//!
//! - **Resource ids**: `(category, name)` pairs such as `table:orders`
//! - **Ordering**: a fixed category order every request is sorted into
//! - **Lock Manager**: `LockManager`, the single owner of lock state
//! - **Wait queues**: per-resource lists of blocked tasks
//! - **Expiry**: per-task deadlines, a reaper task and a stale-lock sweep
//!
//! # Example
//!
//! ```ignore
//! use forge_core::domain::locking::{LockManager, LockConfig};
//!
//! let manager = LockManager::new(LockConfig::default());
//! let _reaper = manager.spawn_reaper();
//!
//! match manager.acquire_locks(&blueprint).await {
//!     AcquireOutcome::Granted(_) => { /* run the task */ }
//!     AcquireOutcome::Blocked(conflicts) => { /* wait and retry */ }
//! }
//!
//! manager.release_locks(&blueprint.id).await;
//! ```

pub mod event;
pub mod expiry;
pub mod manager;
pub mod ordering;
pub mod types;
pub mod wait_queue;

// Re-export main types
pub use event::{LockAction, LockEvent, LockTimeout};
pub use manager::{LockManager, ReaperHandle};
pub use ordering::sort_requests;
pub use types::{
    AcquireOutcome, LockConfig, LockConflict, LockError, LockMode, LockRecord, LockRequest,
    LockResult, ResourceCategory, ResourceId,
};
pub use wait_queue::WaitQueue;
