//! Lock types and error definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Result type for lock operations
pub type LockResult<T> = std::result::Result<T, LockError>;

/// Lock errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// Resource is held by another task
    #[error("Lock conflict: resource '{resource}' is held by task '{holder}'")]
    Conflict { resource: String, holder: String },

    /// Malformed resource identifier or request
    #[error("Invalid lock request: {0}")]
    InvalidRequest(String),
}

impl LockError {
    /// Get error code for this lock error
    pub fn code(&self) -> &'static str {
        match self {
            Self::Conflict { .. } => "E301",
            Self::InvalidRequest(_) => "E303",
        }
    }
}

/// Category of a lockable resource
///
/// Declaration order is the deadlock-avoidance order: every multi-resource
/// request is acquired migrations first and files last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceCategory {
    Migration,
    Table,
    RlsPolicy,
    TypeDefinition,
    ServiceFunction,
    Route,
    Component,
    File,
}

impl ResourceCategory {
    /// All categories in acquisition order
    pub const ALL: [ResourceCategory; 8] = [
        Self::Migration,
        Self::Table,
        Self::RlsPolicy,
        Self::TypeDefinition,
        Self::ServiceFunction,
        Self::Route,
        Self::Component,
        Self::File,
    ];

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Migration => "migration",
            Self::Table => "table",
            Self::RlsPolicy => "rls-policy",
            Self::TypeDefinition => "type-definition",
            Self::ServiceFunction => "service-function",
            Self::Route => "route",
            Self::Component => "component",
            Self::File => "file",
        }
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResourceCategory {
    type Err = LockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| LockError::InvalidRequest(format!("unknown resource category '{}'", s)))
    }
}

/// A `(category, name)` pair identifying one lockable resource
///
/// Ordering compares category priority first, then name, which is exactly
/// the order requests are acquired in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    pub category: ResourceCategory,
    pub name: String,
}

impl ResourceId {
    pub fn new(category: ResourceCategory, name: impl Into<String>) -> Self {
        Self {
            category,
            name: name.into(),
        }
    }

    pub fn table(name: impl Into<String>) -> Self {
        Self::new(ResourceCategory::Table, name)
    }

    pub fn route(name: impl Into<String>) -> Self {
        Self::new(ResourceCategory::Route, name)
    }

    pub fn migration(name: impl Into<String>) -> Self {
        Self::new(ResourceCategory::Migration, name)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category, self.name)
    }
}

impl FromStr for ResourceId {
    type Err = LockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (category, name) = s.split_once(':').ok_or_else(|| {
            LockError::InvalidRequest(format!("expected 'category:name', got '{}'", s))
        })?;
        if name.is_empty() {
            return Err(LockError::InvalidRequest(format!("empty resource name in '{}'", s)));
        }
        Ok(Self::new(category.parse()?, name))
    }
}

/// Lock mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    Read,
    Write,
}

impl LockMode {
    /// Whether a held lock in `self` mode blocks a request in `requested` mode
    pub fn conflicts_with(self, requested: LockMode) -> bool {
        self == LockMode::Write || requested == LockMode::Write
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
        }
    }
}

/// A single lock request for one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRequest {
    pub resource: ResourceId,
    pub mode: LockMode,
}

impl LockRequest {
    pub fn write(resource: ResourceId) -> Self {
        Self {
            resource,
            mode: LockMode::Write,
        }
    }

    pub fn read(resource: ResourceId) -> Self {
        Self {
            resource,
            mode: LockMode::Read,
        }
    }
}

/// A granted lock, owned by the lock registry
#[derive(Debug, Clone, Serialize)]
pub struct LockRecord {
    /// Locked resource
    pub resource: ResourceId,
    /// Lock mode
    pub mode: LockMode,
    /// Task holding the lock
    pub holder: String,
    /// When the lock was granted
    pub acquired_at: DateTime<Utc>,
    /// When the lock lapses (`acquired_at + max_duration`)
    pub expires_at: DateTime<Utc>,
    /// Monotonic deadline used for expiry decisions
    #[serde(skip)]
    pub(crate) deadline: Instant,
}

impl LockRecord {
    /// Build a grant. `acquired_at` and `now` are taken once per
    /// acquisition so every lock of one task shares a deadline.
    pub(crate) fn new(
        request: &LockRequest,
        holder: &str,
        acquired_at: DateTime<Utc>,
        now: Instant,
        max_duration: Duration,
    ) -> Self {
        Self {
            resource: request.resource.clone(),
            mode: request.mode,
            holder: holder.to_string(),
            acquired_at,
            expires_at: acquired_at + chrono::Duration::from_std(max_duration).unwrap_or_default(),
            deadline: now + max_duration,
        }
    }

    pub(crate) fn refresh(
        &mut self,
        acquired_at: DateTime<Utc>,
        now: Instant,
        max_duration: Duration,
    ) {
        self.acquired_at = acquired_at;
        self.expires_at =
            acquired_at + chrono::Duration::from_std(max_duration).unwrap_or_default();
        self.deadline = now + max_duration;
    }

    /// Check if the lock is expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    pub(crate) fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.deadline
    }
}

/// A resource a task could not acquire
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockConflict {
    pub resource: ResourceId,
    pub holder: String,
    pub held_mode: LockMode,
    pub requested_mode: LockMode,
}

/// Outcome of an all-or-nothing acquisition attempt
#[derive(Debug, Clone)]
pub enum AcquireOutcome {
    /// Every requested lock was granted, in acquisition order
    Granted(Vec<LockRecord>),
    /// Nothing was granted
    Blocked(Vec<LockConflict>),
}

impl AcquireOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }

    pub fn conflicts(&self) -> &[LockConflict] {
        match self {
            Self::Granted(_) => &[],
            Self::Blocked(conflicts) => conflicts,
        }
    }

    /// Granted records, or the first conflict as an error
    pub fn into_result(self) -> LockResult<Vec<LockRecord>> {
        match self {
            Self::Granted(records) => Ok(records),
            Self::Blocked(conflicts) => Err(conflicts
                .into_iter()
                .next()
                .map(|c| LockError::Conflict {
                    resource: c.resource.to_string(),
                    holder: c.holder,
                })
                .unwrap_or_else(|| {
                    LockError::InvalidRequest("blocked without a conflict".to_string())
                })),
        }
    }
}

/// Configuration for the lock manager
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// How long a grant lives before it is forcibly reclaimed
    pub max_duration: Duration,

    /// Retry interval when waiting for a lock
    pub retry_interval: Duration,

    /// Interval between stale-lock sweeps run by the reaper
    pub sweep_interval: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(15 * 60),
            retry_interval: Duration::from_millis(500),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl LockConfig {
    /// Set the maximum lock duration
    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }

    /// Set the retry interval
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Set the sweep interval
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}
