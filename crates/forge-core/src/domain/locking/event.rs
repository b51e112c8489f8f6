//! Lock history
//!
//! Append-only audit entries written by the lock manager. Diagnostic only:
//! nothing reads them back to make locking decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::ResourceId;

/// What happened to a lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockAction {
    /// A lock was granted
    Acquired,
    /// A lock was released by its holder
    Released,
    /// A lock outlived its maximum duration and was reclaimed
    Expired,
}

impl LockAction {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Acquired => "acquired",
            Self::Released => "released",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for LockAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One audit entry in the lock history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockEvent {
    /// Unique event identifier
    pub id: Uuid,
    /// What happened
    pub action: LockAction,
    /// Resource affected
    pub resource: ResourceId,
    /// Task that held or requested the lock
    pub task_id: String,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
}

impl LockEvent {
    /// Create a new lock event
    pub fn new(action: LockAction, resource: ResourceId, task_id: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            resource,
            task_id: task_id.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn acquired(resource: ResourceId, task_id: &str) -> Self {
        Self::new(LockAction::Acquired, resource, task_id)
    }

    pub fn released(resource: ResourceId, task_id: &str) -> Self {
        Self::new(LockAction::Released, resource, task_id)
    }

    pub fn expired(resource: ResourceId, task_id: &str) -> Self {
        Self::new(LockAction::Expired, resource, task_id)
    }
}

/// Notification published when a task's locks are reclaimed by expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockTimeout {
    pub task_id: String,
    pub resources: Vec<ResourceId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_constructors() {
        let event = LockEvent::expired(ResourceId::table("orders"), "task-x");
        assert_eq!(event.action, LockAction::Expired);
        assert_eq!(event.resource.to_string(), "table:orders");
        assert_eq!(event.task_id, "task-x");
    }

    #[test]
    fn test_event_serializes_action_in_snake_case() {
        let event = LockEvent::acquired(ResourceId::route("/api/x"), "api-1");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["action"], "acquired");
        assert_eq!(json["resource"]["category"], "route");
        assert_eq!(json["resource"]["name"], "/api/x");
    }
}
