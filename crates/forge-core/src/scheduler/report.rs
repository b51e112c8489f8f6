//! Run reports
//!
//! The scheduler's structured result: layers, batches and per-task outcomes
//! with the findings gathered along the way. Serializes to camelCase JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::cross_reference::CrossReferenceReport;
use crate::agents::Verdict;
use crate::domain::blueprint::BlueprintType;

/// Terminal state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Succeeded,
    /// Agent error or a summary reporting failure
    Failed,
    /// Lock deadline passed during invocation
    TimedOut,
    /// A blocking review gate said no
    Rejected,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::TimedOut => "timed-out",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskReport {
    pub task_id: String,
    pub kind: BlueprintType,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_validation: Option<Verdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_verification: Option<Verdict>,
    pub duration_ms: u64,
}

impl TaskReport {
    pub(crate) fn new(task_id: impl Into<String>, kind: BlueprintType, status: TaskStatus) -> Self {
        Self {
            task_id: task_id.into(),
            kind,
            status,
            summary: None,
            error: None,
            warnings: Vec::new(),
            pre_validation: None,
            post_verification: None,
            duration_ms: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub index: usize,
    pub tasks: Vec<TaskReport>,
    pub cross_reference: CrossReferenceReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerReport {
    pub index: usize,
    pub batches: Vec<BatchReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub layers: Vec<LayerReport>,
}

impl RunReport {
    /// Every task report in execution order
    pub fn tasks(&self) -> impl Iterator<Item = &TaskReport> {
        self.layers
            .iter()
            .flat_map(|l| &l.batches)
            .flat_map(|b| &b.tasks)
    }

    pub fn task(&self, task_id: &str) -> Option<&TaskReport> {
        self.tasks().find(|t| t.task_id == task_id)
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks().filter(|t| t.status == status).count()
    }

    /// True when every task succeeded
    pub fn is_success(&self) -> bool {
        self.tasks().all(|t| t.status == TaskStatus::Succeeded)
    }

    pub fn conflict_count(&self) -> usize {
        self.layers
            .iter()
            .flat_map(|l| &l.batches)
            .map(|b| b.cross_reference.conflicts.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(statuses: &[TaskStatus]) -> RunReport {
        let tasks = statuses
            .iter()
            .enumerate()
            .map(|(i, s)| TaskReport::new(format!("t{}", i), BlueprintType::Other, *s))
            .collect();
        RunReport {
            session_id: "s1".into(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            layers: vec![LayerReport {
                index: 0,
                batches: vec![BatchReport {
                    index: 0,
                    tasks,
                    cross_reference: CrossReferenceReport::default(),
                }],
            }],
        }
    }

    #[test]
    fn test_counts() {
        let run = report(&[TaskStatus::Succeeded, TaskStatus::TimedOut, TaskStatus::Succeeded]);
        assert_eq!(run.count(TaskStatus::Succeeded), 2);
        assert_eq!(run.count(TaskStatus::TimedOut), 1);
        assert!(!run.is_success());
        assert_eq!(run.task("t1").unwrap().status, TaskStatus::TimedOut);
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(report(&[TaskStatus::Succeeded])).unwrap();
        let task = &json["layers"][0]["batches"][0]["tasks"][0];
        assert_eq!(task["taskId"], "t0");
        assert_eq!(task["status"], "succeeded");
        assert!(task.get("summary").is_none());
    }
}
