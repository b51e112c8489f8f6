//! Result validation heuristics
//!
//! Summaries are unstructured text, so these checks are deliberately shallow.
//! Only the keyword check can fail a task; everything else is a warning.

use crate::domain::blueprint::{Blueprint, BlueprintType};

const FAILURE_KEYWORDS: [&str; 7] = [
    "fail", "error", "blocker", "blocked", "cannot", "unable", "exception",
];

const SUCCESS_KEYWORDS: [&str; 6] = [
    "success", "succeeded", "complete", "done", "passed", "implemented",
];

const UI_EVIDENCE_KEYWORDS: [&str; 2] = ["screenshot", "state"];

/// Findings for one task summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultCheck {
    /// Set when the summary reports a failure and no success
    pub failure: Option<String>,
    pub warnings: Vec<String>,
}

impl ResultCheck {
    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

/// Where a task is expected to put its artifacts
pub fn evidence_path(session_id: &str, task_id: &str) -> String {
    format!("evidence/{}/{}/", session_id, task_id)
}

/// Apply the heuristics to one summary
pub fn check_result(
    blueprint: &Blueprint,
    summary: &str,
    session_id: &str,
    max_lines: usize,
) -> ResultCheck {
    let mut check = ResultCheck::default();
    let lower = summary.to_lowercase();

    let lines = summary.trim().lines().count();
    if lines > max_lines {
        check.warnings.push(format!(
            "summary is {} lines long (expected at most {})",
            lines, max_lines
        ));
    }

    let failure = FAILURE_KEYWORDS.iter().find(|k| lower.contains(*k));
    let success = SUCCESS_KEYWORDS.iter().any(|k| lower.contains(k));
    if let (Some(keyword), false) = (failure, success) {
        check.failure = Some(format!("summary reports a failure ('{}')", keyword));
    }

    let evidence = evidence_path(session_id, &blueprint.id);
    if !summary.contains(&evidence) {
        check
            .warnings
            .push(format!("summary does not reference {}", evidence));
    }

    if blueprint.kind == BlueprintType::Ui
        && !UI_EVIDENCE_KEYWORDS.iter().any(|k| lower.contains(k))
    {
        check
            .warnings
            .push("UI summary mentions no screenshot or state".to_string());
    }

    check
}
