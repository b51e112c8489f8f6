//! Review verdict parsing
//!
//! Verdicts are free text. A verdict approves iff its lowercase form
//! contains "approved" and none of the rejection phrases.

use serde::{Deserialize, Serialize};

const REJECTION_PHRASES: [&str; 3] = ["not approved", "needs improvement", "blocked"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub approved: bool,
    pub text: String,
}

impl Verdict {
    pub fn parse(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            approved: is_approval(&text),
            text,
        }
    }

    /// First non-empty line, for log output
    pub fn headline(&self) -> &str {
        self.text
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("")
    }
}

pub fn is_approval(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("approved") && !REJECTION_PHRASES.iter().any(|p| lower.contains(p))
}
