//! The recorded result of one task execution.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput {
    /// Description of the task, after input interpolation.
    pub description: String,
    pub expected_output: String,
    /// First ten words of the description.
    pub summary: String,
    /// Final answer text.
    pub raw: String,
    /// Role of the agent that produced the answer.
    pub agent: String,
    pub completed_at: DateTime<Utc>,
}

impl TaskOutput {
    pub fn new(
        description: impl Into<String>,
        expected_output: impl Into<String>,
        agent: impl Into<String>,
        raw: impl Into<String>,
    ) -> Self {
        let description = description.into();
        let summary = Self::generate_summary(&description);
        Self {
            description,
            expected_output: expected_output.into(),
            summary,
            raw: raw.into(),
            agent: agent.into(),
            completed_at: Utc::now(),
        }
    }

    fn generate_summary(description: &str) -> String {
        let excerpt = description
            .split_whitespace()
            .take(10)
            .collect::<Vec<&str>>()
            .join(" ");
        format!("{}...", excerpt)
    }
}

impl fmt::Display for TaskOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
