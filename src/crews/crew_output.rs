//! Result of a crew run.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::tasks::task_output::TaskOutput;
use crate::types::usage_metrics::UsageMetrics;

/// Full record of a kickoff.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrewOutput {
    /// Raw output of the last task.
    pub final_output: String,
    /// Output of each task, in execution order.
    pub tasks_output: Vec<TaskOutput>,
    /// Usage summed over every agent that ran.
    pub token_usage: UsageMetrics,
}

impl CrewOutput {
    pub fn new(
        final_output: String,
        tasks_output: Vec<TaskOutput>,
        token_usage: UsageMetrics,
    ) -> Self {
        Self {
            final_output,
            tasks_output,
            token_usage,
        }
    }
}

impl fmt::Display for CrewOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.final_output)
    }
}

/// What `Crew::kickoff` hands back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KickoffOutput {
    /// The last task's raw output.
    Raw(String),
    /// Every task output plus usage, when the crew runs in full-output mode.
    Full(CrewOutput),
}

impl KickoffOutput {
    /// The final answer, whatever the output mode.
    pub fn raw(&self) -> &str {
        match self {
            KickoffOutput::Raw(raw) => raw,
            KickoffOutput::Full(output) => &output.final_output,
        }
    }

    pub fn into_full(self) -> Option<CrewOutput> {
        match self {
            KickoffOutput::Full(output) => Some(output),
            KickoffOutput::Raw(_) => None,
        }
    }
}

impl fmt::Display for KickoffOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.raw())
    }
}
