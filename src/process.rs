//! Process topologies a crew can follow.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a crew sequences its tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Process {
    /// Tasks run one after another; each result becomes the next context.
    #[default]
    Sequential,
    /// A manager agent executes every task by delegating to the members.
    Hierarchical,
    /// A planner designs a sub-crew for every declared task.
    Autonomous,
}

impl Process {
    pub fn as_str(&self) -> &'static str {
        match self {
            Process::Sequential => "sequential",
            Process::Hierarchical => "hierarchical",
            Process::Autonomous => "autonomous",
        }
    }
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
