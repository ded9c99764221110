//! Synthetic tools that let an agent delegate work to its coworkers.

pub mod agent_tools;
pub mod delegate_work_tool;

pub use agent_tools::AgentTools;
pub use delegate_work_tool::{delegate_tool_name, DelegateWorkTool};
