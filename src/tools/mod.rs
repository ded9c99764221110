//! Tools and the tool invocation engine.

pub mod agent_tools;
pub mod base_tool;
pub mod tool_calling;
pub mod tool_registry;
pub mod tool_usage;

pub use base_tool::{BaseTool, Tool};
pub use tool_calling::ToolCalling;
pub use tool_registry::ToolRegistry;
pub use tool_usage::ToolUsage;
