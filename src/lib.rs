//! # crew-engine
//!
//! Orchestrates a crew of LLM-backed agents working through a list of tasks,
//! in one of three process topologies: sequential hand-off, a manager that
//! delegates to the members, or autonomous self-planning.
//!
//! The model backend and the tools are traits ([`BaseLLM`], [`BaseTool`]);
//! the crate ships no provider. Free-text tool requests from a model go
//! through the tool invocation engine ([`tools::tool_usage`]), which turns
//! them into structured calls, caches results and recovers from malformed
//! output with bounded retries.

pub mod agent;
pub mod agents;
pub mod context;
pub mod crew;
pub mod crews;
pub mod llms;
pub mod process;
pub mod task;
pub mod tasks;
pub mod telemetry;
pub mod tools;
pub mod types;
pub mod utilities;

#[cfg(test)]
pub(crate) mod test_support;

pub use agent::{Agent, AgentRef};
pub use context::ExecutionContext;
pub use crew::{Crew, CrewBuilder};
pub use crews::crew_config::CrewConfig;
pub use crews::crew_output::{CrewOutput, KickoffOutput};
pub use llms::base_llm::{BaseLLM, LLMMessage, LLMResponse, TokenUsage};
pub use process::Process;
pub use task::Task;
pub use tasks::task_output::TaskOutput;
pub use tools::base_tool::{BaseTool, Tool};
pub use types::usage_metrics::{MetricsPolicy, UsageMetrics};
pub use utilities::errors::{ConfigurationError, CrewError};
pub use utilities::logger::init_logging;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
