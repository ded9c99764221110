//! Agent machinery: the reasoning loop, its reply parser, per-agent token
//! accounting, the tool result cache and last-used-tool tracking.

pub mod cache;
pub mod crew_agent_executor;
pub mod parser;
pub mod token_process;
pub mod tools_handler;

pub use cache::CacheHandler;
pub use crew_agent_executor::CrewAgentExecutor;
pub use parser::{AgentAction, AgentFinish, AgentStep, OutputParserError};
pub use token_process::TokenProcess;
pub use tools_handler::ToolsHandler;
