//! Shared utilities: errors, prompts, logging, rate limiting and the output
//! log.

pub mod errors;
pub mod file_handler;
pub mod i18n;
pub mod logger;
pub mod prompts;
pub mod rpm_controller;
pub mod string_utils;

pub use errors::{
    AgentError, AggregationError, ConfigurationError, CrewError, LLMError, TaskError,
    ToolUsageError,
};
pub use i18n::I18N;
pub use logger::Logger;
pub use rpm_controller::RPMController;
