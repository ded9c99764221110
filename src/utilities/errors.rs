//! Error types for the crew engine.
//!
//! Only [`ConfigurationError`] is allowed to abort a run before any task
//! executes. [`ToolUsageError`] never leaves the tool invocation engine: it is
//! turned into observation text for the reasoning loop.

use thiserror::Error;

/// Construction-time and process-selection failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// The crew has neither tasks nor agents.
    #[error("Either 'agents' and 'tasks' need to be set or 'config'.")]
    MissingAgentsOrTasks,

    /// A declarative config lacks its `agents` or `tasks` key.
    #[error("Config should have 'agents' and 'tasks'.")]
    MissingConfigKeys,

    /// Hierarchical process without a way to build a manager.
    #[error("Attribute `manager_llm` or `manager_agent` is required when using hierarchical process.")]
    MissingManager,

    /// The custom manager agent is also listed as a crew member.
    #[error("Manager agent should not be included in agents list.")]
    ManagerInAgents,

    /// The custom manager agent was given domain tools.
    #[error("Manager agent should not have tools")]
    ManagerHasTools,

    /// Autonomous process without a planning model.
    #[error("Attribute `autonomous_llm` is required when using autonomous process.")]
    MissingAutonomousLlm,

    /// A task has no agent and the process cannot assign one.
    #[error("Task '{task}' has no agent assigned")]
    TaskWithoutAgent { task: String },

    /// A configured task references an agent role that does not exist.
    #[error("Task '{task}' references unknown agent role '{role}'")]
    UnknownAgentRole { task: String, role: String },

    /// The declarative config could not be decoded.
    #[error("Invalid crew config: {0}")]
    InvalidConfig(String),

    /// A custom prompt file could not be loaded.
    #[error("Failed to load prompt file '{path}': {message}")]
    PromptFile { path: String, message: String },
}

/// Failures inside one tool invocation.
///
/// `Parse` and `Execution` are retried up to the engine's attempt bound;
/// `NotFound` is terminal for the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolUsageError {
    #[error("Tool '{tool_name}' not found.")]
    NotFound { tool_name: String },

    #[error("Failed to parse tool calling: {0}")]
    Parse(String),

    #[error("Tool execution failed: {0}")]
    Execution(String),
}

impl ToolUsageError {
    /// Whether another attempt of the whole invocation may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ToolUsageError::NotFound { .. })
    }
}

/// Usage metric sources disagree on their counter names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Usage metrics source #{source_index} reports keys [{found}], expected [{expected}]")]
pub struct AggregationError {
    pub source_index: usize,
    pub expected: String,
    pub found: String,
}

/// Failures reported by a model backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LLMError {
    #[error("LLM request failed: {0}")]
    Request(String),

    #[error("LLM returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Failures of an agent while executing a task.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Agent '{role}' could not get a response from its model: {source}")]
    Llm {
        role: String,
        #[source]
        source: LLMError,
    },
}

/// Failures of a single task execution.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Task '{description}' has no agent to execute it")]
    NoAgent { description: String },

    #[error(transparent)]
    Agent(#[from] AgentError),
}

/// Top-level error returned by `Crew::kickoff`.
#[derive(Debug, Error)]
pub enum CrewError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error("Autonomous planning failed: {0}")]
    Planning(String),
}
