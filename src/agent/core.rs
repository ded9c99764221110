//! The agent: a persona bound to a model, a tool belt and a token counter.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use md5::{Digest, Md5};
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::agents::crew_agent_executor::CrewAgentExecutor;
use crate::agents::parser::AgentStep;
use crate::agents::token_process::TokenProcess;
use crate::agents::tools_handler::ToolsHandler;
use crate::context::ExecutionContext;
use crate::llms::base_llm::BaseLLM;
use crate::task::Task;
use crate::tools::base_tool::{render_text_description, tool_names, BaseTool};
use crate::tools::tool_registry::ToolRegistry;
use crate::types::usage_metrics::UsageMetrics;
use crate::utilities::errors::AgentError;
use crate::utilities::logger::Logger;
use crate::utilities::prompts::{AgentInfo, Prompts};
use crate::utilities::string_utils::{format_template, interpolate_only};

/// Called after every parsed step of the reasoning loop.
pub type StepCallback = Arc<dyn Fn(&AgentStep) + Send + Sync>;

/// An agent shared between a crew, its tasks and delegation tools.
///
/// Executions take the read lock; kickoff setup takes the write lock.
pub type AgentRef = Arc<RwLock<Agent>>;

pub const DEFAULT_MAX_ITER: usize = 15;
pub const DEFAULT_MAX_RETRY_LIMIT: u32 = 2;

pub struct Agent {
    pub id: Uuid,
    /// Role of the agent.
    pub role: String,
    /// Objective of the agent.
    pub goal: String,
    /// Backstory of the agent.
    pub backstory: String,
    /// Tools at the agent's disposal.
    pub tools: Vec<Arc<dyn BaseTool>>,
    /// Enable the agent to delegate work to its coworkers.
    pub allow_delegation: bool,
    /// Model that runs the reasoning loop.
    pub llm: Arc<dyn BaseLLM>,
    /// Model that turns tool requests into structured calls. Falls back to
    /// `llm`.
    pub function_calling_llm: Option<Arc<dyn BaseLLM>>,
    pub step_callback: Option<StepCallback>,
    /// Reasoning iterations before a final answer is forced.
    pub max_iter: usize,
    /// Extra whole-execution attempts after a model backend failure.
    pub max_retry_limit: u32,
    pub verbose: bool,
    /// Usage of this agent's model.
    pub token_process: TokenProcess,
    /// Last tool call across every task this agent runs, for the
    /// repeated-usage guard.
    pub tools_handler: Mutex<ToolsHandler>,

    original_role: Option<String>,
    original_goal: Option<String>,
    original_backstory: Option<String>,
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("goal", &self.goal)
            .field("llm", &self.llm.model())
            .field("tools", &self.tools.len())
            .field("allow_delegation", &self.allow_delegation)
            .finish_non_exhaustive()
    }
}

impl Agent {
    pub fn new(
        role: impl Into<String>,
        goal: impl Into<String>,
        backstory: impl Into<String>,
        llm: Arc<dyn BaseLLM>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: role.into(),
            goal: goal.into(),
            backstory: backstory.into(),
            tools: Vec::new(),
            allow_delegation: false,
            llm,
            function_calling_llm: None,
            step_callback: None,
            max_iter: DEFAULT_MAX_ITER,
            max_retry_limit: DEFAULT_MAX_RETRY_LIMIT,
            verbose: false,
            token_process: TokenProcess::new(),
            tools_handler: Mutex::new(ToolsHandler::default()),
            original_role: None,
            original_goal: None,
            original_backstory: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<Arc<dyn BaseTool>>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_allow_delegation(mut self, allow_delegation: bool) -> Self {
        self.allow_delegation = allow_delegation;
        self
    }

    pub fn with_function_calling_llm(mut self, llm: Arc<dyn BaseLLM>) -> Self {
        self.function_calling_llm = Some(llm);
        self
    }

    pub fn with_step_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&AgentStep) + Send + Sync + 'static,
    {
        self.step_callback = Some(Arc::new(callback));
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Wrap the agent for sharing.
    pub fn into_ref(self) -> AgentRef {
        Arc::new(RwLock::new(self))
    }

    pub fn logger(&self) -> Logger {
        Logger::new(self.verbose)
    }

    /// Execute `task` with the given tools and return the final answer.
    ///
    /// A model backend failure restarts the whole execution, up to
    /// `max_retry_limit` extra times.
    pub fn execute_task(
        &self,
        task: &mut Task,
        context: Option<&str>,
        tools: &[Arc<dyn BaseTool>],
        ctx: &ExecutionContext,
    ) -> Result<String, AgentError> {
        let prompt = self.build_prompt(task, context, tools, ctx);
        let registry = ToolRegistry::new(tools);

        let mut retries = 0;
        loop {
            let mut executor = CrewAgentExecutor::new(self, task, registry.clone(), ctx);
            match executor.invoke(prompt.clone()) {
                Ok(answer) => return Ok(answer),
                Err(e) if retries < self.max_retry_limit => {
                    retries += 1;
                    log::warn!(
                        "Agent '{}' model call failed ({}), retry {}/{}",
                        self.role,
                        e,
                        retries,
                        self.max_retry_limit
                    );
                }
                Err(e) => {
                    return Err(AgentError::Llm {
                        role: self.role.clone(),
                        source: e,
                    })
                }
            }
        }
    }

    fn build_prompt(
        &self,
        task: &Task,
        context: Option<&str>,
        tools: &[Arc<dyn BaseTool>],
        ctx: &ExecutionContext,
    ) -> String {
        let i18n = &ctx.i18n;
        let template = Prompts::new(i18n, !tools.is_empty()).task_execution(&AgentInfo {
            role: &self.role,
            goal: &self.goal,
            backstory: &self.backstory,
        });

        let mut input = task.prompt(&i18n.slice("expected_output"));
        if let Some(context) = context.filter(|c| !c.is_empty()) {
            input.push_str(&format_template(
                &i18n.slice("context"),
                &[("context", context)],
            ));
        }

        format_template(
            &template,
            &[
                ("tools", &render_text_description(tools)),
                ("tool_names", &tool_names(tools)),
                ("input", &input),
            ],
        )
    }

    /// Fill `{key}` placeholders in role, goal and backstory, always from
    /// the original text.
    pub fn interpolate_inputs(&mut self, inputs: &HashMap<String, String>) {
        let role = self.original_role.get_or_insert_with(|| self.role.clone());
        let goal = self.original_goal.get_or_insert_with(|| self.goal.clone());
        let backstory = self
            .original_backstory
            .get_or_insert_with(|| self.backstory.clone());

        self.role = interpolate_only(role, inputs);
        self.goal = interpolate_only(goal, inputs);
        self.backstory = interpolate_only(backstory, inputs);
    }

    /// MD5 of the uninterpolated role, goal and backstory.
    pub fn key(&self) -> String {
        let role = self.original_role.as_deref().unwrap_or(&self.role);
        let goal = self.original_goal.as_deref().unwrap_or(&self.goal);
        let backstory = self
            .original_backstory
            .as_deref()
            .unwrap_or(&self.backstory);

        let mut hasher = Md5::new();
        hasher.update(format!("{}|{}|{}", role, goal, backstory).as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn usage_metrics(&self) -> UsageMetrics {
        self.token_process.get_summary()
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Agent(role={}, goal={})", self.role, self.goal)
    }
}
