//! The crew: a group of agents, the tasks they perform and the process that
//! sequences them.
//!
//! A crew is configured once through [`CrewBuilder`] and can be kicked off
//! any number of times. It owns the tool result cache and the rate limiter
//! for its whole lifetime and hands both down through the
//! [`ExecutionContext`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use md5::{Digest, Md5};
use uuid::Uuid;

use crate::agent::{Agent, AgentRef, StepCallback};
use crate::agents::cache::CacheHandler;
use crate::agents::parser::AgentStep;
use crate::context::ExecutionContext;
use crate::crews::crew_output::{CrewOutput, KickoffOutput};
use crate::crews::planning::AutonomousPlanner;
use crate::llms::base_llm::BaseLLM;
use crate::process::Process;
use crate::task::{Task, TaskCallback};
use crate::tasks::task_output::TaskOutput;
use crate::telemetry::Telemetry;
use crate::tools::agent_tools::AgentTools;
use crate::tools::base_tool::{append_unique_tools, BaseTool};
use crate::types::usage_metrics::{aggregate_metrics, MetricsPolicy, UsageMetrics};
use crate::utilities::errors::{ConfigurationError, CrewError};
use crate::utilities::file_handler::{FileHandler, OutputLogFile};
use crate::utilities::i18n::I18N;
use crate::utilities::logger::{Logger, PrinterColor};
use crate::utilities::rpm_controller::RPMController;

const DEFAULT_RPM_WINDOW: Duration = Duration::from_secs(60);

/// Configures and validates a [`Crew`].
pub struct CrewBuilder {
    tasks: Vec<Task>,
    agents: Vec<AgentRef>,
    process: Process,
    verbose: bool,
    cache: bool,
    memory: bool,
    max_rpm: Option<u32>,
    rpm_window: Duration,
    full_output: bool,
    output_log_file: Option<OutputLogFile>,
    manager_llm: Option<Arc<dyn BaseLLM>>,
    manager_agent: Option<AgentRef>,
    function_calling_llm: Option<Arc<dyn BaseLLM>>,
    step_callback: Option<StepCallback>,
    task_callback: Option<TaskCallback>,
    autonomous_llm: Option<Arc<dyn BaseLLM>>,
    autonomous_tools: Vec<Arc<dyn BaseTool>>,
    prompt_file: Option<String>,
    metrics_policy: MetricsPolicy,
    telemetry: Option<Telemetry>,
    context: Option<ExecutionContext>,
}

impl Default for CrewBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CrewBuilder {
    /// An empty builder: sequential process, cache on, no rate limit.
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            agents: Vec::new(),
            process: Process::default(),
            verbose: false,
            cache: true,
            memory: false,
            max_rpm: None,
            rpm_window: DEFAULT_RPM_WINDOW,
            full_output: false,
            output_log_file: None,
            manager_llm: None,
            manager_agent: None,
            function_calling_llm: None,
            step_callback: None,
            task_callback: None,
            autonomous_llm: None,
            autonomous_tools: Vec::new(),
            prompt_file: None,
            metrics_policy: MetricsPolicy::default(),
            telemetry: None,
            context: None,
        }
    }

    /// Add one crew member.
    pub fn agent(mut self, agent: &AgentRef) -> Self {
        self.agents.push(Arc::clone(agent));
        self
    }

    /// Add several crew members, in order.
    pub fn agents(mut self, agents: Vec<AgentRef>) -> Self {
        self.agents.extend(agents);
        self
    }

    /// Add one task. Tasks run in the order they are added.
    pub fn task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    /// Add several tasks, in order.
    pub fn tasks(mut self, tasks: Vec<Task>) -> Self {
        self.tasks.extend(tasks);
        self
    }

    /// How the tasks are carried out. Sequential unless set.
    pub fn process(mut self, process: Process) -> Self {
        self.process = process;
        self
    }

    /// Print working agent, task and output to the console.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Cache tool results for the crew's lifetime (on by default).
    pub fn cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    /// Flag the crew as memory-enabled. The memory backend itself is
    /// supplied by the host.
    pub fn memory(mut self, memory: bool) -> Self {
        self.memory = memory;
        self
    }

    /// Ceiling on model requests per window, shared by every agent. Zero
    /// leaves the crew unlimited.
    pub fn max_rpm(mut self, max_rpm: u32) -> Self {
        self.max_rpm = Some(max_rpm).filter(|&max| max > 0);
        self
    }

    /// Length of the rate limiter window. One minute unless set.
    pub fn rpm_window(mut self, window: Duration) -> Self {
        self.rpm_window = window;
        self
    }

    /// Return every task output and the aggregated usage instead of the
    /// last raw answer.
    pub fn full_output(mut self, full_output: bool) -> Self {
        self.full_output = full_output;
        self
    }

    /// Append task lifecycle lines to `target`. `true` selects `logs.txt`,
    /// `false` turns the log off.
    pub fn output_log_file(mut self, target: impl Into<OutputLogFile>) -> Self {
        self.output_log_file = Some(target.into());
        self
    }

    /// Model for the synthesized manager of a hierarchical crew.
    pub fn manager_llm(mut self, llm: Arc<dyn BaseLLM>) -> Self {
        self.manager_llm = Some(llm);
        self
    }

    /// Custom manager for a hierarchical crew. Must not be a crew member
    /// and must not hold tools.
    pub fn manager_agent(mut self, agent: &AgentRef) -> Self {
        self.manager_agent = Some(Arc::clone(agent));
        self
    }

    /// Model that structures tool calls for agents without their own.
    pub fn function_calling_llm(mut self, llm: Arc<dyn BaseLLM>) -> Self {
        self.function_calling_llm = Some(llm);
        self
    }

    /// Called after every reasoning step of agents without their own
    /// callback.
    pub fn step_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&AgentStep) + Send + Sync + 'static,
    {
        self.step_callback = Some(Arc::new(callback));
        self
    }

    /// Called with each task output, for tasks without their own callback.
    pub fn task_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&TaskOutput) + Send + Sync + 'static,
    {
        self.task_callback = Some(Arc::new(callback));
        self
    }

    /// Model that plans and staffs sub-crews in the autonomous process.
    pub fn autonomous_llm(mut self, llm: Arc<dyn BaseLLM>) -> Self {
        self.autonomous_llm = Some(llm);
        self
    }

    /// Tool catalogue the autonomous planner may hand to its agents.
    pub fn autonomous_tools(mut self, tools: Vec<Arc<dyn BaseTool>>) -> Self {
        self.autonomous_tools = tools;
        self
    }

    /// Custom prompt catalogue overlaid on the embedded English one.
    pub fn prompt_file(mut self, path: impl Into<String>) -> Self {
        self.prompt_file = Some(path.into());
        self
    }

    /// How usage counters with different key sets are combined.
    pub fn metrics_policy(mut self, policy: MetricsPolicy) -> Self {
        self.metrics_policy = policy;
        self
    }

    /// Telemetry handle. Defaults to spans on the global tracer only.
    pub fn telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Run inside a parent crew's context: share its cache, rate limiter,
    /// prompts and telemetry instead of creating new ones.
    pub(crate) fn execution_context(mut self, ctx: ExecutionContext) -> Self {
        self.context = Some(ctx);
        self
    }

    /// Validate the configuration and create the crew, its cache and its
    /// rate limiter.
    pub fn build(self) -> Result<Crew, ConfigurationError> {
        let inherited_context = self.context.is_some();
        let ctx = match self.context {
            Some(ctx) => ctx,
            None => {
                let i18n = Arc::new(I18N::new(self.prompt_file.as_deref())?);
                let logger = Logger::new(self.verbose);
                let mut ctx = ExecutionContext::new(i18n, self.telemetry.unwrap_or_default())
                    .with_logger(logger.clone());
                if self.cache {
                    ctx = ctx.with_cache(CacheHandler::new());
                }
                if let Some(max_rpm) = self.max_rpm {
                    let rpm = RPMController::with_window(Some(max_rpm), self.rpm_window)
                        .with_logger(logger);
                    ctx = ctx.with_rpm_controller(Arc::new(rpm));
                }
                ctx
            }
        };

        let crew = Crew {
            id: Uuid::new_v4(),
            tasks: self.tasks,
            agents: self.agents,
            process: self.process,
            verbose: self.verbose,
            cache: self.cache,
            memory: self.memory,
            max_rpm: self.max_rpm,
            full_output: self.full_output,
            manager_llm: self.manager_llm,
            manager_agent: self.manager_agent,
            function_calling_llm: self.function_calling_llm,
            step_callback: self.step_callback,
            task_callback: self.task_callback,
            autonomous_llm: self.autonomous_llm,
            autonomous_tools: self.autonomous_tools,
            metrics_policy: self.metrics_policy,
            usage_metrics: None,
            file_handler: self.output_log_file.as_ref().and_then(FileHandler::new),
            ctx,
            manager: None,
            inherited_context,
        };
        crew.validate()?;

        if crew.memory {
            log::debug!("Crew {} runs with memory enabled", crew.id);
        }
        crew.ctx.telemetry.crew_creation(
            &crew.id.to_string(),
            crew.process.as_str(),
            crew.agents.len(),
            crew.tasks.len(),
        );
        Ok(crew)
    }
}

/// Outcome of one process run, before metrics aggregation.
struct ProcessRun {
    final_output: String,
    tasks_output: Vec<TaskOutput>,
    /// Usage of participants that are not crew members (manager, planner).
    extra_metrics: Vec<UsageMetrics>,
}

/// Runs one task with console and output-log bookkeeping.
struct TaskRunner<'a> {
    ctx: &'a ExecutionContext,
    file_handler: Option<&'a FileHandler>,
}

impl TaskRunner<'_> {
    fn run(
        &self,
        task: &mut Task,
        agent: Option<&AgentRef>,
        context: Option<&str>,
        tools: Option<&[Arc<dyn BaseTool>]>,
        role: &str,
    ) -> Result<TaskOutput, CrewError> {
        let logger = &self.ctx.logger;
        logger.log(
            "debug",
            &format!("== Working Agent: {}", role),
            Some(PrinterColor::BoldPurple),
        );
        logger.log(
            "info",
            &format!("== Starting Task: {}", task.description),
            Some(PrinterColor::BoldPurple),
        );
        if let Some(file_handler) = self.file_handler {
            file_handler.log_task(role, &task.description, "started");
        }

        let result = task.execute(agent, context, tools, self.ctx)?;

        logger.log(
            "debug",
            &format!("== [{}] Task output: {}\n\n", role, result),
            None,
        );
        if let Some(file_handler) = self.file_handler {
            file_handler.log_task(role, &result, "completed");
        }

        Ok(task.output.clone().unwrap_or_else(|| {
            TaskOutput::new(
                task.description.clone(),
                task.expected_output.clone(),
                role,
                result,
            )
        }))
    }
}

/// A group of agents and the tasks they perform.
pub struct Crew {
    /// Identifier reported in logs and telemetry.
    pub id: Uuid,
    /// Tasks in execution order.
    pub tasks: Vec<Task>,
    /// Crew members. A hierarchical manager is not one of them.
    pub agents: Vec<AgentRef>,
    /// How the tasks are carried out.
    pub process: Process,
    pub verbose: bool,
    /// Whether tool results are cached for the crew's lifetime.
    pub cache: bool,
    /// Memory is provided by the host; the crew only carries the flag.
    pub memory: bool,
    /// Model requests allowed per window, shared by all members.
    pub max_rpm: Option<u32>,
    /// Return every task output and the usage instead of the final answer.
    pub full_output: bool,
    /// Model of the synthesized manager in hierarchical crews.
    pub manager_llm: Option<Arc<dyn BaseLLM>>,
    /// Custom manager for hierarchical crews. Must not be a member.
    pub manager_agent: Option<AgentRef>,
    /// Installed on members that have no function calling model of their own.
    pub function_calling_llm: Option<Arc<dyn BaseLLM>>,
    /// Installed on members that have no step callback of their own.
    pub step_callback: Option<StepCallback>,
    /// Installed on tasks that have no callback of their own.
    pub task_callback: Option<TaskCallback>,
    /// Planner model of the autonomous process.
    pub autonomous_llm: Option<Arc<dyn BaseLLM>>,
    /// Catalogue the autonomous planner may hand to the agents it creates.
    pub autonomous_tools: Vec<Arc<dyn BaseTool>>,
    /// How member usage counters are combined after a run.
    pub metrics_policy: MetricsPolicy,
    /// Usage summed over everyone who took part, after a kickoff.
    pub usage_metrics: Option<UsageMetrics>,

    ctx: ExecutionContext,
    file_handler: Option<FileHandler>,
    /// The hierarchical manager, built on the first hierarchical kickoff.
    manager: Option<AgentRef>,
    /// Cache and rate limiter belong to a parent crew.
    inherited_context: bool,
}

impl fmt::Debug for Crew {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crew")
            .field("id", &self.id)
            .field("process", &self.process)
            .field("agents", &self.agents.len())
            .field("tasks", &self.tasks)
            .field("cache", &self.cache)
            .field("max_rpm", &self.max_rpm)
            .field("full_output", &self.full_output)
            .finish_non_exhaustive()
    }
}

impl Crew {
    pub fn builder() -> CrewBuilder {
        CrewBuilder::new()
    }

    pub fn execution_context(&self) -> &ExecutionContext {
        &self.ctx
    }

    /// The hierarchical manager, once it has been built.
    pub fn manager(&self) -> Option<&AgentRef> {
        self.manager.as_ref()
    }

    /// Check the configuration invariants.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.tasks.is_empty()
            || (self.agents.is_empty() && self.process != Process::Autonomous)
        {
            return Err(ConfigurationError::MissingAgentsOrTasks);
        }

        match self.process {
            Process::Sequential => {
                if let Some(task) = self.tasks.iter().find(|t| t.agent.is_none()) {
                    return Err(ConfigurationError::TaskWithoutAgent {
                        task: task.description.clone(),
                    });
                }
            }
            Process::Hierarchical => {
                if self.manager_llm.is_none() && self.manager_agent.is_none() {
                    return Err(ConfigurationError::MissingManager);
                }
                if let Some(manager) = &self.manager_agent {
                    if self.agents.iter().any(|a| Arc::ptr_eq(a, manager)) {
                        return Err(ConfigurationError::ManagerInAgents);
                    }
                }
            }
            Process::Autonomous => {
                if self.autonomous_llm.is_none() {
                    return Err(ConfigurationError::MissingAutonomousLlm);
                }
            }
        }
        Ok(())
    }

    /// MD5 over the agent and task keys.
    pub fn key(&self) -> String {
        let source: Vec<String> = self
            .agents
            .iter()
            .map(|agent| agent.read().key())
            .chain(self.tasks.iter().map(Task::key))
            .collect();
        let mut hasher = Md5::new();
        hasher.update(source.join("|").as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Run the crew's process and return the final answer.
    pub fn kickoff(
        &mut self,
        inputs: Option<HashMap<String, String>>,
    ) -> Result<KickoffOutput, CrewError> {
        self.validate()?;
        let crew_id = self.id.to_string();
        let span = self
            .ctx
            .telemetry
            .crew_execution(&crew_id, self.process.as_str());

        self.interpolate_inputs(&inputs.unwrap_or_default());
        self.set_tasks_callbacks();
        for agent in &self.agents {
            self.bind_agent(agent);
        }
        let owns_rpm = !self.inherited_context;
        if let Some(rpm) = self.ctx.rpm_controller.as_ref().filter(|_| owns_rpm) {
            rpm.start_rpm_counter();
        }

        let run = match self.process {
            Process::Sequential => self.run_sequential_process(),
            Process::Hierarchical => self.run_hierarchical_process(),
            Process::Autonomous => self.run_autonomous_process(),
        };

        if let Some(rpm) = self.ctx.rpm_controller.as_ref().filter(|_| owns_rpm) {
            rpm.stop_rpm_counter();
        }
        let result = run.and_then(|run| self.finish(run));
        self.ctx
            .telemetry
            .crew_execution_end(span, &crew_id, result.is_ok());
        result
    }

    /// Async entry point with the same contract as [`kickoff`](Self::kickoff).
    pub async fn kickoff_async(
        &mut self,
        inputs: Option<HashMap<String, String>>,
    ) -> Result<KickoffOutput, CrewError> {
        self.kickoff(inputs)
    }

    fn interpolate_inputs(&mut self, inputs: &HashMap<String, String>) {
        for task in &mut self.tasks {
            task.interpolate_inputs(inputs);
        }
        for agent in &self.agents {
            agent.write().interpolate_inputs(inputs);
        }
    }

    fn set_tasks_callbacks(&mut self) {
        for task in &mut self.tasks {
            if task.callback.is_none() {
                task.callback = self.task_callback.clone();
            }
        }
    }

    fn bind_agent(&self, agent: &AgentRef) {
        let mut agent = agent.write();
        if agent.function_calling_llm.is_none() {
            agent.function_calling_llm = self.function_calling_llm.clone();
        }
        if agent.step_callback.is_none() {
            agent.step_callback = self.step_callback.clone();
        }
    }

    fn run_sequential_process(&mut self) -> Result<ProcessRun, CrewError> {
        let runner = TaskRunner {
            ctx: &self.ctx,
            file_handler: self.file_handler.as_ref(),
        };
        let agents = &self.agents;
        let mut context: Option<String> = None;
        let mut tasks_output = Vec::with_capacity(self.tasks.len());

        for task in self.tasks.iter_mut() {
            let agent = task
                .agent
                .clone()
                .ok_or_else(|| ConfigurationError::TaskWithoutAgent {
                    task: task.description.clone(),
                })?;
            let (role, allow_delegation, own_tools) = {
                let guard = agent.read();
                (guard.role.clone(), guard.allow_delegation, guard.tools.clone())
            };

            // Delegation tools follow the coworkers' current roles, so they
            // are rebuilt every kickoff and never stored on the task.
            let tools = if allow_delegation && agents.len() > 1 {
                let delegation = AgentTools::for_agent(&agent, agents, self.ctx.clone()).tools();
                let mut tools = if task.tools.is_empty() {
                    own_tools
                } else {
                    task.tools.clone()
                };
                append_unique_tools(&mut tools, &delegation);
                Some(tools)
            } else {
                None
            };

            let output = runner.run(task, None, context.as_deref(), tools.as_deref(), &role)?;
            if !task.async_execution {
                context = Some(output.raw.clone());
            }
            tasks_output.push(output);
        }

        let final_output = context
            .or_else(|| tasks_output.last().map(|o| o.raw.clone()))
            .unwrap_or_default();
        Ok(ProcessRun {
            final_output,
            tasks_output,
            extra_metrics: Vec::new(),
        })
    }

    fn resolve_manager(&mut self) -> Result<AgentRef, ConfigurationError> {
        if let Some(manager) = &self.manager {
            return Ok(Arc::clone(manager));
        }
        let manager = match (&self.manager_agent, &self.manager_llm) {
            (Some(agent), _) => Arc::clone(agent),
            (None, Some(llm)) => {
                let i18n = &self.ctx.i18n;
                Agent::new(
                    i18n.retrieve("hierarchical_manager_agent", "role"),
                    i18n.retrieve("hierarchical_manager_agent", "goal"),
                    i18n.retrieve("hierarchical_manager_agent", "backstory"),
                    Arc::clone(llm),
                )
                .with_verbose(self.verbose)
                .into_ref()
            }
            (None, None) => return Err(ConfigurationError::MissingManager),
        };
        log::info!("Crew {} manager: {}", self.id, manager.read().role);
        self.manager = Some(Arc::clone(&manager));
        Ok(manager)
    }

    fn run_hierarchical_process(&mut self) -> Result<ProcessRun, CrewError> {
        let manager = self.resolve_manager()?;
        let role = {
            let mut guard = manager.write();
            if !guard.tools.is_empty() {
                return Err(ConfigurationError::ManagerHasTools.into());
            }
            guard.allow_delegation = true;
            guard.role.clone()
        };
        self.bind_agent(&manager);

        let delegation = AgentTools::new(self.agents.clone(), self.ctx.clone()).tools();
        let runner = TaskRunner {
            ctx: &self.ctx,
            file_handler: self.file_handler.as_ref(),
        };
        let mut context: Option<String> = None;
        let mut tasks_output = Vec::with_capacity(self.tasks.len());

        for task in self.tasks.iter_mut() {
            let output = runner.run(
                task,
                Some(&manager),
                context.as_deref(),
                Some(delegation.as_slice()),
                &role,
            )?;
            context = Some(output.raw.clone());
            tasks_output.push(output);
        }

        let manager_metrics = manager.read().usage_metrics();
        Ok(ProcessRun {
            final_output: context.unwrap_or_default(),
            tasks_output,
            extra_metrics: vec![manager_metrics],
        })
    }

    fn run_autonomous_process(&mut self) -> Result<ProcessRun, CrewError> {
        let llm = self
            .autonomous_llm
            .clone()
            .ok_or(ConfigurationError::MissingAutonomousLlm)?;
        let mut planner = AutonomousPlanner::new(llm, self.autonomous_tools.clone(), &self.ctx);
        let tasks_output = planner.run(&mut self.tasks, &self.ctx)?;

        Ok(ProcessRun {
            final_output: tasks_output
                .last()
                .map(|o| o.raw.clone())
                .unwrap_or_default(),
            tasks_output,
            extra_metrics: planner.usage_metrics(),
        })
    }

    fn finish(&mut self, run: ProcessRun) -> Result<KickoffOutput, CrewError> {
        let mut sources = run.extra_metrics;
        sources.extend(self.agents.iter().map(|agent| agent.read().usage_metrics()));
        let usage = aggregate_metrics(&sources, self.metrics_policy)?;
        self.usage_metrics = Some(usage.clone());

        if self.full_output {
            Ok(KickoffOutput::Full(CrewOutput::new(
                run.final_output,
                run.tasks_output,
                usage,
            )))
        } else {
            Ok(KickoffOutput::Raw(run.final_output))
        }
    }
}

impl fmt::Display for Crew {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Crew(id={}, process={}, number_of_agents={}, number_of_tasks={})",
            self.id,
            self.process,
            self.agents.len(),
            self.tasks.len()
        )
    }
}
