//! Autonomous process: a planner designs a sub-crew for each declared task.

use std::sync::Arc;

use crate::agent::{Agent, AgentRef};
use crate::context::ExecutionContext;
use crate::crews::crew_config::CrewConfig;
use crate::llms::base_llm::BaseLLM;
use crate::process::Process;
use crate::task::Task;
use crate::tasks::task_output::TaskOutput;
use crate::tools::base_tool::BaseTool;
use crate::types::usage_metrics::UsageMetrics;
use crate::utilities::errors::CrewError;
use crate::utilities::string_utils::{extract_json_object, format_template};

/// Renders the tool catalogue the planner may hand out.
pub fn describe_catalogue(tools: &[Arc<dyn BaseTool>]) -> String {
    if tools.is_empty() {
        return "No tools available.".to_string();
    }
    tools
        .iter()
        .map(|tool| {
            format!(
                "Tool Name: {}\nTool Description: {}\nTool Arguments: {}",
                tool.name().to_lowercase(),
                tool.description(),
                tool.args_schema()
            )
        })
        .collect::<Vec<_>>()
        .join("\n--\n")
}

/// Plans and runs sub-crews on behalf of an autonomous crew.
pub struct AutonomousPlanner {
    planner: AgentRef,
    llm: Arc<dyn BaseLLM>,
    catalogue: Vec<Arc<dyn BaseTool>>,
    /// Usage of every sub-crew run so far.
    sub_crew_metrics: Vec<UsageMetrics>,
}

impl AutonomousPlanner {
    pub fn new(
        llm: Arc<dyn BaseLLM>,
        catalogue: Vec<Arc<dyn BaseTool>>,
        ctx: &ExecutionContext,
    ) -> Self {
        let i18n = &ctx.i18n;
        let planner = Agent::new(
            i18n.retrieve("planning_agent", "role"),
            i18n.retrieve("planning_agent", "goal"),
            i18n.retrieve("planning_agent", "backstory"),
            Arc::clone(&llm),
        )
        .into_ref();
        Self {
            planner,
            llm,
            catalogue,
            sub_crew_metrics: Vec::new(),
        }
    }

    /// Ask the planner for a crew that accomplishes `task`.
    pub fn plan(&self, task: &Task, ctx: &ExecutionContext) -> Result<CrewConfig, CrewError> {
        let description = format_template(
            &ctx.i18n.slice("planning_task"),
            &[
                ("task", &task.description),
                ("goal", &task.expected_output),
                ("tools_list", &describe_catalogue(&self.catalogue)),
            ],
        );
        let mut planning = Task::new(description, ctx.i18n.slice("planning_expected_output"));
        let no_tools: Vec<Arc<dyn BaseTool>> = Vec::new();
        let answer = planning.execute(Some(&self.planner), None, Some(no_tools.as_slice()), ctx)?;

        let value = extract_json_object(&answer)
            .ok_or_else(|| CrewError::Planning(format!("planner answer is not JSON: {}", answer)))?;
        let mut plan =
            CrewConfig::from_value(value).map_err(|e| CrewError::Planning(e.to_string()))?;
        if plan.process == Some(Process::Autonomous) {
            plan.process = Some(Process::Sequential);
        }
        Ok(plan)
    }

    /// Plan and run a sub-crew for every task, in order.
    ///
    /// Sub-crews share `ctx`, so the parent's cache and rate limiter apply.
    pub fn run(
        &mut self,
        tasks: &mut [Task],
        ctx: &ExecutionContext,
    ) -> Result<Vec<TaskOutput>, CrewError> {
        let mut outputs = Vec::with_capacity(tasks.len());
        for task in tasks.iter_mut() {
            let plan = self.plan(task, ctx)?;
            log::info!(
                "Planned {} crew with {} agents and {} tasks for '{}'",
                plan.process.unwrap_or_default(),
                plan.agents.len(),
                plan.tasks.len(),
                task.description
            );

            let mut crew = plan
                .into_builder(&self.llm, &self.catalogue)
                .and_then(|builder| {
                    builder
                        .manager_llm(Arc::clone(&self.llm))
                        .execution_context(ctx.clone())
                        .build()
                })
                .map_err(|e| CrewError::Planning(e.to_string()))?;
            let result = crew.kickoff(None)?;
            if let Some(metrics) = crew.usage_metrics.take() {
                self.sub_crew_metrics.push(metrics);
            }

            let output = TaskOutput::new(
                task.description.clone(),
                task.expected_output.clone(),
                self.planner.read().role.clone(),
                result.raw(),
            );
            if let Some(callback) = &task.callback {
                callback(&output);
            }
            task.output = Some(output.clone());
            outputs.push(output);
        }
        Ok(outputs)
    }

    /// Planner usage followed by the usage of every sub-crew.
    pub fn usage_metrics(&self) -> Vec<UsageMetrics> {
        let mut metrics = vec![self.planner.read().usage_metrics()];
        metrics.extend(self.sub_crew_metrics.iter().cloned());
        metrics
    }
}
