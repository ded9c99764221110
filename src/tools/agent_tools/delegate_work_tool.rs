//! Delegation to one coworker.

use std::fmt;

use anyhow::{anyhow, Context as _};
use serde_json::{json, Map, Value};

use crate::agent::AgentRef;
use crate::context::ExecutionContext;
use crate::task::Task;
use crate::tools::base_tool::BaseTool;
use crate::utilities::string_utils::format_template;

/// Hands a task (or a question) to one specific coworker and returns the
/// coworker's answer.
pub struct DelegateWorkTool {
    name: String,
    description: String,
    coworker: AgentRef,
    coworker_role: String,
    /// Roles of every coworker reachable from the same agent, for errors.
    all_coworkers: Vec<String>,
    ctx: ExecutionContext,
}

impl fmt::Debug for DelegateWorkTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegateWorkTool")
            .field("name", &self.name)
            .field("coworker", &self.coworker_role)
            .finish()
    }
}

/// Name of the delegation tool for `role`.
pub fn delegate_tool_name(role: &str) -> String {
    format!("Delegate work to {}", role)
}

fn normalize_role(role: &str) -> String {
    role.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('"', "")
        .to_lowercase()
}

impl DelegateWorkTool {
    pub fn new(coworker: AgentRef, all_coworkers: Vec<String>, ctx: ExecutionContext) -> Self {
        let coworker_role = coworker.read().role.clone();
        let description = format_template(
            &ctx.i18n.tools("delegate_work"),
            &[("coworker", &coworker_role)],
        );
        Self {
            name: delegate_tool_name(&coworker_role),
            description,
            coworker,
            coworker_role,
            all_coworkers,
            ctx,
        }
    }

    pub fn coworker(&self) -> &AgentRef {
        &self.coworker
    }

    fn check_coworker(&self, arguments: &Map<String, Value>) -> anyhow::Result<()> {
        let Some(named) = arguments.get("coworker").and_then(Value::as_str) else {
            return Ok(());
        };
        if normalize_role(named) == normalize_role(&self.coworker_role) {
            return Ok(());
        }
        let options = self
            .all_coworkers
            .iter()
            .map(|role| format!("- {}", role))
            .collect::<Vec<_>>()
            .join("\n");
        Err(anyhow!(format_template(
            &self.ctx.i18n.errors("agent_tool_unexisting_coworker"),
            &[("coworkers", &options)],
        )))
    }
}

impl BaseTool for DelegateWorkTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn args_schema(&self) -> Value {
        json!({
            "task": {"type": "string", "description": "The task to delegate or the question to ask"},
            "context": {"type": "string", "description": "Everything the coworker needs to know"}
        })
    }

    fn run(&self, arguments: &Map<String, Value>) -> anyhow::Result<Value> {
        self.check_coworker(arguments)?;

        let description = arguments
            .get("task")
            .or_else(|| arguments.get("question"))
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("missing required argument 'task'"))?;
        let context = arguments
            .get("context")
            .and_then(Value::as_str)
            .unwrap_or_default();

        log::info!("Delegating to '{}': {}", self.coworker_role, description);
        let mut task = Task::new(description, self.ctx.i18n.tools("coworker_expected_output"));
        let answer = task
            .execute(Some(&self.coworker), Some(context), None, &self.ctx)
            .with_context(|| format!("coworker '{}' failed", self.coworker_role))?;
        Ok(Value::String(answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use crate::test_support::ScriptedLLM;

    #[test]
    fn test_name_and_description() {
        let agent = Agent::new("Writer", "Write", "Wordy", ScriptedLLM::new(["x"])).into_ref();
        let tool = DelegateWorkTool::new(agent, vec!["Writer".into()], ExecutionContext::default());
        assert_eq!(tool.name(), "Delegate work to Writer");
        assert!(tool.description().contains("co-worker Writer"));
    }

    #[test]
    fn test_runs_coworker_on_new_task() {
        let llm = ScriptedLLM::new(["Final Answer: a haiku about bees"]);
        let writer = Agent::new("Writer", "Write", "Wordy", llm.clone()).into_ref();
        let tool = DelegateWorkTool::new(writer, vec!["Writer".into()], ExecutionContext::default());

        let args = json!({"task": "Write a haiku", "context": "It is about bees"});
        let out = tool.run(args.as_object().unwrap()).unwrap();
        assert_eq!(out, json!("a haiku about bees"));

        let prompt = &llm.requests()[0][0].content;
        assert!(prompt.contains("Write a haiku"));
        assert!(prompt.contains("It is about bees"));
        assert!(prompt.contains("Your best answer to your co-worker"));
    }

    #[test]
    fn test_wrong_coworker_lists_options() {
        let writer = Agent::new("Writer", "Write", "Wordy", ScriptedLLM::new(["x"])).into_ref();
        let tool = DelegateWorkTool::new(
            writer,
            vec!["Writer".into(), "Researcher".into()],
            ExecutionContext::default(),
        );
        let args = json!({"task": "t", "coworker": "Chef"});
        let err = tool.run(args.as_object().unwrap()).unwrap_err();
        assert!(err.to_string().contains("- Researcher"));
    }

    #[test]
    fn test_missing_task_argument() {
        let writer = Agent::new("Writer", "Write", "Wordy", ScriptedLLM::new(["x"])).into_ref();
        let tool = DelegateWorkTool::new(writer, vec![], ExecutionContext::default());
        assert!(tool.run(&Map::new()).is_err());
    }
}
