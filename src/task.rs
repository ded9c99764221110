//! A unit of work executed by one agent.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use md5::{Digest, Md5};
use uuid::Uuid;

use crate::agent::AgentRef;
use crate::context::ExecutionContext;
use crate::tasks::task_output::TaskOutput;
use crate::tools::base_tool::{append_unique_tools, BaseTool};
use crate::utilities::errors::TaskError;
use crate::utilities::string_utils::{format_template, interpolate_only};

/// Called with the output of every completed task.
pub type TaskCallback = Arc<dyn Fn(&TaskOutput) + Send + Sync>;

pub struct Task {
    pub id: Uuid,
    /// What the agent must do. May contain `{input}` placeholders.
    pub description: String,
    /// What a complete answer looks like.
    pub expected_output: String,
    /// The agent responsible for the task. Hierarchical crews may leave it
    /// empty and let the manager execute it.
    pub agent: Option<AgentRef>,
    /// Tools available while executing this task. Empty means the agent's
    /// own tools.
    pub tools: Vec<Arc<dyn BaseTool>>,
    /// Run without feeding the result forward as the next task's context.
    pub async_execution: bool,
    pub callback: Option<TaskCallback>,
    /// Result of the latest execution.
    pub output: Option<TaskOutput>,
    /// Tool invocations made while executing this task.
    pub used_tools: u32,
    /// Tool invocations that ended in an error observation.
    pub tools_errors: u32,

    original_description: Option<String>,
    original_expected_output: Option<String>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("expected_output", &self.expected_output)
            .field("has_agent", &self.agent.is_some())
            .field("tools", &self.tools.len())
            .field("async_execution", &self.async_execution)
            .finish_non_exhaustive()
    }
}

impl Task {
    pub fn new(description: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            expected_output: expected_output.into(),
            agent: None,
            tools: Vec::new(),
            async_execution: false,
            callback: None,
            output: None,
            used_tools: 0,
            tools_errors: 0,
            original_description: None,
            original_expected_output: None,
        }
    }

    pub fn with_agent(mut self, agent: &AgentRef) -> Self {
        self.agent = Some(Arc::clone(agent));
        self
    }

    pub fn with_tools(mut self, tools: Vec<Arc<dyn BaseTool>>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_async_execution(mut self, async_execution: bool) -> Self {
        self.async_execution = async_execution;
        self
    }

    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&TaskOutput) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Execute the task and return the raw answer.
    ///
    /// The executing agent is `agent` if given, else the task's own agent.
    /// Tools are `tools` if given, else the task's tools, else the agent's.
    pub fn execute(
        &mut self,
        agent: Option<&AgentRef>,
        context: Option<&str>,
        tools: Option<&[Arc<dyn BaseTool>]>,
        ctx: &ExecutionContext,
    ) -> Result<String, TaskError> {
        let agent = agent
            .or(self.agent.as_ref())
            .cloned()
            .ok_or_else(|| TaskError::NoAgent {
                description: self.description.clone(),
            })?;

        let guard = agent.read();
        let tools: Vec<Arc<dyn BaseTool>> = match tools {
            Some(tools) => tools.to_vec(),
            None if !self.tools.is_empty() => self.tools.clone(),
            None => guard.tools.clone(),
        };

        let result = guard.execute_task(self, context, &tools, ctx)?;

        let output = TaskOutput::new(
            self.description.clone(),
            self.expected_output.clone(),
            guard.role.clone(),
            result.clone(),
        );
        drop(guard);

        if let Some(callback) = &self.callback {
            callback(&output);
        }
        self.output = Some(output);
        Ok(result)
    }

    /// The task part of the agent prompt.
    pub fn prompt(&self, expected_output_slice: &str) -> String {
        let expected = format_template(
            expected_output_slice,
            &[("expected_output", &self.expected_output)],
        );
        format!("{}{}", self.description, expected)
    }

    /// Append tools whose canonical name is not already present.
    ///
    /// Returns how many tools were added.
    pub fn add_tools(&mut self, tools: &[Arc<dyn BaseTool>]) -> usize {
        append_unique_tools(&mut self.tools, tools)
    }

    /// Fill `{key}` placeholders from `inputs`.
    ///
    /// Always starts from the text the task was created with, so repeated
    /// kickoffs with different inputs do not compound.
    pub fn interpolate_inputs(&mut self, inputs: &HashMap<String, String>) {
        let description = self
            .original_description
            .get_or_insert_with(|| self.description.clone());
        let expected_output = self
            .original_expected_output
            .get_or_insert_with(|| self.expected_output.clone());

        self.description = interpolate_only(description, inputs);
        self.expected_output = interpolate_only(expected_output, inputs);
    }

    /// MD5 of the uninterpolated description and expected output.
    pub fn key(&self) -> String {
        let description = self
            .original_description
            .as_deref()
            .unwrap_or(&self.description);
        let expected = self
            .original_expected_output
            .as_deref()
            .unwrap_or(&self.expected_output);

        let mut hasher = Md5::new();
        hasher.update(format!("{}|{}", description, expected).as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn increment_tools_errors(&mut self) {
        self.tools_errors += 1;
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task(description={})", self.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use crate::test_support::ScriptedLLM;
    use crate::tools::base_tool::Tool;
    use parking_lot::Mutex;
    use serde_json::json;

    fn tool(name: &str) -> Arc<dyn BaseTool> {
        Tool::new(name, "test", |_| Ok(json!("ok"))).into_shared()
    }

    #[test]
    fn test_interpolation_keeps_templates() {
        let mut task = Task::new("Research {topic}", "A report on {topic}");
        let key = task.key();

        task.interpolate_inputs(&HashMap::from([("topic".into(), "bees".into())]));
        assert_eq!(task.description, "Research bees");
        assert_eq!(task.expected_output, "A report on bees");

        task.interpolate_inputs(&HashMap::from([("topic".into(), "ants".into())]));
        assert_eq!(task.description, "Research ants");
        assert_eq!(task.key(), key);
    }

    #[test]
    fn test_interpolation_is_stable_when_values_hold_placeholders() {
        let inputs = HashMap::from([
            ("a".to_string(), "{b}".to_string()),
            ("b".to_string(), "bees".to_string()),
        ]);
        for _ in 0..100 {
            let mut task = Task::new("{a}", "About {b}");
            task.interpolate_inputs(&inputs);
            assert_eq!(task.description, "{b}");
            assert_eq!(task.expected_output, "About bees");
        }
    }

    #[test]
    fn test_unresolved_placeholders_stay() {
        let mut task = Task::new("Write for {audience}", "text");
        task.interpolate_inputs(&HashMap::new());
        assert_eq!(task.description, "Write for {audience}");
    }

    #[test]
    fn test_add_tools_is_idempotent() {
        let mut task = Task::new("d", "e").with_tools(vec![tool("Search")]);
        assert_eq!(task.add_tools(&[tool("search"), tool("Calculator")]), 1);
        assert_eq!(task.add_tools(&[tool("calculator")]), 0);
        assert_eq!(task.tools.len(), 2);
    }

    #[test]
    fn test_execute_without_agent_fails() {
        let mut task = Task::new("Orphan task", "nothing");
        let err = task
            .execute(None, None, None, &ExecutionContext::default())
            .unwrap_err();
        assert!(matches!(err, TaskError::NoAgent { .. }));
    }

    #[test]
    fn test_execute_records_output_and_calls_back() {
        let llm = ScriptedLLM::new(["Thought: easy\nFinal Answer: 42"]);
        let agent = Agent::new("Solver", "Solve", "Good at sums", llm).into_ref();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut task = Task::new("What is 6 * 7?", "A number")
            .with_agent(&agent)
            .with_callback(move |output| sink.lock().push(output.raw.clone()));

        let result = task
            .execute(None, None, None, &ExecutionContext::default())
            .unwrap();
        assert_eq!(result, "42");
        let output = task.output.as_ref().unwrap();
        assert_eq!(output.agent, "Solver");
        assert_eq!(output.raw, "42");
        assert_eq!(*seen.lock(), vec!["42".to_string()]);
    }
}
