//! The tool invocation engine.
//!
//! Turns a model's free-text tool request into a validated [`ToolCalling`],
//! runs it and renders the observation the reasoning loop feeds back to the
//! model. Every failure mode ends as observation text; nothing here returns
//! an error to the caller.
//!
//! One invocation goes through:
//!
//! 1. normalize the ReAct vocabulary,
//! 2. parse through the function-calling model (behind the rate limiter),
//! 3. refuse an exact repeat of the previous call,
//! 4. resolve the tool by name,
//! 5. read the crew cache,
//! 6. execute,
//! 7. format the result, reminding the model of the tools every few uses,
//! 8. record the call and emit telemetry.
//!
//! Parse and execution failures retry the whole pipeline, sharing one
//! attempt counter.

use std::sync::Arc;

use serde_json::{json, Value};

use super::base_tool::{render_text_description, tool_names, BaseTool};
use super::tool_calling::ToolCalling;
use super::tool_registry::ToolRegistry;
use crate::agents::tools_handler::ToolsHandler;
use crate::context::ExecutionContext;
use crate::llms::base_llm::{BaseLLM, LLMMessage};
use crate::task::Task;
use crate::utilities::errors::ToolUsageError;
use crate::utilities::logger::PrinterColor;
use crate::utilities::string_utils::{format_template, value_to_text};

/// Attempts per invocation, parse and execution failures combined.
pub const MAX_PARSING_ATTEMPTS: u32 = 2;

/// The tool reminder is appended on every Nth usage within a task.
pub const REMEMBER_FORMAT_AFTER_USAGES: u32 = 3;

/// Normalize ReAct vocabulary into the tool-calling vocabulary.
pub fn normalize_tool_string(text: &str) -> String {
    text.replace("Thought: Do I need to use a tool? Yes", "")
        .replace("Action Input:", "Tool Arguments:")
        .replace("Action:", "Tool Name:")
        .trim()
        .to_string()
}

fn tool_calling_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "function_name": {"type": "string"},
            "arguments": {"type": "object"}
        },
        "required": ["function_name", "arguments"]
    })
}

/// One tool invocation on behalf of an agent executing a task.
pub struct ToolUsage<'a> {
    tools_handler: &'a mut ToolsHandler,
    registry: &'a ToolRegistry,
    task: &'a mut Task,
    function_calling_llm: Arc<dyn BaseLLM>,
    ctx: &'a ExecutionContext,
    tools_description: String,
    tools_names: String,
    /// Current attempt, starting at 1.
    pub run_attempts: u32,
    pub max_parsing_attempts: u32,
    pub remember_format_after_usages: u32,
    /// Tool resolved by the latest attempt, for error messages.
    current_tool: Option<Arc<dyn BaseTool>>,
}

impl<'a> ToolUsage<'a> {
    pub fn new(
        tools_handler: &'a mut ToolsHandler,
        registry: &'a ToolRegistry,
        task: &'a mut Task,
        function_calling_llm: Arc<dyn BaseLLM>,
        ctx: &'a ExecutionContext,
    ) -> Self {
        Self {
            tools_description: render_text_description(registry.tools()),
            tools_names: tool_names(registry.tools()),
            tools_handler,
            registry,
            task,
            function_calling_llm,
            ctx,
            run_attempts: 1,
            max_parsing_attempts: MAX_PARSING_ATTEMPTS,
            remember_format_after_usages: REMEMBER_FORMAT_AFTER_USAGES,
            current_tool: None,
        }
    }

    /// Run the tool requested in `tool_string` and return the observation.
    pub fn use_tool(&mut self, tool_string: &str) -> String {
        let text = normalize_tool_string(tool_string);

        loop {
            match self.attempt(&text) {
                Ok(observation) => return observation,
                Err(err) if err.is_retryable() && self.run_attempts < self.max_parsing_attempts => {
                    log::debug!(
                        "Tool usage attempt {} failed, retrying: {}",
                        self.run_attempts,
                        err
                    );
                    self.run_attempts += 1;
                }
                Err(err) => return self.degrade(err),
            }
        }
    }

    fn attempt(&mut self, text: &str) -> Result<String, ToolUsageError> {
        self.current_tool = None;
        let calling = self.tool_calling(text)?;

        if self.tools_handler.is_repeat(&calling) {
            self.ctx.telemetry.tool_repeated_usage(
                self.function_calling_llm.model(),
                &calling.function_name,
                self.run_attempts,
            );
            let message = format_template(
                &self.ctx.i18n.errors("task_repeated_usage"),
                &[
                    ("tool", &calling.function_name),
                    ("tool_input", &calling.argument_values()),
                ],
            );
            self.ctx.logger.print(&message, PrinterColor::Yellow);
            return Ok(self.format_result(message));
        }

        let tool = self.registry.resolve(&calling.function_name)?;
        self.current_tool = Some(Arc::clone(&tool));

        let input = calling.serialized_arguments();
        let cached = self
            .tools_handler
            .cache
            .as_ref()
            .and_then(|cache| cache.read(tool.name(), &input));

        let (output, should_cache) = match cached {
            Some(value) => {
                log::debug!("Cache hit for tool '{}'", tool.name());
                (value, false)
            }
            None => {
                let value = tool
                    .run(&calling.arguments)
                    .map_err(|e| ToolUsageError::Execution(format!("{:#}", e)))?;
                let should_cache = tool.cache_function(&calling.arguments, &value);
                (value, should_cache)
            }
        };

        let result = self.format_result(value_to_text(&output));
        self.tools_handler
            .on_tool_use(&calling, &output, should_cache);
        self.ctx.telemetry.tool_usage(
            self.function_calling_llm.model(),
            tool.name(),
            self.run_attempts,
        );
        Ok(result)
    }

    /// Ask the function-calling model to restate `text` as a structured call.
    fn tool_calling(&self, text: &str) -> Result<ToolCalling, ToolUsageError> {
        self.ctx.wait_for_rpm();

        let prompt = format_template(
            &self.ctx.i18n.slice("tool_calling"),
            &[
                ("available_tools", &self.tools_description),
                ("tool_string", text),
            ],
        );
        let value = self
            .function_calling_llm
            .call_structured(&[LLMMessage::user(prompt)], &tool_calling_schema())
            .map_err(|e| ToolUsageError::Parse(e.to_string()))?;

        ToolCalling::from_value(value).map_err(|e| ToolUsageError::Parse(e.to_string()))
    }

    /// Count the usage and append the tool reminder every few uses.
    fn format_result(&mut self, result: String) -> String {
        self.task.used_tools += 1;
        if self.task.used_tools % self.remember_format_after_usages == 0 {
            let reminder = format_template(
                &self.ctx.i18n.slice("tools"),
                &[
                    ("tools", &self.tools_description),
                    ("tool_names", &self.tools_names),
                ],
            );
            return format!("{}\n\n{}", result, reminder);
        }
        result
    }

    /// Turn a final failure into the observation shown to the model.
    fn degrade(&mut self, err: ToolUsageError) -> String {
        self.task.increment_tools_errors();
        let i18n = &self.ctx.i18n;

        let message = match &err {
            ToolUsageError::Parse(_) => {
                self.ctx
                    .telemetry
                    .tool_usage_error(self.function_calling_llm.model());
                let reminder = format_template(
                    &i18n.slice("tools"),
                    &[
                        ("tools", &self.tools_description),
                        ("tool_names", &self.tools_names),
                    ],
                );
                format!("{}\n{}", i18n.errors("tool_usage_error"), reminder)
            }
            ToolUsageError::NotFound { tool_name } => format_template(
                &i18n.errors("wrong_tool_name"),
                &[("tool", tool_name), ("tools", &self.tools_names)],
            ),
            ToolUsageError::Execution(detail) => {
                self.ctx
                    .telemetry
                    .tool_usage_error(self.function_calling_llm.model());
                let (name, inputs) = match &self.current_tool {
                    Some(tool) => (tool.name().to_string(), tool.args_schema().to_string()),
                    None => (String::new(), String::new()),
                };
                format_template(
                    &i18n.errors("tool_usage_exception"),
                    &[("error", detail), ("tool", &name), ("tool_inputs", &inputs)],
                )
            }
        };

        log::warn!("Tool usage failed after {} attempt(s): {}", self.run_attempts, err);
        self.ctx
            .logger
            .print(&format!("\n\n{}\n", message), PrinterColor::Red);
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::cache::CacheHandler;
    use crate::telemetry::tests::RecordingSink;
    use crate::telemetry::{Telemetry, TelemetryEventKind};
    use crate::test_support::ScriptedLLM;
    use crate::tools::base_tool::Tool;
    use crate::utilities::i18n::I18N;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        registry: ToolRegistry,
        handler: ToolsHandler,
        task: Task,
        ctx: ExecutionContext,
        runs: Arc<AtomicUsize>,
        sink: Arc<RecordingSink>,
    }

    fn fixture(tool: Tool, runs: Arc<AtomicUsize>) -> Fixture {
        let sink = Arc::new(RecordingSink::default());
        let ctx = ExecutionContext::new(Arc::new(I18N::default()), Telemetry::recording(sink.clone()))
            .with_cache(CacheHandler::new());
        Fixture {
            registry: ToolRegistry::new(&[tool.into_shared()]),
            handler: ToolsHandler::new(ctx.cache.clone()),
            task: Task::new("Research bees", "Facts"),
            ctx,
            runs,
            sink,
        }
    }

    fn counting_search(runs: Arc<AtomicUsize>) -> Tool {
        Tool::new("Search", "Searches the web", move |args| {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(json!(format!(
                "results for {}",
                args.get("q").and_then(Value::as_str).unwrap_or("")
            )))
        })
        .with_args_schema(json!({"q": "string"}))
    }

    fn use_tool(f: &mut Fixture, llm: &Arc<ScriptedLLM>, text: &str) -> String {
        ToolUsage::new(&mut f.handler, &f.registry, &mut f.task, llm.clone(), &f.ctx).use_tool(text)
    }

    #[test]
    fn test_normalize_tool_string() {
        let text = "Thought: Do I need to use a tool? Yes\nAction: search\nAction Input: {\"q\": 1}";
        assert_eq!(
            normalize_tool_string(text),
            "Tool Name: search\nTool Arguments: {\"q\": 1}"
        );
    }

    #[test]
    fn test_successful_call() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut f = fixture(counting_search(runs.clone()), runs);
        let llm = ScriptedLLM::new([r#"{"function_name": "search", "arguments": {"q": "bees"}}"#]);

        let out = use_tool(&mut f, &llm, "Action: search\nAction Input: {\"q\": \"bees\"}");
        assert_eq!(out, "results for bees");
        assert_eq!(f.task.used_tools, 1);
        assert_eq!(f.runs.load(Ordering::SeqCst), 1);
        assert_eq!(f.sink.kinds(), vec![TelemetryEventKind::ToolUsage]);
        assert!(f.handler.last_used_tool.is_some());
    }

    #[test]
    fn test_value_equal_repeat_is_refused() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut f = fixture(counting_search(runs.clone()), runs);
        let llm = ScriptedLLM::new([
            r#"{"function_name": "search", "arguments": {"q": "bees", "n": 1}}"#,
            r#"{"arguments": {"n":1, "q":"bees"}, "function_name": "search"}"#,
        ]);

        use_tool(&mut f, &llm, "first");
        let out = use_tool(&mut f, &llm, "second");

        assert!(out.starts_with("I already used the search tool with input 1, bees."));
        assert_eq!(f.runs.load(Ordering::SeqCst), 1);
        assert_eq!(f.task.used_tools, 2);
        assert!(f.sink.kinds().contains(&TelemetryEventKind::ToolRepeatedUsage));
    }

    #[test]
    fn test_cache_prevents_second_run() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut f = fixture(counting_search(runs.clone()), runs);
        let llm = ScriptedLLM::new([
            r#"{"function_name": "search", "arguments": {"q": "bees"}}"#,
            r#"{"function_name": "search", "arguments": {"q": "ants"}}"#,
            r#"{"function_name": "SEARCH", "arguments": {"q": "bees"}}"#,
        ]);

        use_tool(&mut f, &llm, "bees");
        use_tool(&mut f, &llm, "ants");
        let out = use_tool(&mut f, &llm, "bees again");

        assert!(out.starts_with("results for bees"));
        assert_eq!(f.runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failing_tool_runs_twice_then_reports() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let tool = Tool::new("Flaky", "Always fails", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("disk on fire")
        });
        let mut f = fixture(tool, runs);
        let llm = ScriptedLLM::new([
            r#"{"function_name": "flaky", "arguments": {}}"#,
            r#"{"function_name": "flaky", "arguments": {}}"#,
        ]);

        let out = use_tool(&mut f, &llm, "Action: flaky\nAction Input: {}");
        assert!(out.contains("disk on fire"));
        assert!(out.contains("Tool Flaky accepts these inputs"));
        assert_eq!(f.runs.load(Ordering::SeqCst), 2);
        assert_eq!(f.task.tools_errors, 1);
        assert!(f.sink.kinds().contains(&TelemetryEventKind::ToolUsageError));
    }

    #[test]
    fn test_unknown_tool_is_not_retried() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut f = fixture(counting_search(runs.clone()), runs);
        let llm = ScriptedLLM::new([r#"{"function_name": "calculator", "arguments": {}}"#]);

        let out = use_tool(&mut f, &llm, "Action: calculator");
        assert!(out.contains("You tried to use the tool calculator, but it doesn't exist"));
        assert!(out.contains("Search"));
        assert_eq!(llm.calls(), 1);
    }

    #[test]
    fn test_unparsable_call_degrades_after_bound() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut f = fixture(counting_search(runs.clone()), runs);
        let llm = ScriptedLLM::new(["no idea", "still prose"]);

        let out = use_tool(&mut f, &llm, "gibberish");
        assert!(out.starts_with(&I18N::default().errors("tool_usage_error")));
        assert_eq!(llm.calls(), 2);
        assert_eq!(f.runs.load(Ordering::SeqCst), 0);
        assert_eq!(f.task.tools_errors, 1);
    }

    #[test]
    fn test_reminder_every_third_usage() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut f = fixture(counting_search(runs.clone()), runs);
        let replies: Vec<String> = (0..7)
            .map(|i| format!(r#"{{"function_name": "search", "arguments": {{"q": "{}"}}}}"#, i))
            .collect();
        let llm = ScriptedLLM::new(replies);

        for usage in 1..=7 {
            let out = use_tool(&mut f, &llm, "search");
            let has_reminder = out.contains("You ONLY have access to the following tools");
            assert_eq!(has_reminder, usage % 3 == 0, "usage {}", usage);
        }
    }
}
