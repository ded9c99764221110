//! The tool interface and a closure-backed implementation.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::utilities::string_utils::canonical_tool_name;

/// A capability an agent can invoke by name.
///
/// Tools are shared between agents and tasks as `Arc<dyn BaseTool>`, so
/// implementations that keep state must synchronize it themselves.
pub trait BaseTool: Send + Sync + fmt::Debug {
    /// The unique name of the tool that clearly communicates its purpose.
    fn name(&self) -> &str;

    /// Description used to tell the model how/when/why to use the tool.
    fn description(&self) -> &str;

    /// JSON schema of the accepted arguments.
    fn args_schema(&self) -> Value {
        Value::Object(Map::new())
    }

    /// Execute the tool.
    fn run(&self, arguments: &Map<String, Value>) -> anyhow::Result<Value>;

    /// Whether a successful result may be stored in the crew cache.
    fn cache_function(&self, _arguments: &Map<String, Value>, _result: &Value) -> bool {
        true
    }

    /// The text block shown to a model for this tool.
    fn render_description(&self) -> String {
        format!(
            "Tool Name: {}\nTool Arguments: {}\nTool Description: {}",
            self.name(),
            self.args_schema(),
            self.description()
        )
    }
}

/// Render the descriptions of several tools, one block per tool.
pub fn render_text_description(tools: &[Arc<dyn BaseTool>]) -> String {
    tools
        .iter()
        .map(|t| t.render_description())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Append the tools of `extra` whose canonical name is not yet in `tools`.
///
/// Returns how many tools were added.
pub fn append_unique_tools(tools: &mut Vec<Arc<dyn BaseTool>>, extra: &[Arc<dyn BaseTool>]) -> usize {
    let mut added = 0;
    for tool in extra {
        let name = canonical_tool_name(tool.name());
        if tools.iter().any(|t| canonical_tool_name(t.name()) == name) {
            continue;
        }
        tools.push(Arc::clone(tool));
        added += 1;
    }
    added
}

/// Comma separated tool names.
pub fn tool_names(tools: &[Arc<dyn BaseTool>]) -> String {
    tools
        .iter()
        .map(|t| t.name())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type ToolFn = Arc<dyn Fn(&Map<String, Value>) -> anyhow::Result<Value> + Send + Sync>;

pub type CacheFn = Arc<dyn Fn(&Map<String, Value>, &Value) -> bool + Send + Sync>;

/// Tool that wraps a closure.
#[derive(Clone)]
pub struct Tool {
    name: String,
    description: String,
    args_schema: Value,
    func: ToolFn,
    cache_fn: Option<CacheFn>,
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

impl Tool {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            args_schema: Value::Object(Map::new()),
            func: Arc::new(func),
            cache_fn: None,
        }
    }

    pub fn with_args_schema(mut self, schema: Value) -> Self {
        self.args_schema = schema;
        self
    }

    /// Decide per call whether results may be cached.
    pub fn with_cache_function<F>(mut self, cache_fn: F) -> Self
    where
        F: Fn(&Map<String, Value>, &Value) -> bool + Send + Sync + 'static,
    {
        self.cache_fn = Some(Arc::new(cache_fn));
        self
    }

    /// Shorthand for `Arc::new(self)` as a trait object.
    pub fn into_shared(self) -> Arc<dyn BaseTool> {
        Arc::new(self)
    }
}

impl BaseTool for Tool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn args_schema(&self) -> Value {
        self.args_schema.clone()
    }

    fn run(&self, arguments: &Map<String, Value>) -> anyhow::Result<Value> {
        (self.func)(arguments)
    }

    fn cache_function(&self, arguments: &Map<String, Value>, result: &Value) -> bool {
        match &self.cache_fn {
            Some(f) => f(arguments, result),
            None => true,
        }
    }
}
