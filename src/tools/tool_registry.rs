//! Name-based tool resolution.

use std::collections::HashMap;
use std::sync::Arc;

use crate::tools::base_tool::BaseTool;
use crate::utilities::errors::ToolUsageError;
use crate::utilities::string_utils::canonical_tool_name;

/// Case-insensitive map from tool name to tool.
///
/// When two tools share a canonical name the first one registered wins.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn BaseTool>>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new(tools: &[Arc<dyn BaseTool>]) -> Self {
        let mut registry = Self::default();
        for tool in tools {
            registry.register(Arc::clone(tool));
        }
        registry
    }

    /// Add a tool; returns `false` if its name was already taken.
    pub fn register(&mut self, tool: Arc<dyn BaseTool>) -> bool {
        let key = canonical_tool_name(tool.name());
        if self.by_name.contains_key(&key) {
            log::debug!("Tool '{}' already registered, keeping the first", tool.name());
            return false;
        }
        self.by_name.insert(key, self.tools.len());
        self.tools.push(tool);
        true
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn BaseTool>, ToolUsageError> {
        self.by_name
            .get(&canonical_tool_name(name))
            .map(|&i| Arc::clone(&self.tools[i]))
            .ok_or_else(|| ToolUsageError::NotFound {
                tool_name: name.to_string(),
            })
    }

    /// Registered tools in registration order.
    pub fn tools(&self) -> &[Arc<dyn BaseTool>] {
        &self.tools
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::base_tool::Tool;
    use serde_json::json;

    fn tool(name: &str, out: i64) -> Arc<dyn BaseTool> {
        Tool::new(name, "test tool", move |_| Ok(json!(out))).into_shared()
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let registry = ToolRegistry::new(&[tool("Web Search", 1)]);
        assert_eq!(registry.resolve("web search").unwrap().name(), "Web Search");
        assert_eq!(registry.resolve("  WEB SEARCH ").unwrap().name(), "Web Search");
    }

    #[test]
    fn test_miss_is_not_found() {
        let registry = ToolRegistry::new(&[tool("search", 1)]);
        let err = registry.resolve("calculator").unwrap_err();
        assert_eq!(
            err,
            ToolUsageError::NotFound {
                tool_name: "calculator".into()
            }
        );
    }

    #[test]
    fn test_first_registration_wins() {
        let mut registry = ToolRegistry::new(&[tool("search", 1)]);
        assert!(!registry.register(tool("SEARCH", 2)));
        assert_eq!(registry.len(), 1);
        let found = registry.resolve("search").unwrap();
        assert_eq!(found.run(&Default::default()).unwrap(), json!(1));
    }
}
