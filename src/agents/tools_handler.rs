//! Per-execution record of the last successful tool call.

use serde_json::Value;

use super::cache::CacheHandler;
use crate::tools::tool_calling::ToolCalling;

/// Tracks the most recent tool call of one agent execution and writes
/// results through to the crew cache.
#[derive(Debug, Clone, Default)]
pub struct ToolsHandler {
    pub cache: Option<CacheHandler>,
    pub last_used_tool: Option<ToolCalling>,
}

impl ToolsHandler {
    pub fn new(cache: Option<CacheHandler>) -> Self {
        Self {
            cache,
            last_used_tool: None,
        }
    }

    /// Record `calling` as the last used tool, caching `output` when asked.
    pub fn on_tool_use(&mut self, calling: &ToolCalling, output: &Value, should_cache: bool) {
        if should_cache {
            if let Some(cache) = &self.cache {
                cache.add(
                    &calling.function_name,
                    &calling.serialized_arguments(),
                    output.clone(),
                );
            }
        }
        self.last_used_tool = Some(calling.clone());
    }

    /// Whether `calling` repeats the previous call exactly.
    pub fn is_repeat(&self, calling: &ToolCalling) -> bool {
        self.last_used_tool.as_ref() == Some(calling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(q: &str) -> ToolCalling {
        ToolCalling::from_value(json!({"function_name": "search", "arguments": {"q": q}})).unwrap()
    }

    #[test]
    fn test_records_and_caches() {
        let cache = CacheHandler::new();
        let mut handler = ToolsHandler::new(Some(cache.clone()));

        handler.on_tool_use(&call("rust"), &json!("results"), true);
        assert!(handler.is_repeat(&call("rust")));
        assert!(!handler.is_repeat(&call("go")));
        assert_eq!(cache.read("search", r#"{"q":"rust"}"#), Some(json!("results")));
    }

    #[test]
    fn test_should_cache_false_skips_cache() {
        let cache = CacheHandler::new();
        let mut handler = ToolsHandler::new(Some(cache.clone()));
        handler.on_tool_use(&call("rust"), &json!("results"), false);
        assert!(cache.is_empty());
        assert!(handler.last_used_tool.is_some());
    }
}
