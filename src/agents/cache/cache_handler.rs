//! Crew-scoped cache of tool results.
//!
//! Entries are keyed by the canonical tool name and the serialized call
//! arguments. A key is written at most once and never evicted, so a
//! `(tool, arguments)` pair runs at most once per crew.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::utilities::string_utils::canonical_tool_name;

/// Shared handle to the tool result cache. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct CacheHandler {
    cache: Arc<RwLock<HashMap<String, Value>>>,
}

impl CacheHandler {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(tool: &str, input: &str) -> String {
        format!("{}-{}", canonical_tool_name(tool), input)
    }

    /// Store a tool result unless the key is already cached.
    ///
    /// Returns `true` when the entry was inserted.
    pub fn add(&self, tool: &str, input: &str, output: Value) -> bool {
        let mut cache = self.cache.write();
        let key = Self::key(tool, input);
        if cache.contains_key(&key) {
            return false;
        }
        cache.insert(key, output);
        true
    }

    pub fn read(&self, tool: &str, input: &str) -> Option<Value> {
        self.cache.read().get(&Self::key(tool, input)).cloned()
    }

    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_add_and_read() {
        let cache = CacheHandler::new();
        assert!(cache.add("Search", r#"{"q":"rust"}"#, json!("Found results")));
        assert_eq!(
            cache.read("search", r#"{"q":"rust"}"#),
            Some(json!("Found results"))
        );
        assert_eq!(cache.read("search", r#"{"q":"go"}"#), None);
    }

    #[test]
    fn test_write_once_per_key() {
        let cache = CacheHandler::new();
        assert!(cache.add("tool", "{}", json!(1)));
        assert!(!cache.add("TOOL", "{}", json!(2)));
        assert_eq!(cache.read("tool", "{}"), Some(json!(1)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clones_share_storage() {
        use std::thread;

        let cache = CacheHandler::new();
        let writer = {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 0..50 {
                    cache.add("tool", &format!("input_{}", i), json!(i));
                }
            })
        };
        writer.join().unwrap();
        assert_eq!(cache.len(), 50);
    }
}
