//! The structured form of a tool call extracted from model output.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::utilities::string_utils::value_to_text;

/// A validated `{function_name, arguments}` call.
///
/// Equality is value equality on both fields. `arguments` is a sorted map,
/// so two calls whose JSON differs only in key order or whitespace compare
/// equal and serialize identically.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCalling {
    pub function_name: String,
    pub arguments: Map<String, Value>,
}

impl ToolCalling {
    pub fn new(function_name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            function_name: function_name.into(),
            arguments,
        }
    }

    /// Build a call from a JSON value returned by a model.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Canonical serialization of the arguments, used as the cache key.
    pub fn serialized_arguments(&self) -> String {
        Value::Object(self.arguments.clone()).to_string()
    }

    /// The argument values joined for display.
    pub fn argument_values(&self) -> String {
        self.arguments
            .values()
            .map(value_to_text)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Deserialize)]
struct RawToolCalling {
    #[serde(alias = "tool_name")]
    function_name: String,
    #[serde(default)]
    arguments: Value,
}

impl<'de> Deserialize<'de> for ToolCalling {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        let raw = RawToolCalling::deserialize(deserializer)?;
        if raw.function_name.trim().is_empty() {
            return Err(D::Error::custom("function_name must not be empty"));
        }

        // Models sometimes encode the arguments object as a string.
        let arguments = match raw.arguments {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            Value::String(s) if s.trim().is_empty() => Map::new(),
            Value::String(s) => match serde_json::from_str::<Value>(&s) {
                Ok(Value::Object(map)) => map,
                _ => return Err(D::Error::custom("arguments must be a JSON object")),
            },
            _ => return Err(D::Error::custom("arguments must be a JSON object")),
        };

        Ok(ToolCalling {
            function_name: raw.function_name.trim().to_string(),
            arguments,
        })
    }
}
