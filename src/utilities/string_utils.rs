//! String utility functions.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").expect("valid regex"));

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(\w+)\}").expect("valid regex"));

/// Single left-to-right pass over `template`. Substituted text is never
/// rescanned, and placeholders `lookup` does not know stay as written.
fn substitute<'a>(template: &str, lookup: impl Fn(&str) -> Option<&'a str>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| match lookup(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Replace every `{key}` in `template` with the matching input value.
///
/// Literal substring substitution: placeholders without a matching input are
/// left untouched.
pub fn interpolate_only(template: &str, inputs: &HashMap<String, String>) -> String {
    substitute(template, |key| inputs.get(key).map(String::as_str))
}

/// Fill a prompt template from a fixed list of named arguments.
pub fn format_template(template: &str, args: &[(&str, &str)]) -> String {
    substitute(template, |key| {
        args.iter().find(|(name, _)| *name == key).map(|(_, value)| *value)
    })
}

/// Canonical form used for tool name lookups and cache keys.
pub fn canonical_tool_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Extract the first JSON object embedded in model output.
///
/// Handles bare objects, fenced ```json blocks, and objects surrounded by
/// prose.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    for caps in FENCED_JSON.captures_iter(trimmed) {
        if let Some(body) = caps.get(1) {
            if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(body.as_str()) {
                return Some(value);
            }
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&trimmed[start..=end]) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

/// Render a JSON value the way an observation shows it: strings verbatim,
/// everything else as compact JSON.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
