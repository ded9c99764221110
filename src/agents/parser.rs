//! Parser for ReAct-style model replies.
//!
//! A reply is either a tool action:
//!
//! ```text
//! Thought: I should look this up
//! Action: search
//! Action Input: {"query": "bees"}
//! ```
//!
//! or a final answer:
//!
//! ```text
//! Thought: I now know the final answer
//! Final Answer: Bees are insects.
//! ```

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

const FINAL_ANSWER_ACTION: &str = "Final Answer:";

const MISSING_ACTION_AFTER_THOUGHT_ERROR_MESSAGE: &str =
    "I did it wrong. Invalid Format: I missed the 'Action:' after 'Thought:'. I will do right next, and don't use a tool I have already used.";

const MISSING_ACTION_INPUT_AFTER_ACTION_ERROR_MESSAGE: &str =
    "I did it wrong. Invalid Format: I missed the 'Action Input:' after 'Action:'. I will do right next, and don't use a tool I have already used.";

const FINAL_ANSWER_AND_PARSABLE_ACTION_ERROR_MESSAGE: &str =
    "I did it wrong. Tried to both perform Action and give a Final Answer at the same time, I must do one or the other";

static ACTION_INPUT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)")
        .expect("valid regex")
});
static ACTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)").expect("valid regex"));

/// A tool call the agent wants to make.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentAction {
    pub tool: String,
    pub tool_input: String,
    /// The full model reply.
    pub text: String,
    /// Observation produced by the tool invocation engine.
    pub result: Option<String>,
}

/// The agent's final answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentFinish {
    pub output: String,
    pub text: String,
}

/// One parsed step of the reasoning loop, as seen by step callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentStep {
    Action(AgentAction),
    Finish(AgentFinish),
}

/// The reply matched neither format. `error` is shown back to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputParserError {
    pub error: String,
}

impl fmt::Display for OutputParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.error)
    }
}

impl std::error::Error for OutputParserError {}

fn parser_error(error: &str) -> OutputParserError {
    OutputParserError {
        error: error.to_string(),
    }
}

pub fn parse(text: &str) -> Result<AgentStep, OutputParserError> {
    let includes_answer = text.contains(FINAL_ANSWER_ACTION);

    if let Some(caps) = ACTION_INPUT_RE.captures(text) {
        if includes_answer {
            return Err(parser_error(FINAL_ANSWER_AND_PARSABLE_ACTION_ERROR_MESSAGE));
        }
        let tool = caps
            .get(1)
            .map_or("", |m| m.as_str())
            .trim()
            .trim_matches('*')
            .trim()
            .to_string();
        let tool_input = caps
            .get(2)
            .map_or("", |m| m.as_str())
            .trim()
            .trim_matches('"')
            .to_string();

        return Ok(AgentStep::Action(AgentAction {
            tool,
            tool_input,
            text: text.to_string(),
            result: None,
        }));
    }

    if includes_answer {
        let output = text
            .rsplit(FINAL_ANSWER_ACTION)
            .next()
            .unwrap_or("")
            .trim();
        return Ok(AgentStep::Finish(AgentFinish {
            output: strip_unmatched_fence(output),
            text: text.to_string(),
        }));
    }

    if !ACTION_RE.is_match(text) {
        return Err(parser_error(MISSING_ACTION_AFTER_THOUGHT_ERROR_MESSAGE));
    }
    Err(parser_error(MISSING_ACTION_INPUT_AFTER_ACTION_ERROR_MESSAGE))
}

/// Drop a trailing ``` left over from a fenced answer.
fn strip_unmatched_fence(text: &str) -> String {
    if text.ends_with("```") && text.matches("```").count() % 2 != 0 {
        return text[..text.len() - 3].trim_end().to_string();
    }
    text.to_string()
}
