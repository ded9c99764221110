//! The model backend interface.
//!
//! The engine never talks to a provider directly. Anything that can turn a
//! list of chat messages into a completion implements [`BaseLLM`]; the
//! engine uses `call` for the reasoning loop and `call_structured` when the
//! tool invocation engine needs a JSON function call back.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utilities::errors::LLMError;
use crate::utilities::string_utils::extract_json_object;

/// Chat role of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a model conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LLMMessage {
    pub role: Role,
    pub content: String,
}

impl LLMMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Token counts reported by a backend for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    /// Only some providers report prompt cache hits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_prompt_tokens: Option<i64>,
}

impl TokenUsage {
    pub fn total_tokens(&self) -> i64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// A completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LLMResponse {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

impl LLMResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
        }
    }
}

/// Model backend used by agents and the tool invocation engine.
#[async_trait]
pub trait BaseLLM: Send + Sync + fmt::Debug {
    /// Model identifier, used in logs and telemetry.
    fn model(&self) -> &str;

    /// Complete a conversation.
    fn call(&self, messages: &[LLMMessage]) -> Result<LLMResponse, LLMError>;

    /// Ask for a JSON object matching `schema`.
    ///
    /// The default implementation sends the messages through [`call`] and
    /// extracts the first JSON object from the reply. Backends with native
    /// structured output should override it.
    ///
    /// [`call`]: BaseLLM::call
    fn call_structured(&self, messages: &[LLMMessage], schema: &Value) -> Result<Value, LLMError> {
        let _ = schema;
        let response = self.call(messages)?;
        extract_json_object(&response.content).ok_or_else(|| {
            LLMError::InvalidResponse(format!(
                "expected a JSON object, got: {}",
                response.content
            ))
        })
    }

    /// Async variant of [`call`](BaseLLM::call).
    async fn acall(&self, messages: &[LLMMessage]) -> Result<LLMResponse, LLMError> {
        self.call(messages)
    }
}
