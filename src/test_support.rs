//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::llms::base_llm::{BaseLLM, LLMMessage, LLMResponse, TokenUsage};
use crate::utilities::errors::LLMError;

/// A model that replays a fixed script of replies, in order, across both
/// `call` and `call_structured`.
#[derive(Debug, Default)]
pub(crate) struct ScriptedLLM {
    responses: Mutex<VecDeque<String>>,
    usage: Option<TokenUsage>,
    /// Error returned instead of a reply; `None` once the failures are spent.
    failure: Option<LLMError>,
    failures_left: Mutex<Option<usize>>,
    calls: Mutex<usize>,
    requests: Mutex<Vec<Vec<LLMMessage>>>,
}

impl ScriptedLLM {
    pub(crate) fn new<I, S>(responses: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self::scripted(responses))
    }

    /// Every call reports the same token usage.
    pub(crate) fn with_usage<I, S>(responses: I, prompt_tokens: i64, completion_tokens: i64) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            usage: Some(TokenUsage {
                prompt_tokens,
                completion_tokens,
                cached_prompt_tokens: None,
            }),
            ..Self::scripted(responses)
        })
    }

    /// Every call fails with `error`.
    pub(crate) fn failing(error: LLMError) -> Arc<Self> {
        Arc::new(Self {
            failure: Some(error),
            ..Self::default()
        })
    }

    /// The first `failures` calls fail, then the script plays.
    pub(crate) fn flaky<I, S>(failures: usize, responses: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            failure: Some(LLMError::Request("temporarily unavailable".into())),
            failures_left: Mutex::new(Some(failures)),
            ..Self::scripted(responses)
        })
    }

    fn scripted<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Calls made so far, failed ones included.
    pub(crate) fn calls(&self) -> usize {
        *self.calls.lock()
    }

    /// Message lists of every call, in order.
    pub(crate) fn requests(&self) -> Vec<Vec<LLMMessage>> {
        self.requests.lock().clone()
    }

    fn next_failure(&self) -> Option<LLMError> {
        let error = self.failure.as_ref()?;
        let mut left = self.failures_left.lock();
        match left.as_mut() {
            None => Some(error.clone()),
            Some(0) => None,
            Some(n) => {
                *n -= 1;
                Some(error.clone())
            }
        }
    }
}

impl BaseLLM for ScriptedLLM {
    fn model(&self) -> &str {
        "scripted"
    }

    fn call(&self, messages: &[LLMMessage]) -> Result<LLMResponse, LLMError> {
        *self.calls.lock() += 1;
        self.requests.lock().push(messages.to_vec());

        if let Some(error) = self.next_failure() {
            return Err(error);
        }
        let content = self
            .responses
            .lock()
            .pop_front()
            .ok_or_else(|| LLMError::Request("script exhausted".into()))?;
        Ok(LLMResponse {
            content,
            usage: self.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flaky_then_scripted() {
        let llm = ScriptedLLM::flaky(2, ["hello"]);
        assert!(llm.call(&[]).is_err());
        assert!(llm.call(&[]).is_err());
        assert_eq!(llm.call(&[]).unwrap().content, "hello");
        assert!(llm.call(&[]).is_err());
        assert_eq!(llm.calls(), 4);
    }
}
