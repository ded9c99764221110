//! Per-agent token accounting.

use parking_lot::Mutex;

use crate::llms::base_llm::TokenUsage;
use crate::types::usage_metrics::{
    UsageMetrics, CACHED_PROMPT_TOKENS, COMPLETION_TOKENS, PROMPT_TOKENS, SUCCESSFUL_REQUESTS,
    TOTAL_TOKENS,
};

/// Running usage counters of one agent.
///
/// Mutated through `&self` so an agent can record usage while it is shared
/// behind a read lock.
#[derive(Debug)]
pub struct TokenProcess {
    metrics: Mutex<UsageMetrics>,
}

impl Default for TokenProcess {
    fn default() -> Self {
        Self {
            metrics: Mutex::new(UsageMetrics::new()),
        }
    }
}

impl Clone for TokenProcess {
    fn clone(&self) -> Self {
        Self {
            metrics: Mutex::new(self.metrics.lock().clone()),
        }
    }
}

impl TokenProcess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one successful model call.
    pub fn record(&self, usage: Option<&TokenUsage>) {
        let mut metrics = self.metrics.lock();
        metrics.add(SUCCESSFUL_REQUESTS, 1);
        if let Some(usage) = usage {
            metrics.add(PROMPT_TOKENS, usage.prompt_tokens);
            metrics.add(COMPLETION_TOKENS, usage.completion_tokens);
            metrics.add(TOTAL_TOKENS, usage.total_tokens());
            if let Some(cached) = usage.cached_prompt_tokens {
                metrics.add(CACHED_PROMPT_TOKENS, cached);
            }
        }
    }

    pub fn get_summary(&self) -> UsageMetrics {
        self.metrics.lock().clone()
    }
}
