//! Token usage counters and their crew-level aggregation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::utilities::errors::AggregationError;

pub const TOTAL_TOKENS: &str = "total_tokens";
pub const PROMPT_TOKENS: &str = "prompt_tokens";
pub const COMPLETION_TOKENS: &str = "completion_tokens";
pub const SUCCESSFUL_REQUESTS: &str = "successful_requests";
pub const CACHED_PROMPT_TOKENS: &str = "cached_prompt_tokens";

/// Named usage counters.
///
/// The standard counters are always present once a source has been
/// created through [`UsageMetrics::new`]; `cached_prompt_tokens` only
/// appears when a backend reported it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsageMetrics(BTreeMap<String, i64>);

impl UsageMetrics {
    /// Zeroed standard counters.
    pub fn new() -> Self {
        let mut metrics = Self::default();
        for key in [
            TOTAL_TOKENS,
            PROMPT_TOKENS,
            COMPLETION_TOKENS,
            SUCCESSFUL_REQUESTS,
        ] {
            metrics.0.insert(key.to_string(), 0);
        }
        metrics
    }

    pub fn get(&self, key: &str) -> i64 {
        self.0.get(key).copied().unwrap_or(0)
    }

    pub fn set(&mut self, key: &str, value: i64) {
        self.0.insert(key.to_string(), value);
    }

    pub fn add(&mut self, key: &str, value: i64) {
        *self.0.entry(key.to_string()).or_insert(0) += value;
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Add every counter of `other`, creating missing ones.
    pub fn add_usage_metrics(&mut self, other: &UsageMetrics) {
        for (key, value) in other.iter() {
            self.add(key, value);
        }
    }

    fn key_list(&self) -> String {
        self.keys().collect::<Vec<_>>().join(", ")
    }
}

impl<const N: usize> From<[(&str, i64); N]> for UsageMetrics {
    fn from(entries: [(&str, i64); N]) -> Self {
        Self(entries.iter().map(|(k, v)| (k.to_string(), *v)).collect())
    }
}

/// How sources with different counter names are summed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricsPolicy {
    /// Union of keys; a counter missing from a source counts as zero.
    #[default]
    ZeroFill,
    /// Every source must report the same keys as the first one.
    Strict,
}

/// Sum usage counters across sources.
pub fn aggregate_metrics(
    sources: &[UsageMetrics],
    policy: MetricsPolicy,
) -> Result<UsageMetrics, AggregationError> {
    let mut total = UsageMetrics::default();
    let Some(first) = sources.first() else {
        return Ok(total);
    };

    for (index, source) in sources.iter().enumerate() {
        if policy == MetricsPolicy::Strict && !source.keys().eq(first.keys()) {
            return Err(AggregationError {
                source_index: index,
                expected: first.key_list(),
                found: source.key_list(),
            });
        }
        total.add_usage_metrics(source);
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_has_standard_counters() {
        let metrics = UsageMetrics::new();
        assert!(metrics.contains(TOTAL_TOKENS));
        assert!(!metrics.contains(CACHED_PROMPT_TOKENS));
        assert_eq!(metrics.get(SUCCESSFUL_REQUESTS), 0);
    }

    #[test]
    fn test_zero_fill_unions_keys() {
        let a = UsageMetrics::from([(TOTAL_TOKENS, 10), (PROMPT_TOKENS, 6)]);
        let b = UsageMetrics::from([
            (TOTAL_TOKENS, 5),
            (PROMPT_TOKENS, 2),
            (CACHED_PROMPT_TOKENS, 1),
        ]);

        let total = aggregate_metrics(&[a, b], MetricsPolicy::ZeroFill).unwrap();
        assert_eq!(total.get(TOTAL_TOKENS), 15);
        assert_eq!(total.get(PROMPT_TOKENS), 8);
        assert_eq!(total.get(CACHED_PROMPT_TOKENS), 1);
    }

    #[test]
    fn test_strict_rejects_mismatched_keys() {
        let a = UsageMetrics::from([(TOTAL_TOKENS, 10)]);
        let b = UsageMetrics::from([(TOTAL_TOKENS, 5), (CACHED_PROMPT_TOKENS, 1)]);

        let err = aggregate_metrics(&[a, b], MetricsPolicy::Strict).unwrap_err();
        assert_eq!(err.source_index, 1);
        assert_eq!(err.found, "cached_prompt_tokens, total_tokens");
    }

    #[test]
    fn test_strict_accepts_matching_keys() {
        let total = aggregate_metrics(
            &[UsageMetrics::new(), UsageMetrics::new()],
            MetricsPolicy::Strict,
        )
        .unwrap();
        assert_eq!(total, UsageMetrics::new());
    }

    #[test]
    fn test_empty_sources() {
        let total = aggregate_metrics(&[], MetricsPolicy::Strict).unwrap();
        assert_eq!(total.keys().count(), 0);
    }
}
