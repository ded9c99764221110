//! Shared value types.

pub mod usage_metrics;

pub use usage_metrics::{aggregate_metrics, MetricsPolicy, UsageMetrics};
