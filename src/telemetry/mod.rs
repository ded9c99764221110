//! Anonymous execution telemetry.
//!
//! Every event goes to two places: the optional [`TelemetrySink`] installed
//! by the host, and an OpenTelemetry span on the global tracer (a no-op
//! unless the host application installed a tracer provider). Sink failures
//! are logged and swallowed; telemetry never fails a run.
//!
//! Set `CREW_ENGINE_TELEMETRY_OPT_OUT` or `OTEL_SDK_DISABLED` to `true`/`1`
//! to turn everything off.

use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::sync::Arc;

use opentelemetry::global::{self, BoxedSpan};
use opentelemetry::trace::{Span, Tracer};
use opentelemetry::KeyValue;

const TRACER_NAME: &str = "crew-engine";

/// Kinds of telemetry events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelemetryEventKind {
    CrewCreation,
    CrewExecution,
    CrewExecutionEnd,
    ToolUsage,
    ToolUsageError,
    ToolRepeatedUsage,
}

impl TelemetryEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CrewCreation => "crew_creation",
            Self::CrewExecution => "crew_execution",
            Self::CrewExecutionEnd => "crew_execution_end",
            Self::ToolUsage => "tool_usage",
            Self::ToolUsageError => "tool_usage_error",
            Self::ToolRepeatedUsage => "tool_repeated_usage",
        }
    }
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One telemetry record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryEvent {
    pub kind: TelemetryEventKind,
    pub attributes: BTreeMap<String, String>,
}

impl TelemetryEvent {
    pub fn new(kind: TelemetryEventKind) -> Self {
        Self {
            kind,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    fn key_values(&self) -> Vec<KeyValue> {
        self.attributes
            .iter()
            .map(|(k, v)| KeyValue::new(k.clone(), v.clone()))
            .collect()
    }
}

/// Destination for telemetry events.
pub trait TelemetrySink: Send + Sync {
    fn emit(&self, event: &TelemetryEvent) -> anyhow::Result<()>;
}

/// Whether the opt-out environment variables disable telemetry.
pub fn is_telemetry_disabled() -> bool {
    ["CREW_ENGINE_TELEMETRY_OPT_OUT", "OTEL_SDK_DISABLED"]
        .iter()
        .any(|var| {
            let value = env::var(var).unwrap_or_default().to_lowercase();
            value == "true" || value == "1"
        })
}

/// Telemetry front-end shared by a crew and its tool invocations.
#[derive(Clone)]
pub struct Telemetry {
    enabled: bool,
    sink: Option<Arc<dyn TelemetrySink>>,
}

impl fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Telemetry")
            .field("enabled", &self.enabled)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Telemetry {
    pub fn new(sink: Option<Arc<dyn TelemetrySink>>) -> Self {
        Self {
            enabled: !is_telemetry_disabled(),
            sink,
        }
    }

    /// Telemetry that records nothing.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            sink: None,
        }
    }

    /// Enabled telemetry regardless of the environment.
    #[cfg(test)]
    pub(crate) fn recording(sink: Arc<dyn TelemetrySink>) -> Self {
        Self {
            enabled: true,
            sink: Some(sink),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record a point event: forward it to the sink and emit a closed span.
    pub fn record(&self, event: TelemetryEvent) {
        let mut span = self.start_span(&event);
        span.end();
    }

    /// Forward `event` to the sink and open a span that stays open until the
    /// returned handle is ended or dropped.
    pub fn start_span(&self, event: &TelemetryEvent) -> SpanHandle {
        if !self.enabled {
            return SpanHandle { span: None };
        }

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.emit(event) {
                log::warn!("Telemetry sink rejected {} event: {}", event.kind, e);
            }
        }

        let tracer = global::tracer(TRACER_NAME);
        let mut span = tracer.start(event.kind.as_str());
        for kv in event.key_values() {
            span.set_attribute(kv);
        }
        SpanHandle { span: Some(span) }
    }

    pub fn crew_creation(&self, crew_id: &str, process: &str, agents: usize, tasks: usize) {
        self.record(
            TelemetryEvent::new(TelemetryEventKind::CrewCreation)
                .with("crew_id", crew_id)
                .with("crew_process", process)
                .with("crew_number_of_agents", agents)
                .with("crew_number_of_tasks", tasks),
        );
    }

    pub fn crew_execution(&self, crew_id: &str, process: &str) -> SpanHandle {
        self.start_span(
            &TelemetryEvent::new(TelemetryEventKind::CrewExecution)
                .with("crew_id", crew_id)
                .with("crew_process", process),
        )
    }

    /// Close the execution span opened by [`crew_execution`](Self::crew_execution).
    pub fn crew_execution_end(&self, mut span: SpanHandle, crew_id: &str, succeeded: bool) {
        span.set_attribute("succeeded", succeeded.to_string());
        span.end();
        self.record(
            TelemetryEvent::new(TelemetryEventKind::CrewExecutionEnd)
                .with("crew_id", crew_id)
                .with("succeeded", succeeded),
        );
    }

    pub fn tool_usage(&self, llm_model: &str, tool_name: &str, attempts: u32) {
        self.record(
            TelemetryEvent::new(TelemetryEventKind::ToolUsage)
                .with("llm", llm_model)
                .with("tool_name", tool_name)
                .with("attempts", attempts),
        );
    }

    pub fn tool_usage_error(&self, llm_model: &str) {
        self.record(TelemetryEvent::new(TelemetryEventKind::ToolUsageError).with("llm", llm_model));
    }

    pub fn tool_repeated_usage(&self, llm_model: &str, tool_name: &str, attempts: u32) {
        self.record(
            TelemetryEvent::new(TelemetryEventKind::ToolRepeatedUsage)
                .with("llm", llm_model)
                .with("tool_name", tool_name)
                .with("attempts", attempts),
        );
    }
}

/// An open OpenTelemetry span. Ends on drop if not ended explicitly.
pub struct SpanHandle {
    span: Option<BoxedSpan>,
}

impl SpanHandle {
    pub fn set_attribute(&mut self, key: &str, value: String) {
        if let Some(span) = self.span.as_mut() {
            span.set_attribute(KeyValue::new(key.to_string(), value));
        }
    }

    pub fn end(&mut self) {
        if let Some(mut span) = self.span.take() {
            span.end();
        }
    }
}

impl Drop for SpanHandle {
    fn drop(&mut self) {
        self.end();
    }
}
