//! Execution context shared by everything a crew runs.
//!
//! The crew owns the cache and the rate limiter; they are handed down
//! explicitly to tasks, agents and the tool invocation engine through this
//! struct rather than living in process-wide state. Clones share the same
//! cache, limiter and telemetry.

use std::sync::Arc;

use crate::agents::cache::CacheHandler;
use crate::telemetry::Telemetry;
use crate::utilities::i18n::I18N;
use crate::utilities::logger::Logger;
use crate::utilities::rpm_controller::RPMController;

#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// Tool result cache; `None` when the crew runs with `cache = false`.
    pub cache: Option<CacheHandler>,
    /// Request gate; `None` when no `max_rpm` is set.
    pub rpm_controller: Option<Arc<RPMController>>,
    pub telemetry: Telemetry,
    pub i18n: Arc<I18N>,
    /// Crew-level verbose console output.
    pub logger: Logger,
}

impl ExecutionContext {
    pub fn new(i18n: Arc<I18N>, telemetry: Telemetry) -> Self {
        Self {
            cache: None,
            rpm_controller: None,
            telemetry,
            i18n,
            logger: Logger::new(false),
        }
    }

    pub fn with_cache(mut self, cache: CacheHandler) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_rpm_controller(mut self, rpm: Arc<RPMController>) -> Self {
        self.rpm_controller = Some(rpm);
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Pass the rate limiter gate, if any.
    pub fn wait_for_rpm(&self) {
        if let Some(rpm) = &self.rpm_controller {
            rpm.check_or_wait();
        }
    }
}
