//! Requests-per-minute gate shared by every model call of a crew.
//!
//! The controller counts requests inside a fixed window (one minute unless
//! overridden). Once the ceiling is hit, callers block until the window
//! rolls over, then the request is counted against the new window.

use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::utilities::logger::Logger;

const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct RpmState {
    count: u32,
    window_started: Instant,
    paused: bool,
    active: bool,
}

/// Blocking rate limiter.
///
/// `max_rpm == None` disables the gate entirely.
#[derive(Debug)]
pub struct RPMController {
    /// Maximum requests per window.
    pub max_rpm: Option<u32>,
    window: Duration,
    state: Mutex<RpmState>,
    logger: Logger,
}

impl Default for RPMController {
    fn default() -> Self {
        Self::new(None)
    }
}

impl RPMController {
    pub fn new(max_rpm: Option<u32>) -> Self {
        Self::with_window(max_rpm, DEFAULT_WINDOW)
    }

    /// Controller with a custom window length. A ceiling of zero means no
    /// ceiling.
    pub fn with_window(max_rpm: Option<u32>, window: Duration) -> Self {
        let max_rpm = max_rpm.filter(|&max| max > 0);
        Self {
            max_rpm,
            window,
            state: Mutex::new(RpmState {
                count: 0,
                window_started: Instant::now(),
                paused: false,
                active: max_rpm.is_some(),
            }),
            logger: Logger::new(false),
        }
    }

    /// Use a verbose logger for the "waiting" notice.
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Count one request, blocking until the next window when the ceiling
    /// has been reached.
    ///
    /// Always returns `true` once the request is admitted.
    pub fn check_or_wait(&self) -> bool {
        let Some(max) = self.max_rpm else {
            return true;
        };

        loop {
            let wait = {
                let mut state = self.state.lock();
                if !state.active {
                    return true;
                }

                let elapsed = state.window_started.elapsed();
                if elapsed >= self.window {
                    state.count = 0;
                    state.window_started = Instant::now();
                    state.paused = false;
                }

                if state.count < max {
                    state.count += 1;
                    state.paused = false;
                    return true;
                }

                state.paused = true;
                self.window.saturating_sub(state.window_started.elapsed())
            };

            self.logger.log(
                "info",
                "Max RPM reached, waiting for next minute to start.",
                None,
            );
            thread::sleep(wait);
        }
    }

    /// Stop counting; the gate admits everything until restarted.
    pub fn stop_rpm_counter(&self) {
        let mut state = self.state.lock();
        state.active = false;
        state.paused = false;
        log::debug!("RPM counter stopped");
    }

    /// Restart counting with a fresh window.
    pub fn start_rpm_counter(&self) {
        if self.max_rpm.is_none() {
            return;
        }
        let mut state = self.state.lock();
        state.active = true;
        state.paused = false;
        state.count = 0;
        state.window_started = Instant::now();
    }

    /// Whether a caller is currently waiting for the window to roll over.
    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    /// Requests counted in the current window.
    pub fn current_rpm(&self) -> u32 {
        self.state.lock().count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_no_limit_never_blocks() {
        let rpm = RPMController::new(None);
        for _ in 0..100 {
            assert!(rpm.check_or_wait());
        }
        assert_eq!(rpm.current_rpm(), 0);
    }

    #[test]
    fn test_zero_ceiling_is_no_limit() {
        let rpm = RPMController::with_window(Some(0), Duration::from_secs(60));
        assert_eq!(rpm.max_rpm, None);
        for _ in 0..10 {
            assert!(rpm.check_or_wait());
        }
        assert!(!rpm.is_paused());
    }

    #[test]
    fn test_counts_within_window() {
        let rpm = RPMController::new(Some(5));
        rpm.check_or_wait();
        rpm.check_or_wait();
        assert_eq!(rpm.current_rpm(), 2);
        assert!(!rpm.is_paused());
    }

    #[test]
    fn test_third_request_waits_for_next_window() {
        let window = Duration::from_millis(300);
        let rpm = RPMController::with_window(Some(2), window);
        let started = Instant::now();
        rpm.check_or_wait();
        rpm.check_or_wait();
        assert!(started.elapsed() < window);

        rpm.check_or_wait();
        assert!(started.elapsed() >= window);
        assert_eq!(rpm.current_rpm(), 1);
    }

    #[test]
    fn test_paused_while_blocked() {
        let rpm = Arc::new(RPMController::with_window(
            Some(1),
            Duration::from_millis(400),
        ));
        rpm.check_or_wait();

        let waiter = {
            let rpm = Arc::clone(&rpm);
            thread::spawn(move || rpm.check_or_wait())
        };
        thread::sleep(Duration::from_millis(100));
        assert!(rpm.is_paused());
        assert!(waiter.join().unwrap());
        assert!(!rpm.is_paused());
    }

    #[test]
    fn test_stop_and_restart() {
        let rpm = RPMController::with_window(Some(1), Duration::from_secs(60));
        rpm.check_or_wait();
        rpm.stop_rpm_counter();
        // stopped: admitted without blocking
        rpm.check_or_wait();
        assert_eq!(rpm.current_rpm(), 1);

        rpm.start_rpm_counter();
        assert_eq!(rpm.current_rpm(), 0);
        rpm.check_or_wait();
        assert_eq!(rpm.current_rpm(), 1);
    }
}
