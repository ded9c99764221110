//! Console logging for crew runs.
//!
//! Two layers: the `log` facade carries structured diagnostics for the host
//! application, while [`Logger`] prints the human-facing progress lines a
//! verbose crew shows ("Working Agent", "Starting Task", tool observations).

use chrono::Local;

/// ANSI colors used by the verbose console output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrinterColor {
    Yellow,
    BoldYellow,
    Green,
    BoldGreen,
    Red,
    BoldPurple,
    Cyan,
}

impl PrinterColor {
    fn ansi_code(self) -> &'static str {
        match self {
            Self::Yellow => "\x1b[33m",
            Self::BoldYellow => "\x1b[1;33m",
            Self::Green => "\x1b[32m",
            Self::BoldGreen => "\x1b[1;32m",
            Self::Red => "\x1b[31m",
            Self::BoldPurple => "\x1b[1;35m",
            Self::Cyan => "\x1b[36m",
        }
    }
}

const RESET: &str = "\x1b[0m";

/// Writes colored lines to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct Printer;

impl Printer {
    pub fn print(&self, content: &str, color: PrinterColor) {
        println!("{}{}{}", color.ansi_code(), content, RESET);
    }
}

/// Verbose, timestamped console logger.
///
/// Silent unless `verbose` is set; every message is also forwarded to the
/// `log` facade at the matching level.
#[derive(Debug, Clone, Default)]
pub struct Logger {
    pub verbose: bool,
    printer: Printer,
}

impl Logger {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            printer: Printer,
        }
    }

    /// Log `message` at `level` ("debug", "info", "warning", "error").
    pub fn log(&self, level: &str, message: &str, color: Option<PrinterColor>) {
        match level {
            "debug" => log::debug!("{}", message),
            "warning" | "warn" => log::warn!("{}", message),
            "error" => log::error!("{}", message),
            _ => log::info!("{}", message),
        }

        if self.verbose {
            let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
            let line = format!("\n[{}][{}]: {}", timestamp, level.to_uppercase(), message);
            self.printer
                .print(&line, color.unwrap_or(PrinterColor::BoldYellow));
        }
    }

    /// Print without timestamp when verbose, used for tool observations.
    pub fn print(&self, content: &str, color: PrinterColor) {
        if self.verbose {
            self.printer.print(content, color);
        }
    }
}

/// Install an `env_logger` backend for the `log` facade.
///
/// Respects `RUST_LOG`; calling it more than once is harmless.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_logger_does_not_panic() {
        init_logging();
        let logger = Logger::new(false);
        logger.log("info", "== Starting Task: quiet", None);
        logger.print("observation", PrinterColor::Yellow);
    }

    #[test]
    fn test_verbose_logger_prints() {
        let logger = Logger::new(true);
        logger.log("debug", "== Working Agent: Researcher", Some(PrinterColor::BoldPurple));
        assert!(logger.verbose);
    }
}
