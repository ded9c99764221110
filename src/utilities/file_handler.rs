//! Append-only output log of task lifecycle events.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

/// Log file used when the crew asks for an output log without naming one.
pub const DEFAULT_LOG_FILE: &str = "logs.txt";

/// Where a crew writes its output log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLogFile {
    /// `logs.txt` in the working directory.
    Default,
    Path(PathBuf),
    /// No output log.
    Disabled,
}

impl From<bool> for OutputLogFile {
    fn from(enabled: bool) -> Self {
        if enabled {
            OutputLogFile::Default
        } else {
            OutputLogFile::Disabled
        }
    }
}

impl From<&str> for OutputLogFile {
    fn from(path: &str) -> Self {
        OutputLogFile::Path(PathBuf::from(path))
    }
}

impl From<PathBuf> for OutputLogFile {
    fn from(path: PathBuf) -> Self {
        OutputLogFile::Path(path)
    }
}

/// Appends `timestamp: key=value, ...` lines to a text file.
#[derive(Debug, Clone)]
pub struct FileHandler {
    path: PathBuf,
}

impl FileHandler {
    /// Handler for `target`, or `None` when the log is disabled.
    pub fn new(target: &OutputLogFile) -> Option<Self> {
        let path = match target {
            OutputLogFile::Default => PathBuf::from(DEFAULT_LOG_FILE),
            OutputLogFile::Path(path) => path.clone(),
            OutputLogFile::Disabled => return None,
        };
        Some(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line built from `fields`.
    pub fn log(&self, fields: &[(&str, &str)]) -> std::io::Result<()> {
        let now = Local::now().format("%Y-%m-%d %H:%M:%S");
        let body = fields
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join(", ");

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}: {}", now, body)
    }

    /// Record a task status change. Write failures are logged, not raised.
    pub fn log_task(&self, agent: &str, task: &str, status: &str) {
        if let Err(e) = self.log(&[("agent", agent), ("task", task), ("status", status)]) {
            log::warn!(
                "Failed to write output log {}: {}",
                self.path.display(),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_target() {
        let handler = FileHandler::new(&OutputLogFile::from(true)).unwrap();
        assert_eq!(handler.path(), Path::new("logs.txt"));
    }

    #[test]
    fn test_false_disables_log() {
        assert_eq!(OutputLogFile::from(false), OutputLogFile::Disabled);
        assert!(FileHandler::new(&OutputLogFile::from(false)).is_none());
    }

    #[test]
    fn test_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crew.log");
        let handler = FileHandler::new(&OutputLogFile::Path(path.clone())).unwrap();

        handler.log_task("Researcher", "Find facts", "started");
        handler.log_task("Researcher", "Find facts", "completed");

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("agent=Researcher, task=Find facts, status=started"));
        assert!(lines[1].ends_with("status=completed"));
    }
}
