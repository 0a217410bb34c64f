//! Chat log — append-only line sink for room traffic.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::warn;

/// Clonable handle to the process-wide chat log. Disabled when no log file
/// is configured; logging failures are reported, never fatal.
#[derive(Clone, Default)]
pub struct ChatLog {
    sink: Option<Arc<Mutex<File>>>,
}

impl ChatLog {
    #[must_use]
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    /// Open (creating if needed) the log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { sink: Some(Arc::new(Mutex::new(file))) })
    }

    /// Append one line.
    pub fn log(&self, line: &str) {
        let Some(sink) = &self.sink else {
            return;
        };
        let mut file = sink.lock().unwrap();
        if let Err(e) = writeln!(file, "{line}") {
            warn!(error = %e, "chat log write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_log_swallows_lines() {
        let log = ChatLog::disabled();
        log.log("goes nowhere");
    }

    #[test]
    fn open_log_appends_lines() {
        let path = std::env::temp_dir().join(format!("parlor-chatlog-{}", uuid::Uuid::new_v4()));
        let log = ChatLog::open(&path).unwrap();
        log.log("first");
        log.log("second");

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first\nsecond\n");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn clones_share_one_sink() {
        let path = std::env::temp_dir().join(format!("parlor-chatlog-{}", uuid::Uuid::new_v4()));
        let log = ChatLog::open(&path).unwrap();
        let clone = log.clone();
        log.log("from original");
        clone.log("from clone");

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        std::fs::remove_file(&path).ok();
    }
}
