use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Every failure the snapshot and retention pipeline can report.
///
/// The variant is the category. Callers match on it, they never inspect the
/// message text.
#[derive(Debug, Error)]
pub enum BackupError {
    /// Missing or malformed connection string or config value.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The dump executable is not on the search path.
    #[error("dump tool '{tool}' not found on PATH (install the postgresql client package)")]
    ToolNotFound { tool: String },

    #[error("dump tool exited with {}: {}", exit_label(*.code), .stderr.trim())]
    ToolExecution { code: Option<i32>, stderr: String },

    #[error("dump tool timed out after {}", humantime::format_duration(*.timeout))]
    Timeout { timeout: Duration },

    /// Any scan, classify or apply failure inside the retention engine.
    #[error("retention management failed: {context}: {source}")]
    Retention {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("another run holds the lock at {}", .lock_path.display())]
    RunInProgress { lock_path: PathBuf },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl BackupError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        BackupError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn retention(context: impl Into<String>, source: io::Error) -> Self {
        BackupError::Retention {
            context: context.into(),
            source,
        }
    }

    /// True for failures that happen before any snapshot attempt is made.
    pub fn is_setup_failure(&self) -> bool {
        matches!(
            self,
            BackupError::Configuration(_) | BackupError::ToolNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
