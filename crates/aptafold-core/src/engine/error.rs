use super::config::ConfigError;
use crate::core::models::secondary::SecondaryStructureError;
use crate::core::models::sequence::SequenceError;
use std::fmt::Display;
use std::path::PathBuf;
use thiserror::Error;

/// Number of trailing log lines kept when an external engine fails.
pub const LOG_TAIL_LINES: usize = 20;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(
        "Missing input for stage '{stage}': {artifact} not found at {path}",
        path = path.display()
    )]
    MissingInput {
        stage: &'static str,
        artifact: &'static str,
        path: PathBuf,
    },

    #[error("External engine '{tool}' failed ({status}):\n{log_tail}")]
    EngineFailure {
        tool: String,
        status: String,
        log_tail: String,
    },

    #[error("Anchor line '{anchor}' not found in command template {path}", path = path.display())]
    TemplateAnchorNotFound { anchor: String, path: PathBuf },

    #[error(
        "Run directory {path} was claimed concurrently for run {run_number}",
        path = path.display()
    )]
    DirectoryConflict { run_number: u32, path: PathBuf },

    #[error("I/O error on {path}: {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read or write artifact {path}: {message}", path = path.display())]
    Serialization { path: PathBuf, message: String },
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Builds an `EngineFailure`, keeping only the last [`LOG_TAIL_LINES`] lines of `log`.
    pub fn engine_failure(tool: impl Into<String>, status: impl Display, log: &str) -> Self {
        Self::EngineFailure {
            tool: tool.into(),
            status: status.to_string(),
            log_tail: log_tail(log, LOG_TAIL_LINES),
        }
    }

    /// An engine exited cleanly but its output cannot be used.
    pub fn malformed_output(tool: impl Into<String>, detail: impl Display) -> Self {
        Self::engine_failure(tool, "malformed output", &detail.to_string())
    }
}

impl From<ConfigError> for PipelineError {
    fn from(e: ConfigError) -> Self {
        Self::Configuration(e.to_string())
    }
}

impl From<SequenceError> for PipelineError {
    fn from(e: SequenceError) -> Self {
        Self::Configuration(e.to_string())
    }
}

impl From<SecondaryStructureError> for PipelineError {
    fn from(e: SecondaryStructureError) -> Self {
        Self::Configuration(e.to_string())
    }
}

fn log_tail(log: &str, lines: usize) -> String {
    let all: Vec<&str> = log.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}
