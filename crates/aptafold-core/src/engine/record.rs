use super::artifacts::RECORD_FILE;
use super::context::RunContext;
use super::error::PipelineError;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// The run-local, human-readable record log (`record.txt`).
///
/// Stage transitions and failures are appended here in addition to being logged and raised,
/// so a run directory can be inspected post-mortem without the process' console output.
#[derive(Debug, Clone)]
pub struct RunRecord {
    path: PathBuf,
}

impl RunRecord {
    pub fn new(context: &RunContext) -> Self {
        Self {
            path: context.path(RECORD_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, statement: &str) -> Result<(), PipelineError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| PipelineError::io(&self.path, e))?;
        writeln!(file, "{statement}").map_err(|e| PipelineError::io(&self.path, e))
    }

    /// Appends a statement, downgrading a write failure to a warning so that recording an
    /// error never masks the error itself.
    pub fn note(&self, statement: &str) {
        if let Err(e) = self.append(statement) {
            warn!("Could not write to run record {:?}: {}", self.path, e);
        }
    }
}
