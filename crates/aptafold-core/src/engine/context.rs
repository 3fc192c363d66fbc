use super::artifacts::OUTFILES_DIR;
use std::path::{Path, PathBuf};

/// Everything a stage needs to know about the run it executes in.
///
/// Stages never change the process working directory or environment; they resolve every
/// artifact against `work_dir` and hand `library_path` to the subprocesses that need it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub run_number: u32,
    pub work_dir: PathBuf,
    pub library_path: Option<PathBuf>,
}

impl RunContext {
    pub fn new(run_number: u32, work_dir: PathBuf, library_path: Option<PathBuf>) -> Self {
        Self {
            run_number,
            work_dir,
            library_path,
        }
    }

    /// Resolves a conventional artifact name inside the run directory.
    pub fn path(&self, name: impl AsRef<Path>) -> PathBuf {
        self.work_dir.join(name)
    }

    /// Directory holding raw engine console output.
    pub fn outfiles_dir(&self) -> PathBuf {
        self.work_dir.join(OUTFILES_DIR)
    }
}
