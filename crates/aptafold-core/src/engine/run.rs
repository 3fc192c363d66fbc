use super::artifacts::{
    self, ANALYTE_STRUCTURE, COMMAND_TEMPLATE, ENGINE_PARAMETERS, OUTFILES_DIR,
};
use super::checkpoint::{CheckpointLog, CheckpointState};
use super::context::RunContext;
use super::error::PipelineError;
use super::record::RunRecord;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const RUN_DIR_PREFIX: &str = "run";

/// Input files copied into every freshly allocated run directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTemplates {
    pub command_template: PathBuf,
    pub engine_parameters: Option<PathBuf>,
    pub analyte_structure: Option<PathBuf>,
}

/// Allocates and resolves per-run working directories (`<work_root>/run<N>`).
#[derive(Debug, Clone)]
pub struct RunManager {
    work_root: PathBuf,
    templates: RunTemplates,
    library_path: Option<PathBuf>,
}

impl RunManager {
    pub fn new(work_root: PathBuf, templates: RunTemplates, library_path: Option<PathBuf>) -> Self {
        Self {
            work_root,
            templates,
            library_path,
        }
    }

    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    /// Starts a new run when `run_number` is 0, otherwise resumes the existing one.
    pub fn start_or_resume_run(&self, run_number: u32) -> Result<RunHandle, PipelineError> {
        if run_number == 0 {
            self.start_new_run()
        } else {
            self.resume_run(run_number)
        }
    }

    /// The ordinal a new run would receive: one past the highest existing run, or 1.
    pub fn next_run_number(&self) -> Result<u32, PipelineError> {
        let entries = match fs::read_dir(&self.work_root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(1),
            Err(e) => return Err(PipelineError::io(&self.work_root, e)),
        };

        let mut highest = 0;
        for entry in entries {
            let entry = entry.map_err(|e| PipelineError::io(&self.work_root, e))?;
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(n) = parse_run_number(&entry.file_name().to_string_lossy()) {
                highest = highest.max(n);
            }
        }
        Ok(highest + 1)
    }

    pub fn run_dir(&self, run_number: u32) -> PathBuf {
        run_directory(&self.work_root, run_number)
    }

    fn start_new_run(&self) -> Result<RunHandle, PipelineError> {
        fs::create_dir_all(&self.work_root).map_err(|e| PipelineError::io(&self.work_root, e))?;

        let run_number = self.next_run_number()?;
        let work_dir = self.run_dir(run_number);

        // `create_dir` fails if another process claimed the same ordinal first.
        match fs::create_dir(&work_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(PipelineError::DirectoryConflict {
                    run_number,
                    path: work_dir,
                });
            }
            Err(e) => return Err(PipelineError::io(&work_dir, e)),
        }
        info!("Starting fresh run {} in {:?}", run_number, work_dir);

        let outfiles = work_dir.join(OUTFILES_DIR);
        fs::create_dir(&outfiles).map_err(|e| PipelineError::io(&outfiles, e))?;

        let context = self.context(run_number, work_dir);
        self.install_templates(&context)?;
        RunHandle::open(context, false)
    }

    fn resume_run(&self, run_number: u32) -> Result<RunHandle, PipelineError> {
        let work_dir = self.run_dir(run_number);
        if !work_dir.is_dir() {
            return Err(PipelineError::Configuration(format!(
                "Cannot resume run {}: directory {:?} does not exist",
                run_number, work_dir
            )));
        }
        info!("Resuming run {} in {:?}", run_number, work_dir);
        let context = self.context(run_number, work_dir);
        RunHandle::open(context, true)
    }

    fn context(&self, run_number: u32, work_dir: PathBuf) -> RunContext {
        RunContext::new(run_number, work_dir, self.library_path.clone())
    }

    fn install_templates(&self, context: &RunContext) -> Result<(), PipelineError> {
        let copies = [
            (Some(&self.templates.command_template), COMMAND_TEMPLATE, "command template"),
            (
                self.templates.engine_parameters.as_ref(),
                ENGINE_PARAMETERS,
                "engine parameters",
            ),
            (
                self.templates.analyte_structure.as_ref(),
                ANALYTE_STRUCTURE,
                "analyte structure",
            ),
        ];
        for (source, name, artifact) in copies {
            let Some(source) = source else { continue };
            let source = artifacts::require("run setup", artifact, source.clone())?;
            debug!("Copying {} {:?} into run directory.", artifact, source);
            artifacts::copy(&source, &context.path(name))?;
        }
        Ok(())
    }
}

/// The directory of run `run_number` under `work_root`.
pub fn run_directory(work_root: &Path, run_number: u32) -> PathBuf {
    work_root.join(format!("{RUN_DIR_PREFIX}{run_number}"))
}

fn parse_run_number(name: &str) -> Option<u32> {
    name.strip_prefix(RUN_DIR_PREFIX)?.parse().ok()
}

/// An open run: its context plus the checkpoint log and record log living in it.
#[derive(Debug, Clone)]
pub struct RunHandle {
    context: RunContext,
    checkpoint: CheckpointLog,
    record: RunRecord,
    resumed: bool,
}

impl RunHandle {
    pub fn open(context: RunContext, resumed: bool) -> Result<Self, PipelineError> {
        let handle = Self {
            checkpoint: CheckpointLog::new(&context),
            record: RunRecord::new(&context),
            context,
            resumed,
        };
        let state = handle.read_checkpoint()?;
        let verb = if resumed { "Resuming" } else { "Starting" };
        handle.record.append(&format!(
            "{} run {} at checkpoint '{}' ({} marker(s))",
            verb, handle.context.run_number, state.label, state.count
        ))?;
        Ok(handle)
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    pub fn record(&self) -> &RunRecord {
        &self.record
    }

    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    pub fn read_checkpoint(&self) -> Result<CheckpointState, PipelineError> {
        self.checkpoint.read()
    }

    pub fn advance_checkpoint(&self, marker: &str) -> Result<usize, PipelineError> {
        let count = self.checkpoint.advance(marker)?;
        self.record.append(&format!("Checkpoint: {marker}"))?;
        Ok(count)
    }
}
