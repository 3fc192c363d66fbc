use super::artifacts::CHECKPOINT_FILE;
use super::context::RunContext;
use super::error::PipelineError;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// First marker of every checkpoint log.
pub const STARTED_MARKER: &str = "Started";
pub const INITIALIZED_LABEL: &str = "initialized";
/// Label for marker counts past the last registered stage.
pub const COMPLETE_LABEL: &str = "complete";

/// The registered pipeline stages, in execution order.
///
/// A stage's gate is derived from its position in [`StageId::ALL`]: the log starts with one
/// marker, and each completed stage appends exactly one more, so stage `k` (0-based) is
/// complete once the log holds at least `k + 2` markers. Adding a stage only means adding it
/// here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageId {
    SecondaryStructure,
    Folding,
    AptamerSampling,
    ComplexSampling,
}

impl StageId {
    pub const ALL: [StageId; 4] = [
        StageId::SecondaryStructure,
        StageId::Folding,
        StageId::AptamerSampling,
        StageId::ComplexSampling,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::SecondaryStructure => "Secondary Structure Prediction",
            Self::Folding => "Coarse Folding",
            Self::AptamerSampling => "Free Aptamer Sampling",
            Self::ComplexSampling => "Complex Sampling",
        }
    }

    /// The completion marker appended to the checkpoint log.
    pub fn marker(self) -> &'static str {
        match self {
            Self::SecondaryStructure => "secondary structure done",
            Self::Folding => "folded",
            Self::AptamerSampling => "aptamer sampled",
            Self::ComplexSampling => "complex sampled",
        }
    }

    pub fn ordinal(self) -> usize {
        Self::ALL
            .iter()
            .position(|&stage| stage == self)
            .unwrap_or(Self::ALL.len())
    }

    /// Marker count at which this stage counts as durably complete.
    pub fn gate(self) -> usize {
        self.ordinal() + 2
    }

    pub fn is_complete(self, count: usize) -> bool {
        count >= self.gate()
    }
}

/// Maps a marker count to its named checkpoint.
pub fn label_for(count: usize) -> &'static str {
    match count {
        0 | 1 => INITIALIZED_LABEL,
        n => StageId::ALL
            .get(n - 2)
            .map(|stage| stage.marker())
            .unwrap_or(COMPLETE_LABEL),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointState {
    pub count: usize,
    pub label: &'static str,
}

/// The append-only, newline-delimited checkpoint log of one run directory.
///
/// The number of markers is the sole source of truth for the resume position. Markers are
/// only ever appended; nothing is reordered, rewritten or truncated.
#[derive(Debug, Clone)]
pub struct CheckpointLog {
    path: PathBuf,
}

impl CheckpointLog {
    pub fn new(context: &RunContext) -> Self {
        Self::at(context.path(CHECKPOINT_FILE))
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the current position, creating the log with a single start marker if needed.
    pub fn read(&self) -> Result<CheckpointState, PipelineError> {
        let count = match fs::read_to_string(&self.path) {
            Ok(text) => count_markers(&text),
            Err(e) if e.kind() == ErrorKind::NotFound => 0,
            Err(e) => return Err(PipelineError::io(&self.path, e)),
        };

        if count == 0 {
            debug!("Checkpoint log {:?} is empty; writing start marker.", self.path);
            self.append(STARTED_MARKER)?;
            return Ok(CheckpointState {
                count: 1,
                label: INITIALIZED_LABEL,
            });
        }

        Ok(CheckpointState {
            count,
            label: label_for(count),
        })
    }

    /// Reads the current position without touching the log; `None` if no marker was written yet.
    pub fn peek(&self) -> Result<Option<CheckpointState>, PipelineError> {
        let count = match fs::read_to_string(&self.path) {
            Ok(text) => count_markers(&text),
            Err(e) if e.kind() == ErrorKind::NotFound => 0,
            Err(e) => return Err(PipelineError::io(&self.path, e)),
        };
        Ok((count > 0).then(|| CheckpointState {
            count,
            label: label_for(count),
        }))
    }

    /// Appends `marker` as a new line and returns the new marker count.
    pub fn advance(&self, marker: &str) -> Result<usize, PipelineError> {
        self.append(marker)?;
        let state = self.read()?;
        info!(count = state.count, marker, "Checkpoint advanced.");
        Ok(state.count)
    }

    fn append(&self, marker: &str) -> Result<(), PipelineError> {
        let needs_separator = match fs::read(&self.path) {
            Ok(bytes) => bytes.last().is_some_and(|&b| b != b'\n'),
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(PipelineError::io(&self.path, e)),
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| PipelineError::io(&self.path, e))?;
        let line = if needs_separator {
            format!("\n{marker}\n")
        } else {
            format!("{marker}\n")
        };
        file.write_all(line.as_bytes())
            .and_then(|_| file.sync_data())
            .map_err(|e| PipelineError::io(&self.path, e))
    }
}

fn count_markers(text: &str) -> usize {
    text.lines().filter(|line| !line.trim().is_empty()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn log_in(dir: &Path) -> CheckpointLog {
        CheckpointLog::at(dir.join(CHECKPOINT_FILE))
    }

    #[test]
    fn read_creates_log_with_start_marker() {
        let dir = tempdir().unwrap();
        let log = log_in(dir.path());

        let state = log.read().unwrap();
        assert_eq!(state.count, 1);
        assert_eq!(state.label, INITIALIZED_LABEL);
        assert_eq!(fs::read_to_string(log.path()).unwrap(), "Started\n");
    }

    #[test]
    fn peek_never_creates_the_log() {
        let dir = tempdir().unwrap();
        let log = log_in(dir.path());

        assert_eq!(log.peek().unwrap(), None);
        assert!(!log.path().exists());

        log.read().unwrap();
        log.advance(StageId::SecondaryStructure.marker()).unwrap();
        let state = log.peek().unwrap().unwrap();
        assert_eq!(state.count, 2);
        assert_eq!(state.label, StageId::SecondaryStructure.marker());
    }

    #[test]
    fn repeated_reads_do_not_change_the_count() {
        let dir = tempdir().unwrap();
        let log = log_in(dir.path());
        log.read().unwrap();
        log.advance(StageId::SecondaryStructure.marker()).unwrap();

        let first = log.read().unwrap();
        let second = log.read().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.count, 2);
    }

    #[test]
    fn advance_appends_exactly_one_line_and_preserves_prefix() {
        let dir = tempdir().unwrap();
        let log = log_in(dir.path());
        log.read().unwrap();

        let mut previous = fs::read_to_string(log.path()).unwrap();
        for (expected, stage) in (2..).zip(StageId::ALL) {
            let count = log.advance(stage.marker()).unwrap();
            assert_eq!(count, expected);

            let current = fs::read_to_string(log.path()).unwrap();
            assert!(current.starts_with(&previous));
            assert_eq!(&current[previous.len()..], format!("{}\n", stage.marker()));
            previous = current;
        }
    }

    #[test]
    fn labels_follow_the_stage_registry() {
        assert_eq!(label_for(1), "initialized");
        assert_eq!(label_for(2), "secondary structure done");
        assert_eq!(label_for(3), "folded");
        assert_eq!(label_for(4), "aptamer sampled");
        assert_eq!(label_for(5), "complex sampled");
        assert_eq!(label_for(6), COMPLETE_LABEL);
        assert_eq!(label_for(42), COMPLETE_LABEL);
    }

    #[test]
    fn stage_gates_are_derived_from_registry_order() {
        assert_eq!(StageId::SecondaryStructure.gate(), 2);
        assert_eq!(StageId::ComplexSampling.gate(), 5);
        assert!(!StageId::Folding.is_complete(2));
        assert!(StageId::Folding.is_complete(3));
        assert!(StageId::SecondaryStructure.is_complete(3));
        assert!(!StageId::AptamerSampling.is_complete(3));
    }

    #[test]
    fn legacy_log_without_trailing_newline_is_extended_cleanly() {
        let dir = tempdir().unwrap();
        let log = log_in(dir.path());
        fs::write(log.path(), "Started!\n\nGot Secondary Structure").unwrap();

        assert_eq!(log.read().unwrap().count, 2);
        assert_eq!(log.advance("folded").unwrap(), 3);
        assert_eq!(
            fs::read_to_string(log.path()).unwrap(),
            "Started!\n\nGot Secondary Structure\nfolded\n"
        );
    }

    #[test]
    fn empty_log_is_repaired_with_start_marker() {
        let dir = tempdir().unwrap();
        let log = log_in(dir.path());
        fs::write(log.path(), "").unwrap();
        assert_eq!(log.read().unwrap().count, 1);
        assert_eq!(fs::read_to_string(log.path()).unwrap(), "Started\n");
    }
}
