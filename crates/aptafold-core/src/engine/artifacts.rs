//! Conventional artifact names inside a run directory and helpers to move artifacts between
//! stages.
//!
//! Each stage finds its input under a fixed name, so a resumed run can pick up where it left
//! off without any in-memory hand-off. The adapters still receive those paths as explicit
//! fields, which lets a single stage run against any directory in tests.

use super::context::RunContext;
use super::error::PipelineError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const CHECKPOINT_FILE: &str = "checkpoint.txt";
pub const RECORD_FILE: &str = "record.txt";
pub const OUTFILES_DIR: &str = "outfiles";
pub const JOBS_DIR: &str = "jobs";

pub const COMMAND_TEMPLATE: &str = "commands.template.dat";
pub const ENGINE_PARAMETERS: &str = "parameters.csv";
pub const ANALYTE_STRUCTURE: &str = "analyte.pdb";

/// Dropping a structure under this name seeds the run and bypasses prediction and folding.
pub const PREFOLD_OVERRIDE: &str = "pre_fold.pdb";
pub const SECONDARY_STRUCTURE: &str = "secondary_structure.toml";
pub const FOLD_SCRIPT: &str = "commands.fold.dat";
pub const FOLD_LOG: &str = "fold.out";
pub const ENGINE_FRAME: &str = "frame.pdb";
pub const FOLDED_STRUCTURE: &str = "sequence.pdb";

pub const ENGINE_TRAJECTORY: &str = "trajectory.dcd";
pub const ENGINE_LOG: &str = "log.txt";

pub const PEPTIDE_STRUCTURE: &str = "peptide.pdb";
pub const COMPLEX_INPUT: &str = "combined.pdb";

/// Which molecular system an MD stage and its analysis operate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactLabel {
    Aptamer,
    Complex,
}

impl ArtifactLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Aptamer => "aptamer",
            Self::Complex => "complex",
        }
    }

    pub fn structure(self) -> String {
        format!("{}.pdb", self.as_str())
    }

    pub fn trajectory(self) -> String {
        format!("{}.dcd", self.as_str())
    }

    pub fn clean_structure(self) -> String {
        format!("clean_{}.pdb", self.as_str())
    }

    pub fn clean_trajectory(self) -> String {
        format!("clean_{}.dcd", self.as_str())
    }

    /// The MD engine's own state snapshot, used to resume an interrupted simulation.
    pub fn engine_state(self) -> String {
        format!("{}_state.chk", self.as_str())
    }

    /// Written by the sampling stage once production has finished.
    pub fn sampling_record(self) -> String {
        format!("{}_sampling.toml", self.as_str())
    }

    pub fn representative_structure(self) -> String {
        format!("{}_representative.pdb", self.as_str())
    }

    pub fn reduced_trajectory(self) -> String {
        format!("{}_reduced.csv", self.as_str())
    }

    pub fn analysis(self) -> String {
        format!("{}_analysis.toml", self.as_str())
    }
}

impl fmt::Display for ArtifactLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns `path` if it exists, otherwise a `MissingInput` error attributed to `stage`.
pub fn require(
    stage: &'static str,
    artifact: &'static str,
    path: PathBuf,
) -> Result<PathBuf, PipelineError> {
    if path.exists() {
        Ok(path)
    } else {
        Err(PipelineError::MissingInput {
            stage,
            artifact,
            path,
        })
    }
}

/// Renames an engine output to its stage-specific name, replacing any earlier copy.
pub fn relabel(from: &Path, to: &Path) -> Result<(), PipelineError> {
    fs::rename(from, to).map_err(|e| PipelineError::io(from, e))
}

pub fn copy(from: &Path, to: &Path) -> Result<(), PipelineError> {
    fs::copy(from, to)
        .map(|_| ())
        .map_err(|e| PipelineError::io(from, e))
}

pub fn write_toml<T: Serialize>(path: &Path, value: &T) -> Result<(), PipelineError> {
    let text = toml::to_string_pretty(value).map_err(|e| PipelineError::Serialization {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    fs::write(path, text).map_err(|e| PipelineError::io(path, e))
}

pub fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, PipelineError> {
    let text = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
    toml::from_str(&text).map_err(|e| PipelineError::Serialization {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Creates the directory holding an engine's raw console output if it is missing.
pub fn ensure_outfiles(context: &RunContext) -> Result<PathBuf, PipelineError> {
    let dir = context.outfiles_dir();
    fs::create_dir_all(&dir).map_err(|e| PipelineError::io(&dir, e))?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        frames: Vec<Vec<f64>>,
        label: ArtifactLabel,
    }

    #[test]
    fn label_names_are_stable() {
        assert_eq!(ArtifactLabel::Aptamer.structure(), "aptamer.pdb");
        assert_eq!(ArtifactLabel::Complex.trajectory(), "complex.dcd");
        assert_eq!(ArtifactLabel::Aptamer.engine_state(), "aptamer_state.chk");
        assert_eq!(ArtifactLabel::Complex.sampling_record(), "complex_sampling.toml");
        assert_eq!(
            ArtifactLabel::Complex.representative_structure(),
            "complex_representative.pdb"
        );
    }

    #[test]
    fn require_reports_stage_and_path() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join(FOLDED_STRUCTURE);
        let err = require("md-sampling", "folded structure", missing.clone()).unwrap_err();
        match err {
            PipelineError::MissingInput {
                stage,
                artifact,
                path,
            } => {
                assert_eq!(stage, "md-sampling");
                assert_eq!(artifact, "folded structure");
                assert_eq!(path, missing);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn toml_helpers_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.toml");
        let sample = Sample {
            frames: vec![vec![0.5, -1.0], vec![2.0, 0.0]],
            label: ArtifactLabel::Complex,
        };
        write_toml(&path, &sample).unwrap();
        let back: Sample = read_toml(&path).unwrap();
        assert_eq!(back, sample);
    }

    #[test]
    fn read_toml_reports_malformed_artifacts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "frames = [").unwrap();
        let err = read_toml::<Sample>(&path).unwrap_err();
        assert!(matches!(err, PipelineError::Serialization { .. }));
    }
}
