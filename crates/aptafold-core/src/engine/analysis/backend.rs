use crate::core::models::sequence::{DnaSequence, PeptideSequence};
use crate::engine::context::RunContext;
use crate::engine::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A trajectory and the structure that defines its topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TrajectoryPair {
    pub structure: PathBuf,
    pub trajectory: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResidueContact {
    /// 1-based aptamer base index.
    pub base_index: usize,
    /// 1-based peptide residue index.
    pub peptide_residue: usize,
    /// Fraction of frames in which the two are in contact.
    pub occupancy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BindingSummary {
    pub contacts: Vec<ResidueContact>,
    /// Fraction of frames with at least one aptamer-peptide contact.
    pub bound_fraction: f64,
}

impl BindingSummary {
    pub fn strongest_contact(&self) -> Option<&ResidueContact> {
        self.contacts
            .iter()
            .max_by(|a, b| a.occupancy.total_cmp(&b.occupancy))
    }
}

/// External trajectory numerics.
pub trait TrajectoryBackend {
    fn name(&self) -> &str;

    /// Writes `output`, a copy of `input` without solvent and ion segments.
    fn strip_solvent(
        &self,
        input: &TrajectoryPair,
        output: &TrajectoryPair,
        ctx: &RunContext,
    ) -> Result<(), PipelineError>;

    /// Per-frame Watson-Crick partner tables for the aptamer (1-based partners, 0 = unpaired).
    fn pairing_trajectory(
        &self,
        pair: &TrajectoryPair,
        ctx: &RunContext,
    ) -> Result<Vec<Vec<usize>>, PipelineError>;

    /// Per-frame backbone dihedral angles in radians.
    fn dihedral_trajectory(
        &self,
        pair: &TrajectoryPair,
        ctx: &RunContext,
    ) -> Result<Vec<Vec<f64>>, PipelineError>;

    fn binding_contacts(
        &self,
        pair: &TrajectoryPair,
        sequence: &DnaSequence,
        peptide: &PeptideSequence,
        ctx: &RunContext,
    ) -> Result<BindingSummary, PipelineError>;

    /// Writes frame `frame` (0-based) of the trajectory as a standalone structure.
    fn extract_frame(
        &self,
        pair: &TrajectoryPair,
        frame: usize,
        output: &Path,
        ctx: &RunContext,
    ) -> Result<(), PipelineError>;
}
