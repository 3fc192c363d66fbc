//! Trajectory analysis: turns a sampled trajectory into an [`AnalysisResult`].
//!
//! The heavy numerics (solvent stripping, base-pair detection, dihedrals, contact maps) are
//! delegated to a [`TrajectoryBackend`]. What is decided here is how those raw series become a
//! result: the equilibrium pairing, the discrepancy against the prediction, the reduced
//! trajectory and the choice of representative frame.

pub mod backend;
pub mod reduction;
pub mod secondary;

pub use backend::{BindingSummary, ResidueContact, TrajectoryBackend, TrajectoryPair};
pub use reduction::ReducedTrajectory;
pub use secondary::{PartnerMismatch, StructureComparator};

use crate::core::models::secondary::SecondaryStructure;
use crate::core::models::sequence::{DnaSequence, PeptideSequence};
use crate::engine::artifacts::{self, ArtifactLabel};
use crate::engine::context::RunContext;
use crate::engine::error::PipelineError;
use crate::engine::stages::{StageAdapter, StageDiagnostics, StageOutput};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AnalysisResult {
    pub label: ArtifactLabel,
    /// Discrepancy between predicted and observed pairing; absent without a prediction.
    pub prediction_error: Option<f64>,
    pub representative_frame: usize,
    pub representative_structure: PathBuf,
    pub observed_dot_bracket: String,
    pub predicted_partners: Option<Vec<usize>>,
    pub observed_partners: Vec<usize>,
    pub reduced_trajectory: ReducedTrajectory,
    pub binding: Option<BindingSummary>,
}

impl AnalysisResult {
    /// Reloads the result persisted by an earlier, completed analysis.
    pub fn load(label: ArtifactLabel, ctx: &RunContext) -> Result<Self, PipelineError> {
        let path = artifacts::require(
            "trajectory-analysis",
            "persisted analysis",
            ctx.path(label.analysis()),
        )?;
        artifacts::read_toml(&path)
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub label: ArtifactLabel,
    pub sampled: TrajectoryPair,
    pub sequence: DnaSequence,
    pub peptide: Option<PeptideSequence>,
    pub predicted: Option<SecondaryStructure>,
}

pub struct TrajectoryAnalyzer<'a> {
    backend: &'a dyn TrajectoryBackend,
    comparator: &'a dyn StructureComparator,
    principal_components: usize,
}

impl<'a> TrajectoryAnalyzer<'a> {
    pub fn new(
        backend: &'a dyn TrajectoryBackend,
        comparator: &'a dyn StructureComparator,
        principal_components: usize,
    ) -> Self {
        Self {
            backend,
            comparator,
            principal_components,
        }
    }
}

impl StageAdapter for TrajectoryAnalyzer<'_> {
    type Input = AnalysisRequest;
    type Output = AnalysisResult;

    fn name(&self) -> &'static str {
        "trajectory-analysis"
    }

    #[instrument(skip_all, name = "trajectory_analysis", fields(label = %input.label))]
    fn execute(
        &self,
        input: &Self::Input,
        ctx: &RunContext,
    ) -> Result<StageOutput<Self::Output>, PipelineError> {
        let started = Instant::now();
        let label = input.label;
        let sampled = TrajectoryPair {
            structure: artifacts::require(
                self.name(),
                "sampled structure",
                input.sampled.structure.clone(),
            )?,
            trajectory: artifacts::require(
                self.name(),
                "sampled trajectory",
                input.sampled.trajectory.clone(),
            )?,
        };

        // === Solvent removal ===
        let clean = TrajectoryPair {
            structure: ctx.path(label.clean_structure()),
            trajectory: ctx.path(label.clean_trajectory()),
        };
        self.backend.strip_solvent(&sampled, &clean, ctx)?;

        // === Secondary structure ===
        let pairing = self.backend.pairing_trajectory(&clean, ctx)?;
        let observed_partners = secondary::equilibrium_partners(&pairing, input.sequence.len())?;
        let observed = SecondaryStructure::from_partner_table(&observed_partners)
            .map_err(|e| PipelineError::malformed_output(self.backend.name(), e))?;

        let predicted_partners = input.predicted.as_ref().map(SecondaryStructure::partner_table);
        let prediction_error = predicted_partners
            .as_deref()
            .map(|predicted| self.comparator.distance(predicted, &observed_partners))
            .transpose()?;
        if let Some(error) = prediction_error {
            info!(
                error,
                observed = %observed.dot_bracket(),
                "Secondary structure prediction error."
            );
        }

        // === Conformational reduction ===
        let dihedrals = self.backend.dihedral_trajectory(&clean, ctx)?;
        let reduced = reduction::reduce(&dihedrals, self.principal_components)?;
        let representative_frame = reduction::representative_frame(&reduced.frames).ok_or_else(|| {
            PipelineError::malformed_output(self.backend.name(), "trajectory has no frames")
        })?;
        let representative_structure = ctx.path(label.representative_structure());
        self.backend
            .extract_frame(&clean, representative_frame, &representative_structure, ctx)?;
        reduced.write_csv(&ctx.path(label.reduced_trajectory()))?;
        info!(frame = representative_frame, "Representative frame selected.");

        // === Binding ===
        let binding = match &input.peptide {
            Some(peptide) => {
                let summary = self
                    .backend
                    .binding_contacts(&clean, &input.sequence, peptide, ctx)?;
                info!(bound_fraction = summary.bound_fraction, "Binding contacts analysed.");
                Some(summary)
            }
            None => None,
        };

        let result = AnalysisResult {
            label,
            prediction_error,
            representative_frame,
            representative_structure,
            observed_dot_bracket: observed.dot_bracket(),
            predicted_partners,
            observed_partners,
            reduced_trajectory: reduced,
            binding,
        };
        artifacts::write_toml(&ctx.path(label.analysis()), &result)?;

        Ok(StageOutput {
            artifacts: result,
            diagnostics: StageDiagnostics::new(self.name(), started.elapsed())
                .with_note(format!("{} frames analysed", dihedrals.len())),
        })
    }
}
