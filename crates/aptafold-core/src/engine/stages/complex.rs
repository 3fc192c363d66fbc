use super::{StageAdapter, StageDiagnostics, StageOutput};
use crate::core::io::structure::combine_structures;
use crate::core::models::sequence::PeptideSequence;
use crate::engine::artifacts::{self, ArtifactLabel, COMPLEX_INPUT, PEPTIDE_STRUCTURE};
use crate::engine::context::RunContext;
use crate::engine::error::PipelineError;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, instrument};

/// An external builder producing a peptide structure from its sequence.
pub trait PeptideBuilder {
    fn name(&self) -> &str;

    fn build(
        &self,
        peptide: &PeptideSequence,
        output: &Path,
        ctx: &RunContext,
    ) -> Result<(), PipelineError>;
}

#[derive(Debug, Clone)]
pub struct ComplexInput {
    pub peptide: PeptideSequence,
    /// The aptamer conformation the peptide is placed next to.
    pub aptamer_structure: PathBuf,
    pub peptide_structure: PathBuf,
    pub combined: PathBuf,
}

impl ComplexInput {
    pub fn in_run(peptide: PeptideSequence, ctx: &RunContext) -> Self {
        Self {
            peptide,
            aptamer_structure: ctx.path(ArtifactLabel::Aptamer.representative_structure()),
            peptide_structure: ctx.path(PEPTIDE_STRUCTURE),
            combined: ctx.path(COMPLEX_INPUT),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexStructure {
    pub path: PathBuf,
    pub peptide_structure: PathBuf,
}

/// Builds the peptide and concatenates it with the representative aptamer conformation.
pub struct ComplexAssembler<'a> {
    builder: &'a dyn PeptideBuilder,
}

impl<'a> ComplexAssembler<'a> {
    pub fn new(builder: &'a dyn PeptideBuilder) -> Self {
        Self { builder }
    }
}

impl StageAdapter for ComplexAssembler<'_> {
    type Input = ComplexInput;
    type Output = ComplexStructure;

    fn name(&self) -> &'static str {
        "complex-assembly"
    }

    #[instrument(skip_all, name = "complex_assembly_stage")]
    fn execute(
        &self,
        input: &Self::Input,
        ctx: &RunContext,
    ) -> Result<StageOutput<Self::Output>, PipelineError> {
        let started = Instant::now();
        let aptamer = artifacts::require(
            self.name(),
            "representative aptamer structure",
            input.aptamer_structure.clone(),
        )?;

        info!(peptide = %input.peptide, builder = self.builder.name(), "Building peptide.");
        self.builder.build(&input.peptide, &input.peptide_structure, ctx)?;
        if !input.peptide_structure.exists() {
            return Err(PipelineError::malformed_output(
                self.builder.name(),
                format!("peptide structure {:?} was not written", input.peptide_structure),
            ));
        }

        combine_structures(&aptamer, &input.peptide_structure, &input.combined)
            .map_err(|e| PipelineError::io(&input.combined, e))?;

        Ok(StageOutput {
            artifacts: ComplexStructure {
                path: input.combined.clone(),
                peptide_structure: input.peptide_structure.clone(),
            },
            diagnostics: StageDiagnostics::new(self.name(), started.elapsed())
                .with_note(format!("{} residue peptide", input.peptide.len())),
        })
    }
}
