use crate::core::models::secondary::SecondaryStructure;
use crate::core::models::sequence::{DnaSequence, PeptideSequence};
use crate::engine::analysis::{
    AnalysisRequest, AnalysisResult, StructureComparator, TrajectoryAnalyzer, TrajectoryBackend,
    TrajectoryPair,
};
use crate::engine::artifacts::{self, ArtifactLabel, FOLDED_STRUCTURE, SECONDARY_STRUCTURE};
use crate::engine::checkpoint::{CheckpointLog, CheckpointState, StageId};
use crate::engine::config::PipelineConfig;
use crate::engine::context::RunContext;
use crate::engine::error::PipelineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::run::{self as runs, RunHandle};
use crate::engine::stages::complex::{ComplexAssembler, ComplexInput, PeptideBuilder};
use crate::engine::stages::folding::{FoldingInput, FoldingRunner, FoldingStage};
use crate::engine::stages::sampling::{MdEngine, MdSamplingStage, SamplingInput};
use crate::engine::stages::secondary::{
    FoldingOracle, SecondaryStructureInput, SecondaryStructureStage,
};
use crate::engine::stages::{StageAdapter, StageDiagnostics};
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument};

#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub sequence: DnaSequence,
    pub peptide: Option<PeptideSequence>,
    pub config: PipelineConfig,
}

/// The external engines a run is wired to.
#[derive(Clone, Copy)]
pub struct PipelineStages<'a> {
    pub oracle: &'a dyn FoldingOracle,
    pub folding: &'a dyn FoldingRunner,
    pub md: &'a dyn MdEngine,
    pub trajectory: &'a dyn TrajectoryBackend,
    pub peptide_builder: &'a dyn PeptideBuilder,
    pub comparator: &'a dyn StructureComparator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
    pub run_number: u32,
    pub work_dir: PathBuf,
    pub aptamer: AnalysisResult,
    /// Present only when a peptide was processed.
    pub complex: Option<AnalysisResult>,
    /// Stages executed by this invocation, in order; skipped stages are not listed.
    pub executed: Vec<StageId>,
}

/// Drives the run from its current checkpoint to completion.
///
/// Stages whose completion marker is present are skipped and their persisted artifacts are
/// reloaded instead. A failing stage is recorded in the run record and halts the run without
/// touching the checkpoint.
#[instrument(skip_all, name = "pipeline_workflow", fields(run = handle.context().run_number))]
pub fn run(
    handle: &RunHandle,
    request: &PipelineRequest,
    stages: &PipelineStages,
    reporter: &ProgressReporter,
) -> Result<PipelineResult, PipelineError> {
    let mut controller = Controller {
        handle,
        request,
        stages,
        reporter,
        current: None,
        executed: Vec::new(),
    };
    let outcome = controller.execute();

    if let Err(e) = &outcome {
        let location = controller.current.map_or("run setup", StageId::name);
        error!("{} failed: {}", location, e);
        handle
            .record()
            .note(&format!("ERROR during {location}: {e}"));
    }
    outcome
}

/// How far a run directory has progressed.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStatus {
    pub run_number: u32,
    pub work_dir: PathBuf,
    /// `None` until the run has written its first marker.
    pub checkpoint: Option<CheckpointState>,
    pub aptamer: Option<AnalysisResult>,
    pub complex: Option<AnalysisResult>,
}

/// Reports the checkpoint and persisted results of an existing run without modifying it.
pub fn inspect(work_root: &Path, run_number: u32) -> Result<RunStatus, PipelineError> {
    let work_dir = runs::run_directory(work_root, run_number);
    if !work_dir.is_dir() {
        return Err(PipelineError::Configuration(format!(
            "Run {} does not exist: {:?} is not a directory",
            run_number, work_dir
        )));
    }
    let ctx = RunContext::new(run_number, work_dir, None);
    let checkpoint = CheckpointLog::new(&ctx).peek()?;
    let count = checkpoint.as_ref().map_or(0, |state| state.count);

    let load = |stage: StageId, label: ArtifactLabel| {
        if stage.is_complete(count) {
            AnalysisResult::load(label, &ctx).map(Some)
        } else {
            Ok(None)
        }
    };
    let aptamer = load(StageId::AptamerSampling, ArtifactLabel::Aptamer)?;
    let complex = load(StageId::ComplexSampling, ArtifactLabel::Complex)?;

    Ok(RunStatus {
        run_number,
        work_dir: ctx.work_dir.clone(),
        checkpoint,
        aptamer,
        complex,
    })
}

struct Controller<'a> {
    handle: &'a RunHandle,
    request: &'a PipelineRequest,
    stages: &'a PipelineStages<'a>,
    reporter: &'a ProgressReporter<'a>,
    current: Option<StageId>,
    executed: Vec<StageId>,
}

impl Controller<'_> {
    fn execute(&mut self) -> Result<PipelineResult, PipelineError> {
        let (handle, request) = (self.handle, self.request);
        let ctx = handle.context();
        let state = handle.read_checkpoint()?;
        info!(
            count = state.count,
            label = state.label,
            "Starting pipeline from checkpoint."
        );
        let count = state.count;

        // === Stage 1: Secondary structure prediction ===
        let structure = if StageId::SecondaryStructure.is_complete(count) {
            self.skip(StageId::SecondaryStructure);
            let path = artifacts::require(
                StageId::SecondaryStructure.name(),
                "secondary structure",
                ctx.path(SECONDARY_STRUCTURE),
            )?;
            artifacts::read_toml::<SecondaryStructure>(&path)?
        } else {
            self.begin(StageId::SecondaryStructure)?;
            let input = SecondaryStructureInput::in_run(
                request.sequence.clone(),
                request.config.conditions.clone(),
                ctx,
            );
            let output = SecondaryStructureStage::new(self.stages.oracle).execute(&input, ctx)?;
            self.complete(StageId::SecondaryStructure, &[&output.diagnostics])?;
            output.artifacts.structure
        };

        // === Stage 2: Coarse folding ===
        if StageId::Folding.is_complete(count) {
            self.skip(StageId::Folding);
        } else {
            self.begin(StageId::Folding)?;
            let input =
                FoldingInput::in_run(request.sequence.clone(), structure.clone(), ctx);
            let output = FoldingStage::new(self.stages.folding).execute(&input, ctx)?;
            self.complete(StageId::Folding, &[&output.diagnostics])?;
        }

        // === Stage 3: Free aptamer sampling and analysis ===
        let aptamer = if StageId::AptamerSampling.is_complete(count) {
            self.skip(StageId::AptamerSampling);
            AnalysisResult::load(ArtifactLabel::Aptamer, ctx)?
        } else {
            self.begin(StageId::AptamerSampling)?;
            let sampling = SamplingInput {
                structure: ctx.path(FOLDED_STRUCTURE),
                label: ArtifactLabel::Aptamer,
                correct_atom_names: true,
            };
            self.sample_and_analyze(StageId::AptamerSampling, &sampling, None, &structure)?
        };

        // === Stage 4: Complex sampling and analysis ===
        let complex = match &request.peptide {
            None => {
                info!("No peptide supplied; complex sampling is not part of this run.");
                None
            }
            Some(_) if StageId::ComplexSampling.is_complete(count) => {
                self.skip(StageId::ComplexSampling);
                Some(AnalysisResult::load(ArtifactLabel::Complex, ctx)?)
            }
            Some(peptide) => {
                self.begin(StageId::ComplexSampling)?;
                let assembled = ComplexAssembler::new(self.stages.peptide_builder)
                    .execute(&ComplexInput::in_run(peptide.clone(), ctx), ctx)?;
                let sampling = SamplingInput {
                    structure: assembled.artifacts.path.clone(),
                    label: ArtifactLabel::Complex,
                    correct_atom_names: false,
                };
                Some(self.sample_and_analyze(
                    StageId::ComplexSampling,
                    &sampling,
                    Some(peptide),
                    &structure,
                )?)
            }
        };

        self.current = None;
        info!(executed = self.executed.len(), "Pipeline complete.");
        Ok(PipelineResult {
            run_number: ctx.run_number,
            work_dir: ctx.work_dir.clone(),
            aptamer,
            complex,
            executed: std::mem::take(&mut self.executed),
        })
    }

    fn sample_and_analyze(
        &mut self,
        stage: StageId,
        sampling: &SamplingInput,
        peptide: Option<&PeptideSequence>,
        predicted: &SecondaryStructure,
    ) -> Result<AnalysisResult, PipelineError> {
        let (handle, request) = (self.handle, self.request);
        let ctx = handle.context();
        let config: &PipelineConfig = &request.config;

        let sampled = MdSamplingStage::new(self.stages.md, config).execute(sampling, ctx)?;
        if let Some(ns_per_day) = sampled.artifacts.throughput_ns_per_day {
            self.reporter.report(Progress::Message(format!(
                "{} simulation speed {:.1} ns/day",
                sampled.artifacts.label, ns_per_day
            )));
        }

        let analyzer = TrajectoryAnalyzer::new(
            self.stages.trajectory,
            self.stages.comparator,
            config.analysis.principal_components,
        );
        let analysis = analyzer.execute(
            &AnalysisRequest {
                label: sampled.artifacts.label,
                sampled: TrajectoryPair {
                    structure: sampled.artifacts.structure.clone(),
                    trajectory: sampled.artifacts.trajectory.clone(),
                },
                sequence: request.sequence.clone(),
                peptide: peptide.cloned(),
                predicted: Some(predicted.clone()),
            },
            ctx,
        )?;

        self.complete(stage, &[&sampled.diagnostics, &analysis.diagnostics])?;
        Ok(analysis.artifacts)
    }

    fn skip(&self, stage: StageId) {
        info!("Skipping {}: already complete.", stage.name());
        self.handle.record().note(&format!(
            "Skipped {} (checkpoint '{}')",
            stage.name(),
            stage.marker()
        ));
        self.reporter
            .report(Progress::StageSkipped { name: stage.name() });
    }

    fn begin(&mut self, stage: StageId) -> Result<(), PipelineError> {
        self.current = Some(stage);
        info!("Running {}.", stage.name());
        self.reporter
            .report(Progress::PhaseStart { name: stage.name() });
        self.handle
            .record()
            .append(&format!("Started {}", stage.name()))
    }

    /// Records the stage's diagnostics and durably marks it complete.
    fn complete(
        &mut self,
        stage: StageId,
        diagnostics: &[&StageDiagnostics],
    ) -> Result<(), PipelineError> {
        for report in diagnostics {
            let mut line = format!(
                "{} ({}) finished in {:.1} s",
                stage.name(),
                report.stage,
                report.elapsed.as_secs_f64()
            );
            if let Some(ns_per_day) = report.throughput_ns_per_day {
                line.push_str(&format!(", {ns_per_day:.1} ns/day"));
            }
            for note in &report.notes {
                line.push_str(&format!("; {note}"));
            }
            self.handle.record().append(&line)?;
        }
        self.handle.advance_checkpoint(stage.marker())?;
        self.executed.push(stage);
        self.reporter.report(Progress::PhaseFinish);
        Ok(())
    }
}
