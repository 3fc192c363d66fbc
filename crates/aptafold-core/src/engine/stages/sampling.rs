use super::{StageAdapter, StageDiagnostics, StageOutput};
use crate::core::io::structure::correct_engine_atom_names;
use crate::engine::artifacts::{self, ArtifactLabel, ENGINE_LOG, ENGINE_TRAJECTORY};
use crate::engine::config::{
    Constraints, NonbondedMethod, PipelineConfig, Platform, Precision,
};
use crate::engine::context::RunContext;
use crate::engine::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, instrument, warn};

pub const POSITIVE_ION: &str = "Na+";
pub const NEGATIVE_ION: &str = "Cl-";
const SECONDS_PER_DAY: f64 = 86_400.0;

/// One step of an MD run, executed in order by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "kebab-case")]
pub enum SimulationPhase {
    Minimize,
    Equilibrate { steps: u64 },
    /// Reload positions, velocities and the step counter from an engine state file.
    RestoreState { path: PathBuf },
    /// Production sampling up to `steps` total production steps, with trajectory reporting.
    Produce { steps: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationPlan {
    pub phases: Vec<SimulationPhase>,
}

impl SimulationPlan {
    pub fn fresh(equilibration_steps: u64, production_steps: u64) -> Self {
        Self {
            phases: vec![
                SimulationPhase::Minimize,
                SimulationPhase::Equilibrate {
                    steps: equilibration_steps,
                },
                SimulationPhase::Produce {
                    steps: production_steps,
                },
            ],
        }
    }

    pub fn resume(state: PathBuf, production_steps: u64) -> Self {
        Self {
            phases: vec![
                SimulationPhase::RestoreState { path: state },
                SimulationPhase::Produce {
                    steps: production_steps,
                },
            ],
        }
    }

    pub fn resumes_from_state(&self) -> bool {
        self.phases
            .iter()
            .any(|phase| matches!(phase, SimulationPhase::RestoreState { .. }))
    }

    pub fn runs_minimization(&self) -> bool {
        self.phases.contains(&SimulationPhase::Minimize)
    }
}

/// The physical and numeric settings handed to the MD engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SimulationSettings {
    pub force_fields: Vec<String>,
    pub implicit_solvent: bool,
    pub temperature_kelvin: f64,
    pub friction_per_ps: f64,
    pub time_step_fs: f64,
    pub nonbonded_method: NonbondedMethod,
    pub nonbonded_cutoff_nm: f64,
    pub ewald_error_tolerance: f64,
    pub constraints: Constraints,
    pub rigid_water: bool,
    pub constraint_tolerance: f64,
    pub hydrogen_mass_amu: f64,
    pub platform: Platform,
    pub precision: Precision,
    pub report_interval: u64,
    pub state_interval: u64,
}

impl SimulationSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        let solvent = config.solvation.solvent;
        Self {
            force_fields: solvent.force_field_files(),
            implicit_solvent: solvent.is_implicit(),
            temperature_kelvin: config.conditions.temperature_kelvin,
            friction_per_ps: config.integration.friction_per_ps,
            time_step_fs: config.integration.time_step_fs,
            nonbonded_method: config.system.nonbonded_method,
            nonbonded_cutoff_nm: config.system.nonbonded_cutoff_nm,
            ewald_error_tolerance: config.system.ewald_error_tolerance,
            constraints: config.system.constraints,
            rigid_water: config.system.rigid_water,
            constraint_tolerance: config.system.constraint_tolerance,
            hydrogen_mass_amu: config.system.hydrogen_mass_amu,
            platform: config.platform.platform,
            precision: config.platform.precision,
            report_interval: config.integration.report_interval(),
            state_interval: config.integration.state_interval_steps,
        }
    }
}

/// Protonation and solvation of a structure before explicit-solvent dynamics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PreparationRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub ph: f64,
    pub force_fields: Vec<String>,
    pub box_padding_nm: f64,
    pub ionic_strength_molar: f64,
    pub positive_ion: String,
    pub negative_ion: String,
}

/// Where the engine writes what it produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SimulationOutputs {
    pub trajectory: PathBuf,
    pub state: PathBuf,
    pub log: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SimulationJob {
    pub structure: PathBuf,
    pub plan: SimulationPlan,
    pub settings: SimulationSettings,
    pub outputs: SimulationOutputs,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SimulationReport {
    pub produced_steps: u64,
    pub wall_seconds: f64,
}

/// The external MD engine.
///
/// `simulate` must write the engine state to `outputs.state` periodically (every
/// `settings.state_interval` steps) and once more when production finishes.
pub trait MdEngine {
    fn name(&self) -> &str;

    fn prepare(&self, request: &PreparationRequest, ctx: &RunContext) -> Result<(), PipelineError>;

    fn simulate(&self, job: &SimulationJob, ctx: &RunContext)
    -> Result<SimulationReport, PipelineError>;
}

/// Durable evidence that production sampling for one label has finished.
///
/// A sampling stage re-entered after a later failure (for example in the analysis) publishes
/// the recorded outputs again instead of asking the engine for more dynamics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SamplingRecord {
    /// The structure the dynamics ran on.
    pub structure: PathBuf,
    pub production_steps: u64,
    pub report: SimulationReport,
}

#[derive(Debug, Clone)]
pub struct SamplingInput {
    pub structure: PathBuf,
    pub label: ArtifactLabel,
    /// Structures straight from the folding engine need their atom names repaired.
    pub correct_atom_names: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SampledArtifacts {
    pub label: ArtifactLabel,
    pub structure: PathBuf,
    pub trajectory: PathBuf,
    pub throughput_ns_per_day: Option<f64>,
    pub resumed_from_state: bool,
}

pub struct MdSamplingStage<'a> {
    engine: &'a dyn MdEngine,
    config: &'a PipelineConfig,
}

impl<'a> MdSamplingStage<'a> {
    pub fn new(engine: &'a dyn MdEngine, config: &'a PipelineConfig) -> Self {
        Self { engine, config }
    }

    /// Returns the structure the dynamics start from, solvating it first under explicit solvent.
    fn prepared_structure(
        &self,
        structure: &Path,
        resuming: bool,
        ctx: &RunContext,
    ) -> Result<PathBuf, PipelineError> {
        if self.config.solvation.solvent.is_implicit() {
            return Ok(structure.to_path_buf());
        }

        let processed = ctx.path(processed_name(structure));
        if resuming && processed.exists() {
            info!("Reusing prepared structure {:?}.", processed);
            return Ok(processed);
        }

        let request = PreparationRequest {
            input: structure.to_path_buf(),
            output: processed.clone(),
            ph: self.config.conditions.ph,
            force_fields: self.config.solvation.solvent.force_field_files(),
            box_padding_nm: self.config.solvation.box_padding_nm,
            ionic_strength_molar: self.config.conditions.ionic_strength_molar,
            positive_ion: POSITIVE_ION.to_string(),
            negative_ion: NEGATIVE_ION.to_string(),
        };
        info!(
            padding_nm = request.box_padding_nm,
            ionic_strength = request.ionic_strength_molar,
            "Solvating structure."
        );
        self.engine.prepare(&request, ctx)?;

        if !processed.exists() {
            return Err(PipelineError::malformed_output(
                self.engine.name(),
                format!("prepared structure {:?} was not written", processed),
            ));
        }
        Ok(processed)
    }

    fn throughput(&self, report: &SimulationReport) -> Option<f64> {
        if report.wall_seconds > 0.0 {
            let simulated = self.config.integration.simulated_ns(report.produced_steps);
            Some(simulated / (report.wall_seconds / SECONDS_PER_DAY))
        } else {
            None
        }
    }

    /// Moves the engine outputs of a finished production run to their stage-specific names.
    fn publish(
        &self,
        label: ArtifactLabel,
        record: &SamplingRecord,
        resumed_from_state: bool,
        mut diagnostics: StageDiagnostics,
        ctx: &RunContext,
    ) -> Result<StageOutput<SampledArtifacts>, PipelineError> {
        let engine_trajectory = ctx.path(ENGINE_TRAJECTORY);
        let trajectory = ctx.path(label.trajectory());
        if engine_trajectory.exists() {
            artifacts::relabel(&engine_trajectory, &trajectory)?;
        }
        let trajectory = artifacts::require(self.name(), "sampled trajectory", trajectory)?;

        let final_structure = ctx.path(label.structure());
        if record.structure != final_structure && record.structure.exists() {
            artifacts::copy(&record.structure, &final_structure)?;
        }
        let final_structure =
            artifacts::require(self.name(), "sampled structure", final_structure)?;

        let throughput = self.throughput(&record.report);
        match throughput {
            Some(ns_per_day) => {
                info!(label = %label, ns_per_day, "Sampling finished.");
                diagnostics = diagnostics.with_throughput(ns_per_day);
            }
            None => warn!("Engine reported no wall time; throughput unknown."),
        }

        Ok(StageOutput {
            artifacts: SampledArtifacts {
                label,
                structure: final_structure,
                trajectory,
                throughput_ns_per_day: throughput,
                resumed_from_state,
            },
            diagnostics,
        })
    }
}

fn processed_name(structure: &Path) -> String {
    let stem = structure
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "structure".to_string());
    format!("{stem}_processed.pdb")
}

impl StageAdapter for MdSamplingStage<'_> {
    type Input = SamplingInput;
    type Output = SampledArtifacts;

    fn name(&self) -> &'static str {
        "md-sampling"
    }

    #[instrument(skip_all, name = "md_sampling_stage", fields(label = %input.label))]
    fn execute(
        &self,
        input: &Self::Input,
        ctx: &RunContext,
    ) -> Result<StageOutput<Self::Output>, PipelineError> {
        let started = Instant::now();
        let record_path = ctx.path(input.label.sampling_record());
        if record_path.exists() {
            let record: SamplingRecord = artifacts::read_toml(&record_path)?;
            info!(
                label = %input.label,
                steps = record.production_steps,
                "Production already finished; reusing its trajectory."
            );
            if record.production_steps != self.config.integration.production_steps() {
                warn!(
                    recorded = record.production_steps,
                    configured = self.config.integration.production_steps(),
                    "Configured sampling length differs from the finished production run."
                );
            }
            let diagnostics = StageDiagnostics::new(self.name(), started.elapsed())
                .with_note("reused finished production");
            return self.publish(input.label, &record, false, diagnostics, ctx);
        }

        let structure =
            artifacts::require(self.name(), "input structure", input.structure.clone())?;
        if input.correct_atom_names {
            correct_engine_atom_names(&structure).map_err(|e| PipelineError::io(&structure, e))?;
        }

        let state = ctx.path(input.label.engine_state());
        let resuming = state.exists();
        let md_input = self.prepared_structure(&structure, resuming, ctx)?;

        let integration = &self.config.integration;
        let plan = if resuming {
            info!("Engine state {:?} found; resuming production sampling.", state);
            SimulationPlan::resume(state.clone(), integration.production_steps())
        } else {
            SimulationPlan::fresh(
                integration.equilibration_steps(),
                integration.production_steps(),
            )
        };

        let job = SimulationJob {
            structure: md_input.clone(),
            plan,
            settings: SimulationSettings::from_config(self.config),
            outputs: SimulationOutputs {
                trajectory: ctx.path(ENGINE_TRAJECTORY),
                state,
                log: ctx.path(ENGINE_LOG),
            },
        };
        let report = self.engine.simulate(&job, ctx)?;
        if !job.outputs.trajectory.exists() {
            return Err(PipelineError::malformed_output(
                self.engine.name(),
                format!("trajectory {:?} was not written", job.outputs.trajectory),
            ));
        }

        // Recorded before relabelling so an interruption in between is recoverable.
        let record = SamplingRecord {
            structure: md_input,
            production_steps: integration.production_steps(),
            report,
        };
        artifacts::write_toml(&record_path, &record)?;

        let resumed = job.plan.resumes_from_state();
        let mut diagnostics = StageDiagnostics::new(self.name(), started.elapsed());
        if resumed {
            diagnostics = diagnostics.with_note("resumed from engine state");
        }
        self.publish(input.label, &record, resumed, diagnostics, ctx)
    }
}
