#![allow(dead_code)]

use aptafold::core::models::secondary::SecondaryStructure;
use aptafold::core::models::sequence::{DnaSequence, PeptideSequence};
use aptafold::engine::analysis::{
    BindingSummary, PartnerMismatch, ResidueContact, TrajectoryBackend, TrajectoryPair,
};
use aptafold::engine::artifacts::ENGINE_FRAME;
use aptafold::engine::config::{
    ConditionsConfig, Constraints, NonbondedMethod, PipelineConfig, PipelineConfigBuilder,
    Platform, Precision, SecondaryStructureEngine, Solvent, WaterModel,
};
use aptafold::engine::context::RunContext;
use aptafold::engine::error::PipelineError;
use aptafold::engine::run::{RunManager, RunTemplates};
use aptafold::engine::stages::complex::PeptideBuilder;
use aptafold::engine::stages::folding::{FoldingRunner, PAIR_ANCHOR};
use aptafold::engine::stages::sampling::{
    MdEngine, PreparationRequest, SimulationJob, SimulationPhase, SimulationReport,
};
use aptafold::engine::stages::secondary::FoldingOracle;
use aptafold::workflows::pipeline::{PipelineRequest, PipelineStages};
use std::cell::{Cell, RefCell};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub fn config() -> PipelineConfig {
    PipelineConfigBuilder::new()
        .secondary_structure_engine(SecondaryStructureEngine::Seqfold)
        .temperature_kelvin(298.0)
        .ionic_strength_molar(0.1)
        .ph(7.4)
        .solvent(Solvent::Explicit(WaterModel::Tip3p))
        .box_padding_nm(1.0)
        .nonbonded_method(NonbondedMethod::Pme)
        .nonbonded_cutoff_nm(1.0)
        .ewald_error_tolerance(5e-4)
        .constraints(Constraints::HBonds)
        .rigid_water(true)
        .constraint_tolerance(1e-6)
        .hydrogen_mass_amu(1.5)
        .time_step_fs(2.0)
        .friction_per_ps(1.0)
        .equilibration_ns(0.01)
        .sampling_ns(0.1)
        .print_step_ps(1.0)
        .platform(Platform::Cpu)
        .precision(Precision::Single)
        .build()
        .unwrap()
}

pub fn request(sequence: &str, peptide: &str) -> PipelineRequest {
    PipelineRequest {
        sequence: sequence.parse().unwrap(),
        peptide: PeptideSequence::parse_optional(peptide).unwrap(),
        config: config(),
    }
}

pub fn manager(dir: &TempDir) -> RunManager {
    let templates = dir.path().join("templates");
    fs::create_dir_all(&templates).unwrap();
    let template = templates.join("commands.template.dat");
    fs::write(
        &template,
        format!("RNA A 1 SEQUENCE\n{PAIR_ANCHOR}\nnumReportingIntervals 5\n"),
    )
    .unwrap();
    let parameters = templates.join("parameters.csv");
    fs::write(&parameters, "name,value\n").unwrap();

    RunManager::new(
        dir.path().join("runs"),
        RunTemplates {
            command_template: template,
            engine_parameters: Some(parameters),
            analyte_structure: None,
        },
        None,
    )
}

/// In-process stand-ins for every external engine, counting their invocations.
#[derive(Default)]
pub struct FakeEngines {
    pub oracle_calls: Cell<usize>,
    pub fold_calls: Cell<usize>,
    pub simulations: RefCell<Vec<SimulationJob>>,
    pub peptide_builds: Cell<usize>,
    pub fail_simulation: Cell<bool>,
    /// Makes the next `strip_solvent` call fail, once.
    pub fail_next_strip: Cell<bool>,
    pub comparator: PartnerMismatch,
}

impl FakeEngines {
    pub fn stages(&self) -> PipelineStages<'_> {
        PipelineStages {
            oracle: self,
            folding: self,
            md: self,
            trajectory: self,
            peptide_builder: self,
            comparator: &self.comparator,
        }
    }
}

impl FoldingOracle for FakeEngines {
    fn name(&self) -> &str {
        "fake-oracle"
    }

    fn predict(
        &self,
        sequence: &DnaSequence,
        _conditions: &ConditionsConfig,
    ) -> Result<SecondaryStructure, PipelineError> {
        self.oracle_calls.set(self.oracle_calls.get() + 1);
        Ok(SecondaryStructure::from_pairs(sequence.len(), [(1, sequence.len())])?)
    }
}

impl FoldingRunner for FakeEngines {
    fn name(&self) -> &str {
        "fake-folder"
    }

    fn run(&self, script: &Path, ctx: &RunContext) -> Result<(), PipelineError> {
        assert!(fs::read_to_string(script).unwrap().contains("baseInteraction A 1"));
        self.fold_calls.set(self.fold_calls.get() + 1);
        fs::write(ctx.path(ENGINE_FRAME), "ATOM      1  C1* DA  A   1\n").unwrap();
        Ok(())
    }
}

impl MdEngine for FakeEngines {
    fn name(&self) -> &str {
        "fake-md"
    }

    fn prepare(
        &self,
        request: &PreparationRequest,
        _ctx: &RunContext,
    ) -> Result<(), PipelineError> {
        fs::copy(&request.input, &request.output).unwrap();
        Ok(())
    }

    fn simulate(
        &self,
        job: &SimulationJob,
        _ctx: &RunContext,
    ) -> Result<SimulationReport, PipelineError> {
        if self.fail_simulation.get() {
            return Err(PipelineError::engine_failure(
                "fake-md",
                "exit status: 1",
                "NaN detected in coordinates",
            ));
        }
        // Like a real engine, production continues from the step counter stored in the state
        // file and only the remaining frames are written.
        let target = job
            .plan
            .phases
            .iter()
            .find_map(|phase| match phase {
                SimulationPhase::Produce { steps } => Some(*steps),
                _ => None,
            })
            .unwrap_or(0);
        let done = job
            .plan
            .phases
            .iter()
            .find_map(|phase| match phase {
                SimulationPhase::RestoreState { path } => fs::read_to_string(path).ok(),
                _ => None,
            })
            .and_then(|state| state.strip_prefix("STEPS ")?.trim().parse::<u64>().ok())
            .unwrap_or(0);

        self.simulations.borrow_mut().push(job.clone());
        let remaining = target.saturating_sub(done);
        if remaining > 0 {
            fs::write(&job.outputs.trajectory, format!("FRAMES {remaining}")).unwrap();
        }
        fs::write(&job.outputs.state, format!("STEPS {}", done.max(target))).unwrap();
        Ok(SimulationReport {
            produced_steps: remaining,
            wall_seconds: 60.0,
        })
    }
}

impl TrajectoryBackend for FakeEngines {
    fn name(&self) -> &str {
        "fake-trajectory"
    }

    fn strip_solvent(
        &self,
        input: &TrajectoryPair,
        output: &TrajectoryPair,
        _ctx: &RunContext,
    ) -> Result<(), PipelineError> {
        if self.fail_next_strip.replace(false) {
            return Err(PipelineError::engine_failure(
                "fake-trajectory",
                "exit status: 1",
                "segment SOL not found",
            ));
        }
        fs::copy(&input.structure, &output.structure).unwrap();
        fs::copy(&input.trajectory, &output.trajectory).unwrap();
        Ok(())
    }

    fn pairing_trajectory(
        &self,
        _pair: &TrajectoryPair,
        _ctx: &RunContext,
    ) -> Result<Vec<Vec<usize>>, PipelineError> {
        Ok(vec![vec![8, 0, 0, 0, 0, 0, 0, 1]; 3])
    }

    fn dihedral_trajectory(
        &self,
        _pair: &TrajectoryPair,
        _ctx: &RunContext,
    ) -> Result<Vec<Vec<f64>>, PipelineError> {
        Ok(vec![
            vec![0.3, -1.2],
            vec![0.1, -1.0],
            vec![-0.2, -0.9],
        ])
    }

    fn binding_contacts(
        &self,
        _pair: &TrajectoryPair,
        _sequence: &DnaSequence,
        _peptide: &PeptideSequence,
        _ctx: &RunContext,
    ) -> Result<BindingSummary, PipelineError> {
        Ok(BindingSummary {
            contacts: vec![ResidueContact {
                base_index: 4,
                peptide_residue: 2,
                occupancy: 0.66,
            }],
            bound_fraction: 0.9,
        })
    }

    fn extract_frame(
        &self,
        _pair: &TrajectoryPair,
        frame: usize,
        output: &Path,
        _ctx: &RunContext,
    ) -> Result<(), PipelineError> {
        let text = format!("REMARK frame {frame}\nATOM      1  P   DA  A   1\nEND\n");
        fs::write(output, text).unwrap();
        Ok(())
    }
}

impl PeptideBuilder for FakeEngines {
    fn name(&self) -> &str {
        "fake-peptide"
    }

    fn build(
        &self,
        _peptide: &PeptideSequence,
        output: &Path,
        _ctx: &RunContext,
    ) -> Result<(), PipelineError> {
        self.peptide_builds.set(self.peptide_builds.get() + 1);
        fs::write(output, "ATOM      1  CA  TYR B   1\nEND\n").unwrap();
        Ok(())
    }
}
