use aptafold::engine::config::{
    Constraints, DEFAULT_PRINCIPAL_COMPONENTS, DEFAULT_STATE_INTERVAL_STEPS, NonbondedMethod,
    Platform, Precision, SecondaryStructureEngine, Solvent, WaterModel,
};

pub struct DefaultsConfig {
    pub secondary_structure_engine: SecondaryStructureEngine,
    pub temperature: f64,
    pub ionic_strength: f64,
    pub ph: f64,
    pub water_model: Solvent,
    pub box_padding_nm: f64,
    pub nonbonded_method: NonbondedMethod,
    pub nonbonded_cutoff_nm: f64,
    pub ewald_error_tolerance: f64,
    pub constraints: Constraints,
    pub rigid_water: bool,
    pub constraint_tolerance: f64,
    pub hydrogen_mass_amu: f64,
    pub time_step_fs: f64,
    pub friction_per_ps: f64,
    pub equilibration_ns: f64,
    pub sampling_ns: f64,
    pub print_step_ps: f64,
    pub state_interval_steps: u64,
    pub platform: Platform,
    pub precision: Precision,
    pub principal_components: usize,
    pub work_root: &'static str,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            secondary_structure_engine: SecondaryStructureEngine::Seqfold,
            temperature: 298.0,
            ionic_strength: 0.163,
            ph: 7.4,
            water_model: Solvent::Explicit(WaterModel::Tip3p),
            box_padding_nm: 1.0,
            nonbonded_method: NonbondedMethod::Pme,
            nonbonded_cutoff_nm: 1.0,
            ewald_error_tolerance: 5e-4,
            constraints: Constraints::HBonds,
            rigid_water: true,
            constraint_tolerance: 1e-6,
            hydrogen_mass_amu: 1.5,
            time_step_fs: 2.0,
            friction_per_ps: 1.0,
            equilibration_ns: 0.1,
            sampling_ns: 1.0,
            print_step_ps: 10.0,
            state_interval_steps: DEFAULT_STATE_INTERVAL_STEPS,
            platform: Platform::Cpu,
            precision: Precision::Single,
            principal_components: DEFAULT_PRINCIPAL_COMPONENTS,
            work_root: "runs",
        }
    }
}
