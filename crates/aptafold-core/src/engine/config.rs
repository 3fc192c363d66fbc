use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecondaryStructureEngine {
    Seqfold,
    Nupack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaterModel {
    Tip3p,
    Tip3pfb,
    Spce,
    Tip4pew,
    Tip4pfb,
    Tip5p,
}

impl WaterModel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tip3p => "tip3p",
            Self::Tip3pfb => "tip3pfb",
            Self::Spce => "spce",
            Self::Tip4pew => "tip4pew",
            Self::Tip4pfb => "tip4pfb",
            Self::Tip5p => "tip5p",
        }
    }
}

impl FromStr for WaterModel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tip3p" => Ok(Self::Tip3p),
            "tip3pfb" => Ok(Self::Tip3pfb),
            "spce" => Ok(Self::Spce),
            "tip4pew" => Ok(Self::Tip4pew),
            "tip4pfb" => Ok(Self::Tip4pfb),
            "tip5p" => Ok(Self::Tip5p),
            other => Err(ConfigError::InvalidValue {
                parameter: "water_model",
                reason: format!("unknown water model '{other}'"),
            }),
        }
    }
}

/// Solvent treatment, resolved once from the configured water-model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Solvent {
    Implicit,
    Explicit(WaterModel),
}

impl Solvent {
    pub fn is_implicit(self) -> bool {
        matches!(self, Self::Implicit)
    }

    /// Force-field parameter files the MD engine loads for this solvent treatment.
    pub fn force_field_files(self) -> Vec<String> {
        match self {
            Self::Implicit => vec!["amber10.xml".to_string(), "amber10_obc.xml".to_string()],
            Self::Explicit(model) => vec![
                "amber14-all.xml".to_string(),
                format!("amber14/{}.xml", model.as_str()),
            ],
        }
    }
}

impl FromStr for Solvent {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("implicit") {
            Ok(Self::Implicit)
        } else {
            s.parse().map(Self::Explicit)
        }
    }
}

impl fmt::Display for Solvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Implicit => f.write_str("implicit"),
            Self::Explicit(model) => f.write_str(model.as_str()),
        }
    }
}

impl TryFrom<String> for Solvent {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Solvent> for String {
    fn from(solvent: Solvent) -> Self {
        solvent.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NonbondedMethod {
    NoCutoff,
    CutoffNonPeriodic,
    CutoffPeriodic,
    Ewald,
    Pme,
}

impl NonbondedMethod {
    pub fn is_periodic(self) -> bool {
        matches!(self, Self::CutoffPeriodic | Self::Ewald | Self::Pme)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Constraints {
    None,
    HBonds,
    AllBonds,
    HAngles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Cpu,
    Cuda,
    OpenCl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Single,
    Mixed,
    Double,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionsConfig {
    pub temperature_kelvin: f64,
    pub ionic_strength_molar: f64,
    pub ph: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolvationConfig {
    pub solvent: Solvent,
    pub box_padding_nm: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemConfig {
    pub nonbonded_method: NonbondedMethod,
    pub nonbonded_cutoff_nm: f64,
    pub ewald_error_tolerance: f64,
    pub constraints: Constraints,
    pub rigid_water: bool,
    pub constraint_tolerance: f64,
    pub hydrogen_mass_amu: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationConfig {
    pub time_step_fs: f64,
    pub friction_per_ps: f64,
    pub equilibration_ns: f64,
    pub sampling_ns: f64,
    pub print_step_ps: f64,
    pub state_interval_steps: u64,
}

impl IntegrationConfig {
    pub fn production_steps(&self) -> u64 {
        steps_for(self.sampling_ns, self.time_step_fs)
    }

    pub fn equilibration_steps(&self) -> u64 {
        steps_for(self.equilibration_ns, self.time_step_fs)
    }

    /// Steps between trajectory frames; never zero.
    pub fn report_interval(&self) -> u64 {
        ((self.print_step_ps * 1000.0 / self.time_step_fs).floor() as u64).max(1)
    }

    /// Simulated nanoseconds covered by `steps` integrator steps.
    pub fn simulated_ns(&self, steps: u64) -> f64 {
        steps as f64 * self.time_step_fs * 1e-6
    }
}

fn steps_for(duration_ns: f64, time_step_fs: f64) -> u64 {
    (duration_ns * 1e6 / time_step_fs).floor() as u64
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlatformConfig {
    pub platform: Platform,
    pub precision: Precision,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub principal_components: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub secondary_structure_engine: SecondaryStructureEngine,
    pub conditions: ConditionsConfig,
    pub solvation: SolvationConfig,
    pub system: SystemConfig,
    pub integration: IntegrationConfig,
    pub platform: PlatformConfig,
    pub analysis: AnalysisConfig,
}

pub const DEFAULT_STATE_INTERVAL_STEPS: u64 = 10_000;
pub const DEFAULT_PRINCIPAL_COMPONENTS: usize = 2;

#[derive(Default)]
pub struct PipelineConfigBuilder {
    secondary_structure_engine: Option<SecondaryStructureEngine>,
    temperature_kelvin: Option<f64>,
    ionic_strength_molar: Option<f64>,
    ph: Option<f64>,
    solvent: Option<Solvent>,
    box_padding_nm: Option<f64>,
    nonbonded_method: Option<NonbondedMethod>,
    nonbonded_cutoff_nm: Option<f64>,
    ewald_error_tolerance: Option<f64>,
    constraints: Option<Constraints>,
    rigid_water: Option<bool>,
    constraint_tolerance: Option<f64>,
    hydrogen_mass_amu: Option<f64>,
    time_step_fs: Option<f64>,
    friction_per_ps: Option<f64>,
    equilibration_ns: Option<f64>,
    sampling_ns: Option<f64>,
    print_step_ps: Option<f64>,
    state_interval_steps: Option<u64>,
    platform: Option<Platform>,
    precision: Option<Precision>,
    principal_components: Option<usize>,
}

impl PipelineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn secondary_structure_engine(mut self, engine: SecondaryStructureEngine) -> Self {
        self.secondary_structure_engine = Some(engine);
        self
    }
    pub fn temperature_kelvin(mut self, value: f64) -> Self {
        self.temperature_kelvin = Some(value);
        self
    }
    pub fn ionic_strength_molar(mut self, value: f64) -> Self {
        self.ionic_strength_molar = Some(value);
        self
    }
    pub fn ph(mut self, value: f64) -> Self {
        self.ph = Some(value);
        self
    }
    pub fn solvent(mut self, solvent: Solvent) -> Self {
        self.solvent = Some(solvent);
        self
    }
    pub fn box_padding_nm(mut self, value: f64) -> Self {
        self.box_padding_nm = Some(value);
        self
    }
    pub fn nonbonded_method(mut self, method: NonbondedMethod) -> Self {
        self.nonbonded_method = Some(method);
        self
    }
    pub fn nonbonded_cutoff_nm(mut self, value: f64) -> Self {
        self.nonbonded_cutoff_nm = Some(value);
        self
    }
    pub fn ewald_error_tolerance(mut self, value: f64) -> Self {
        self.ewald_error_tolerance = Some(value);
        self
    }
    pub fn constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = Some(constraints);
        self
    }
    pub fn rigid_water(mut self, rigid: bool) -> Self {
        self.rigid_water = Some(rigid);
        self
    }
    pub fn constraint_tolerance(mut self, value: f64) -> Self {
        self.constraint_tolerance = Some(value);
        self
    }
    pub fn hydrogen_mass_amu(mut self, value: f64) -> Self {
        self.hydrogen_mass_amu = Some(value);
        self
    }
    pub fn time_step_fs(mut self, value: f64) -> Self {
        self.time_step_fs = Some(value);
        self
    }
    pub fn friction_per_ps(mut self, value: f64) -> Self {
        self.friction_per_ps = Some(value);
        self
    }
    pub fn equilibration_ns(mut self, value: f64) -> Self {
        self.equilibration_ns = Some(value);
        self
    }
    pub fn sampling_ns(mut self, value: f64) -> Self {
        self.sampling_ns = Some(value);
        self
    }
    pub fn print_step_ps(mut self, value: f64) -> Self {
        self.print_step_ps = Some(value);
        self
    }
    pub fn state_interval_steps(mut self, steps: u64) -> Self {
        self.state_interval_steps = Some(steps);
        self
    }
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }
    pub fn precision(mut self, precision: Precision) -> Self {
        self.precision = Some(precision);
        self
    }
    pub fn principal_components(mut self, n: usize) -> Self {
        self.principal_components = Some(n);
        self
    }

    pub fn build(self) -> Result<PipelineConfig, ConfigError> {
        let conditions = ConditionsConfig {
            temperature_kelvin: self
                .temperature_kelvin
                .ok_or(ConfigError::MissingParameter("temperature_kelvin"))?,
            ionic_strength_molar: self
                .ionic_strength_molar
                .ok_or(ConfigError::MissingParameter("ionic_strength_molar"))?,
            ph: self.ph.ok_or(ConfigError::MissingParameter("ph"))?,
        };
        let solvation = SolvationConfig {
            solvent: self.solvent.ok_or(ConfigError::MissingParameter("solvent"))?,
            box_padding_nm: self
                .box_padding_nm
                .ok_or(ConfigError::MissingParameter("box_padding_nm"))?,
        };
        let system = SystemConfig {
            nonbonded_method: self
                .nonbonded_method
                .ok_or(ConfigError::MissingParameter("nonbonded_method"))?,
            nonbonded_cutoff_nm: self
                .nonbonded_cutoff_nm
                .ok_or(ConfigError::MissingParameter("nonbonded_cutoff_nm"))?,
            ewald_error_tolerance: self
                .ewald_error_tolerance
                .ok_or(ConfigError::MissingParameter("ewald_error_tolerance"))?,
            constraints: self
                .constraints
                .ok_or(ConfigError::MissingParameter("constraints"))?,
            rigid_water: self
                .rigid_water
                .ok_or(ConfigError::MissingParameter("rigid_water"))?,
            constraint_tolerance: self
                .constraint_tolerance
                .ok_or(ConfigError::MissingParameter("constraint_tolerance"))?,
            hydrogen_mass_amu: self
                .hydrogen_mass_amu
                .ok_or(ConfigError::MissingParameter("hydrogen_mass_amu"))?,
        };
        let integration = IntegrationConfig {
            time_step_fs: self
                .time_step_fs
                .ok_or(ConfigError::MissingParameter("time_step_fs"))?,
            friction_per_ps: self
                .friction_per_ps
                .ok_or(ConfigError::MissingParameter("friction_per_ps"))?,
            equilibration_ns: self
                .equilibration_ns
                .ok_or(ConfigError::MissingParameter("equilibration_ns"))?,
            sampling_ns: self
                .sampling_ns
                .ok_or(ConfigError::MissingParameter("sampling_ns"))?,
            print_step_ps: self
                .print_step_ps
                .ok_or(ConfigError::MissingParameter("print_step_ps"))?,
            state_interval_steps: self
                .state_interval_steps
                .unwrap_or(DEFAULT_STATE_INTERVAL_STEPS),
        };
        let platform = PlatformConfig {
            platform: self
                .platform
                .ok_or(ConfigError::MissingParameter("platform"))?,
            precision: self
                .precision
                .ok_or(ConfigError::MissingParameter("precision"))?,
        };
        let analysis = AnalysisConfig {
            principal_components: self
                .principal_components
                .unwrap_or(DEFAULT_PRINCIPAL_COMPONENTS),
        };

        let config = PipelineConfig {
            secondary_structure_engine: self
                .secondary_structure_engine
                .ok_or(ConfigError::MissingParameter("secondary_structure_engine"))?,
            conditions,
            solvation,
            system,
            integration,
            platform,
            analysis,
        };
        config.validate()?;
        Ok(config)
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("temperature_kelvin", self.conditions.temperature_kelvin)?;
        non_negative("ionic_strength_molar", self.conditions.ionic_strength_molar)?;
        if !(0.0..=14.0).contains(&self.conditions.ph) {
            return Err(invalid("ph", "must lie between 0 and 14"));
        }
        non_negative("box_padding_nm", self.solvation.box_padding_nm)?;
        positive("nonbonded_cutoff_nm", self.system.nonbonded_cutoff_nm)?;
        positive("ewald_error_tolerance", self.system.ewald_error_tolerance)?;
        positive("constraint_tolerance", self.system.constraint_tolerance)?;
        positive("hydrogen_mass_amu", self.system.hydrogen_mass_amu)?;
        positive("time_step_fs", self.integration.time_step_fs)?;
        non_negative("friction_per_ps", self.integration.friction_per_ps)?;
        non_negative("equilibration_ns", self.integration.equilibration_ns)?;
        non_negative("sampling_ns", self.integration.sampling_ns)?;
        positive("print_step_ps", self.integration.print_step_ps)?;
        if self.integration.state_interval_steps == 0 {
            return Err(invalid("state_interval_steps", "must be at least 1"));
        }
        if self.analysis.principal_components == 0 {
            return Err(invalid("principal_components", "must be at least 1"));
        }
        if self.solvation.solvent.is_implicit() && self.system.nonbonded_method.is_periodic() {
            return Err(invalid(
                "nonbonded_method",
                "periodic methods require an explicit water model",
            ));
        }
        Ok(())
    }
}

fn invalid(parameter: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        parameter,
        reason: reason.to_string(),
    }
}

fn positive(parameter: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(parameter, &format!("must be positive (got {value})")))
    }
}

fn non_negative(parameter: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(parameter, &format!("must not be negative (got {value})")))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn complete_builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::new()
            .secondary_structure_engine(SecondaryStructureEngine::Seqfold)
            .temperature_kelvin(298.0)
            .ionic_strength_molar(0.163)
            .ph(7.4)
            .solvent(Solvent::Explicit(WaterModel::Tip3p))
            .box_padding_nm(1.0)
            .nonbonded_method(NonbondedMethod::Pme)
            .nonbonded_cutoff_nm(1.0)
            .ewald_error_tolerance(5e-4)
            .constraints(Constraints::HBonds)
            .rigid_water(true)
            .constraint_tolerance(1e-6)
            .hydrogen_mass_amu(1.0)
            .time_step_fs(2.0)
            .friction_per_ps(1.0)
            .equilibration_ns(0.1)
            .sampling_ns(1.0)
            .print_step_ps(10.0)
            .platform(Platform::Cpu)
            .precision(Precision::Single)
    }

    #[test]
    fn builder_applies_defaults_for_optional_parameters() {
        let config = complete_builder().build().unwrap();
        assert_eq!(
            config.integration.state_interval_steps,
            DEFAULT_STATE_INTERVAL_STEPS
        );
        assert_eq!(
            config.analysis.principal_components,
            DEFAULT_PRINCIPAL_COMPONENTS
        );
    }

    #[test]
    fn builder_reports_first_missing_parameter() {
        let result = PipelineConfigBuilder::new().ph(7.0).build();
        assert_eq!(
            result,
            Err(ConfigError::MissingParameter("temperature_kelvin"))
        );
    }

    #[test]
    fn builder_rejects_out_of_range_values() {
        let err = complete_builder().ph(15.0).build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { parameter: "ph", .. }));

        let err = complete_builder().time_step_fs(0.0).build().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                parameter: "time_step_fs",
                ..
            }
        ));
    }

    #[test]
    fn implicit_solvent_forbids_periodic_nonbonded_methods() {
        let err = complete_builder()
            .solvent(Solvent::Implicit)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                parameter: "nonbonded_method",
                ..
            }
        ));

        let ok = complete_builder()
            .solvent(Solvent::Implicit)
            .nonbonded_method(NonbondedMethod::CutoffNonPeriodic)
            .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn integration_step_counts_follow_time_step() {
        let config = complete_builder().build().unwrap();
        assert_eq!(config.integration.production_steps(), 500_000);
        assert_eq!(config.integration.equilibration_steps(), 50_000);
        assert_eq!(config.integration.report_interval(), 5_000);
        assert!((config.integration.simulated_ns(500_000) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn solvent_parses_water_models_and_implicit() {
        assert_eq!("implicit".parse::<Solvent>().unwrap(), Solvent::Implicit);
        assert_eq!(
            "TIP4PEW".parse::<Solvent>().unwrap(),
            Solvent::Explicit(WaterModel::Tip4pew)
        );
        assert!("water".parse::<Solvent>().is_err());
        assert_eq!(
            Solvent::Explicit(WaterModel::Spce).force_field_files(),
            vec!["amber14-all.xml", "amber14/spce.xml"]
        );
    }
}
