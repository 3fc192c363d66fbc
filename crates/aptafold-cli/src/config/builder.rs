use super::defaults::DefaultsConfig;
use super::file::{FileConfig, FilePathsConfig};
use super::models::{AppConfig, ToolPaths};
use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use crate::utils::parser::{self, Assignment};
use aptafold::engine::config as core_config;
use serde::de::{DeserializeOwned, IntoDeserializer};
use serde::de::value::{Error as ValueError, StrDeserializer};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

pub fn build_config(args: &RunArgs) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();
    let file_config = load_file_config(&args.config, &args.set_values)?;

    let physics = file_config.physics.unwrap_or_default();
    let md = file_config.md.unwrap_or_default();
    let platform = file_config.platform.unwrap_or_default();
    let analysis = file_config.analysis.unwrap_or_default();

    let secondary_structure_engine = physics
        .secondary_structure_engine
        .unwrap_or(defaults.secondary_structure_engine);
    let temperature = args
        .temperature
        .or(physics.temperature)
        .unwrap_or(defaults.temperature);
    let ionic_strength = args
        .ionic_strength
        .or(physics.ionic_strength)
        .unwrap_or(defaults.ionic_strength);
    let sampling_ns = args
        .sampling_ns
        .or(md.sampling_ns)
        .unwrap_or(defaults.sampling_ns);
    let equilibration_ns = args
        .equilibration_ns
        .or(md.equilibration_ns)
        .unwrap_or(defaults.equilibration_ns);

    let core_config = core_config::PipelineConfigBuilder::new()
        .secondary_structure_engine(secondary_structure_engine)
        .temperature_kelvin(temperature)
        .ionic_strength_molar(ionic_strength)
        .ph(physics.ph.unwrap_or(defaults.ph))
        .solvent(md.water_model.unwrap_or(defaults.water_model))
        .box_padding_nm(md.box_padding_nm.unwrap_or(defaults.box_padding_nm))
        .nonbonded_method(md.nonbonded_method.unwrap_or(defaults.nonbonded_method))
        .nonbonded_cutoff_nm(md.nonbonded_cutoff_nm.unwrap_or(defaults.nonbonded_cutoff_nm))
        .ewald_error_tolerance(
            md.ewald_error_tolerance
                .unwrap_or(defaults.ewald_error_tolerance),
        )
        .constraints(md.constraints.unwrap_or(defaults.constraints))
        .rigid_water(md.rigid_water.unwrap_or(defaults.rigid_water))
        .constraint_tolerance(
            md.constraint_tolerance
                .unwrap_or(defaults.constraint_tolerance),
        )
        .hydrogen_mass_amu(md.hydrogen_mass_amu.unwrap_or(defaults.hydrogen_mass_amu))
        .time_step_fs(md.time_step_fs.unwrap_or(defaults.time_step_fs))
        .friction_per_ps(md.friction_per_ps.unwrap_or(defaults.friction_per_ps))
        .equilibration_ns(equilibration_ns)
        .sampling_ns(sampling_ns)
        .print_step_ps(md.print_step_ps.unwrap_or(defaults.print_step_ps))
        .state_interval_steps(
            md.state_interval_steps
                .unwrap_or(defaults.state_interval_steps),
        )
        .platform(platform.platform.unwrap_or(defaults.platform))
        .precision(platform.precision.unwrap_or(defaults.precision))
        .principal_components(
            analysis
                .principal_components
                .unwrap_or(defaults.principal_components),
        )
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    let paths = resolve_paths(
        file_config.paths.unwrap_or_default(),
        config_dir(&args.config),
        secondary_structure_engine,
        &defaults,
    )?;

    Ok(AppConfig { paths, core_config })
}

/// Reads the configuration file and applies `--set` overrides on top of it.
pub fn load_file_config(path: &Path, set_values: &[String]) -> Result<FileConfig> {
    let file_config = FileConfig::from_file(path)?;
    apply_set_values(file_config, set_values)
}

/// The directory runs are created in, as configured in `path`.
pub fn work_root(path: &Path) -> Result<PathBuf> {
    let file_config = FileConfig::from_file(path)?;
    let defaults = DefaultsConfig::default();
    let configured = file_config.paths.and_then(|p| p.work_root);
    Ok(resolve(
        config_dir(path),
        configured.unwrap_or_else(|| PathBuf::from(defaults.work_root)),
    ))
}

fn config_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new("."))
}

fn resolve(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

fn required(base: &Path, value: Option<PathBuf>, key: &str) -> Result<PathBuf> {
    value
        .map(|path| resolve(base, path))
        .ok_or_else(|| CliError::Config(format!("`paths.{}` is required", key)))
}

fn resolve_paths(
    file: FilePathsConfig,
    base: &Path,
    engine: core_config::SecondaryStructureEngine,
    defaults: &DefaultsConfig,
) -> Result<ToolPaths> {
    let (oracle, oracle_key) = match engine {
        core_config::SecondaryStructureEngine::Seqfold => (file.seqfold, "seqfold"),
        core_config::SecondaryStructureEngine::Nupack => (file.nupack, "nupack"),
    };

    let paths = ToolPaths {
        work_root: resolve(
            base,
            file.work_root
                .unwrap_or_else(|| PathBuf::from(defaults.work_root)),
        ),
        mmb: required(base, file.mmb, "mmb")?,
        mmb_library: file.mmb_library.map(|p| resolve(base, p)),
        oracle: required(base, oracle, oracle_key)?,
        driver: required(base, file.driver, "driver")?,
        command_template: required(base, file.command_template, "command-template")?,
        engine_parameters: file.engine_parameters.map(|p| resolve(base, p)),
        analyte_structure: file.analyte_structure.map(|p| resolve(base, p)),
    };
    debug!("Resolved tool paths: {:?}", paths);
    Ok(paths)
}

fn typed<T: FromStr>(assignment: &Assignment, expected: &'static str) -> Result<Option<T>> {
    assignment
        .parse(expected)
        .map(Some)
        .map_err(|e| CliError::Config(e.to_string()))
}

fn keyword<T: DeserializeOwned>(assignment: &Assignment) -> Result<Option<T>> {
    let deserializer: StrDeserializer<'_, ValueError> = assignment.value.into_deserializer();
    T::deserialize(deserializer).map(Some).map_err(|e| {
        CliError::Config(format!("Invalid value for {}: {}", assignment.key, e))
    })
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let a = parser::parse_assignment(kv_pair).map_err(|e| CliError::Config(e.to_string()))?;
        debug!("Applying override {} = {}", a.key, a.value);

        match a.key.split_once('.') {
            Some(("paths", key)) => {
                let section = config.paths.get_or_insert_with(Default::default);
                let value = Some(PathBuf::from(a.value));
                match key {
                    "work-root" => section.work_root = value,
                    "mmb" => section.mmb = value,
                    "mmb-library" => section.mmb_library = value,
                    "seqfold" => section.seqfold = value,
                    "nupack" => section.nupack = value,
                    "driver" => section.driver = value,
                    "command-template" => section.command_template = value,
                    "engine-parameters" => section.engine_parameters = value,
                    "analyte-structure" => section.analyte_structure = value,
                    _ => return Err(unsupported(a.key)),
                }
            }
            Some(("physics", key)) => {
                let section = config.physics.get_or_insert_with(Default::default);
                match key {
                    "secondary-structure-engine" => {
                        section.secondary_structure_engine = keyword(&a)?
                    }
                    "temperature" => section.temperature = typed(&a, "float")?,
                    "ionic-strength" => section.ionic_strength = typed(&a, "float")?,
                    "ph" => section.ph = typed(&a, "float")?,
                    _ => return Err(unsupported(a.key)),
                }
            }
            Some(("md", key)) => {
                let section = config.md.get_or_insert_with(Default::default);
                match key {
                    "water-model" => section.water_model = typed(&a, "water model")?,
                    "box-padding-nm" => section.box_padding_nm = typed(&a, "float")?,
                    "nonbonded-method" => section.nonbonded_method = keyword(&a)?,
                    "nonbonded-cutoff-nm" => section.nonbonded_cutoff_nm = typed(&a, "float")?,
                    "ewald-error-tolerance" => {
                        section.ewald_error_tolerance = typed(&a, "float")?
                    }
                    "constraints" => section.constraints = keyword(&a)?,
                    "rigid-water" => section.rigid_water = typed(&a, "boolean")?,
                    "constraint-tolerance" => section.constraint_tolerance = typed(&a, "float")?,
                    "hydrogen-mass-amu" => section.hydrogen_mass_amu = typed(&a, "float")?,
                    "time-step-fs" => section.time_step_fs = typed(&a, "float")?,
                    "friction-per-ps" => section.friction_per_ps = typed(&a, "float")?,
                    "equilibration-ns" => section.equilibration_ns = typed(&a, "float")?,
                    "sampling-ns" => section.sampling_ns = typed(&a, "float")?,
                    "print-step-ps" => section.print_step_ps = typed(&a, "float")?,
                    "state-interval-steps" => {
                        section.state_interval_steps = typed(&a, "integer")?
                    }
                    _ => return Err(unsupported(a.key)),
                }
            }
            Some(("platform", key)) => {
                let section = config.platform.get_or_insert_with(Default::default);
                match key {
                    "platform" => section.platform = keyword(&a)?,
                    "precision" => section.precision = keyword(&a)?,
                    _ => return Err(unsupported(a.key)),
                }
            }
            Some(("analysis", "principal-components")) => {
                config
                    .analysis
                    .get_or_insert_with(Default::default)
                    .principal_components = typed(&a, "integer")?;
            }
            _ => return Err(unsupported(a.key)),
        }
    }
    Ok(config)
}

fn unsupported(key: &str) -> CliError {
    CliError::Config(format!(
        "Unsupported configuration key for --set: '{}'",
        key
    ))
}
