use crate::error::{CliError, Result};
use aptafold::engine::config as core_config;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// External tool and template locations. Relative paths are resolved against the directory
/// holding the configuration file.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FilePathsConfig {
    pub work_root: Option<PathBuf>,
    pub mmb: Option<PathBuf>,
    pub mmb_library: Option<PathBuf>,
    pub seqfold: Option<PathBuf>,
    pub nupack: Option<PathBuf>,
    pub driver: Option<PathBuf>,
    pub command_template: Option<PathBuf>,
    pub engine_parameters: Option<PathBuf>,
    pub analyte_structure: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FilePhysicsConfig {
    pub secondary_structure_engine: Option<core_config::SecondaryStructureEngine>,
    pub temperature: Option<f64>,
    pub ionic_strength: Option<f64>,
    pub ph: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileMdConfig {
    pub water_model: Option<core_config::Solvent>,
    pub box_padding_nm: Option<f64>,
    pub nonbonded_method: Option<core_config::NonbondedMethod>,
    pub nonbonded_cutoff_nm: Option<f64>,
    pub ewald_error_tolerance: Option<f64>,
    pub constraints: Option<core_config::Constraints>,
    pub rigid_water: Option<bool>,
    pub constraint_tolerance: Option<f64>,
    pub hydrogen_mass_amu: Option<f64>,
    pub time_step_fs: Option<f64>,
    pub friction_per_ps: Option<f64>,
    pub equilibration_ns: Option<f64>,
    pub sampling_ns: Option<f64>,
    pub print_step_ps: Option<f64>,
    pub state_interval_steps: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FilePlatformConfig {
    pub platform: Option<core_config::Platform>,
    pub precision: Option<core_config::Precision>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileAnalysisConfig {
    pub principal_components: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub paths: Option<FilePathsConfig>,
    pub physics: Option<FilePhysicsConfig>,
    pub md: Option<FileMdConfig>,
    pub platform: Option<FilePlatformConfig>,
    pub analysis: Option<FileAnalysisConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Reading configuration file {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn full_document_deserializes() {
        let config: FileConfig = toml::from_str(
            r#"
            [paths]
            work-root = "runs"
            mmb = "/opt/mmb/bin/MMB"
            driver = "bin/md-driver"
            command-template = "templates/commands.template.dat"

            [physics]
            secondary-structure-engine = "nupack"
            temperature = 310.0
            ph = 7.0

            [md]
            water-model = "implicit"
            nonbonded-method = "cutoff-non-periodic"
            constraints = "h-bonds"
            sampling-ns = 2.5

            [platform]
            platform = "cuda"
            precision = "mixed"

            [analysis]
            principal-components = 3
            "#,
        )
        .unwrap();

        let paths = config.paths.unwrap();
        assert_eq!(paths.work_root, Some(PathBuf::from("runs")));
        assert!(paths.seqfold.is_none());
        let physics = config.physics.unwrap();
        assert_eq!(
            physics.secondary_structure_engine,
            Some(core_config::SecondaryStructureEngine::Nupack)
        );
        let md = config.md.unwrap();
        assert_eq!(md.water_model, Some(core_config::Solvent::Implicit));
        assert_eq!(md.constraints, Some(core_config::Constraints::HBonds));
        assert_eq!(
            config.platform.unwrap().platform,
            Some(core_config::Platform::Cuda)
        );
        assert_eq!(config.analysis.unwrap().principal_components, Some(3));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        fs::write(&path, "[md]\nsampling-time = 5.0\n").unwrap();

        let err = FileConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, CliError::FileParsing { .. }));
    }

    #[test]
    fn unknown_water_model_is_rejected() {
        let result = toml::from_str::<FileConfig>("[md]\nwater-model = \"tip9p\"\n");
        assert!(result.is_err());
    }
}
