use aptafold::engine::config as core_config;
use aptafold::engine::run::RunTemplates;
use std::path::PathBuf;

/// Resolved locations of every external tool and template a run needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolPaths {
    pub work_root: PathBuf,
    pub mmb: PathBuf,
    pub mmb_library: Option<PathBuf>,
    /// Executable of the configured secondary-structure engine.
    pub oracle: PathBuf,
    pub driver: PathBuf,
    pub command_template: PathBuf,
    pub engine_parameters: Option<PathBuf>,
    pub analyte_structure: Option<PathBuf>,
}

impl ToolPaths {
    pub fn templates(&self) -> RunTemplates {
        RunTemplates {
            command_template: self.command_template.clone(),
            engine_parameters: self.engine_parameters.clone(),
            analyte_structure: self.analyte_structure.clone(),
        }
    }
}

pub struct AppConfig {
    pub paths: ToolPaths,
    pub core_config: core_config::PipelineConfig,
}
