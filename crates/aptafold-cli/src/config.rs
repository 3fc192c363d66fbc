//! Pipeline configuration for the CLI.
//!
//! Values are layered with the precedence CLI flag > `--set` override > configuration file >
//! built-in default, then handed to the core `PipelineConfigBuilder` for validation.

pub mod builder;
pub mod defaults;
pub mod file;
pub mod models;

pub use builder::{build_config, work_root};
pub use models::AppConfig;
