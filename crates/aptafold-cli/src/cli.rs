use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "The Aptafold Developers",
    version,
    about = "Aptafold CLI - Predicts the 3D structure of a DNA aptamer and, optionally, its binding with a peptide, through checkpointed and resumable molecular dynamics runs.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a new run, or resume an existing one from its last checkpoint.
    Run(RunArgs),
    /// Show the checkpoint an existing run would resume from.
    Status(StatusArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    // --- Core Arguments ---
    /// Path to the pipeline configuration file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Run to resume. 0 starts a new run in the next free run directory.
    #[arg(short = 'n', long = "run-num", default_value_t = 0, value_name = "INT")]
    pub run_num: u32,

    /// DNA aptamer sequence (A, C, G, T).
    #[arg(short, long, required = true, value_name = "SEQ")]
    pub sequence: String,

    /// Peptide analyte in one-letter code, or 'none' to sample the free aptamer only.
    #[arg(short, long, value_name = "PEP")]
    pub peptide: Option<String>,

    /// Wall-time budget granted to this job, in hours. Recorded in the run log.
    #[arg(short, long, value_name = "HOURS")]
    pub walltime: Option<f64>,

    // --- Physics Overrides ---
    /// Override the simulation temperature (K) from the config file.
    #[arg(short = 'T', long, value_name = "FLOAT")]
    pub temperature: Option<f64>,

    /// Override the ionic strength (M) from the config file.
    #[arg(long, value_name = "FLOAT")]
    pub ionic_strength: Option<f64>,

    // --- MD Overrides ---
    /// Override the production sampling time (ns) from the config file.
    #[arg(long, value_name = "FLOAT")]
    pub sampling_ns: Option<f64>,

    /// Override the equilibration time (ns) from the config file.
    #[arg(long, value_name = "FLOAT")]
    pub equilibration_ns: Option<f64>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S md.sampling-ns=20
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `status` subcommand.
#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    /// Path to the pipeline configuration file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Run to inspect.
    #[arg(short = 'n', long = "run-num", required = true, value_name = "INT")]
    pub run_num: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_arguments_parse_with_overrides() {
        let cli = Cli::try_parse_from([
            "aptafold",
            "-vv",
            "run",
            "--config",
            "pipeline.toml",
            "--sequence",
            "ATCGGCTA",
            "--peptide",
            "none",
            "--run-num",
            "3",
            "-S",
            "md.sampling-ns=5",
            "-S",
            "physics.ph=7.0",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Commands::Run(args) = cli.command else {
            panic!("expected run subcommand");
        };
        assert_eq!(args.run_num, 3);
        assert_eq!(args.peptide.as_deref(), Some("none"));
        assert_eq!(args.set_values.len(), 2);
        assert!(args.walltime.is_none());
    }

    #[test]
    fn run_requires_a_sequence() {
        let result = Cli::try_parse_from(["aptafold", "run", "--config", "pipeline.toml"]);
        assert!(result.is_err());
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from([
            "aptafold", "-q", "-v", "status", "-c", "p.toml", "-n", "1",
        ]);
        assert!(result.is_err());
    }
}
