use crate::cli::RunArgs;
use crate::config::{self, AppConfig};
use crate::error::{CliError, Result};
use crate::ui::{CliProgressHandler, UiEvent};
use aptafold::{
    core::models::sequence::{DnaSequence, NO_PEPTIDE_SENTINEL, PeptideSequence},
    engine::{
        analysis::{AnalysisResult, secondary::PartnerMismatch},
        bridge::DriverBridge,
        progress::ProgressReporter,
        run::RunManager,
        stages::{folding::MmbRunner, secondary::CommandOracle},
    },
    workflows::pipeline::{self, PipelineRequest, PipelineStages},
};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::info;

pub async fn run(args: RunArgs, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    let AppConfig { paths, core_config } = config::build_config(&args)?;

    let sequence: DnaSequence = args
        .sequence
        .parse()
        .map_err(|source| CliError::Sequence {
            argument: "--sequence",
            source,
        })?;
    let peptide = PeptideSequence::parse_optional(
        args.peptide.as_deref().unwrap_or(NO_PEPTIDE_SENTINEL),
    )
    .map_err(|source| CliError::Sequence {
        argument: "--peptide",
        source,
    })?;

    let manager = RunManager::new(
        paths.work_root.clone(),
        paths.templates(),
        paths.mmb_library.clone(),
    );
    let handle = manager.start_or_resume_run(args.run_num)?;
    let run_number = handle.context().run_number;
    info!(
        "Using run {} in {:?}",
        run_number,
        handle.context().work_dir
    );
    if let Some(hours) = args.walltime {
        handle
            .record()
            .append(&format!("Wall-time budget: {:.2} h", hours))?;
    }

    let oracle = CommandOracle::new(core_config.secondary_structure_engine, paths.oracle.clone());
    let folding = MmbRunner::new(paths.mmb.clone());
    let bridge = DriverBridge::new(paths.driver.clone());
    let comparator = PartnerMismatch;
    let stages = PipelineStages {
        oracle: &oracle,
        folding: &folding,
        md: &bridge,
        trajectory: &bridge,
        peptide_builder: &bridge,
        comparator: &comparator,
    };
    let request = PipelineRequest {
        sequence,
        peptide,
        config: core_config,
    };

    let progress_handler = CliProgressHandler::new(ui_sender);
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    if handle.is_resumed() {
        println!("Resuming run {}...", run_number);
    } else {
        println!("Starting run {}...", run_number);
    }
    let started = Instant::now();

    let result =
        tokio::task::block_in_place(|| pipeline::run(&handle, &request, &stages, &reporter))?;

    let elapsed = started.elapsed().as_secs_f64() / 3600.0;
    handle
        .record()
        .append(&format!("Pipeline finished in {:.3} h", elapsed))?;
    info!(
        "Run {} finished; executed stages: {:?}",
        result.run_number, result.executed
    );

    println!("Run {} complete: {}", result.run_number, result.work_dir.display());
    print_analysis(&result.aptamer);
    if let Some(complex) = &result.complex {
        print_analysis(complex);
    }

    Ok(())
}

pub(crate) fn print_analysis(analysis: &AnalysisResult) {
    println!("  [{}]", analysis.label.as_str());
    println!("    Observed structure: {}", analysis.observed_dot_bracket);
    match analysis.prediction_error {
        Some(error) => println!("    Secondary structure error: {:.3}", error),
        None => println!("    Secondary structure error: n/a"),
    }
    println!(
        "    Representative frame {}: {}",
        analysis.representative_frame,
        analysis.representative_structure.display()
    );
    if let Some(binding) = &analysis.binding {
        println!("    Bound fraction: {:.1}%", binding.bound_fraction * 100.0);
        if let Some(contact) = binding.strongest_contact() {
            println!(
                "    Strongest contact: base {} / peptide residue {} ({:.1}% of frames)",
                contact.base_index,
                contact.peptide_residue,
                contact.occupancy * 100.0
            );
        }
    }
}
