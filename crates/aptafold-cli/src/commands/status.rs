use crate::cli::StatusArgs;
use crate::commands::run::print_analysis;
use crate::config;
use crate::error::Result;
use aptafold::workflows::pipeline;
use tracing::info;

pub async fn run(args: StatusArgs) -> Result<()> {
    let work_root = config::work_root(&args.config)?;
    info!("Inspecting run {} under {:?}", args.run_num, work_root);

    let status = pipeline::inspect(&work_root, args.run_num)?;

    println!("Run {}: {}", status.run_number, status.work_dir.display());
    match &status.checkpoint {
        Some(state) => println!(
            "  Checkpoint: '{}' ({} marker(s))",
            state.label, state.count
        ),
        None => println!("  Checkpoint: none recorded yet"),
    }
    for analysis in status.aptamer.iter().chain(status.complex.iter()) {
        print_analysis(analysis);
    }

    Ok(())
}
