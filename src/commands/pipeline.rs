use anyhow::Result;
use tracing::info;

use crate::cli::PipelineArgs;
use crate::commands::{evaluate, extract, gate};

pub fn run(args: PipelineArgs) -> Result<()> {
    info!(notes = %args.notes_path.display(), "pipeline started");

    extract::extract_preabstract(
        &args.notes_path,
        &args.entities_path,
        &args.preabstract_path,
        args.allow_missing_entities,
    )?;

    let config = evaluate::evaluation_config(&args.fields, args.detailed);
    let outcome =
        evaluate::evaluate_preabstract(&args.preabstract_path, &args.output_dir, &config, "pipeline")?;
    evaluate::print_metrics(&outcome.evaluation.metrics)?;

    if args.gate {
        let thresholds = gate::load_gate_config(args.thresholds_path.as_deref())?;
        gate::enforce_gate(&outcome.evaluation.metrics, &thresholds)?;
    }

    info!(
        run_id = %outcome.manifest.run_id,
        manifest = %outcome.manifest_path.display(),
        "pipeline completed"
    );
    Ok(())
}
