use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::RUN_MANIFEST_FILE;
use crate::commands::export_reviews::correction_files;
use crate::dataset::{format_metric, load_metrics_csv};
use crate::model::EvaluationRunManifest;
use crate::util::read_json;

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_path = args.output_dir.join(RUN_MANIFEST_FILE);

    info!(output_dir = %args.output_dir.display(), "status requested");

    if manifest_path.exists() {
        let manifest: EvaluationRunManifest = read_json(&manifest_path)?;
        let fields = manifest
            .fields
            .iter()
            .map(|field| field.as_str())
            .collect::<Vec<&str>>()
            .join(",");

        info!(
            run_id = %manifest.run_id,
            generated_at = %manifest.generated_at,
            command = %manifest.command,
            preabstract = %manifest.preabstract_path,
            preabstract_sha256 = %manifest.preabstract_sha256,
            notes = manifest.note_count,
            fields = %fields,
            detailed = manifest.detailed,
            errors = manifest.error_count,
            "loaded evaluation run manifest"
        );
        for (field, excluded) in &manifest.excluded_by_field {
            if *excluded > 0 {
                info!(%field, excluded, "notes excluded from scoring");
            }
        }

        let metrics_path = Path::new(&manifest.metrics_path);
        if metrics_path.exists() {
            for row in load_metrics_csv(metrics_path)? {
                info!(
                    field = %row.field,
                    total_cases = row.total_cases,
                    correct = row.correct,
                    accuracy = %format_metric(row.accuracy),
                    "last run metrics"
                );
            }
        } else {
            warn!(path = %metrics_path.display(), "metrics table missing");
        }
    } else {
        warn!(path = %manifest_path.display(), "evaluation run manifest missing");
    }

    if args.review_dir.is_dir() {
        let corrections = correction_files(&args.review_dir)?;
        info!(
            review_dir = %args.review_dir.display(),
            corrections = corrections.len(),
            "review records"
        );
    } else {
        warn!(path = %args.review_dir.display(), "review directory missing");
    }

    Ok(())
}
