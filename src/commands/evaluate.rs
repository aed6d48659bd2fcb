use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use crate::cli::EvaluateArgs;
use crate::commands::{ERRORS_FILE, METRICS_FILE, RUN_MANIFEST_FILE};
use crate::dataset::{
    format_metric, load_preabstract, render_metrics_table, write_errors_csv, write_metrics_csv,
};
use crate::model::{EvaluationRunManifest, MetricsRow, RegistryField};
use crate::scoring::{
    AvailabilityDetector, Canonicalizer, Evaluation, EvaluationConfig, Evaluator,
};
use crate::util::{
    ensure_directory, now_utc_string, sha256_file, utc_compact_string, write_json_pretty,
};

const RUN_MANIFEST_VERSION: u32 = 1;

#[derive(Debug)]
pub struct EvaluationOutcome {
    pub evaluation: Evaluation,
    pub manifest: EvaluationRunManifest,
    pub manifest_path: PathBuf,
}

pub fn run(args: EvaluateArgs) -> Result<()> {
    let config = evaluation_config(&args.fields, args.detailed);
    let outcome = evaluate_preabstract(
        &args.preabstract_path,
        &args.output_dir,
        &config,
        "evaluate",
    )?;
    print_metrics(&outcome.evaluation.metrics)
}

/// No `--field` flags means every registry field.
pub fn evaluation_config(fields: &[RegistryField], detailed: bool) -> EvaluationConfig {
    if fields.is_empty() {
        EvaluationConfig::all_fields(detailed)
    } else {
        EvaluationConfig {
            fields: fields.to_vec(),
            detailed,
        }
    }
}

/// Scores a pre-abstract table and writes metrics, errors and the run manifest
/// into `output_dir`. Earlier outputs there are replaced.
pub fn evaluate_preabstract(
    preabstract_path: &Path,
    output_dir: &Path,
    config: &EvaluationConfig,
    command: &str,
) -> Result<EvaluationOutcome> {
    let records = load_preabstract(preabstract_path)?;
    let canonicalizer =
        Canonicalizer::new().context("failed to compile canonicalization patterns")?;
    let availability =
        AvailabilityDetector::new().context("failed to compile availability patterns")?;

    let evaluation = Evaluator::new(&canonicalizer, &availability)
        .evaluate(&records, config)
        .with_context(|| format!("evaluation of {} failed", preabstract_path.display()))?;

    ensure_directory(output_dir)?;
    let metrics_path = output_dir.join(METRICS_FILE);
    let errors_path = output_dir.join(ERRORS_FILE);
    let manifest_path = output_dir.join(RUN_MANIFEST_FILE);
    write_metrics_csv(&metrics_path, &evaluation.metrics)?;
    write_errors_csv(&errors_path, &evaluation.errors)?;

    let manifest = EvaluationRunManifest {
        manifest_version: RUN_MANIFEST_VERSION,
        run_id: format!("eval-{}", utc_compact_string(Utc::now())),
        generated_at: now_utc_string(),
        command: command.to_string(),
        preabstract_path: preabstract_path.display().to_string(),
        preabstract_sha256: sha256_file(preabstract_path)?,
        note_count: records.len(),
        fields: config.fields.clone(),
        detailed: config.detailed,
        excluded_by_field: evaluation
            .excluded_by_field
            .iter()
            .map(|(field, excluded)| (field.as_str().to_string(), *excluded))
            .collect(),
        error_count: evaluation.errors.len(),
        metrics_path: metrics_path.display().to_string(),
        errors_path: errors_path.display().to_string(),
    };
    write_json_pretty(&manifest_path, &manifest)?;

    for row in &evaluation.metrics {
        info!(
            field = %row.field,
            total_cases = row.total_cases,
            correct = row.correct,
            accuracy = %format_metric(row.accuracy),
            excluded = evaluation.excluded_by_field.get(&row.field).copied().unwrap_or(0),
            "field metrics"
        );
    }
    info!(
        run_id = %manifest.run_id,
        notes = manifest.note_count,
        errors = manifest.error_count,
        metrics = %metrics_path.display(),
        errors_path = %errors_path.display(),
        "evaluation completed"
    );

    Ok(EvaluationOutcome {
        evaluation,
        manifest,
        manifest_path,
    })
}

pub fn print_metrics(rows: &[MetricsRow]) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(output, "{}", render_metrics_table(rows))?;
    output.flush()?;
    Ok(())
}
