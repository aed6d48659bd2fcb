use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::cli::GateArgs;
use crate::dataset::{format_metric, load_metrics_csv};
use crate::model::MetricsRow;
use crate::scoring::{GateConfig, check_thresholds};
use crate::util::read_json;

pub fn run(args: GateArgs) -> Result<()> {
    let config = load_gate_config(args.thresholds_path.as_deref())?;
    let metrics = load_metrics_csv(&args.metrics_path)?;
    enforce_gate(&metrics, &config)
}

/// Reads thresholds from `path`, or falls back to the demo thresholds.
pub fn load_gate_config(path: Option<&Path>) -> Result<GateConfig> {
    match path {
        Some(path) => {
            let config: GateConfig = read_json(path)?;
            info!(path = %path.display(), fields = config.thresholds.len(), "loaded gate thresholds");
            Ok(config)
        }
        None => {
            info!("using demo gate thresholds");
            Ok(GateConfig::demo_defaults())
        }
    }
}

pub fn enforce_gate(metrics: &[MetricsRow], config: &GateConfig) -> Result<()> {
    let report = check_thresholds(metrics, config).context("regression gate is misconfigured")?;

    for outcome in &report.outcomes {
        if outcome.passed {
            info!(
                field = %outcome.field,
                accuracy = %format_metric(outcome.accuracy),
                threshold = outcome.threshold,
                "gate passed"
            );
        } else {
            warn!(
                field = %outcome.field,
                accuracy = %format_metric(outcome.accuracy),
                threshold = outcome.threshold,
                "gate failed"
            );
        }
    }

    if !report.passed() {
        let failed = report
            .failures()
            .map(|outcome| outcome.field.as_str())
            .collect::<Vec<&str>>()
            .join(", ");
        bail!("regression gate failed for: {failed}");
    }

    info!(fields = report.outcomes.len(), "regression gate passed");
    Ok(())
}
