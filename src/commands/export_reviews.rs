use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::cli::ExportReviewsArgs;
use crate::commands::{CORRECTION_FILE_PREFIX, REVIEW_EXPORT_FILE};
use crate::dataset::{ReviewExportRow, write_review_export};
use crate::model::CorrectionRecord;
use crate::util::{modified_utc, read_json, utc_rfc3339_string};

pub fn run(args: ExportReviewsArgs) -> Result<()> {
    let output_path = args
        .output_path
        .unwrap_or_else(|| args.review_dir.join(REVIEW_EXPORT_FILE));
    export_reviews(&args.review_dir, &output_path)?;
    Ok(())
}

pub fn correction_files(review_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(review_dir)
        .with_context(|| format!("failed to list {}", review_dir.display()))?
    {
        let path = entry
            .with_context(|| format!("failed to list {}", review_dir.display()))?
            .path();
        let is_correction = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(CORRECTION_FILE_PREFIX) && name.ends_with(".json"));
        if is_correction && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Flattens every correction record in `review_dir` into one CSV, newest
/// first. Unreadable records are skipped with a warning. Returns the row count.
pub fn export_reviews(review_dir: &Path, output_path: &Path) -> Result<usize> {
    if !review_dir.is_dir() {
        bail!("review directory not found: {}", review_dir.display());
    }

    let files = correction_files(review_dir)?;
    if files.is_empty() {
        bail!("no correction records found in {}", review_dir.display());
    }

    let mut rows = Vec::with_capacity(files.len());
    for path in files {
        let file = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let record: CorrectionRecord = match read_json(&path) {
            Ok(record) => record,
            Err(err) => {
                warn!(file = %file, error = %format!("{err:#}"), "skipping unreadable correction record");
                continue;
            }
        };

        let reviewed_at_utc = record
            .reviewed_at_utc
            .clone()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| modified_utc(&path).map(utc_rfc3339_string))
            .unwrap_or_default();
        rows.push(ReviewExportRow {
            file,
            reviewed_at_utc,
            record,
        });
    }

    write_review_export(output_path, &mut rows)?;
    info!(
        review_dir = %review_dir.display(),
        rows = rows.len(),
        output = %output_path.display(),
        "review export completed"
    );
    Ok(rows.len())
}
