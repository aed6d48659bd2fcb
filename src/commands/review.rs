use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::info;

use crate::cli::ReviewArgs;
use crate::commands::CORRECTION_FILE_PREFIX;
use crate::dataset::load_notes;
use crate::model::{CorrectionRecord, NoteKey, RegistryField};
use crate::util::{file_component, utc_compact_string, utc_rfc3339_string, write_json_pretty};

pub fn run(args: ReviewArgs) -> Result<()> {
    let edits = args
        .edits
        .iter()
        .map(|raw| parse_edit(raw))
        .collect::<Result<Vec<_>>>()?;
    let key = NoteKey::new(args.case_id, args.note_id);

    record_review(
        &args.preabstract_path,
        &args.review_dir,
        &key,
        &edits,
        args.notes,
    )?;
    Ok(())
}

/// Parses `field=value`. An empty value is a valid correction to "no value".
pub fn parse_edit(raw: &str) -> Result<(RegistryField, String)> {
    let Some((field, value)) = raw.split_once('=') else {
        bail!("edit `{raw}` must look like FIELD=VALUE");
    };
    let field = field
        .parse::<RegistryField>()
        .with_context(|| format!("invalid edit `{raw}`"))?;
    Ok((field, value.trim().to_string()))
}

/// Writes one correction record for a note in the pre-abstract table and
/// returns its path. Records are never overwritten.
pub fn record_review(
    preabstract_path: &Path,
    review_dir: &Path,
    key: &NoteKey,
    edits: &[(RegistryField, String)],
    notes: Option<String>,
) -> Result<PathBuf> {
    let table = load_notes(preabstract_path)?;
    let row = table
        .find(key)
        .with_context(|| format!("note {key} not found in {}", preabstract_path.display()))?;

    let column_values = |column: fn(RegistryField) -> String| {
        RegistryField::ALL
            .into_iter()
            .map(|field| {
                let value = row
                    .cell(&table.headers, &column(field))
                    .filter(|value| !value.is_empty())
                    .map(str::to_string);
                (field.as_str().to_string(), value)
            })
            .collect::<BTreeMap<String, Option<String>>>()
    };
    let predictions_original = column_values(RegistryField::pred_column);
    let evidence = column_values(RegistryField::evidence_column);

    let mut predictions_edited = predictions_original.clone();
    for (field, value) in edits {
        let value = (!value.is_empty()).then(|| value.clone());
        predictions_edited.insert(field.as_str().to_string(), value);
    }

    let reviewed_at = Utc::now();
    let record = CorrectionRecord {
        case_id: Some(row.note.case_id.clone()),
        note_id: Some(row.note.note_id.clone()),
        note_type: Some(row.note.note_type.clone()),
        note_date: Some(row.note.note_date.clone()),
        source_csv: Some(preabstract_path.display().to_string()),
        reviewed_at_utc: Some(utc_rfc3339_string(reviewed_at)),
        predictions_original,
        predictions_edited,
        evidence,
        notes,
    };

    let path = review_dir.join(format!(
        "{CORRECTION_FILE_PREFIX}{}_{}_{}.json",
        file_component(&key.case_id),
        file_component(&key.note_id),
        utc_compact_string(reviewed_at)
    ));
    if path.exists() {
        bail!("correction record already exists: {}", path.display());
    }
    write_json_pretty(&path, &record)?;

    info!(
        note = %key,
        edits = edits.len(),
        path = %path.display(),
        "wrote correction record"
    );
    Ok(path)
}
