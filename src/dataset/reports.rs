use super::*;

pub const METRICS_COLUMNS: [&str; 7] = [
    "field",
    "total_cases",
    "correct",
    "accuracy",
    "precision",
    "recall",
    "f1",
];

pub const ERROR_COLUMNS: [&str; 10] = [
    "case_id",
    "note_id",
    "note_type",
    "note_date",
    "field",
    "predicted_canonical",
    "ground_truth_canonical",
    "predicted_raw",
    "ground_truth_raw",
    "evidence_text",
];

/// Three decimals, or an empty cell when the metric is undefined.
pub fn format_metric(value: Option<f64>) -> String {
    value
        .map(|value| format!("{:.3}", round_metric(value)))
        .unwrap_or_default()
}

pub fn write_metrics_csv(path: &Path, rows: &[MetricsRow]) -> Result<()> {
    let mut writer = create_csv_writer(path)?;
    writer
        .write_record(METRICS_COLUMNS)
        .with_context(|| format!("failed to write header: {}", path.display()))?;

    for row in rows {
        writer
            .write_record([
                row.field.as_str().to_string(),
                row.total_cases.to_string(),
                row.correct.to_string(),
                format_metric(row.accuracy),
                format_metric(row.precision),
                format_metric(row.recall),
                format_metric(row.f1),
            ])
            .with_context(|| format!("failed to write metrics row for {}", row.field))?;
    }

    writer
        .flush()
        .with_context(|| format!("failed to flush csv file: {}", path.display()))
}

pub fn load_metrics_csv(path: &Path) -> Result<Vec<MetricsRow>> {
    let mut reader = open_csv_reader(path)?;

    let mut rows = Vec::new();
    for (row_index, row) in reader.deserialize::<MetricsRow>().enumerate() {
        let row = row.with_context(|| {
            format!(
                "failed to parse metrics row {} of {}",
                row_index + 1,
                path.display()
            )
        })?;
        rows.push(row);
    }
    Ok(rows)
}

/// Writes the error report. The header is written even when there are no
/// errors so downstream readers always see the schema.
pub fn write_errors_csv(path: &Path, errors: &[ErrorRecord]) -> Result<()> {
    let mut writer = create_csv_writer(path)?;
    writer
        .write_record(ERROR_COLUMNS)
        .with_context(|| format!("failed to write header: {}", path.display()))?;

    for error in errors {
        writer.serialize(error).with_context(|| {
            format!(
                "failed to write error row for {}/{} {}",
                error.case_id, error.note_id, error.field
            )
        })?;
    }

    writer
        .flush()
        .with_context(|| format!("failed to flush csv file: {}", path.display()))
}

/// Plain-text metrics table for terminal output.
pub fn render_metrics_table(rows: &[MetricsRow]) -> String {
    let detailed = rows
        .iter()
        .any(|row| row.precision.is_some() || row.recall.is_some() || row.f1.is_some());
    let columns = if detailed {
        &METRICS_COLUMNS[..]
    } else {
        &METRICS_COLUMNS[..4]
    };

    let mut table = vec![columns.iter().map(|column| column.to_string()).collect::<Vec<_>>()];
    for row in rows {
        let mut cells = vec![
            row.field.as_str().to_string(),
            row.total_cases.to_string(),
            row.correct.to_string(),
            format_metric(row.accuracy),
        ];
        if detailed {
            cells.push(format_metric(row.precision));
            cells.push(format_metric(row.recall));
            cells.push(format_metric(row.f1));
        }
        table.push(cells);
    }

    let widths = (0..columns.len())
        .map(|column| {
            table
                .iter()
                .map(|cells| cells[column].chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect::<Vec<usize>>();

    table
        .iter()
        .map(|cells| {
            cells
                .iter()
                .zip(&widths)
                .enumerate()
                .map(|(index, (cell, width))| {
                    let width = *width;
                    if index == 0 {
                        format!("{cell:<width$}")
                    } else {
                        format!("{cell:>width$}")
                    }
                })
                .collect::<Vec<String>>()
                .join("  ")
        })
        .collect::<Vec<String>>()
        .join("\n")
}

/// One correction record flattened for export.
#[derive(Debug, Clone)]
pub struct ReviewExportRow {
    pub file: String,
    pub reviewed_at_utc: String,
    pub record: CorrectionRecord,
}

impl ReviewExportRow {
    pub fn reviewed_at(&self) -> Option<DateTime<Utc>> {
        parse_review_timestamp(&self.reviewed_at_utc)
    }
}

fn parse_review_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw.trim_end_matches('Z'), "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn review_export_columns() -> Vec<String> {
    let mut columns = [
        "file",
        "reviewed_at_utc",
        "case_id",
        "note_id",
        "note_type",
        "note_date",
        "source_csv",
        "notes",
    ]
    .iter()
    .map(|column| column.to_string())
    .collect::<Vec<String>>();

    for field in RegistryField::ALL {
        columns.push(format!("orig_{field}"));
        columns.push(format!("edit_{field}"));
        columns.push(format!("evidence_{field}"));
    }
    columns
}

/// Writes correction records newest first. Rows whose timestamp does not parse
/// sort after every dated row and keep their relative order.
pub fn write_review_export(path: &Path, rows: &mut [ReviewExportRow]) -> Result<()> {
    rows.sort_by(|left, right| {
        match (left.reviewed_at(), right.reviewed_at()) {
            (Some(left), Some(right)) => right.cmp(&left),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
    });

    let mut writer = create_csv_writer(path)?;
    writer
        .write_record(review_export_columns())
        .with_context(|| format!("failed to write header: {}", path.display()))?;

    for row in rows.iter() {
        let record = &row.record;
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        let field_value = |values: &BTreeMap<String, Option<String>>, field: RegistryField| {
            values
                .get(field.as_str())
                .cloned()
                .flatten()
                .unwrap_or_default()
        };

        let mut cells = vec![
            row.file.clone(),
            row.reviewed_at_utc.clone(),
            text(&record.case_id),
            text(&record.note_id),
            text(&record.note_type),
            text(&record.note_date),
            text(&record.source_csv),
            text(&record.notes),
        ];
        for field in RegistryField::ALL {
            cells.push(field_value(&record.predictions_original, field));
            cells.push(field_value(&record.predictions_edited, field));
            cells.push(field_value(&record.evidence, field));
        }

        writer
            .write_record(&cells)
            .with_context(|| format!("failed to write export row for {}", row.file))?;
    }

    writer
        .flush()
        .with_context(|| format!("failed to flush csv file: {}", path.display()))?;

    info!(path = %path.display(), rows = rows.len(), "wrote review export");
    Ok(())
}
