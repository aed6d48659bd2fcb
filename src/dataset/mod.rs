use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDateTime, Utc};
use csv::StringRecord;
use tracing::{info, warn};

use crate::model::{
    CorrectionRecord, EntityRecord, ErrorRecord, FieldPrediction, GroundTruthRecord, MetricsRow,
    Note, NoteKey, NotePredictions, NoteRecord, PredictionSource, RawEntity, RegistryField,
};
use crate::scoring::round_metric;
use crate::util::ensure_directory;

mod entities;
mod notes;
mod preabstract;
mod reports;
#[cfg(test)]
mod tests;

pub use self::entities::{EntityIndex, json_id, load_entity_index};
pub use self::notes::{NoteRow, NoteTable, REQUIRED_NOTE_COLUMNS, load_notes};
pub use self::preabstract::{load_preabstract, write_preabstract};
pub use self::reports::{
    ERROR_COLUMNS, METRICS_COLUMNS, ReviewExportRow, format_metric, load_metrics_csv,
    render_metrics_table, write_errors_csv, write_metrics_csv, write_review_export,
};

fn open_csv_reader(path: &Path) -> Result<csv::Reader<File>> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("failed to open csv file: {}", path.display()))
}

fn create_csv_writer(path: &Path) -> Result<csv::Writer<File>> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("failed to create csv file: {}", path.display()))
}

fn header_index(headers: &[String], name: &str) -> Option<usize> {
    headers.iter().position(|header| header == name)
}
