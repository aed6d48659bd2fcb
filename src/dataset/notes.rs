use super::*;

pub const REQUIRED_NOTE_COLUMNS: [&str; 5] =
    ["case_id", "note_id", "note_type", "note_date", "note_text"];

const GROUND_TRUTH_SUFFIX: &str = "_gt";

/// A note row with its ground truth and every original cell, in header order.
#[derive(Debug, Clone)]
pub struct NoteRow {
    pub note: Note,
    pub ground_truth: GroundTruthRecord,
    pub cells: Vec<String>,
}

impl NoteRow {
    pub fn cell(&self, headers: &[String], name: &str) -> Option<&str> {
        header_index(headers, name)
            .and_then(|index| self.cells.get(index))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NoteTable {
    pub headers: Vec<String>,
    pub rows: Vec<NoteRow>,
}

impl NoteTable {
    pub fn find(&self, key: &NoteKey) -> Option<&NoteRow> {
        self.rows
            .iter()
            .find(|row| row.note.case_id == key.case_id && row.note.note_id == key.note_id)
    }
}

/// Loads a notes table. Columns ending in `_gt` are ground truth; every other
/// column is carried through untouched in `cells`.
pub fn load_notes(path: &Path) -> Result<NoteTable> {
    let mut reader = open_csv_reader(path)?;
    let headers = reader
        .headers()
        .with_context(|| format!("failed to read csv header: {}", path.display()))?
        .iter()
        .map(|header| header.trim().to_string())
        .collect::<Vec<String>>();

    let mut required = [0_usize; REQUIRED_NOTE_COLUMNS.len()];
    for (slot, name) in required.iter_mut().zip(REQUIRED_NOTE_COLUMNS) {
        let Some(index) = header_index(&headers, name) else {
            bail!(
                "notes table {} is missing required column `{}`",
                path.display(),
                name
            );
        };
        *slot = index;
    }

    let ground_truth_columns = headers
        .iter()
        .enumerate()
        .filter_map(|(index, header)| {
            header
                .strip_suffix(GROUND_TRUTH_SUFFIX)
                .filter(|field_name| !field_name.is_empty())
                .map(|field_name| (index, field_name.to_string()))
        })
        .collect::<Vec<(usize, String)>>();

    let mut rows = Vec::new();
    for (row_index, record) in reader.records().enumerate() {
        let record = record.with_context(|| {
            format!("failed to read row {} of {}", row_index + 1, path.display())
        })?;
        let cell = |index: usize| record.get(index).unwrap_or_default().to_string();

        let note = Note {
            case_id: cell(required[0]).trim().to_string(),
            note_id: cell(required[1]).trim().to_string(),
            note_type: cell(required[2]),
            note_date: cell(required[3]),
            note_text: cell(required[4]),
        };

        let mut ground_truth = GroundTruthRecord::default();
        for (index, field_name) in &ground_truth_columns {
            ground_truth.insert(field_name.clone(), cell(*index));
        }

        rows.push(NoteRow {
            note,
            ground_truth,
            cells: record_cells(&record, headers.len()),
        });
    }

    info!(
        path = %path.display(),
        rows = rows.len(),
        ground_truth_columns = ground_truth_columns.len(),
        "loaded notes table"
    );

    Ok(NoteTable { headers, rows })
}

fn record_cells(record: &StringRecord, width: usize) -> Vec<String> {
    (0..width)
        .map(|index| record.get(index).unwrap_or_default().to_string())
        .collect()
}
