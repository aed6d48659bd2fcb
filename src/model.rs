use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// One of the six registry fields abstracted from a note.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryField {
    PrimarySite,
    Histology,
    Stage,
    ErStatus,
    PrStatus,
    Her2Status,
}

impl RegistryField {
    pub const ALL: [RegistryField; 6] = [
        Self::PrimarySite,
        Self::Histology,
        Self::Stage,
        Self::ErStatus,
        Self::PrStatus,
        Self::Her2Status,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PrimarySite => "primary_site",
            Self::Histology => "histology",
            Self::Stage => "stage",
            Self::ErStatus => "er_status",
            Self::PrStatus => "pr_status",
            Self::Her2Status => "her2_status",
        }
    }

    pub fn is_biomarker(self) -> bool {
        matches!(self, Self::ErStatus | Self::PrStatus | Self::Her2Status)
    }

    pub fn pred_column(self) -> String {
        format!("{}_pred", self.as_str())
    }

    pub fn evidence_column(self) -> String {
        format!("{}_evidence", self.as_str())
    }

    pub fn source_column(self) -> String {
        format!("{}_source", self.as_str())
    }

    pub fn gt_column(self) -> String {
        format!("{}_gt", self.as_str())
    }
}

impl fmt::Display for RegistryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown registry field `{0}` (expected one of primary_site, histology, stage, er_status, pr_status, her2_status)")]
pub struct UnknownFieldError(pub String);

impl FromStr for RegistryField {
    type Err = UnknownFieldError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == normalized)
            .ok_or_else(|| UnknownFieldError(value.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NoteKey {
    pub case_id: String,
    pub note_id: String,
}

impl NoteKey {
    pub fn new(case_id: impl Into<String>, note_id: impl Into<String>) -> Self {
        Self {
            case_id: case_id.into(),
            note_id: note_id.into(),
        }
    }
}

impl fmt::Display for NoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.case_id, self.note_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub case_id: String,
    pub note_id: String,
    pub note_type: String,
    pub note_date: String,
    pub note_text: String,
}

impl Note {
    pub fn key(&self) -> NoteKey {
        NoteKey::new(self.case_id.clone(), self.note_id.clone())
    }
}

/// Entity as emitted by the external NER step, before any cleanup.
///
/// Offsets are character offsets into the note text. They are signed and
/// optional so that garbage from upstream deserializes and can be dropped
/// instead of failing the whole record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEntity {
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub start: Option<i64>,
    #[serde(default)]
    pub end: Option<i64>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// An entity entry of the wrong shape becomes an offset-less placeholder, so
/// normalization drops and counts it while the rest of the note survives.
fn lenient_entities<'de, D>(deserializer: D) -> Result<Vec<RawEntity>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(values
        .into_iter()
        .map(|value| serde_json::from_value(value).unwrap_or_default())
        .collect())
}

/// One line of the NER JSONL file.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityRecord {
    pub case_id: serde_json::Value,
    pub note_id: serde_json::Value,
    #[serde(default)]
    pub note_type: Option<serde_json::Value>,
    #[serde(default)]
    pub note_date: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "lenient_entities")]
    pub entities: Vec<RawEntity>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionSource {
    Entity,
    Pattern,
    None,
}

impl PredictionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Pattern => "pattern",
            Self::None => "none",
        }
    }

    /// Reads a source cell back from a pre-abstract table. Tables written
    /// before the source column existed only tell us whether a value was found.
    pub fn from_cell(cell: Option<&str>, has_value: bool) -> Self {
        match cell.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
            Some("entity") => Self::Entity,
            Some("pattern") => Self::Pattern,
            Some("none") => Self::None,
            _ if has_value => Self::Pattern,
            _ => Self::None,
        }
    }
}

/// Half-open character span `[start, end)` into a note.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CharSpan {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPrediction {
    pub field: RegistryField,
    pub predicted_value: Option<String>,
    pub evidence_text: String,
    pub source: PredictionSource,
    pub rule_id: Option<String>,
    pub span: Option<CharSpan>,
}

impl FieldPrediction {
    pub fn no_match(field: RegistryField) -> Self {
        Self {
            field,
            predicted_value: None,
            evidence_text: String::new(),
            source: PredictionSource::None,
            rule_id: None,
            span: None,
        }
    }
}

pub type NotePredictions = BTreeMap<RegistryField, FieldPrediction>;

/// Raw `*_gt` values for one note, keyed by field name without the suffix.
///
/// Keys stay strings so that ground truth for fields outside the configured set
/// can be reported instead of silently ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundTruthRecord {
    pub values: BTreeMap<String, String>,
}

impl GroundTruthRecord {
    pub fn get(&self, field: RegistryField) -> Option<&str> {
        self.values.get(field.as_str()).map(String::as_str)
    }

    pub fn insert(&mut self, field_name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(field_name.into(), value.into());
    }
}

/// A note joined with its predictions and ground truth, ready for scoring.
#[derive(Debug, Clone)]
pub struct NoteRecord {
    pub note: Note,
    pub predictions: NotePredictions,
    pub ground_truth: GroundTruthRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsRow {
    pub field: RegistryField,
    pub total_cases: usize,
    pub correct: usize,
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub precision: Option<f64>,
    #[serde(default)]
    pub recall: Option<f64>,
    #[serde(default)]
    pub f1: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorRecord {
    pub case_id: String,
    pub note_id: String,
    pub note_type: String,
    pub note_date: String,
    pub field: RegistryField,
    pub predicted_canonical: String,
    pub ground_truth_canonical: String,
    pub predicted_raw: String,
    pub ground_truth_raw: String,
    pub evidence_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub generated_at: String,
    pub command: String,
    pub preabstract_path: String,
    pub preabstract_sha256: String,
    pub note_count: usize,
    pub fields: Vec<RegistryField>,
    pub detailed: bool,
    pub excluded_by_field: BTreeMap<String, usize>,
    pub error_count: usize,
    pub metrics_path: String,
    pub errors_path: String,
}

/// One reviewer action on one note. Written once, never updated.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CorrectionRecord {
    #[serde(default)]
    pub case_id: Option<String>,
    #[serde(default)]
    pub note_id: Option<String>,
    #[serde(default)]
    pub note_type: Option<String>,
    #[serde(default)]
    pub note_date: Option<String>,
    #[serde(default)]
    pub source_csv: Option<String>,
    #[serde(default, alias = "reviewed_at")]
    pub reviewed_at_utc: Option<String>,
    #[serde(default)]
    pub predictions_original: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub predictions_edited: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub evidence: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub notes: Option<String>,
}
