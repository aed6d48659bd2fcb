use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::model::RegistryField;

#[derive(Parser, Debug)]
#[command(
    name = "registry-abstractor",
    version,
    about = "Cancer registry field extraction and evaluation for clinical notes"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Map notes and NER entities to a pre-abstract table with evidence.
    Extract(ExtractArgs),
    /// Score a pre-abstract table against its ground truth columns.
    Evaluate(EvaluateArgs),
    /// Fail when a field's accuracy is below its threshold.
    Gate(GateArgs),
    /// Extract, evaluate and optionally gate in one run.
    Pipeline(PipelineArgs),
    /// Record one reviewer correction for a note.
    Review(ReviewArgs),
    /// Flatten correction records into a CSV export.
    ExportReviews(ExportReviewsArgs),
    /// Show the last evaluation run and the review records on disk.
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    #[arg(long, default_value = "data/raw/synthetic_oncology_notes.csv")]
    pub notes_path: PathBuf,

    #[arg(long, default_value = "outputs/ner_entities.jsonl")]
    pub entities_path: PathBuf,

    #[arg(long, default_value = "data/processed/preabstract_with_evidence.csv")]
    pub output_path: PathBuf,

    /// Map from note text alone when the entity file does not exist.
    #[arg(long, default_value_t = false)]
    pub allow_missing_entities: bool,
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[arg(long, default_value = "data/processed/preabstract_with_evidence.csv")]
    pub preabstract_path: PathBuf,

    #[arg(long, default_value = "outputs/evaluation")]
    pub output_dir: PathBuf,

    /// Restrict scoring to these fields. Defaults to all six.
    #[arg(long = "field")]
    pub fields: Vec<RegistryField>,

    /// Also report macro precision, recall and F1.
    #[arg(long, default_value_t = false)]
    pub detailed: bool,
}

#[derive(Args, Debug, Clone)]
pub struct GateArgs {
    #[arg(long, default_value = "outputs/evaluation/eval_metrics.csv")]
    pub metrics_path: PathBuf,

    /// JSON file with `{"thresholds": {"<field>": <min accuracy>}}`.
    #[arg(long)]
    pub thresholds_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    #[arg(long, default_value = "data/raw/synthetic_oncology_notes.csv")]
    pub notes_path: PathBuf,

    #[arg(long, default_value = "outputs/ner_entities.jsonl")]
    pub entities_path: PathBuf,

    #[arg(long, default_value = "data/processed/preabstract_with_evidence.csv")]
    pub preabstract_path: PathBuf,

    #[arg(long, default_value = "outputs/evaluation")]
    pub output_dir: PathBuf,

    #[arg(long, default_value_t = false)]
    pub allow_missing_entities: bool,

    #[arg(long = "field")]
    pub fields: Vec<RegistryField>,

    #[arg(long, default_value_t = false)]
    pub detailed: bool,

    /// Run the regression gate after evaluation.
    #[arg(long, default_value_t = false)]
    pub gate: bool,

    #[arg(long)]
    pub thresholds_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ReviewArgs {
    #[arg(long, default_value = "data/processed/preabstract_with_evidence.csv")]
    pub preabstract_path: PathBuf,

    #[arg(long, default_value = "outputs/review")]
    pub review_dir: PathBuf,

    #[arg(long)]
    pub case_id: String,

    #[arg(long)]
    pub note_id: String,

    /// Corrected value, repeatable: `--set stage=IIA`.
    #[arg(long = "set", value_name = "FIELD=VALUE")]
    pub edits: Vec<String>,

    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ExportReviewsArgs {
    #[arg(long, default_value = "outputs/review")]
    pub review_dir: PathBuf,

    #[arg(long)]
    pub output_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = "outputs/evaluation")]
    pub output_dir: PathBuf,

    #[arg(long, default_value = "outputs/review")]
    pub review_dir: PathBuf,
}
