pub mod evaluate;
pub mod export_reviews;
pub mod extract;
pub mod gate;
pub mod pipeline;
pub mod review;
pub mod status;


pub const METRICS_FILE: &str = "eval_metrics.csv";
pub const ERRORS_FILE: &str = "eval_errors.csv";
pub const RUN_MANIFEST_FILE: &str = "eval_run_manifest.json";
pub const REVIEW_EXPORT_FILE: &str = "review_corrections_export.csv";
pub const CORRECTION_FILE_PREFIX: &str = "correction_";
