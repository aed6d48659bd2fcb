use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::extraction::{
    STAGE_ABBREVIATION, STAGE_DECLARATION, STAGE_SIGNAL, TNM_TRIPLET, collapse_whitespace,
};
use crate::model::{
    ErrorRecord, MetricsRow, NoteKey, NoteRecord, RegistryField, UnknownFieldError,
};

mod availability;
mod canonical;
mod evaluator;
mod gate;
mod metrics;

pub use self::availability::AvailabilityDetector;
pub use self::canonical::{
    CanonicalValue, Canonicalizer, Histology, PrimarySite, ReceptorStatus, StageGroup,
};
pub use self::evaluator::{
    Evaluation, EvaluationConfig, EvaluationError, Evaluator, ScoringDecision,
};
pub use self::gate::{GateConfig, GateError, GateOutcome, GateReport, check_thresholds};
pub use self::metrics::{ratio, round_metric};

use self::metrics::FieldTally;
