use std::collections::HashSet;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::model::{
    CharSpan, FieldPrediction, NotePredictions, PredictionSource, RawEntity, RegistryField,
};

mod entities;
mod evidence;
mod mapper;
mod patterns;
#[cfg(test)]
mod tests;

pub use self::entities::{
    Entity, EntityCleanupStats, EntityLabel, NormalizedEntities, normalize_entities,
};
pub use self::evidence::{EVIDENCE_MAX_CHARS, build_evidence_snippet, collapse_whitespace};
pub use self::mapper::FieldMapper;
pub use self::patterns::{
    EntityEmit, FieldRule, PatternEmit, PatternLibrary, PatternLibraryError, RuleKind,
    RuleMatch, RuleMatcher, STAGE_ABBREVIATION, STAGE_DECLARATION, STAGE_SIGNAL, StatusWindow,
    TNM_TRIPLET,
};

use self::evidence::{byte_to_char_offset, char_len, slice_chars};
