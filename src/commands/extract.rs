use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::cli::ExtractArgs;
use crate::dataset::{EntityIndex, load_entity_index, load_notes, write_preabstract};
use crate::extraction::{FieldMapper, PatternLibrary, normalize_entities};
use crate::model::RegistryField;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub notes: usize,
    pub notes_without_entities: usize,
    pub dropped_entities: usize,
    pub merged_entities: usize,
    pub matched_by_field: BTreeMap<RegistryField, usize>,
}

pub fn run(args: ExtractArgs) -> Result<()> {
    extract_preabstract(
        &args.notes_path,
        &args.entities_path,
        &args.output_path,
        args.allow_missing_entities,
    )?;
    Ok(())
}

/// Maps every note in `notes_path` and writes the pre-abstract table.
pub fn extract_preabstract(
    notes_path: &Path,
    entities_path: &Path,
    output_path: &Path,
    allow_missing_entities: bool,
) -> Result<ExtractSummary> {
    let library = PatternLibrary::builtin().context("failed to build pattern library")?;
    let mapper = FieldMapper::new(&library);
    info!(rules = library.len(), "pattern library ready");

    let table = load_notes(notes_path)?;
    let entity_index = if entities_path.exists() {
        load_entity_index(entities_path)?
    } else if allow_missing_entities {
        warn!(
            path = %entities_path.display(),
            "entity file missing; mapping from note text only"
        );
        EntityIndex::new()
    } else {
        bail!(
            "entity file not found: {} (pass --allow-missing-entities to map from note text only)",
            entities_path.display()
        );
    };

    let mut summary = ExtractSummary {
        notes: table.rows.len(),
        ..ExtractSummary::default()
    };
    let mut predictions = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let note = &row.note;
        let raw_entities = entity_index.get(&note.key());
        if raw_entities.is_none() {
            summary.notes_without_entities += 1;
        }

        let normalized = normalize_entities(
            &note.note_text,
            raw_entities.map(Vec::as_slice).unwrap_or_default(),
        );
        summary.dropped_entities += normalized.stats.dropped_malformed;
        summary.merged_entities += normalized.stats.merged_overlaps;

        let note_predictions = mapper.map_normalized(&note.note_text, &normalized.entities);
        for prediction in note_predictions.values() {
            if prediction.predicted_value.is_some() {
                *summary.matched_by_field.entry(prediction.field).or_default() += 1;
            }
        }
        predictions.push(note_predictions);
    }

    if summary.notes_without_entities > 0 && !entity_index.is_empty() {
        warn!(
            notes = summary.notes_without_entities,
            "notes without an entity record were mapped from text only"
        );
    }

    write_preabstract(output_path, &table, &predictions)?;

    for field in RegistryField::ALL {
        info!(
            %field,
            matched = summary.matched_by_field.get(&field).copied().unwrap_or(0),
            notes = summary.notes,
            "field coverage"
        );
    }
    info!(
        notes = summary.notes,
        dropped_entities = summary.dropped_entities,
        merged_entities = summary.merged_entities,
        output = %output_path.display(),
        "extraction completed"
    );

    Ok(summary)
}
