use super::*;

pub type EntityIndex = HashMap<NoteKey, Vec<RawEntity>>;

/// Renders a JSON id the way it appears in a CSV cell: strings as-is, numbers
/// in their shortest form.
pub fn json_id(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.trim().to_string(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Loads NER output, one JSON object per line, keyed by note identity.
///
/// Blank lines are skipped. A later record for the same note replaces the
/// earlier one.
pub fn load_entity_index(path: &Path) -> Result<EntityIndex> {
    let file = File::open(path)
        .with_context(|| format!("failed to open entity file: {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut index = EntityIndex::new();
    let mut entity_count = 0_usize;
    for (line_index, line) in reader.lines().enumerate() {
        let line_number = line_index + 1;
        let line = line.with_context(|| {
            format!("failed to read line {line_number} of {}", path.display())
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let record: EntityRecord = serde_json::from_str(&line).with_context(|| {
            format!(
                "failed to parse entity record on line {line_number} of {}",
                path.display()
            )
        })?;
        let key = NoteKey::new(json_id(&record.case_id), json_id(&record.note_id));

        entity_count += record.entities.len();
        if let Some(previous) = index.insert(key.clone(), record.entities) {
            warn!(
                note = %key,
                line = line_number,
                replaced_entities = previous.len(),
                "duplicate entity record; keeping the later one"
            );
        }
    }

    info!(
        path = %path.display(),
        notes = index.len(),
        entities = entity_count,
        "loaded entity index"
    );

    Ok(index)
}
