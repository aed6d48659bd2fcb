use super::*;

/// Maps one note onto the registry fields using a shared [`PatternLibrary`].
///
/// Pure and deterministic: for every field the rules are tried in priority
/// order and the first hit is the prediction. Later rules are never consulted
/// once one has matched, and candidates are not merged.
#[derive(Debug, Clone, Copy)]
pub struct FieldMapper<'a> {
    library: &'a PatternLibrary,
}

impl<'a> FieldMapper<'a> {
    pub fn new(library: &'a PatternLibrary) -> Self {
        Self { library }
    }

    pub fn map(&self, note_text: &str, raw_entities: &[RawEntity]) -> NotePredictions {
        let normalized = normalize_entities(note_text, raw_entities);
        self.map_normalized(note_text, &normalized.entities)
    }

    pub fn map_normalized(&self, note_text: &str, entities: &[Entity]) -> NotePredictions {
        RegistryField::ALL
            .into_iter()
            .map(|field| (field, self.map_field(field, note_text, entities)))
            .collect()
    }

    pub fn map_field(
        &self,
        field: RegistryField,
        note_text: &str,
        entities: &[Entity],
    ) -> FieldPrediction {
        for rule in self.library.rules_for(field) {
            let Some(hit) = rule.apply(note_text, entities) else {
                continue;
            };

            let value = rule
                .canonical_hint
                .map(ToOwned::to_owned)
                .unwrap_or(hit.value);

            return FieldPrediction {
                field,
                predicted_value: Some(value),
                evidence_text: build_evidence_snippet(note_text, hit.span),
                source: hit.source,
                rule_id: Some(rule.id.to_string()),
                span: Some(hit.span),
            };
        }

        FieldPrediction::no_match(field)
    }
}
