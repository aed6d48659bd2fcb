use super::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationConfig {
    pub fields: Vec<RegistryField>,
    /// Also compute macro precision, recall and F1.
    pub detailed: bool,
}

impl EvaluationConfig {
    pub fn all_fields(detailed: bool) -> Self {
        Self {
            fields: RegistryField::ALL.to_vec(),
            detailed,
        }
    }

    pub fn validate(&self) -> Result<(), EvaluationError> {
        if self.fields.is_empty() {
            return Err(EvaluationError::EmptyFieldSet);
        }
        let mut seen = BTreeSet::new();
        for field in &self.fields {
            if !seen.insert(*field) {
                return Err(EvaluationError::DuplicateField(*field));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("evaluation field set is empty")]
    EmptyFieldSet,
    #[error("field {0} is listed more than once in the evaluation field set")]
    DuplicateField(RegistryField),
    #[error("missing metric for field `{field}`: {detail}")]
    MissingMetricField { field: String, detail: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringDecision {
    pub key: NoteKey,
    pub field: RegistryField,
    pub scored: bool,
    /// Meaningful only when `scored`.
    pub correct: bool,
    pub predicted: CanonicalValue,
    pub ground_truth: CanonicalValue,
}

#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub metrics: Vec<MetricsRow>,
    pub errors: Vec<ErrorRecord>,
    pub decisions: Vec<ScoringDecision>,
    pub excluded_by_field: BTreeMap<RegistryField, usize>,
}

impl Evaluation {
    pub fn metric(&self, field: RegistryField) -> Option<&MetricsRow> {
        self.metrics.iter().find(|row| row.field == field)
    }
}

/// Joins predictions with ground truth and scores them field by field.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
    canonicalizer: &'a Canonicalizer,
    availability: &'a AvailabilityDetector,
}

impl<'a> Evaluator<'a> {
    pub fn new(canonicalizer: &'a Canonicalizer, availability: &'a AvailabilityDetector) -> Self {
        Self {
            canonicalizer,
            availability,
        }
    }

    pub fn evaluate(
        &self,
        records: &[NoteRecord],
        config: &EvaluationConfig,
    ) -> Result<Evaluation, EvaluationError> {
        config.validate()?;
        check_field_coverage(records, &config.fields)?;

        let mut tallies = config
            .fields
            .iter()
            .map(|field| (*field, FieldTally::default()))
            .collect::<BTreeMap<RegistryField, FieldTally>>();
        let mut errors = Vec::new();
        let mut decisions = Vec::with_capacity(records.len() * config.fields.len());

        for record in records {
            let note = &record.note;
            for field in &config.fields {
                let field = *field;
                let prediction = record.predictions.get(&field);
                let predicted_raw = prediction.and_then(|p| p.predicted_value.as_deref());
                let ground_truth_raw = record.ground_truth.get(field);

                let predicted = self.canonicalizer.canonicalize(field, predicted_raw);
                let ground_truth = self.canonicalizer.canonicalize(field, ground_truth_raw);
                let Some(tally) = tallies.get_mut(&field) else {
                    continue;
                };

                if !self.availability.is_scorable(field, &note.note_text) {
                    debug!(note = %note.key(), %field, "field not scorable for note");
                    tally.exclude();
                    decisions.push(ScoringDecision {
                        key: note.key(),
                        field,
                        scored: false,
                        correct: false,
                        predicted,
                        ground_truth,
                    });
                    continue;
                }

                tally.record(predicted, ground_truth);
                let correct = predicted == ground_truth;
                if !correct {
                    errors.push(ErrorRecord {
                        case_id: note.case_id.clone(),
                        note_id: note.note_id.clone(),
                        note_type: note.note_type.clone(),
                        note_date: note.note_date.clone(),
                        field,
                        predicted_canonical: predicted.as_str().to_string(),
                        ground_truth_canonical: ground_truth.as_str().to_string(),
                        predicted_raw: predicted_raw.unwrap_or_default().to_string(),
                        ground_truth_raw: ground_truth_raw.unwrap_or_default().to_string(),
                        evidence_text: prediction
                            .map(|p| p.evidence_text.clone())
                            .unwrap_or_default(),
                    });
                }
                decisions.push(ScoringDecision {
                    key: note.key(),
                    field,
                    scored: true,
                    correct,
                    predicted,
                    ground_truth,
                });
            }
        }

        let metrics = config
            .fields
            .iter()
            .filter_map(|field| {
                tallies
                    .get(field)
                    .map(|tally| tally.to_row(*field, config.detailed))
            })
            .collect();
        let excluded_by_field = tallies
            .iter()
            .map(|(field, tally)| (*field, tally.excluded))
            .collect();

        Ok(Evaluation {
            metrics,
            errors,
            decisions,
            excluded_by_field,
        })
    }
}

/// Ground truth and the configured field set must agree: a `_gt` field outside
/// the set, or a configured field with no ground truth anywhere, means the
/// field set is misconfigured. An empty dataset has nothing to disagree with.
fn check_field_coverage(
    records: &[NoteRecord],
    fields: &[RegistryField],
) -> Result<(), EvaluationError> {
    if records.is_empty() {
        return Ok(());
    }

    let present = records
        .iter()
        .flat_map(|record| record.ground_truth.values.keys())
        .map(String::as_str)
        .collect::<BTreeSet<&str>>();

    for name in &present {
        let configured = name
            .parse::<RegistryField>()
            .map(|field| fields.contains(&field))
            .unwrap_or(false);
        if !configured {
            return Err(EvaluationError::MissingMetricField {
                field: (*name).to_string(),
                detail: "ground truth is present but the field is not in the configured field set",
            });
        }
    }

    for field in fields {
        if !present.contains(field.as_str()) {
            return Err(EvaluationError::MissingMetricField {
                field: field.as_str().to_string(),
                detail: "configured field has no ground truth column",
            });
        }
    }

    Ok(())
}
