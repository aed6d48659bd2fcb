use super::*;

fn generated_columns() -> Vec<String> {
    RegistryField::ALL
        .into_iter()
        .flat_map(|field| {
            [
                field.pred_column(),
                field.evidence_column(),
                field.source_column(),
            ]
        })
        .collect()
}

/// Writes the pre-abstract table: every input column, then `_pred`,
/// `_evidence` and `_source` per field. Generated columns already present in
/// the input (a re-run over a previous pre-abstract) are replaced.
pub fn write_preabstract(
    path: &Path,
    table: &NoteTable,
    predictions: &[NotePredictions],
) -> Result<()> {
    if table.rows.len() != predictions.len() {
        bail!(
            "pre-abstract has {} note rows but {} prediction sets",
            table.rows.len(),
            predictions.len()
        );
    }

    let generated = generated_columns();
    let kept = table
        .headers
        .iter()
        .enumerate()
        .filter(|(_, header)| !generated.contains(header))
        .map(|(index, _)| index)
        .collect::<Vec<usize>>();

    let mut writer = create_csv_writer(path)?;
    let header = kept
        .iter()
        .map(|index| table.headers[*index].clone())
        .chain(generated.iter().cloned())
        .collect::<Vec<String>>();
    writer
        .write_record(&header)
        .with_context(|| format!("failed to write header: {}", path.display()))?;

    for (row, note_predictions) in table.rows.iter().zip(predictions) {
        let mut record = kept
            .iter()
            .map(|index| row.cells.get(*index).cloned().unwrap_or_default())
            .collect::<Vec<String>>();

        for field in RegistryField::ALL {
            let prediction = note_predictions
                .get(&field)
                .cloned()
                .unwrap_or_else(|| FieldPrediction::no_match(field));
            record.push(prediction.predicted_value.unwrap_or_default());
            record.push(prediction.evidence_text);
            record.push(prediction.source.as_str().to_string());
        }

        writer.write_record(&record).with_context(|| {
            format!("failed to write row for note {}", row.note.key())
        })?;
    }

    writer
        .flush()
        .with_context(|| format!("failed to flush csv file: {}", path.display()))?;

    info!(path = %path.display(), rows = table.rows.len(), "wrote pre-abstract table");
    Ok(())
}

/// Reads a pre-abstract table back into scorable records. Fields without a
/// `_pred` column carry no prediction and score as `unknown`.
pub fn load_preabstract(path: &Path) -> Result<Vec<NoteRecord>> {
    let NoteTable { headers, rows } = load_notes(path)?;

    let missing_pred_columns = RegistryField::ALL
        .into_iter()
        .filter(|field| header_index(&headers, &field.pred_column()).is_none())
        .map(RegistryField::as_str)
        .collect::<Vec<&str>>();
    if !missing_pred_columns.is_empty() {
        warn!(
            path = %path.display(),
            fields = %missing_pred_columns.join(","),
            "pre-abstract is missing prediction columns"
        );
    }

    let records = rows
        .into_iter()
        .map(|row| {
            let mut predictions = NotePredictions::new();
            for field in RegistryField::ALL {
                let Some(raw_value) = row.cell(&headers, &field.pred_column()) else {
                    continue;
                };
                let predicted_value = Some(raw_value.trim())
                    .filter(|value| !value.is_empty())
                    .map(ToOwned::to_owned);
                let source = PredictionSource::from_cell(
                    row.cell(&headers, &field.source_column()),
                    predicted_value.is_some(),
                );

                predictions.insert(
                    field,
                    FieldPrediction {
                        field,
                        predicted_value,
                        evidence_text: row
                            .cell(&headers, &field.evidence_column())
                            .unwrap_or_default()
                            .to_string(),
                        source,
                        rule_id: None,
                        span: None,
                    },
                );
            }

            NoteRecord {
                note: row.note,
                predictions,
                ground_truth: row.ground_truth,
            }
        })
        .collect();

    Ok(records)
}
