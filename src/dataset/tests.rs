use super::*;

use std::fs;

use tempfile::TempDir;

const NOTES_CSV: &str = "\
case_id,note_id,note_type,note_date,note_text,site_code,primary_site_gt,stage_gt
1,10,pathology,2024-01-15,\"Left breast invasive ductal carcinoma.
ER positive.\",C50,breast,
2,20,consult,2024-02-01,\"Stage IV lung adenocarcinoma, \"\"RUL\"\".\",C34,lung,Stage IV
";

fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("temporary directory should be created")
}

fn write_file(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("fixture file should be written");
    path
}

fn prediction(field: RegistryField, value: &str, evidence: &str) -> FieldPrediction {
    FieldPrediction {
        field,
        predicted_value: Some(value.to_string()),
        evidence_text: evidence.to_string(),
        source: PredictionSource::Pattern,
        rule_id: None,
        span: None,
    }
}

#[test]
fn load_notes_splits_ground_truth_and_keeps_other_columns() {
    let dir = temp_dir();
    let path = write_file(&dir, "notes.csv", NOTES_CSV);

    let table = load_notes(&path).expect("notes table should load");

    assert_eq!(table.rows.len(), 2);
    let first = &table.rows[0];
    assert_eq!(first.note.key(), NoteKey::new("1", "10"));
    assert_eq!(
        first.note.note_text,
        "Left breast invasive ductal carcinoma.\nER positive."
    );
    assert_eq!(first.ground_truth.get(RegistryField::PrimarySite), Some("breast"));
    assert_eq!(
        first.ground_truth.get(RegistryField::Stage),
        Some(""),
        "an empty ground truth cell is still a present column"
    );
    assert_eq!(first.ground_truth.get(RegistryField::ErStatus), None);
    assert_eq!(first.cell(&table.headers, "site_code"), Some("C50"));
    assert_eq!(
        table.rows[1].note.note_text,
        "Stage IV lung adenocarcinoma, \"RUL\"."
    );
    assert!(table.find(&NoteKey::new("2", "20")).is_some());
}

#[test]
fn load_notes_requires_note_columns() {
    let dir = temp_dir();
    let path = write_file(&dir, "notes.csv", "case_id,note_id,note_text\n1,1,text\n");

    let error = load_notes(&path).expect_err("missing columns should fail");

    assert!(
        error.to_string().contains("note_type"),
        "error should name the missing column: {error}"
    );
}

#[test]
fn entity_index_accepts_numeric_ids_and_blank_lines() {
    let dir = temp_dir();
    let path = write_file(
        &dir,
        "entities.jsonl",
        r#"{"case_id": 1, "note_id": 10, "entities": [{"label": "CANCER", "text": "carcinoma", "confidence": 0.91, "start": 29, "end": 38}]}

{"case_id": "2", "note_id": "20", "note_type": "consult", "entities": []}
{"case_id": "3", "note_id": "30"}
"#,
    );

    let index = load_entity_index(&path).expect("entity index should load");

    assert_eq!(index.len(), 3);
    let entities = &index[&NoteKey::new("1", "10")];
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].confidence, Some(0.91));
    assert!(index[&NoteKey::new("2", "20")].is_empty());
    assert!(index[&NoteKey::new("3", "30")].is_empty());
}

#[test]
fn entity_index_keeps_records_with_malformed_entities() {
    let dir = temp_dir();
    let path = write_file(
        &dir,
        "entities.jsonl",
        r#"{"case_id": "C1", "note_id": "N1", "entities": [{"label": "Cancer", "text": "carcinoma", "start": 0, "end": 9}, {"label": "Cancer", "text": "x", "start": null, "end": 3}, {"label": null, "text": "lung", "start": 10, "end": 14}, {"label": "Organ", "text": "lung"}, "not an entity"]}
"#,
    );

    let index = load_entity_index(&path).expect("malformed entities should not fail the record");

    let entities = &index[&NoteKey::new("C1", "N1")];
    assert_eq!(entities.len(), 5);
    assert_eq!(entities[1].start, None);
    assert_eq!(entities[3].end, None);

    let normalized = crate::extraction::normalize_entities("carcinoma lung", entities);
    assert_eq!(normalized.entities.len(), 1);
    assert_eq!(normalized.entities[0].text, "carcinoma");
    assert_eq!(normalized.stats.dropped_malformed, 4);
}

#[test]
fn entity_index_reports_bad_line_number() {
    let dir = temp_dir();
    let path = write_file(
        &dir,
        "entities.jsonl",
        "{\"case_id\": 1, \"note_id\": 1, \"entities\": []}\n{not json}\n",
    );

    let error = load_entity_index(&path).expect_err("malformed line should fail");

    assert!(
        format!("{error:#}").contains("line 2"),
        "error should carry the line number: {error:#}"
    );
}

#[test]
fn json_ids_render_like_csv_cells() {
    assert_eq!(json_id(&serde_json::json!(7)), "7");
    assert_eq!(json_id(&serde_json::json!(" C7 ")), "C7");
    assert_eq!(json_id(&serde_json::Value::Null), "");
}

#[test]
fn preabstract_round_trip_replaces_generated_columns() {
    let dir = temp_dir();
    let notes_path = write_file(&dir, "notes.csv", NOTES_CSV);
    let preabstract_path = dir.path().join("processed").join("preabstract.csv");
    let table = load_notes(&notes_path).expect("notes table should load");

    let mut first = NotePredictions::new();
    first.insert(
        RegistryField::PrimarySite,
        prediction(RegistryField::PrimarySite, "Left breast", "Left breast invasive"),
    );
    let predictions = vec![first, NotePredictions::new()];
    write_preabstract(&preabstract_path, &table, &predictions)
        .expect("pre-abstract should be written");

    let rerun_table = load_notes(&preabstract_path).expect("pre-abstract should load as notes");
    write_preabstract(&preabstract_path, &rerun_table, &predictions)
        .expect("pre-abstract should be rewritten");

    let rewritten = load_notes(&preabstract_path).expect("rewritten pre-abstract should load");
    let pred_columns = rewritten
        .headers
        .iter()
        .filter(|header| header.as_str() == "primary_site_pred")
        .count();
    assert_eq!(pred_columns, 1, "generated columns should not be duplicated");
    assert_eq!(rewritten.headers.len(), 8 + RegistryField::ALL.len() * 3);

    let records = load_preabstract(&preabstract_path).expect("pre-abstract should load");
    assert_eq!(records.len(), 2);
    let site = &records[0].predictions[&RegistryField::PrimarySite];
    assert_eq!(site.predicted_value.as_deref(), Some("Left breast"));
    assert_eq!(site.evidence_text, "Left breast invasive");
    assert_eq!(site.source, PredictionSource::Pattern);
    let stage = &records[1].predictions[&RegistryField::Stage];
    assert_eq!(stage.predicted_value, None);
    assert_eq!(stage.source, PredictionSource::None);
    assert_eq!(records[1].ground_truth.get(RegistryField::Stage), Some("Stage IV"));
}

#[test]
fn preabstract_rejects_mismatched_prediction_count() {
    let dir = temp_dir();
    let notes_path = write_file(&dir, "notes.csv", NOTES_CSV);
    let table = load_notes(&notes_path).expect("notes table should load");

    let result = write_preabstract(&dir.path().join("out.csv"), &table, &[]);

    assert!(result.is_err());
}

#[test]
fn metrics_csv_round_trips_undefined_values() {
    let dir = temp_dir();
    let path = dir.path().join("eval_metrics.csv");
    let rows = vec![
        MetricsRow {
            field: RegistryField::PrimarySite,
            total_cases: 3,
            correct: 2,
            accuracy: Some(2.0 / 3.0),
            precision: None,
            recall: None,
            f1: None,
        },
        MetricsRow {
            field: RegistryField::Stage,
            total_cases: 0,
            correct: 0,
            accuracy: None,
            precision: None,
            recall: None,
            f1: None,
        },
    ];

    write_metrics_csv(&path, &rows).expect("metrics should be written");
    let contents = fs::read_to_string(&path).expect("metrics file should be readable");
    assert!(contents.starts_with("field,total_cases,correct,accuracy,precision,recall,f1\n"));
    assert!(contents.contains("primary_site,3,2,0.667,,,\n"));
    assert!(contents.contains("stage,0,0,,,,\n"));

    let loaded = load_metrics_csv(&path).expect("metrics should load");
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].accuracy, Some(0.667));
    assert_eq!(loaded[1].accuracy, None);
}

#[test]
fn errors_csv_always_has_header() {
    let dir = temp_dir();
    let path = dir.path().join("eval_errors.csv");

    write_errors_csv(&path, &[]).expect("empty error report should be written");

    let contents = fs::read_to_string(&path).expect("error report should be readable");
    assert_eq!(contents.trim_end(), ERROR_COLUMNS.join(","));
}

#[test]
fn metrics_table_renders_aligned_columns() {
    let rows = vec![MetricsRow {
        field: RegistryField::Her2Status,
        total_cases: 3,
        correct: 3,
        accuracy: Some(1.0),
        precision: None,
        recall: None,
        f1: None,
    }];

    let rendered = render_metrics_table(&rows);
    let lines = rendered.lines().collect::<Vec<_>>();

    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("field"));
    assert!(!lines[0].contains("f1"), "plain mode should omit detailed columns");
    assert!(lines[1].starts_with("her2_status"));
    assert!(lines[1].ends_with("1.000"));
}

#[test]
fn review_export_orders_newest_first() {
    let dir = temp_dir();
    let path = dir.path().join("review").join("review_corrections_export.csv");
    let row = |file: &str, reviewed_at: &str, case_id: &str| {
        let mut record = CorrectionRecord {
            case_id: Some(case_id.to_string()),
            ..CorrectionRecord::default()
        };
        record
            .predictions_edited
            .insert("stage".to_string(), Some("IIA".to_string()));
        ReviewExportRow {
            file: file.to_string(),
            reviewed_at_utc: reviewed_at.to_string(),
            record,
        }
    };
    let mut rows = vec![
        row("a.json", "2024-03-01T10:00:00Z", "old"),
        row("b.json", "not a timestamp", "undated"),
        row("c.json", "2024-03-05T08:30:00", "newest"),
        row("d.json", "2024-03-02T09:00:00+00:00", "middle"),
    ];

    write_review_export(&path, &mut rows).expect("review export should be written");

    let order = rows
        .iter()
        .map(|row| row.record.case_id.clone().unwrap_or_default())
        .collect::<Vec<_>>();
    assert_eq!(order, vec!["newest", "middle", "old", "undated"]);

    let mut reader = csv::Reader::from_path(&path).expect("export should be readable");
    let headers = reader.headers().expect("export should have a header").clone();
    assert_eq!(headers.len(), 8 + RegistryField::ALL.len() * 3);
    let stage_column = headers
        .iter()
        .position(|header| header == "edit_stage")
        .expect("edit_stage column should exist");
    let first = reader
        .records()
        .next()
        .expect("export should have rows")
        .expect("first row should parse");
    assert_eq!(&first[0], "c.json");
    assert_eq!(&first[stage_column], "IIA");
}
