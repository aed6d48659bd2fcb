use super::*;

fn raw(label: &str, text: &str, start: i64, end: i64, confidence: Option<f64>) -> RawEntity {
    RawEntity {
        label: label.to_string(),
        text: text.to_string(),
        confidence,
        start: Some(start),
        end: Some(end),
    }
}

/// Character span of the first occurrence of `needle`. Test notes are ASCII.
fn span_of(text: &str, needle: &str) -> (i64, i64) {
    let start = text.find(needle).expect("needle should occur in test note");
    (start as i64, (start + needle.len()) as i64)
}

fn builtin_library() -> PatternLibrary {
    PatternLibrary::builtin().expect("builtin pattern library should compile")
}

fn predicted(predictions: &NotePredictions, field: RegistryField) -> Option<&str> {
    predictions
        .get(&field)
        .expect("every field should have a prediction")
        .predicted_value
        .as_deref()
}

#[test]
fn normalize_drops_malformed_entities() {
    let note = "Invasive ductal carcinoma of the left breast.";
    let (start, end) = span_of(note, "left breast");
    let entities = vec![
        raw("", "breast", start, end, None),
        raw("ORGAN", "breast", end, start, None),
        raw("ORGAN", "breast", -1, 4, None),
        raw("ORGAN", "breast", start, 1_000, None),
        raw("ORGAN", "left breast", start, end, Some(0.8)),
    ];

    let normalized = normalize_entities(note, &entities);

    assert_eq!(normalized.stats.input_count, 5);
    assert_eq!(normalized.stats.dropped_malformed, 4);
    assert_eq!(normalized.stats.kept_count, 1);
    assert_eq!(normalized.entities[0].label, EntityLabel::Organ);
    assert_eq!(normalized.entities[0].text, "left breast");
}

#[test]
fn normalize_drops_entities_without_offsets() {
    let note = "Adenocarcinoma of the sigmoid colon.";
    let (start, end) = span_of(note, "sigmoid colon");
    let entities = vec![
        RawEntity {
            label: "Cancer".to_string(),
            text: "Adenocarcinoma".to_string(),
            end: Some(14),
            ..RawEntity::default()
        },
        RawEntity::default(),
        raw("Organ", "sigmoid colon", start, end, None),
    ];

    let normalized = normalize_entities(note, &entities);

    assert_eq!(normalized.stats.dropped_malformed, 2);
    assert_eq!(normalized.entities.len(), 1);
    assert_eq!(normalized.entities[0].text, "sigmoid colon");
}

#[test]
fn normalize_merges_same_label_overlaps_into_widest_span() {
    let note = "Biopsy: invasive ductal carcinoma, grade 2.";
    let (first_start, first_end) = span_of(note, "invasive ductal");
    let (second_start, second_end) = span_of(note, "ductal carcinoma");
    let entities = vec![
        raw("Cancer", "invasive ductal", first_start, first_end, Some(0.7)),
        raw("cancer", "ductal carcinoma", second_start, second_end, Some(0.9)),
        raw("Organ", "ductal", second_start, second_start + 6, Some(0.4)),
    ];

    let normalized = normalize_entities(note, &entities);

    assert_eq!(normalized.stats.merged_overlaps, 1);
    let cancers = normalized
        .entities
        .iter()
        .filter(|entity| entity.label == EntityLabel::Cancer)
        .collect::<Vec<_>>();
    assert_eq!(cancers.len(), 1, "overlapping cancer spans should merge");
    assert_eq!(cancers[0].text, "invasive ductal carcinoma");
    assert_eq!(cancers[0].span.start, first_start as usize);
    assert_eq!(cancers[0].span.end, second_end as usize);
    assert_eq!(cancers[0].confidence, 0.9);
    assert!(
        normalized
            .entities
            .iter()
            .any(|entity| entity.label == EntityLabel::Organ),
        "entities with different labels should not merge"
    );
}

#[test]
fn normalize_fills_missing_text_from_note() {
    let note = "Left breast mass.";
    let normalized = normalize_entities(note, &[raw("organ", "", 0, 11, None)]);

    assert_eq!(normalized.entities[0].text, "Left breast");
    assert_eq!(normalized.entities[0].confidence, 0.0);
}

#[test]
fn normalize_accepts_empty_entity_list() {
    let normalized = normalize_entities("Stage IV lung adenocarcinoma.", &[]);
    assert!(normalized.entities.is_empty());
    assert_eq!(normalized.stats, EntityCleanupStats::default());
}

#[test]
fn label_synonyms_fold_to_internal_vocabulary() {
    assert_eq!(EntityLabel::from_raw(" TUMOR "), Some(EntityLabel::Cancer));
    assert_eq!(
        EntityLabel::from_raw("Anatomical Site"),
        Some(EntityLabel::Organ)
    );
    assert_eq!(
        EntityLabel::from_raw("gene-or-gene-product"),
        Some(EntityLabel::Biomarker)
    );
    assert_eq!(EntityLabel::from_raw("DRUG"), Some(EntityLabel::Other));
    assert_eq!(EntityLabel::from_raw("   "), None);
}

#[test]
fn evidence_snippet_is_bounded_substring_of_normalized_note() {
    let filler = "The patient tolerated the procedure well and was observed overnight. ";
    let note = format!(
        "{}Final diagnosis:\n  invasive   ductal carcinoma.\n{}",
        filler.repeat(3),
        filler.repeat(3)
    );
    let start = note.find("invasive").expect("diagnosis should be present");
    let span = CharSpan {
        start,
        end: start + "invasive   ductal carcinoma".len(),
    };

    let snippet = build_evidence_snippet(&note, span);

    assert!(snippet.chars().count() <= EVIDENCE_MAX_CHARS);
    assert!(snippet.contains("invasive ductal carcinoma"));
    assert!(!snippet.contains('\n'));
    assert!(
        collapse_whitespace(&note).contains(snippet.trim_end_matches("...")),
        "snippet should be a substring of the whitespace-normalized note: {snippet}"
    );
}

#[test]
fn evidence_snippet_truncates_long_windows() {
    let note = format!("{} ER positive {}", "word ".repeat(60), "word ".repeat(60));
    let start = note.find("ER").expect("marker should be present");
    let snippet = build_evidence_snippet(
        &note,
        CharSpan {
            start,
            end: start + 150,
        },
    );

    assert!(snippet.chars().count() <= EVIDENCE_MAX_CHARS);
    assert!(snippet.ends_with("..."), "long windows should be truncated: {snippet}");
}

#[test]
fn evidence_snippet_clamps_out_of_range_spans() {
    assert_eq!(
        build_evidence_snippet("short note", CharSpan { start: 50, end: 80 }),
        "short note"
    );
    assert_eq!(
        build_evidence_snippet("short note", CharSpan { start: 6, end: 2 }),
        "short note"
    );
    assert_eq!(
        build_evidence_snippet("", CharSpan { start: 0, end: 3 }),
        ""
    );
}

#[test]
fn pattern_spans_are_character_offsets() {
    let library = builtin_library();
    let mapper = FieldMapper::new(&library);
    let note = "Patiënt: invasive ductal carcinoma, ER+.";

    let predictions = mapper.map(note, &[]);
    let histology = &predictions[&RegistryField::Histology];

    assert_eq!(
        histology.span,
        Some(CharSpan { start: 9, end: 34 }),
        "span should count the accented character once"
    );
    assert_eq!(predicted(&predictions, RegistryField::ErStatus), Some("positive"));
}

#[test]
fn specific_histology_rule_beats_generic_carcinoma() {
    let library = builtin_library();
    let mapper = FieldMapper::new(&library);
    let note = "Core biopsy shows invasive ductal carcinoma. Re-excision margin with residual carcinoma.";

    let predictions = mapper.map(note, &[]);
    let histology = &predictions[&RegistryField::Histology];

    assert_eq!(
        histology.predicted_value.as_deref(),
        Some("invasive ductal carcinoma")
    );
    assert_eq!(histology.rule_id.as_deref(), Some("histology-invasive-ductal"));
    assert_eq!(histology.source, PredictionSource::Pattern);
}

#[test]
fn biomarker_status_stays_unmatched_without_status_token() {
    let library = builtin_library();
    let mapper = FieldMapper::new(&library);
    let note = "ER positive, PR negative, HER2 status not assessed.";

    let predictions = mapper.map(note, &[]);

    assert_eq!(predicted(&predictions, RegistryField::ErStatus), Some("positive"));
    assert_eq!(predicted(&predictions, RegistryField::PrStatus), Some("negative"));
    assert_eq!(
        predicted(&predictions, RegistryField::Her2Status),
        None,
        "HER2 should not default to negative"
    );
    let her2 = &predictions[&RegistryField::Her2Status];
    assert_eq!(her2.source, PredictionSource::None);
    assert!(her2.evidence_text.is_empty());
}

#[test]
fn biomarker_symbols_and_later_mentions() {
    let library = builtin_library();
    let mapper = FieldMapper::new(&library);
    let note = "Receptors: ER+, PR (-). HER2 pending. Addendum: HER2/neu negative by FISH.";

    let predictions = mapper.map(note, &[]);

    assert_eq!(predicted(&predictions, RegistryField::ErStatus), Some("positive"));
    assert_eq!(predicted(&predictions, RegistryField::PrStatus), Some("negative"));
    assert_eq!(predicted(&predictions, RegistryField::Her2Status), Some("negative"));
    assert!(
        predictions[&RegistryField::Her2Status]
            .evidence_text
            .contains("HER2/neu negative")
    );
}

#[test]
fn biomarker_symbols_separated_by_slashes() {
    let library = builtin_library();
    let mapper = FieldMapper::new(&library);

    let predictions = mapper.map("Breast core biopsy: ER+/PR+/HER2-.", &[]);

    assert_eq!(predicted(&predictions, RegistryField::ErStatus), Some("positive"));
    assert_eq!(predicted(&predictions, RegistryField::PrStatus), Some("positive"));
    assert_eq!(predicted(&predictions, RegistryField::Her2Status), Some("negative"));
}

#[test]
fn biomarker_status_is_shared_by_joined_markers() {
    let library = builtin_library();
    let mapper = FieldMapper::new(&library);

    for (note, er, pr) in [
        ("ER/PR positive, HER2 negative.", "positive", "positive"),
        ("ER and PR negative.", "negative", "negative"),
        ("ER/PR+ on core biopsy.", "positive", "positive"),
    ] {
        let predictions = mapper.map(note, &[]);
        assert_eq!(
            predicted(&predictions, RegistryField::ErStatus),
            Some(er),
            "unexpected ER status for {note:?}"
        );
        assert_eq!(
            predicted(&predictions, RegistryField::PrStatus),
            Some(pr),
            "unexpected PR status for {note:?}"
        );
    }

    let predictions = mapper.map("ER/PR positive, HER2 negative.", &[]);
    assert_eq!(predicted(&predictions, RegistryField::Her2Status), Some("negative"));
    assert!(
        predictions[&RegistryField::ErStatus]
            .evidence_text
            .contains("ER/PR positive")
    );
}

#[test]
fn stage_declarations_emit_compact_codes() {
    let library = builtin_library();
    let mapper = FieldMapper::new(&library);

    for (note, expected) in [
        ("Clinical Stage IIA disease.", "IIA"),
        ("Summary stage: ii a per tumor board.", "IIA"),
        ("Metastatic lung adenocarcinoma, Stage IV.", "IV"),
        ("Stage 3 colon cancer.", "3"),
    ] {
        let predictions = mapper.map(note, &[]);
        assert_eq!(
            predicted(&predictions, RegistryField::Stage),
            Some(expected),
            "unexpected stage for {note:?}"
        );
    }
}

#[test]
fn tnm_triplet_is_kept_raw() {
    let library = builtin_library();
    let mapper = FieldMapper::new(&library);
    let note = "Sigmoid colon adenocarcinoma, pT3N0M0, margins negative.";

    let predictions = mapper.map(note, &[]);
    let stage = &predictions[&RegistryField::Stage];

    assert_eq!(stage.predicted_value.as_deref(), Some("pT3N0M0"));
    assert_eq!(stage.rule_id.as_deref(), Some("stage-tnm"));
    assert_eq!(
        predicted(&predictions, RegistryField::PrimarySite),
        Some("Sigmoid colon")
    );
}

#[test]
fn primary_site_prefers_entities_and_highest_confidence() {
    let library = builtin_library();
    let mapper = FieldMapper::new(&library);
    let note = "History of left breast cancer. New right upper lobe lung mass.";
    let (breast_start, breast_end) = span_of(note, "left breast");
    let (lung_start, lung_end) = span_of(note, "right upper lobe lung");
    let entities = vec![
        raw("ORGAN", "left breast", breast_start, breast_end, Some(0.61)),
        raw("ORGAN", "right upper lobe lung", lung_start, lung_end, Some(0.93)),
    ];

    let with_entities = mapper.map(note, &entities);
    let site = &with_entities[&RegistryField::PrimarySite];
    assert_eq!(site.predicted_value.as_deref(), Some("right upper lobe lung"));
    assert_eq!(site.source, PredictionSource::Entity);

    let without_entities = mapper.map(note, &[]);
    let site = &without_entities[&RegistryField::PrimarySite];
    assert_eq!(site.predicted_value.as_deref(), Some("left breast"));
    assert_eq!(site.source, PredictionSource::Pattern);
}

#[test]
fn malformed_entities_fall_back_to_patterns() {
    let library = builtin_library();
    let mapper = FieldMapper::new(&library);
    let note = "Adenocarcinoma of the sigmoid colon.";
    let entities = vec![raw("", "colon", 29, 34, Some(0.99)), raw("CANCER", "lung", 40, 10, None)];

    let predictions = mapper.map(note, &entities);

    assert_eq!(
        predictions[&RegistryField::PrimarySite].source,
        PredictionSource::Pattern
    );
    assert_eq!(
        predicted(&predictions, RegistryField::Histology),
        Some("adenocarcinoma")
    );
}

#[test]
fn unmatched_fields_emit_no_match() {
    let library = builtin_library();
    let mapper = FieldMapper::new(&library);

    let predictions = mapper.map("Patient seen for follow-up. No new complaints.", &[]);

    assert_eq!(predictions.len(), RegistryField::ALL.len());
    for prediction in predictions.values() {
        assert_eq!(prediction, &FieldPrediction::no_match(prediction.field));
    }
}

#[test]
fn mapping_is_deterministic() {
    let library = builtin_library();
    let mapper = FieldMapper::new(&library);
    let note = "Left breast invasive ductal carcinoma, Stage IIA. ER+, PR+, HER2 negative.";
    let (start, end) = span_of(note, "invasive ductal carcinoma");
    let entities = vec![
        raw("Cancer", "invasive ductal carcinoma", start, end, Some(0.5)),
        raw("Cancer", "invasive ductal carcinoma", start, end, Some(0.5)),
    ];

    let first = mapper.map(note, &entities);
    for _ in 0..5 {
        assert_eq!(mapper.map(note, &entities), first);
    }
}

#[test]
fn library_rules_are_sorted_by_priority_within_field() {
    let library = builtin_library();
    assert!(!library.is_empty());

    for field in RegistryField::ALL {
        let priorities = library
            .rules_for(field)
            .map(|rule| rule.priority)
            .collect::<Vec<_>>();
        assert!(!priorities.is_empty(), "{field} should have at least one rule");
        assert!(
            priorities.windows(2).all(|pair| pair[0] < pair[1]),
            "{field} priorities should be strictly ascending: {priorities:?}"
        );
    }

    let histology_kinds = library
        .rules_for(RegistryField::Histology)
        .map(FieldRule::kind)
        .collect::<Vec<_>>();
    assert_eq!(histology_kinds[0], RuleKind::EntityAnchored);
}

#[test]
fn library_rejects_duplicate_priorities_and_ids() {
    let rule = |id: &'static str, priority: u16| FieldRule {
        id,
        field: RegistryField::Histology,
        priority,
        matcher: RuleMatcher::Pattern {
            regex: Regex::new("carcinoma").expect("test regex should compile"),
            emit: PatternEmit::WholeMatch,
        },
        canonical_hint: None,
    };

    let duplicate_priority = PatternLibrary::from_rules(vec![rule("a", 10), rule("b", 10)]);
    assert!(matches!(
        duplicate_priority,
        Err(PatternLibraryError::DuplicatePriority {
            field: RegistryField::Histology,
            priority: 10
        })
    ));

    let duplicate_id = PatternLibrary::from_rules(vec![rule("a", 10), rule("a", 20)]);
    assert!(matches!(
        duplicate_id,
        Err(PatternLibraryError::DuplicateRuleId(id)) if id == "a"
    ));

    let library = PatternLibrary::from_rules(vec![rule("late", 50), rule("early", 5)])
        .expect("distinct priorities should be accepted");
    assert_eq!(library.rules()[0].id, "early");
    assert_eq!(library.len(), 2);
}
