use super::*;

/// Internal entity vocabulary. Upstream NER label sets vary by model, so labels
/// are case-folded and collapsed onto the few categories field mapping uses.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum EntityLabel {
    Cancer,
    Organ,
    Biomarker,
    Other,
}

impl EntityLabel {
    /// Returns `None` for a blank label, which makes the entity malformed.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let folded = raw.trim().to_lowercase().replace([' ', '-'], "_");
        if folded.is_empty() {
            return None;
        }

        let label = match folded.as_str() {
            "cancer" | "tumor" | "tumour" | "neoplasm" | "malignancy" => Self::Cancer,
            "organ" | "tissue" | "anatomy" | "anatomical_site" | "organism_subdivision"
            | "multi_tissue_structure" => Self::Organ,
            "biomarker" | "gene" | "protein" | "gene_or_gene_product" => Self::Biomarker,
            _ => Self::Other,
        };
        Some(label)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cancer => "cancer",
            Self::Organ => "organ",
            Self::Biomarker => "biomarker",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub label: EntityLabel,
    pub text: String,
    pub span: CharSpan,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityCleanupStats {
    pub input_count: usize,
    pub dropped_malformed: usize,
    pub merged_overlaps: usize,
    pub kept_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedEntities {
    pub entities: Vec<Entity>,
    pub stats: EntityCleanupStats,
}

/// Cleans one note's raw NER output.
///
/// Entities with a blank label, a missing offset, or offsets outside
/// `0 <= start < end <= len` are dropped. Overlapping entities that share a
/// label collapse into the widest span, keeping the highest confidence. The
/// result is ordered by start offset, then end offset, then label.
pub fn normalize_entities(note_text: &str, raw_entities: &[RawEntity]) -> NormalizedEntities {
    let note_len = char_len(note_text);
    let mut stats = EntityCleanupStats {
        input_count: raw_entities.len(),
        ..EntityCleanupStats::default()
    };

    let mut valid = Vec::<Entity>::with_capacity(raw_entities.len());
    for raw in raw_entities {
        let Some(label) = EntityLabel::from_raw(&raw.label) else {
            debug!(text = %raw.text, "dropping entity with empty label");
            stats.dropped_malformed += 1;
            continue;
        };

        let (Some(start), Some(end)) = (raw.start, raw.end) else {
            debug!(label = %raw.label, text = %raw.text, "dropping entity without offsets");
            stats.dropped_malformed += 1;
            continue;
        };
        if start < 0 || end <= start || end as u64 > note_len as u64 {
            debug!(
                start,
                end,
                note_len,
                label = %raw.label,
                "dropping entity with invalid offsets"
            );
            stats.dropped_malformed += 1;
            continue;
        }

        let span = CharSpan {
            start: start as usize,
            end: end as usize,
        };
        let text = if raw.text.trim().is_empty() {
            slice_chars(note_text, span)
        } else {
            raw.text.clone()
        };

        valid.push(Entity {
            label,
            text,
            span,
            confidence: raw.confidence.filter(|value| value.is_finite()).unwrap_or(0.0),
        });
    }

    valid.sort_by(|left, right| {
        left.label
            .cmp(&right.label)
            .then(left.span.start.cmp(&right.span.start))
            .then(right.span.end.cmp(&left.span.end))
    });

    let mut merged = Vec::<Entity>::with_capacity(valid.len());
    for entity in valid {
        match merged.last_mut() {
            Some(current)
                if current.label == entity.label && entity.span.start < current.span.end =>
            {
                if entity.span.end > current.span.end {
                    current.span.end = entity.span.end;
                    current.text = slice_chars(note_text, current.span);
                }
                if entity.confidence > current.confidence {
                    current.confidence = entity.confidence;
                }
                stats.merged_overlaps += 1;
            }
            _ => merged.push(entity),
        }
    }

    merged.sort_by(|left, right| {
        left.span
            .start
            .cmp(&right.span.start)
            .then(left.span.end.cmp(&right.span.end))
            .then(left.label.cmp(&right.label))
    });

    stats.kept_count = merged.len();
    NormalizedEntities {
        entities: merged,
        stats,
    }
}
