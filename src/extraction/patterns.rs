use super::*;

/// Explicit stage declaration: `Stage IIA`, `stage: ii a`, `Stage 4`, `stage four`.
pub const STAGE_DECLARATION: &str =
    r"(?i)\bstage\b\s*[:\-]?\s*(0|[1-4]|[ivx]{1,4}|one|two|three|four)(?:\s*([abc]))?\b";

/// Abbreviated declaration: `Stg III`, `stg. 2b`.
pub const STAGE_ABBREVIATION: &str =
    r"(?i)\bstg\b\.?\s*[:\-]?\s*(0|[1-4]|[ivx]{1,4})(?:\s*([abc]))?\b";

/// TNM triplet with optional `y`/`r` and `c`/`p` prefixes: `pT3N0M0`, `ypT2 N1a M0`.
pub const TNM_TRIPLET: &str =
    r"(?i)\b[yr]?[cp]?t(?:[0-4]|is|x)[a-d]?\s?n[0-3x][a-c]?\s?m[01x][a-c]?\b";

/// Any mention of staging vocabulary, used for availability gating. `stage`
/// matches inside words too, so `restaging` and `upstaged` count.
pub const STAGE_SIGNAL: &str = r"(?i)stage|\bstg\b";

const ER_MARKER: &str = r"\bER\b|(?i:\bestrogen\s+receptors?\b)";
const PR_MARKER: &str = r"\bPR\b|(?i:\bprogesterone\s+receptors?\b)";
const HER2_MARKER: &str = r"(?i:\bher-?2\b(?:\s*/\s*neu\b)?|\berbb2\b)";

const STATUS_WORD: &str = r"(?i)\b(positive|pos|negative|neg)\b";
const STATUS_SYMBOL: &str = r"^\s*[:=]?\s*\(?([+\-])(?:[\s,.;/)]|$)";
/// Text allowed between two markers that share one status: `ER/PR`, `ER and PR`.
const MARKER_JOINER: &str = r"(?i)^\s*(?:[/,&]|and)?\s*$";

/// Characters after a biomarker mention searched for a status token.
const STATUS_RADIUS: usize = 40;

#[derive(Debug, Error)]
pub enum PatternLibraryError {
    #[error("rule `{rule_id}` has an invalid pattern")]
    InvalidPattern {
        rule_id: String,
        #[source]
        source: regex::Error,
    },
    #[error("duplicate rule id `{0}`")]
    DuplicateRuleId(String),
    #[error("field {field} has two rules with priority {priority}")]
    DuplicatePriority {
        field: RegistryField,
        priority: u16,
    },
}

fn compile(rule_id: &str, source: &str) -> Result<Regex, PatternLibraryError> {
    Regex::new(source).map_err(|source| PatternLibraryError::InvalidPattern {
        rule_id: rule_id.to_string(),
        source,
    })
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RuleKind {
    EntityAnchored,
    Pattern,
}

/// How a pattern hit becomes a raw predicted value.
#[derive(Debug, Clone)]
pub enum PatternEmit {
    WholeMatch,
    /// Concatenate the listed capture groups, drop whitespace, upper-case.
    CompactGroups(&'static [usize]),
}

/// How an entity hit becomes a raw predicted value.
#[derive(Debug, Clone)]
pub enum EntityEmit {
    SurfaceText,
    /// Pull a compact code out of the surface text, falling back to the text.
    CompactGroups {
        regex: Regex,
        groups: &'static [usize],
    },
}

/// Marker-name search with a local status window after each mention.
#[derive(Debug, Clone)]
pub struct StatusWindow {
    pub any_marker: Regex,
    pub status_word: Regex,
    pub status_symbol: Regex,
    pub marker_joiner: Regex,
    pub radius: usize,
}

#[derive(Debug, Clone)]
pub enum RuleMatcher {
    EntityAnchored {
        labels: Vec<EntityLabel>,
        keywords: Regex,
        emit: EntityEmit,
    },
    Pattern {
        regex: Regex,
        emit: PatternEmit,
    },
    MarkerStatus {
        marker: Regex,
        window: StatusWindow,
    },
}

impl RuleMatcher {
    pub fn kind(&self) -> RuleKind {
        match self {
            Self::EntityAnchored { .. } => RuleKind::EntityAnchored,
            Self::Pattern { .. } | Self::MarkerStatus { .. } => RuleKind::Pattern,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    pub value: String,
    pub span: CharSpan,
    pub source: PredictionSource,
}

#[derive(Debug, Clone)]
pub struct FieldRule {
    pub id: &'static str,
    pub field: RegistryField,
    /// Lower runs first. Unique within a field.
    pub priority: u16,
    pub matcher: RuleMatcher,
    /// When set, a hit emits this value instead of the matched text.
    pub canonical_hint: Option<&'static str>,
}

impl FieldRule {
    pub fn kind(&self) -> RuleKind {
        self.matcher.kind()
    }

    /// Runs this rule against one note. Returns the first hit only.
    pub fn apply(&self, note_text: &str, entities: &[Entity]) -> Option<RuleMatch> {
        let hit = match &self.matcher {
            RuleMatcher::EntityAnchored {
                labels,
                keywords,
                emit,
            } => apply_entity_rule(labels, keywords, emit, entities),
            RuleMatcher::Pattern { regex, emit } => apply_pattern_rule(regex, emit, note_text),
            RuleMatcher::MarkerStatus { marker, window } => {
                apply_marker_rule(marker, window, note_text)
            }
        }?;

        if hit.value.trim().is_empty() {
            return None;
        }
        Some(hit)
    }
}

fn compact_groups(captures: &regex::Captures<'_>, groups: &[usize]) -> String {
    groups
        .iter()
        .filter_map(|index| captures.get(*index))
        .map(|group| group.as_str())
        .collect::<String>()
        .split_whitespace()
        .collect::<String>()
        .to_uppercase()
}

fn apply_entity_rule(
    labels: &[EntityLabel],
    keywords: &Regex,
    emit: &EntityEmit,
    entities: &[Entity],
) -> Option<RuleMatch> {
    let best = entities
        .iter()
        .filter(|entity| labels.contains(&entity.label) && keywords.is_match(&entity.text))
        .max_by(|left, right| {
            left.confidence
                .total_cmp(&right.confidence)
                .then_with(|| right.span.start.cmp(&left.span.start))
                .then_with(|| right.span.end.cmp(&left.span.end))
        })?;

    let surface = best.text.trim().to_string();
    let value = match emit {
        EntityEmit::SurfaceText => surface,
        EntityEmit::CompactGroups { regex, groups } => regex
            .captures(&surface)
            .map(|captures| compact_groups(&captures, groups))
            .filter(|code| !code.is_empty())
            .unwrap_or(surface),
    };

    Some(RuleMatch {
        value,
        span: best.span,
        source: PredictionSource::Entity,
    })
}

fn apply_pattern_rule(regex: &Regex, emit: &PatternEmit, note_text: &str) -> Option<RuleMatch> {
    let captures = regex.captures(note_text)?;
    let whole = captures.get(0)?;

    let value = match emit {
        PatternEmit::WholeMatch => whole.as_str().trim().to_string(),
        PatternEmit::CompactGroups(groups) => compact_groups(&captures, groups),
    };

    Some(RuleMatch {
        value,
        span: CharSpan {
            start: byte_to_char_offset(note_text, whole.start()),
            end: byte_to_char_offset(note_text, whole.end()),
        },
        source: PredictionSource::Pattern,
    })
}

fn apply_marker_rule(marker: &Regex, window: &StatusWindow, note_text: &str) -> Option<RuleMatch> {
    for mention in marker.find_iter(note_text) {
        let (scope_start, scope) = status_scope(window, note_text, mention.end());

        let status = window
            .status_symbol
            .captures(scope)
            .and_then(|captures| captures.get(1))
            .or_else(|| {
                window
                    .status_word
                    .captures(scope)
                    .and_then(|captures| captures.get(1))
            });

        let Some(status) = status else {
            continue;
        };

        let value = match status.as_str().to_ascii_lowercase().as_str() {
            "+" | "pos" | "positive" => "positive",
            _ => "negative",
        };
        let status_end = scope_start + status.end();

        return Some(RuleMatch {
            value: value.to_string(),
            span: CharSpan {
                start: byte_to_char_offset(note_text, mention.start()),
                end: byte_to_char_offset(note_text, status_end),
            },
            source: PredictionSource::Pattern,
        });
    }

    None
}

/// Byte range searched for a status after a marker ending at `from`. The scope
/// stops at the next marker unless only a joiner separates the two, in which
/// case the joined markers share whatever status follows the last of them.
fn status_scope<'t>(window: &StatusWindow, note_text: &'t str, from: usize) -> (usize, &'t str) {
    let mut start = from;
    loop {
        let after = &note_text[start..];
        let window_len = after
            .char_indices()
            .nth(window.radius)
            .map(|(index, _)| index)
            .unwrap_or(after.len());
        match window.any_marker.find(&after[..window_len]) {
            Some(next) if window.marker_joiner.is_match(&after[..next.start()]) => {
                start += next.end();
            }
            Some(next) => return (start, &after[..next.start()]),
            None => return (start, &after[..window_len]),
        }
    }
}

/// Read-only, field-indexed rule table. Rules for a field are kept sorted by
/// ascending priority and evaluated in that order; the first hit wins.
#[derive(Debug, Clone)]
pub struct PatternLibrary {
    rules: Vec<FieldRule>,
}

impl PatternLibrary {
    pub fn from_rules(mut rules: Vec<FieldRule>) -> Result<Self, PatternLibraryError> {
        rules.sort_by(|left, right| {
            left.field
                .cmp(&right.field)
                .then(left.priority.cmp(&right.priority))
        });

        let mut seen_ids = HashSet::<&'static str>::new();
        for rule in &rules {
            if !seen_ids.insert(rule.id) {
                return Err(PatternLibraryError::DuplicateRuleId(rule.id.to_string()));
            }
        }
        for pair in rules.windows(2) {
            if pair[0].field == pair[1].field && pair[0].priority == pair[1].priority {
                return Err(PatternLibraryError::DuplicatePriority {
                    field: pair[0].field,
                    priority: pair[0].priority,
                });
            }
        }

        Ok(Self { rules })
    }

    pub fn builtin() -> Result<Self, PatternLibraryError> {
        let status_window = StatusWindow {
            any_marker: compile(
                "biomarker-boundary",
                &format!("{ER_MARKER}|{PR_MARKER}|{HER2_MARKER}"),
            )?,
            status_word: compile("biomarker-status-word", STATUS_WORD)?,
            status_symbol: compile("biomarker-status-symbol", STATUS_SYMBOL)?,
            marker_joiner: compile("biomarker-marker-joiner", MARKER_JOINER)?,
            radius: STATUS_RADIUS,
        };

        let mut rules = Vec::new();
        rules.extend(primary_site_rules()?);
        rules.extend(histology_rules()?);
        rules.extend(stage_rules()?);
        rules.extend(biomarker_rules(&status_window)?);

        Self::from_rules(rules)
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    pub fn rules_for(&self, field: RegistryField) -> impl Iterator<Item = &FieldRule> + '_ {
        self.rules.iter().filter(move |rule| rule.field == field)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn pattern_rule(
    id: &'static str,
    field: RegistryField,
    priority: u16,
    source: &str,
    emit: PatternEmit,
    canonical_hint: Option<&'static str>,
) -> Result<FieldRule, PatternLibraryError> {
    Ok(FieldRule {
        id,
        field,
        priority,
        matcher: RuleMatcher::Pattern {
            regex: compile(id, source)?,
            emit,
        },
        canonical_hint,
    })
}

fn primary_site_rules() -> Result<Vec<FieldRule>, PatternLibraryError> {
    let field = RegistryField::PrimarySite;
    Ok(vec![
        FieldRule {
            id: "primary-site-entity",
            field,
            priority: 10,
            matcher: RuleMatcher::EntityAnchored {
                labels: vec![EntityLabel::Cancer, EntityLabel::Organ],
                keywords: compile(
                    "primary-site-entity",
                    r"(?i)breast|lung|lobe|pulmonary|colon|sigmoid",
                )?,
                emit: EntityEmit::SurfaceText,
            },
            canonical_hint: None,
        },
        pattern_rule(
            "primary-site-breast",
            field,
            20,
            r"(?i)\b(?:(?:left|right)\s+)?breast\b",
            PatternEmit::WholeMatch,
            None,
        )?,
        pattern_rule(
            "primary-site-lung",
            field,
            30,
            r"(?i)\b(?:(?:right|left)\s+(?:upper|middle|lower)\s+lobe|lung)\b",
            PatternEmit::WholeMatch,
            None,
        )?,
        pattern_rule(
            "primary-site-colon",
            field,
            40,
            r"(?i)\b(?:sigmoid\s+colon|sigmoid|colon)\b",
            PatternEmit::WholeMatch,
            None,
        )?,
    ])
}

fn histology_rules() -> Result<Vec<FieldRule>, PatternLibraryError> {
    let field = RegistryField::Histology;
    Ok(vec![
        FieldRule {
            id: "histology-entity",
            field,
            priority: 10,
            matcher: RuleMatcher::EntityAnchored {
                labels: vec![EntityLabel::Cancer],
                keywords: compile(
                    "histology-entity",
                    r"(?i)carcinoma|adenocarcinoma|sarcoma|lymphoma",
                )?,
                emit: EntityEmit::SurfaceText,
            },
            canonical_hint: None,
        },
        pattern_rule(
            "histology-invasive-ductal",
            field,
            20,
            r"(?i)\b(?:invasive|infiltrating)\s+ductal\s+carcinoma\b",
            PatternEmit::WholeMatch,
            Some("invasive ductal carcinoma"),
        )?,
        pattern_rule(
            "histology-invasive-lobular",
            field,
            30,
            r"(?i)\b(?:invasive|infiltrating)\s+lobular\s+carcinoma\b",
            PatternEmit::WholeMatch,
            Some("invasive lobular carcinoma"),
        )?,
        pattern_rule(
            "histology-adenocarcinoma",
            field,
            40,
            r"(?i)\badenocarcinoma\b",
            PatternEmit::WholeMatch,
            Some("adenocarcinoma"),
        )?,
        pattern_rule(
            "histology-squamous",
            field,
            50,
            r"(?i)\bsquamous\s+cell\s+carcinoma\b",
            PatternEmit::WholeMatch,
            Some("squamous cell carcinoma"),
        )?,
        pattern_rule(
            "histology-generic",
            field,
            90,
            r"(?i)\b(?:\w+\s+)?(?:carcinoma|sarcoma|lymphoma)\b",
            PatternEmit::WholeMatch,
            None,
        )?,
    ])
}

fn stage_rules() -> Result<Vec<FieldRule>, PatternLibraryError> {
    let field = RegistryField::Stage;
    Ok(vec![
        pattern_rule(
            "stage-declaration",
            field,
            10,
            STAGE_DECLARATION,
            PatternEmit::CompactGroups(&[1, 2]),
            None,
        )?,
        FieldRule {
            id: "stage-entity",
            field,
            priority: 20,
            matcher: RuleMatcher::EntityAnchored {
                labels: vec![EntityLabel::Cancer],
                keywords: compile("stage-entity", r"(?i)^\s*stage\b")?,
                emit: EntityEmit::CompactGroups {
                    regex: compile("stage-entity-code", STAGE_DECLARATION)?,
                    groups: &[1, 2],
                },
            },
            canonical_hint: None,
        },
        pattern_rule(
            "stage-tnm",
            field,
            30,
            TNM_TRIPLET,
            PatternEmit::WholeMatch,
            None,
        )?,
        pattern_rule(
            "stage-abbreviation",
            field,
            40,
            STAGE_ABBREVIATION,
            PatternEmit::CompactGroups(&[1, 2]),
            None,
        )?,
    ])
}

fn biomarker_rules(window: &StatusWindow) -> Result<Vec<FieldRule>, PatternLibraryError> {
    let markers = [
        ("er-status-marker", RegistryField::ErStatus, ER_MARKER),
        ("pr-status-marker", RegistryField::PrStatus, PR_MARKER),
        ("her2-status-marker", RegistryField::Her2Status, HER2_MARKER),
    ];

    markers
        .into_iter()
        .map(|(id, field, source)| {
            Ok(FieldRule {
                id,
                field,
                priority: 10,
                matcher: RuleMatcher::MarkerStatus {
                    marker: compile(id, source)?,
                    window: window.clone(),
                },
                canonical_hint: None,
            })
        })
        .collect()
}
