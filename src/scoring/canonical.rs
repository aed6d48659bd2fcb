use super::*;

/// Raw strings that mean "nothing recorded" for every field.
const UNKNOWN_SENTINELS: [&str; 10] = [
    "", "unknown", "unk", "n/a", "na", "none", "nan", "null", "not reported", "not available",
];

/// TNM components with capture groups for T, N and M.
const TNM_COMPONENTS: &str =
    r"(?i)\b[yr]?[cp]?t([0-4]|is|x)[a-d]?\s?n([0-3x])[a-c]?\s?m([01x])[a-c]?\b";

const BARE_STAGE: &str = r"(?i)^\s*(0|[1-4]|[ivx]{1,4}|one|two|three|four)\s*([abc])?\s*$";
const ROMAN_STAGE: &str = r"(?i)\b([ivx]{1,4})\s?([abc])?\b";

/// TNM triplet to stage group lookup.
///
/// This is a fixture-compatible simplification with a single entry, not AJCC
/// staging. Triplets outside the table canonicalize to `unknown`. Extend only
/// from a real staging table.
const TNM_STAGE_TABLE: [(&str, &str, &str, StageGroup); 1] = [("3", "0", "0", StageGroup::II)];

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum PrimarySite {
    Breast,
    Lung,
    Colon,
    Other,
    Unknown,
}

impl PrimarySite {
    pub const ALL: [PrimarySite; 5] = [
        Self::Breast,
        Self::Lung,
        Self::Colon,
        Self::Other,
        Self::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Breast => "breast",
            Self::Lung => "lung",
            Self::Colon => "colon",
            Self::Other => "other",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Histology {
    Adenocarcinoma,
    InvasiveDuctalCarcinoma,
    InvasiveLobularCarcinoma,
    SquamousCellCarcinoma,
    Carcinoma,
    Sarcoma,
    Lymphoma,
    Other,
    Unknown,
}

impl Histology {
    pub const ALL: [Histology; 9] = [
        Self::Adenocarcinoma,
        Self::InvasiveDuctalCarcinoma,
        Self::InvasiveLobularCarcinoma,
        Self::SquamousCellCarcinoma,
        Self::Carcinoma,
        Self::Sarcoma,
        Self::Lymphoma,
        Self::Other,
        Self::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Adenocarcinoma => "adenocarcinoma",
            Self::InvasiveDuctalCarcinoma => "invasive ductal carcinoma",
            Self::InvasiveLobularCarcinoma => "invasive lobular carcinoma",
            Self::SquamousCellCarcinoma => "squamous cell carcinoma",
            Self::Carcinoma => "carcinoma",
            Self::Sarcoma => "sarcoma",
            Self::Lymphoma => "lymphoma",
            Self::Other => "other",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum StageGroup {
    Zero,
    I,
    IA,
    IB,
    IC,
    II,
    IIA,
    IIB,
    IIC,
    III,
    IIIA,
    IIIB,
    IIIC,
    IV,
    IVA,
    IVB,
    IVC,
    Unknown,
}

impl StageGroup {
    pub const ALL: [StageGroup; 18] = [
        Self::Zero,
        Self::I,
        Self::IA,
        Self::IB,
        Self::IC,
        Self::II,
        Self::IIA,
        Self::IIB,
        Self::IIC,
        Self::III,
        Self::IIIA,
        Self::IIIB,
        Self::IIIC,
        Self::IV,
        Self::IVA,
        Self::IVB,
        Self::IVC,
        Self::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Zero => "0",
            Self::I => "i",
            Self::IA => "ia",
            Self::IB => "ib",
            Self::IC => "ic",
            Self::II => "ii",
            Self::IIA => "iia",
            Self::IIB => "iib",
            Self::IIC => "iic",
            Self::III => "iii",
            Self::IIIA => "iiia",
            Self::IIIB => "iiib",
            Self::IIIC => "iiic",
            Self::IV => "iv",
            Self::IVA => "iva",
            Self::IVB => "ivb",
            Self::IVC => "ivc",
            Self::Unknown => "unknown",
        }
    }

    /// Combines a numeral (roman, arabic or word) with an optional A/B/C
    /// suffix. Returns `None` for numerals outside 0..=IV.
    pub fn from_parts(numeral: &str, suffix: Option<&str>) -> Option<Self> {
        let base = match numeral.trim().to_ascii_lowercase().as_str() {
            "0" => return Some(Self::Zero),
            "1" | "i" | "one" => "i",
            "2" | "ii" | "two" => "ii",
            "3" | "iii" | "three" => "iii",
            "4" | "iv" | "four" => "iv",
            _ => return None,
        };
        let suffix = suffix
            .map(|value| value.trim().to_ascii_lowercase())
            .unwrap_or_default();
        let token = format!("{base}{suffix}");

        Self::ALL
            .into_iter()
            .find(|group| group.as_str() == token)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ReceptorStatus {
    Positive,
    Negative,
    Unknown,
}

impl ReceptorStatus {
    pub const ALL: [ReceptorStatus; 3] = [Self::Positive, Self::Negative, Self::Unknown];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Unknown => "unknown",
        }
    }
}

/// A field value reduced to that field's closed vocabulary.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum CanonicalValue {
    PrimarySite(PrimarySite),
    Histology(Histology),
    Stage(StageGroup),
    Receptor(ReceptorStatus),
}

impl CanonicalValue {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PrimarySite(value) => value.as_str(),
            Self::Histology(value) => value.as_str(),
            Self::Stage(value) => value.as_str(),
            Self::Receptor(value) => value.as_str(),
        }
    }

    pub fn is_unknown(self) -> bool {
        matches!(
            self,
            Self::PrimarySite(PrimarySite::Unknown)
                | Self::Histology(Histology::Unknown)
                | Self::Stage(StageGroup::Unknown)
                | Self::Receptor(ReceptorStatus::Unknown)
        )
    }

    /// Every value `field` can canonicalize to.
    pub fn vocabulary(field: RegistryField) -> Vec<CanonicalValue> {
        match field {
            RegistryField::PrimarySite => {
                PrimarySite::ALL.into_iter().map(Self::PrimarySite).collect()
            }
            RegistryField::Histology => Histology::ALL.into_iter().map(Self::Histology).collect(),
            RegistryField::Stage => StageGroup::ALL.into_iter().map(Self::Stage).collect(),
            RegistryField::ErStatus | RegistryField::PrStatus | RegistryField::Her2Status => {
                ReceptorStatus::ALL.into_iter().map(Self::Receptor).collect()
            }
        }
    }
}

impl fmt::Display for CanonicalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn folded(raw: Option<&str>) -> Option<String> {
    let value = collapse_whitespace(raw.unwrap_or_default()).to_lowercase();
    if UNKNOWN_SENTINELS.contains(&value.as_str()) {
        None
    } else {
        Some(value)
    }
}

/// Field-specific canonicalization shared by predictions and ground truth.
///
/// Total: every input, including `None` and the empty string, maps into the
/// field's vocabulary.
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    stage_declaration: Regex,
    stage_abbreviation: Regex,
    tnm_components: Regex,
    bare_stage: Regex,
    roman_stage: Regex,
}

impl Canonicalizer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            stage_declaration: Regex::new(STAGE_DECLARATION)?,
            stage_abbreviation: Regex::new(STAGE_ABBREVIATION)?,
            tnm_components: Regex::new(TNM_COMPONENTS)?,
            bare_stage: Regex::new(BARE_STAGE)?,
            roman_stage: Regex::new(ROMAN_STAGE)?,
        })
    }

    pub fn canonicalize(&self, field: RegistryField, raw: Option<&str>) -> CanonicalValue {
        match field {
            RegistryField::PrimarySite => CanonicalValue::PrimarySite(primary_site(raw)),
            RegistryField::Histology => CanonicalValue::Histology(histology(raw)),
            RegistryField::Stage => CanonicalValue::Stage(self.stage(raw)),
            RegistryField::ErStatus | RegistryField::PrStatus | RegistryField::Her2Status => {
                CanonicalValue::Receptor(receptor_status(raw))
            }
        }
    }

    fn stage(&self, raw: Option<&str>) -> StageGroup {
        let Some(value) = folded(raw) else {
            return StageGroup::Unknown;
        };

        for declaration in [&self.stage_declaration, &self.stage_abbreviation] {
            if let Some(group) = declaration.captures(&value).and_then(|captures| {
                let numeral = captures.get(1)?.as_str();
                StageGroup::from_parts(numeral, captures.get(2).map(|m| m.as_str()))
            }) {
                return group;
            }
        }

        if let Some(captures) = self.tnm_components.captures(&value) {
            let component = |index: usize| {
                captures
                    .get(index)
                    .map(|m| m.as_str().to_ascii_lowercase())
                    .unwrap_or_default()
            };
            let (t, n, m) = (component(1), component(2), component(3));
            return TNM_STAGE_TABLE
                .iter()
                .find(|(table_t, table_n, table_m, _)| {
                    *table_t == t && *table_n == n && *table_m == m
                })
                .map(|(_, _, _, group)| *group)
                .unwrap_or(StageGroup::Unknown);
        }

        for token in [&self.bare_stage, &self.roman_stage] {
            if let Some(group) = token.captures(&value).and_then(|captures| {
                let numeral = captures.get(1)?.as_str();
                StageGroup::from_parts(numeral, captures.get(2).map(|m| m.as_str()))
            }) {
                return group;
            }
        }

        StageGroup::Unknown
    }
}

fn primary_site(raw: Option<&str>) -> PrimarySite {
    let Some(value) = folded(raw) else {
        return PrimarySite::Unknown;
    };

    if value.contains("breast") {
        PrimarySite::Breast
    } else if ["lung", "lobe", "pulmonary"]
        .iter()
        .any(|keyword| value.contains(keyword))
    {
        PrimarySite::Lung
    } else if value.contains("colon") || value.contains("sigmoid") {
        PrimarySite::Colon
    } else {
        PrimarySite::Other
    }
}

fn histology(raw: Option<&str>) -> Histology {
    let Some(value) = folded(raw) else {
        return Histology::Unknown;
    };

    if value.contains("adenocarcinoma") {
        Histology::Adenocarcinoma
    } else if value.contains("ductal carcinoma") {
        Histology::InvasiveDuctalCarcinoma
    } else if value.contains("lobular carcinoma") {
        Histology::InvasiveLobularCarcinoma
    } else if value.contains("squamous") && value.contains("carcinoma") {
        Histology::SquamousCellCarcinoma
    } else if value.contains("carcinoma") {
        Histology::Carcinoma
    } else if value.contains("sarcoma") {
        Histology::Sarcoma
    } else if value.contains("lymphoma") {
        Histology::Lymphoma
    } else {
        Histology::Other
    }
}

fn receptor_status(raw: Option<&str>) -> ReceptorStatus {
    let Some(value) = folded(raw) else {
        return ReceptorStatus::Unknown;
    };

    if ["non-amplified", "nonamplified", "not amplified"]
        .iter()
        .any(|phrase| value.contains(phrase))
    {
        return ReceptorStatus::Negative;
    }
    if value.contains("pos") {
        return ReceptorStatus::Positive;
    }
    if value.contains("neg") {
        return ReceptorStatus::Negative;
    }
    if value.contains("amplified") {
        return ReceptorStatus::Positive;
    }

    if value.ends_with('+') || value.ends_with("(+)") {
        ReceptorStatus::Positive
    } else if value.ends_with('-') || value.ends_with("(-)") {
        ReceptorStatus::Negative
    } else {
        ReceptorStatus::Unknown
    }
}
