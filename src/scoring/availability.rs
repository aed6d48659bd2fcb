use super::*;

/// Decides whether a field is scorable for a note.
///
/// Stage is only scored when the note text carries staging vocabulary or a TNM
/// triplet, using the same detection the extraction rules use. Every other
/// field is always scorable.
#[derive(Debug, Clone)]
pub struct AvailabilityDetector {
    stage_signal: Regex,
    tnm_triplet: Regex,
}

impl AvailabilityDetector {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            stage_signal: Regex::new(STAGE_SIGNAL)?,
            tnm_triplet: Regex::new(TNM_TRIPLET)?,
        })
    }

    pub fn is_scorable(&self, field: RegistryField, note_text: &str) -> bool {
        match field {
            RegistryField::Stage => {
                self.stage_signal.is_match(note_text) || self.tnm_triplet.is_match(note_text)
            }
            _ => true,
        }
    }
}
