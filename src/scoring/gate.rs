use super::*;

/// Slack for comparing accuracies read back from 3-decimal reports.
const THRESHOLD_EPSILON: f64 = 1e-9;

/// Per-field minimum accuracy for the regression gate, passed in explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    pub thresholds: BTreeMap<String, f64>,
}

impl GateConfig {
    /// Thresholds the demo dataset is held to.
    pub fn demo_defaults() -> Self {
        let thresholds = RegistryField::ALL
            .into_iter()
            .map(|field| {
                let threshold = match field {
                    RegistryField::Stage => 0.60,
                    _ => 0.90,
                };
                (field.as_str().to_string(), threshold)
            })
            .collect();
        Self { thresholds }
    }

    /// Parses field names and range-checks every threshold.
    pub fn resolved(&self) -> Result<Vec<(RegistryField, f64)>, GateError> {
        if self.thresholds.is_empty() {
            return Err(GateError::EmptyThresholds);
        }

        self.thresholds
            .iter()
            .map(|(name, threshold)| {
                let field = name.parse::<RegistryField>()?;
                if !threshold.is_finite() || !(0.0..=1.0).contains(threshold) {
                    return Err(GateError::InvalidThreshold {
                        field,
                        threshold: *threshold,
                    });
                }
                Ok((field, *threshold))
            })
            .collect()
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GateError {
    #[error("gate threshold set is empty")]
    EmptyThresholds,
    #[error(transparent)]
    UnknownField(#[from] UnknownFieldError),
    #[error("threshold {threshold} for field {field} is outside [0, 1]")]
    InvalidThreshold { field: RegistryField, threshold: f64 },
    #[error("metrics table has no row for gated field {0}")]
    MissingMetricField(RegistryField),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateOutcome {
    pub field: RegistryField,
    pub threshold: f64,
    pub accuracy: Option<f64>,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateReport {
    pub outcomes: Vec<GateOutcome>,
}

impl GateReport {
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &GateOutcome> + '_ {
        self.outcomes.iter().filter(|outcome| !outcome.passed)
    }
}

/// Compares each gated field's accuracy to its threshold.
///
/// A field with undefined accuracy (no scorable notes) fails the gate. A gated
/// field with no metrics row at all is a configuration error, not a failure.
pub fn check_thresholds(
    metrics: &[MetricsRow],
    config: &GateConfig,
) -> Result<GateReport, GateError> {
    let resolved = config.resolved()?;

    let mut outcomes = Vec::with_capacity(resolved.len());
    for (field, threshold) in resolved {
        let row = metrics
            .iter()
            .find(|row| row.field == field)
            .ok_or(GateError::MissingMetricField(field))?;
        let passed = row
            .accuracy
            .is_some_and(|accuracy| accuracy + THRESHOLD_EPSILON >= threshold);
        outcomes.push(GateOutcome {
            field,
            threshold,
            accuracy: row.accuracy,
            passed,
        });
    }

    Ok(GateReport { outcomes })
}
