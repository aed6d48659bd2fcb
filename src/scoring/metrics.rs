use super::*;

pub fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator as f64 / denominator as f64)
    }
}

/// Rounds to three decimals, the precision metric reports are written with.
pub fn round_metric(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[derive(Debug, Default, Clone, Copy)]
struct ClassCounts {
    true_positive: usize,
    false_positive: usize,
    false_negative: usize,
}

/// Running counts for one field over the scorable notes.
#[derive(Debug, Default, Clone)]
pub(super) struct FieldTally {
    pub(super) total: usize,
    pub(super) correct: usize,
    pub(super) excluded: usize,
    classes: BTreeMap<CanonicalValue, ClassCounts>,
}

impl FieldTally {
    pub(super) fn record(&mut self, predicted: CanonicalValue, ground_truth: CanonicalValue) {
        self.total += 1;
        if predicted == ground_truth {
            self.correct += 1;
            self.classes.entry(predicted).or_default().true_positive += 1;
        } else {
            self.classes.entry(predicted).or_default().false_positive += 1;
            self.classes.entry(ground_truth).or_default().false_negative += 1;
        }
    }

    pub(super) fn exclude(&mut self) {
        self.excluded += 1;
    }

    pub(super) fn to_row(&self, field: RegistryField, detailed: bool) -> MetricsRow {
        let (precision, recall, f1) = if detailed {
            self.macro_scores()
        } else {
            (None, None, None)
        };

        MetricsRow {
            field,
            total_cases: self.total,
            correct: self.correct,
            accuracy: ratio(self.correct, self.total),
            precision,
            recall,
            f1,
        }
    }

    /// Macro-averaged precision, recall and F1 over every class seen in either
    /// predictions or ground truth. A class with a zero denominator scores 0.
    fn macro_scores(&self) -> (Option<f64>, Option<f64>, Option<f64>) {
        if self.total == 0 || self.classes.is_empty() {
            return (None, None, None);
        }

        let mut precision_sum = 0.0;
        let mut recall_sum = 0.0;
        let mut f1_sum = 0.0;
        for counts in self.classes.values() {
            let precision = ratio(
                counts.true_positive,
                counts.true_positive + counts.false_positive,
            )
            .unwrap_or(0.0);
            let recall = ratio(
                counts.true_positive,
                counts.true_positive + counts.false_negative,
            )
            .unwrap_or(0.0);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            precision_sum += precision;
            recall_sum += recall;
            f1_sum += f1;
        }

        let class_count = self.classes.len() as f64;
        (
            Some(precision_sum / class_count),
            Some(recall_sum / class_count),
            Some(f1_sum / class_count),
        )
    }
}
