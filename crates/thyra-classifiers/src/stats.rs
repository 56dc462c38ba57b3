use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data_handling::Label;

/// Held-out metrics, with `Label::Malignant` as the positive class.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl ClassificationReport {
    pub fn support(&self) -> usize {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "accuracy={:.4} precision={:.4} recall={:.4} f1={:.4} (tp={} fp={} tn={} fn={})",
            self.accuracy,
            self.precision,
            self.recall,
            self.f1,
            self.true_positives,
            self.false_positives,
            self.true_negatives,
            self.false_negatives
        )
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Compare true and predicted labels.
///
/// Ratios with a zero denominator are reported as 0.
///
/// # Panics
///
/// Panics if `truth` and `predicted` differ in length.
pub fn evaluate(truth: &[Label], predicted: &[Label]) -> ClassificationReport {
    assert_eq!(
        truth.len(),
        predicted.len(),
        "truth and predicted must have equal lengths"
    );

    let mut report = ClassificationReport::default();
    for (&t, &p) in truth.iter().zip(predicted) {
        match (t, p) {
            (Label::Malignant, Label::Malignant) => report.true_positives += 1,
            (Label::Benign, Label::Malignant) => report.false_positives += 1,
            (Label::Benign, Label::Benign) => report.true_negatives += 1,
            (Label::Malignant, Label::Benign) => report.false_negatives += 1,
        }
    }

    report.accuracy = ratio(
        report.true_positives + report.true_negatives,
        truth.len(),
    );
    report.precision = ratio(
        report.true_positives,
        report.true_positives + report.false_positives,
    );
    report.recall = ratio(
        report.true_positives,
        report.true_positives + report.false_negatives,
    );
    report.f1 = if report.precision + report.recall > 0.0 {
        2.0 * report.precision * report.recall / (report.precision + report.recall)
    } else {
        0.0
    };
    report
}
