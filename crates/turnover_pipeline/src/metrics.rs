//! Binary classification metrics
//!
//! Metrics with a zero denominator are `None` ("undefined") rather than 0,
//! and each one is logged as a warning. [`ClassificationReport::strict`]
//! turns any undefined metric into [`PipelineError::DegenerateMetric`].

use serde::Serialize;
use tracing::warn;

use crate::errors::{PipelineError, Result};

/// Display name for a label value
pub fn label_name(label: bool) -> &'static str {
    if label {
        "Left"
    } else {
        "Stayed"
    }
}

/// 2×2 table of counts: rows are actual labels, columns predicted labels
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    /// `counts[actual][predicted]`, index 0 = stayed, 1 = left
    pub counts: [[usize; 2]; 2],
}

impl ConfusionMatrix {
    pub fn from_labels(true_y: &[bool], pred_y: &[bool]) -> Self {
        let mut counts = [[0usize; 2]; 2];
        for (&actual, &predicted) in true_y.iter().zip(pred_y) {
            counts[usize::from(actual)][usize::from(predicted)] += 1;
        }
        Self { counts }
    }

    pub fn true_negatives(&self) -> usize {
        self.counts[0][0]
    }

    pub fn false_positives(&self) -> usize {
        self.counts[0][1]
    }

    pub fn false_negatives(&self) -> usize {
        self.counts[1][0]
    }

    pub fn true_positives(&self) -> usize {
        self.counts[1][1]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    /// Rows whose actual label is `class`
    pub fn actual(&self, class: bool) -> usize {
        self.counts[usize::from(class)].iter().sum()
    }

    /// Rows predicted as `class`
    pub fn predicted(&self, class: bool) -> usize {
        let col = usize::from(class);
        self.counts[0][col] + self.counts[1][col]
    }

    fn hits(&self, class: bool) -> usize {
        let idx = usize::from(class);
        self.counts[idx][idx]
    }
}

/// Precision, recall and F1 for one class
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub class: &'static str,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1: Option<f64>,
    /// Actual members of the class
    pub support: usize,
}

/// Unweighted or support-weighted mean across classes
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AverageMetrics {
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1: Option<f64>,
}

/// Full evaluation of one set of predictions
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub confusion: ConfusionMatrix,
    /// Index 0 = stayed, 1 = left
    pub classes: [ClassMetrics; 2],
    pub accuracy: f64,
    pub macro_avg: AverageMetrics,
    pub weighted_avg: AverageMetrics,
}

impl ClassificationReport {
    pub fn class(&self, label: bool) -> &ClassMetrics {
        &self.classes[usize::from(label)]
    }

    /// Names of metrics that could not be computed, e.g. `"Left precision"`
    pub fn undefined_metrics(&self) -> Vec<String> {
        let mut undefined = Vec::new();
        for metrics in &self.classes {
            for (name, value) in [
                ("precision", metrics.precision),
                ("recall", metrics.recall),
                ("f1", metrics.f1),
            ] {
                if value.is_none() {
                    undefined.push(format!("{} {name}", metrics.class));
                }
            }
        }
        undefined
    }

    /// Reject the report if any per-class metric is undefined
    pub fn strict(self) -> Result<Self> {
        let undefined = self.undefined_metrics();
        if undefined.is_empty() {
            Ok(self)
        } else {
            Err(PipelineError::DegenerateMetric(format!(
                "undefined: {}",
                undefined.join(", ")
            )))
        }
    }
}

/// Compare true and predicted labels
pub fn evaluate(true_y: &[bool], pred_y: &[bool]) -> Result<ClassificationReport> {
    if true_y.len() != pred_y.len() {
        return Err(PipelineError::Schema(format!(
            "{} true labels but {} predictions",
            true_y.len(),
            pred_y.len()
        )));
    }
    if true_y.is_empty() {
        return Err(PipelineError::InsufficientData(
            "cannot evaluate an empty partition".to_string(),
        ));
    }

    let confusion = ConfusionMatrix::from_labels(true_y, pred_y);
    let classes = [class_metrics(&confusion, false), class_metrics(&confusion, true)];

    for metrics in &classes {
        if metrics.precision.is_none() {
            warn!(class = metrics.class, "precision undefined: no rows predicted in class");
        }
        if metrics.recall.is_none() {
            warn!(class = metrics.class, "recall undefined: no actual rows in class");
        }
        if metrics.f1.is_none() && metrics.precision.is_some() && metrics.recall.is_some() {
            warn!(class = metrics.class, "f1 undefined: precision and recall are both zero");
        }
    }

    let total = confusion.total();
    let accuracy = (confusion.true_negatives() + confusion.true_positives()) as f64 / total as f64;

    let macro_avg = AverageMetrics {
        precision: average(&classes, |m| m.precision, |_| 1.0),
        recall: average(&classes, |m| m.recall, |_| 1.0),
        f1: average(&classes, |m| m.f1, |_| 1.0),
    };
    let weighted_avg = AverageMetrics {
        precision: average(&classes, |m| m.precision, |m| m.support as f64),
        recall: average(&classes, |m| m.recall, |m| m.support as f64),
        f1: average(&classes, |m| m.f1, |m| m.support as f64),
    };

    Ok(ClassificationReport {
        confusion,
        classes,
        accuracy,
        macro_avg,
        weighted_avg,
    })
}

fn class_metrics(confusion: &ConfusionMatrix, class: bool) -> ClassMetrics {
    let hits = confusion.hits(class) as f64;
    let precision = ratio(hits, confusion.predicted(class));
    let recall = ratio(hits, confusion.actual(class));
    let f1 = match (precision, recall) {
        (Some(p), Some(r)) if p + r > 0.0 => Some(2.0 * p * r / (p + r)),
        _ => None,
    };

    ClassMetrics {
        class: label_name(class),
        precision,
        recall,
        f1,
        support: confusion.actual(class),
    }
}

fn ratio(numerator: f64, denominator: usize) -> Option<f64> {
    (denominator > 0).then(|| numerator / denominator as f64)
}

/// Weighted mean of a metric; undefined if any class's value is undefined
fn average(
    classes: &[ClassMetrics; 2],
    metric: impl Fn(&ClassMetrics) -> Option<f64>,
    weight: impl Fn(&ClassMetrics) -> f64,
) -> Option<f64> {
    let mut sum = 0.0;
    let mut weights = 0.0;
    for class in classes {
        let w = weight(class);
        sum += metric(class)? * w;
        weights += w;
    }
    (weights > 0.0).then(|| sum / weights)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_counts() {
        let true_y = [true, true, false, false, true];
        let pred_y = [true, false, false, true, true];
        let cm = ConfusionMatrix::from_labels(&true_y, &pred_y);

        assert_eq!(cm.true_positives(), 2);
        assert_eq!(cm.false_negatives(), 1);
        assert_eq!(cm.true_negatives(), 1);
        assert_eq!(cm.false_positives(), 1);
        assert_eq!(cm.total(), 5);
    }

    #[test]
    fn test_standard_metrics() {
        let true_y = [true, true, false, false, true];
        let pred_y = [true, false, false, true, true];
        let report = evaluate(&true_y, &pred_y).unwrap();

        let left = report.class(true);
        assert_eq!(left.precision, Some(2.0 / 3.0));
        assert_eq!(left.recall, Some(2.0 / 3.0));
        assert!((left.f1.unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(left.support, 3);

        let stayed = report.class(false);
        assert_eq!(stayed.precision, Some(0.5));
        assert_eq!(stayed.recall, Some(0.5));
        assert_eq!(report.accuracy, 0.6);
        assert!(report.undefined_metrics().is_empty());
        assert!(report.clone().strict().is_ok());
    }

    #[test]
    fn test_all_negative_predictions() {
        let true_y = [true, false, false, false];
        let pred_y = [false; 4];
        let report = evaluate(&true_y, &pred_y).unwrap();

        let left = report.class(true);
        assert_eq!(left.recall, Some(0.0));
        assert_eq!(left.precision, None);
        assert_eq!(left.f1, None);
        assert_eq!(report.macro_avg.precision, None);
        assert_eq!(report.accuracy, 0.75);

        assert_eq!(
            report.undefined_metrics(),
            vec!["Left precision".to_string(), "Left f1".to_string()]
        );
        assert!(matches!(report.strict(), Err(PipelineError::DegenerateMetric(_))));
    }

    #[test]
    fn test_zero_precision_and_recall_leave_f1_undefined() {
        let true_y = [true, false];
        let pred_y = [false, true];
        let report = evaluate(&true_y, &pred_y).unwrap();

        let left = report.class(true);
        assert_eq!(left.precision, Some(0.0));
        assert_eq!(left.recall, Some(0.0));
        assert_eq!(left.f1, None);
    }

    #[test]
    fn test_weighted_average_uses_support() {
        let true_y = [false, false, false, true];
        let pred_y = [false, false, false, true];
        let report = evaluate(&true_y, &pred_y).unwrap();
        assert_eq!(report.weighted_avg.recall, Some(1.0));
        assert_eq!(report.macro_avg.f1, Some(1.0));
    }

    #[test]
    fn test_length_mismatch_and_empty() {
        assert!(matches!(evaluate(&[true], &[]), Err(PipelineError::Schema(_))));
        assert!(matches!(evaluate(&[], &[]), Err(PipelineError::InsufficientData(_))));
    }

    #[test]
    fn test_metrics_in_unit_interval() {
        let true_y: Vec<bool> = (0..50).map(|i| i % 3 == 0).collect();
        let pred_y: Vec<bool> = (0..50).map(|i| i % 2 == 0).collect();
        let report = evaluate(&true_y, &pred_y).unwrap();

        for class in &report.classes {
            for value in [class.precision, class.recall, class.f1].into_iter().flatten() {
                assert!((0.0..=1.0).contains(&value));
            }
        }
        assert_eq!(report.confusion.total(), 50);
    }
}
