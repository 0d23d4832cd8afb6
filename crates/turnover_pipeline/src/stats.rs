//! Descriptive statistics for the exploratory part of the report
//!
//! Quantiles use linear interpolation between closest ranks and standard
//! deviations use the sample (n - 1) denominator.

use serde::Serialize;

use crate::dataset::Dataset;
use crate::errors::{PipelineError, Result};
use crate::metrics::label_name;

/// Headline numbers for the report overview
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Overview {
    pub total_rows: usize,
    pub left_count: usize,
    /// Share of rows labelled as leavers, in [0, 1]
    pub left_share: f64,
    pub mean_satisfaction: f64,
    pub mean_stress: f64,
}

/// Summary of one numeric column
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; undefined for a single value
    pub std: Option<f64>,
    pub min: f64,
    pub q1: f64,
    pub q3: f64,
    pub max: f64,
}

/// Five-number summary of one group (box-plot data)
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BoxSummary {
    pub count: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// A feature's distribution split by label
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupSummary {
    pub feature: String,
    pub stayed: Option<BoxSummary>,
    pub left: Option<BoxSummary>,
}

/// Rows per label value
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClassCount {
    pub class: &'static str,
    pub count: usize,
    pub share: f64,
}

/// Equal-width histogram
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Histogram {
    pub column: String,
    /// `counts.len() + 1` bin edges, ascending
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

/// Pairwise Pearson correlations
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub features: Vec<String>,
    /// `None` where either column has zero variance
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.features.iter().position(|f| f == a)?;
        let j = self.features.iter().position(|f| f == b)?;
        self.values[i][j]
    }
}

pub fn overview(dataset: &Dataset, label: &str) -> Result<Overview> {
    let labels = dataset.label_column(label)?;
    let left_count = labels.iter().filter(|&&l| l).count();
    let satisfaction = dataset.numeric_column("satisfaction_score")?;
    let stress = dataset.numeric_column("stress_level")?;

    Ok(Overview {
        total_rows: dataset.len(),
        left_count,
        left_share: left_count as f64 / labels.len() as f64,
        mean_satisfaction: mean(satisfaction)?,
        mean_stress: mean(stress)?,
    })
}

/// Summaries for each named numeric column
pub fn describe<S: AsRef<str>>(dataset: &Dataset, columns: &[S]) -> Result<Vec<ColumnSummary>> {
    columns
        .iter()
        .map(|name| summarize(name.as_ref(), dataset.numeric_column(name.as_ref())?))
        .collect()
}

pub fn summarize(name: &str, values: &[f64]) -> Result<ColumnSummary> {
    let sorted = sorted_copy(name, values)?;
    let mean = mean(values)?;
    let std = (values.len() > 1).then(|| {
        let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (values.len() - 1) as f64).sqrt()
    });

    Ok(ColumnSummary {
        name: name.to_string(),
        count: values.len(),
        mean,
        median: quantile(&sorted, 0.5),
        std,
        min: sorted[0],
        q1: quantile(&sorted, 0.25),
        q3: quantile(&sorted, 0.75),
        max: sorted[sorted.len() - 1],
    })
}

/// Per-label five-number summaries of each feature
pub fn group_summaries<S: AsRef<str>>(
    dataset: &Dataset,
    features: &[S],
    label: &str,
) -> Result<Vec<GroupSummary>> {
    let labels = dataset.label_column(label)?;

    features
        .iter()
        .map(|feature| {
            let feature = feature.as_ref();
            let values = dataset.numeric_column(feature)?;
            let group = |class: bool| -> Option<BoxSummary> {
                let picked: Vec<f64> = values
                    .iter()
                    .zip(&labels)
                    .filter(|(_, l)| **l == class)
                    .map(|(&v, _)| v)
                    .collect();
                box_summary(&picked)
            };

            Ok(GroupSummary {
                feature: feature.to_string(),
                stayed: group(false),
                left: group(true),
            })
        })
        .collect()
}

pub fn class_counts(labels: &[bool]) -> Vec<ClassCount> {
    let total = labels.len();
    [false, true]
        .into_iter()
        .map(|class| {
            let count = labels.iter().filter(|&&l| l == class).count();
            ClassCount {
                class: label_name(class),
                count,
                share: if total == 0 { 0.0 } else { count as f64 / total as f64 },
            }
        })
        .collect()
}

/// Equal-width histogram over the column's range
///
/// A constant column gets the range `value ± 0.5`. The last bin is closed.
pub fn histogram(name: &str, values: &[f64], bins: usize) -> Result<Histogram> {
    if bins == 0 {
        return Err(PipelineError::InvalidConfig(
            "histogram needs at least one bin".to_string(),
        ));
    }
    let sorted = sorted_copy(name, values)?;
    let (mut lo, mut hi) = (sorted[0], sorted[sorted.len() - 1]);
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }

    let width = (hi - lo) / bins as f64;
    let edges: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();
    let mut counts = vec![0usize; bins];
    for &value in values {
        let bin = (((value - lo) / width).floor() as usize).min(bins - 1);
        counts[bin] += 1;
    }

    Ok(Histogram {
        column: name.to_string(),
        edges,
        counts,
    })
}

pub fn correlation_matrix<S: AsRef<str>>(
    dataset: &Dataset,
    features: &[S],
) -> Result<CorrelationMatrix> {
    let columns = features
        .iter()
        .map(|f| dataset.numeric_column(f.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    let values = columns
        .iter()
        .enumerate()
        .map(|(i, a)| {
            columns
                .iter()
                .enumerate()
                .map(|(j, b)| {
                    let r = pearson(a, b);
                    if i == j {
                        r.map(|_| 1.0)
                    } else {
                        r
                    }
                })
                .collect()
        })
        .collect();

    Ok(CorrelationMatrix {
        features: features.iter().map(|f| f.as_ref().to_string()).collect(),
        values,
    })
}

/// Pearson correlation; `None` when either side has zero variance
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    if var_a <= 0.0 || var_b <= 0.0 {
        return None;
    }
    Some((cov / (var_a.sqrt() * var_b.sqrt())).clamp(-1.0, 1.0))
}

fn box_summary(values: &[f64]) -> Option<BoxSummary> {
    let mut sorted = values.to_vec();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    Some(BoxSummary {
        count: sorted.len(),
        min: sorted[0],
        q1: quantile(&sorted, 0.25),
        median: quantile(&sorted, 0.5),
        q3: quantile(&sorted, 0.75),
        max: sorted[sorted.len() - 1],
    })
}

fn mean(values: &[f64]) -> Result<f64> {
    if values.is_empty() {
        return Err(PipelineError::InsufficientData(
            "mean of an empty column".to_string(),
        ));
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

fn sorted_copy(name: &str, values: &[f64]) -> Result<Vec<f64>> {
    if values.is_empty() {
        return Err(PipelineError::InsufficientData(format!(
            "column '{name}' has no values"
        )));
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Ok(sorted)
}

/// Linear-interpolated quantile of non-empty sorted data
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Column;

    fn dataset() -> Dataset {
        Dataset::from_columns(vec![
            ("satisfaction_score", Column::Numeric(vec![8.0, 2.0, 6.0, 4.0])),
            ("stress_level", Column::Numeric(vec![2.0, 9.0, 3.0, 7.0])),
            ("constant", Column::Numeric(vec![1.0; 4])),
            ("left_company", Column::Numeric(vec![0.0, 1.0, 0.0, 1.0])),
        ])
        .unwrap()
    }

    #[test]
    fn test_overview() {
        let overview = overview(&dataset(), "left_company").unwrap();
        assert_eq!(overview.total_rows, 4);
        assert_eq!(overview.left_count, 2);
        assert_eq!(overview.left_share, 0.5);
        assert_eq!(overview.mean_satisfaction, 5.0);
        assert_eq!(overview.mean_stress, 5.25);
    }

    #[test]
    fn test_describe() {
        let summaries = describe(&dataset(), &["satisfaction_score"]).unwrap();
        let s = &summaries[0];
        assert_eq!(s.count, 4);
        assert_eq!(s.mean, 5.0);
        assert_eq!(s.median, 5.0);
        assert_eq!(s.min, 2.0);
        assert_eq!(s.max, 8.0);
        assert_eq!(s.q1, 3.5);
        assert_eq!(s.q3, 6.5);
        let expected_std = (20.0f64 / 3.0).sqrt();
        assert!((s.std.unwrap() - expected_std).abs() < 1e-12);
    }

    #[test]
    fn test_single_value_std_undefined() {
        let s = summarize("x", &[3.0]).unwrap();
        assert_eq!(s.std, None);
        assert_eq!(s.median, 3.0);
    }

    #[test]
    fn test_describe_missing_column() {
        assert!(matches!(
            describe(&dataset(), &["burnout_risk"]),
            Err(PipelineError::Schema(_))
        ));
    }

    #[test]
    fn test_group_summaries() {
        let groups = group_summaries(&dataset(), &["stress_level"], "left_company").unwrap();
        let stress = &groups[0];
        assert_eq!(stress.stayed.as_ref().unwrap().median, 2.5);
        assert_eq!(stress.left.as_ref().unwrap().median, 8.0);
        assert_eq!(stress.left.as_ref().unwrap().count, 2);
    }

    #[test]
    fn test_class_counts() {
        let counts = class_counts(&[true, false, false, false]);
        assert_eq!(counts[0].class, "Stayed");
        assert_eq!(counts[0].count, 3);
        assert_eq!(counts[1].share, 0.25);
    }

    #[test]
    fn test_histogram() {
        let h = histogram("x", &[0.0, 1.0, 2.0, 3.0, 4.0], 2).unwrap();
        assert_eq!(h.edges, vec![0.0, 2.0, 4.0]);
        assert_eq!(h.counts, vec![2, 3]);

        let constant = histogram("c", &[1.0, 1.0], 4).unwrap();
        assert_eq!(constant.counts.iter().sum::<usize>(), 2);
        assert!(histogram("x", &[1.0], 0).is_err());
        assert!(histogram("x", &[], 3).is_err());
    }

    #[test]
    fn test_correlation_matrix() {
        let matrix = correlation_matrix(
            &dataset(),
            &["satisfaction_score", "stress_level", "constant"],
        )
        .unwrap();

        assert_eq!(matrix.get("satisfaction_score", "satisfaction_score"), Some(1.0));
        let r = matrix.get("satisfaction_score", "stress_level").unwrap();
        assert!(r < -0.9);
        assert_eq!(r, matrix.get("stress_level", "satisfaction_score").unwrap());
        assert_eq!(matrix.get("constant", "stress_level"), None);
    }
}
