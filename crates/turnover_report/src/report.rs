//! Report assembly
//!
//! Each page section is computed independently; a failure is kept in place
//! of that section's content and the rest of the report still renders.

use serde::Serialize;
use tracing::warn;
use turnover_pipeline::metrics::ClassificationReport;
use turnover_pipeline::stats::{
    self, ClassCount, ColumnSummary, CorrelationMatrix, GroupSummary, Histogram, Overview,
};
use turnover_pipeline::{
    Dataset, FeatureImportance, ModelMetadata, PipelineError, SplitSummary, TurnoverPipeline,
};

/// Outcome of one report section
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", content = "content", rename_all = "snake_case")]
pub enum Section<T> {
    Ready(T),
    Failed { error: String },
}

impl<T> Section<T> {
    fn from_result(name: &str, result: Result<T, PipelineError>) -> Self {
        match result {
            Ok(value) => Section::Ready(value),
            Err(err) => {
                warn!(section = name, error = %err, "report section unavailable");
                Section::Failed {
                    error: err.to_string(),
                }
            }
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Section::Ready(value) => Some(value),
            Section::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Section::Failed { .. })
    }
}

/// Central tendency and spread of the wellbeing columns
#[derive(Clone, Debug, Serialize)]
pub struct StatisticsSection {
    pub summaries: Vec<ColumnSummary>,
    pub histogram: Histogram,
}

/// Who leaves: label counts and per-label distributions
#[derive(Clone, Debug, Serialize)]
pub struct TurnoverSection {
    pub counts: Vec<ClassCount>,
    pub groups: Vec<GroupSummary>,
}

/// Fitted model and its held-out evaluation
#[derive(Clone, Debug, Serialize)]
pub struct ModelSection {
    pub features: Vec<String>,
    pub split: SplitSummary,
    pub metadata: ModelMetadata,
    pub evaluation: ClassificationReport,
}

pub const ETHICS_NOTES: [&str; 4] = [
    "The dataset is synthetic, reducing privacy risks.",
    "Real-world HR data may contain bias.",
    "Predictions should support, not replace, human decision-making.",
    "GDPR principles such as transparency and fairness must be considered.",
];

/// The full page-like report
#[derive(Clone, Debug, Serialize)]
pub struct Report {
    pub title: String,
    pub generated_at: String,
    pub dataset_fingerprint: String,
    pub overview: Section<Overview>,
    pub statistics: Section<StatisticsSection>,
    pub turnover: Section<TurnoverSection>,
    pub relationships: Section<CorrelationMatrix>,
    pub model: Section<ModelSection>,
    /// Ascending by importance
    pub drivers: Section<Vec<FeatureImportance>>,
    pub notes: Vec<String>,
}

impl Report {
    /// Names of sections that could not be produced
    pub fn failed_sections(&self) -> Vec<&'static str> {
        [
            ("overview", self.overview.is_failed()),
            ("statistics", self.statistics.is_failed()),
            ("turnover", self.turnover.is_failed()),
            ("relationships", self.relationships.is_failed()),
            ("model", self.model.is_failed()),
            ("drivers", self.drivers.is_failed()),
        ]
        .into_iter()
        .filter_map(|(name, failed)| failed.then_some(name))
        .collect()
    }
}

/// Compute every section of the report for one dataset
pub fn build_report(dataset: &Dataset, pipeline: &mut TurnoverPipeline) -> Report {
    let data = pipeline.config().data.clone();

    let overview = Section::from_result("overview", stats::overview(dataset, &data.label));

    let statistics = Section::from_result(
        "statistics",
        stats::describe(dataset, &data.stats_features).and_then(|summaries| {
            let values = dataset.numeric_column(&data.histogram_feature)?;
            let histogram = stats::histogram(&data.histogram_feature, values, data.histogram_bins)?;
            Ok(StatisticsSection {
                summaries,
                histogram,
            })
        }),
    );

    let turnover = Section::from_result(
        "turnover",
        dataset.label_column(&data.label).and_then(|labels| {
            Ok(TurnoverSection {
                counts: stats::class_counts(&labels),
                groups: stats::group_summaries(dataset, &data.stats_features, &data.label)?,
            })
        }),
    );

    let relationships = Section::from_result(
        "relationships",
        stats::correlation_matrix(dataset, &data.correlation_features),
    );

    let (model, drivers) = match pipeline.run(dataset) {
        Ok(run) => (
            Section::Ready(ModelSection {
                features: run.model.feature_names().to_vec(),
                split: run.split.clone(),
                metadata: run.model.metadata().clone(),
                evaluation: run.evaluation.clone(),
            }),
            Section::Ready(run.importances.clone()),
        ),
        Err(err) => {
            warn!(error = %err, "turnover model unavailable");
            let error = err.to_string();
            (
                Section::Failed {
                    error: error.clone(),
                },
                Section::Failed { error },
            )
        }
    };

    Report {
        title: "Employee Turnover Analysis".to_string(),
        generated_at: chrono::Utc::now().to_rfc3339(),
        dataset_fingerprint: dataset.fingerprint().to_string(),
        overview,
        statistics,
        turnover,
        relationships,
        model,
        drivers,
        notes: ETHICS_NOTES.iter().map(|note| note.to_string()).collect(),
    }
}
