//! Pipeline configuration
//!
//! Loaded from TOML; every field has a default matching the reference
//! turnover analysis, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

use crate::dataset::{HIGH_SIGNAL_FEATURES, LABEL_COLUMN};
use crate::errors::{PipelineError, Result};
use crate::forest::ForestConfig;
use crate::split::SplitConfig;

/// Columns used by each part of the analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Binary label column
    pub label: String,
    /// Ordered model features
    pub features: Vec<String>,
    /// Columns summarised in the statistics section
    pub stats_features: Vec<String>,
    /// Columns in the correlation matrix
    pub correlation_features: Vec<String>,
    /// Column shown as a histogram
    pub histogram_feature: String,
    pub histogram_bins: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        let stats = ["satisfaction_score", "stress_level", "burnout_risk"];
        Self {
            label: LABEL_COLUMN.to_string(),
            features: HIGH_SIGNAL_FEATURES.iter().map(|f| f.to_string()).collect(),
            stats_features: stats.iter().map(|f| f.to_string()).collect(),
            correlation_features: stats
                .iter()
                .chain(["workload_score", "performance_score"].iter())
                .map(|f| f.to_string())
                .collect(),
            histogram_feature: "satisfaction_score".to_string(),
            histogram_bins: 10,
        }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub split: SplitConfig,
    pub forest: ForestConfig,
}

impl PipelineConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path.display(), "loaded pipeline configuration");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.data.label.is_empty() {
            return Err(PipelineError::InvalidConfig("label column is empty".to_string()));
        }
        if self.data.features.is_empty() {
            return Err(PipelineError::InvalidConfig("feature list is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for feature in &self.data.features {
            if !seen.insert(feature) {
                return Err(PipelineError::InvalidConfig(format!(
                    "feature '{feature}' listed more than once"
                )));
            }
        }
        if seen.contains(&self.data.label) {
            return Err(PipelineError::InvalidConfig(format!(
                "label '{}' is also listed as a feature",
                self.data.label
            )));
        }
        if self.data.histogram_bins == 0 {
            return Err(PipelineError::InvalidConfig(
                "histogram_bins must be at least 1".to_string(),
            ));
        }

        self.split.validate()?;
        self.forest.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::{ClassWeight, MaxFeatures};

    #[test]
    fn test_defaults_match_reference_analysis() {
        let config = PipelineConfig::default();
        assert_eq!(config.data.label, "left_company");
        assert_eq!(config.data.features.len(), 8);
        assert_eq!(config.data.correlation_features.len(), 5);
        assert_eq!(config.split.train_ratio, 0.8);
        assert_eq!(config.split.seed, 42);
        assert_eq!(config.forest.n_estimators, 200);
        assert_eq!(config.forest.max_depth, 6);
        assert_eq!(config.forest.class_weight, ClassWeight::BalancedSubsample);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_shipped_config_equals_defaults() {
        let shipped = include_str!("../../../config/turnover.toml");
        let config = PipelineConfig::from_toml_str(shipped).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [split]
            train_ratio = 0.75

            [forest]
            n_estimators = 50
            class_weight = "balanced"
            max_features = { count = 3 }
            "#,
        )
        .unwrap();

        assert_eq!(config.split.train_ratio, 0.75);
        assert_eq!(config.split.seed, 42);
        assert_eq!(config.forest.n_estimators, 50);
        assert_eq!(config.forest.class_weight, ClassWeight::Balanced);
        assert_eq!(config.forest.max_features, MaxFeatures::Count(3));
        assert_eq!(config.forest.max_depth, 6);
    }

    #[test]
    fn test_invalid_values_rejected() {
        for toml in [
            "[split]\ntrain_ratio = 1.5",
            "[forest]\nn_estimators = 0",
            "[data]\nfeatures = []",
            "[data]\nfeatures = [\"a\", \"a\"]",
            "[data]\nfeatures = [\"left_company\"]",
        ] {
            assert!(
                matches!(PipelineConfig::from_toml_str(toml), Err(PipelineError::InvalidConfig(_))),
                "accepted: {toml}"
            );
        }
    }

    #[test]
    fn test_malformed_toml() {
        let result = PipelineConfig::from_toml_str("[forest\nn_estimators = ");
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }
}
