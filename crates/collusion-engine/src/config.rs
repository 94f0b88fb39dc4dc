//! Per-run analysis configuration
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration. Hand-tuned constants live under `[tunables]`.
//!
//! ```toml
//! similarity_threshold = 0.25
//! timestamp_diff_minutes = 10
//! parallel = false
//!
//! [dimensions]
//! format_match = false
//!
//! [tunables.risk_weights]
//! content_similarity = 0.30
//! format_match = 0.0
//! ```

use std::fs;
use std::path::Path;

use anyhow::Context;
use bid_types::Dimension;
use serde::{Deserialize, Serialize};

use crate::detectors::metadata::MetadataWeights;
use crate::detectors::price::PriceTolerances;
use crate::error::ConfigError;
use crate::risk::RiskWeights;

/// Allowed distance of the risk weight sum from 1.0
const WEIGHT_SUM_EPSILON: f64 = 1e-3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Alerts scoring at or below this gate are left out of the verdict
    pub similarity_threshold: f64,
    /// Window for timestamp proximity in metadata comparison and clustering
    pub timestamp_diff_minutes: u32,
    /// Run dimensions on scoped threads
    pub parallel: bool,
    pub dimensions: DimensionToggles,
    pub tunables: Tunables,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.20,
            timestamp_diff_minutes: 5,
            parallel: true,
            dimensions: DimensionToggles::default(),
            tunables: Tunables::default(),
        }
    }
}

/// One enable flag per dimension, all on by default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DimensionToggles {
    pub content_similarity: bool,
    pub metadata_match: bool,
    pub format_match: bool,
    pub timestamp_cluster: bool,
    pub entity_cross: bool,
    pub error_pattern: bool,
    pub price_analysis: bool,
}

impl Default for DimensionToggles {
    fn default() -> Self {
        Self {
            content_similarity: true,
            metadata_match: true,
            format_match: true,
            timestamp_cluster: true,
            entity_cross: true,
            error_pattern: true,
            price_analysis: true,
        }
    }
}

impl DimensionToggles {
    pub fn is_enabled(&self, dimension: Dimension) -> bool {
        match dimension {
            Dimension::ContentSimilarity => self.content_similarity,
            Dimension::MetadataMatch => self.metadata_match,
            Dimension::FormatMatch => self.format_match,
            Dimension::TimestampCluster => self.timestamp_cluster,
            Dimension::EntityCross => self.entity_cross,
            Dimension::ErrorPattern => self.error_pattern,
            Dimension::PriceAnalysis => self.price_analysis,
        }
    }

    pub fn set(&mut self, dimension: Dimension, enabled: bool) {
        let flag = match dimension {
            Dimension::ContentSimilarity => &mut self.content_similarity,
            Dimension::MetadataMatch => &mut self.metadata_match,
            Dimension::FormatMatch => &mut self.format_match,
            Dimension::TimestampCluster => &mut self.timestamp_cluster,
            Dimension::EntityCross => &mut self.entity_cross,
            Dimension::ErrorPattern => &mut self.error_pattern,
            Dimension::PriceAnalysis => &mut self.price_analysis,
        };
        *flag = enabled;
    }

    /// Enabled dimensions in run order
    pub fn enabled(&self) -> Vec<Dimension> {
        Dimension::ALL
            .iter()
            .copied()
            .filter(|d| self.is_enabled(*d))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tunables {
    pub risk_weights: RiskWeights,
    pub metadata_weights: MetadataWeights,
    pub price_tolerances: PriceTolerances,
}

impl AnalysisConfig {
    /// Load and validate a configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Parse and validate a configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(s).context("Failed to parse TOML configuration")?;
        config.validate().context("Configuration rejected")?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ConfigError::InvalidThreshold(self.similarity_threshold));
        }

        let risk = &self.tunables.risk_weights;
        for dimension in Dimension::ALL {
            check_weight(dimension.as_str(), risk.weight(dimension))?;
        }
        let sum = risk.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(ConfigError::WeightSum(sum));
        }

        let meta = &self.tunables.metadata_weights;
        let names = [
            "author",
            "last_modified_by",
            "company",
            "creator_producer",
            "software_version",
            "timestamp",
        ];
        for (name, value) in names.iter().zip(meta.as_array()) {
            check_weight(name, value)?;
        }

        let tol = &self.tunables.price_tolerances;
        for (name, value) in [
            ("arithmetic", tol.arithmetic),
            ("geometric", tol.geometric),
            ("fixed_coefficient", tol.fixed_coefficient),
            ("cluster", tol.cluster),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidTolerance {
                    name: name.to_string(),
                    value,
                });
            }
        }
        Ok(())
    }
}

fn check_weight(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidWeight {
            name: name.to_string(),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.similarity_threshold, 0.20);
        assert_eq!(config.timestamp_diff_minutes, 5);
        assert_eq!(config.dimensions.enabled().len(), 7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = AnalysisConfig::from_str("").unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let toml = r#"
            similarity_threshold = 0.35
            parallel = false

            [dimensions]
            format_match = false

            [tunables.price_tolerances]
            cluster = 0.05
        "#;
        let config = AnalysisConfig::from_str(toml).unwrap();
        assert_eq!(config.similarity_threshold, 0.35);
        assert!(!config.parallel);
        assert!(!config.dimensions.is_enabled(Dimension::FormatMatch));
        assert!(config.dimensions.is_enabled(Dimension::PriceAnalysis));
        assert_eq!(config.tunables.price_tolerances.cluster, 0.05);
        assert_eq!(config.tunables.price_tolerances.arithmetic, 0.02);
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let toml = r#"
            [tunables.risk_weights]
            content_similarity = 0.5
        "#;
        let err = AnalysisConfig::from_str(toml).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::WeightSum(_))
        ));
    }

    #[test]
    fn test_gate_out_of_range() {
        let config = AnalysisConfig {
            similarity_threshold: 1.5,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidThreshold(1.5)));
    }

    #[test]
    fn test_negative_metadata_weight() {
        let mut config = AnalysisConfig::default();
        config.tunables.metadata_weights.company = -0.1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidWeight { ref name, .. }) if name == "company"
        ));
    }

    #[test]
    fn test_zero_tolerance_rejected() {
        let mut config = AnalysisConfig::default();
        config.tunables.price_tolerances.geometric = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTolerance { .. })
        ));
    }

    #[test]
    fn test_toggle_set() {
        let mut toggles = DimensionToggles::default();
        toggles.set(Dimension::EntityCross, false);
        assert_eq!(toggles.enabled().len(), 6);
        assert!(!toggles.enabled().contains(&Dimension::EntityCross));
    }
}
