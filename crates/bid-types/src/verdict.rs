use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::alert::{clamp_score, Alert};

/// The seven independent detection signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    ContentSimilarity,
    MetadataMatch,
    FormatMatch,
    TimestampCluster,
    EntityCross,
    ErrorPattern,
    PriceAnalysis,
}

impl Dimension {
    /// All dimensions in run order
    pub const ALL: [Dimension; 7] = [
        Dimension::ContentSimilarity,
        Dimension::MetadataMatch,
        Dimension::FormatMatch,
        Dimension::TimestampCluster,
        Dimension::EntityCross,
        Dimension::ErrorPattern,
        Dimension::PriceAnalysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::ContentSimilarity => "content_similarity",
            Dimension::MetadataMatch => "metadata_match",
            Dimension::FormatMatch => "format_match",
            Dimension::TimestampCluster => "timestamp_cluster",
            Dimension::EntityCross => "entity_cross",
            Dimension::ErrorPattern => "error_pattern",
            Dimension::PriceAnalysis => "price_analysis",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of one detector for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionResult {
    pub dimension: Dimension,
    pub max_score: f64,
    pub alerts: Vec<Alert>,
    /// The detector failed unexpectedly; the score was forced to 0
    #[serde(default)]
    pub degraded: bool,
    #[serde(default)]
    pub failure: Option<String>,
}

impl DimensionResult {
    /// Build a result whose max score is the highest alert score (0 when there are none)
    pub fn from_alerts(dimension: Dimension, alerts: Vec<Alert>) -> Self {
        let max_score = alerts.iter().map(|a| a.score).fold(0.0, f64::max);
        Self {
            dimension,
            max_score: clamp_score(max_score),
            alerts,
            degraded: false,
            failure: None,
        }
    }

    pub fn degraded(dimension: Dimension, failure: impl Into<String>) -> Self {
        Self {
            dimension,
            max_score: 0.0,
            alerts: Vec::new(),
            degraded: true,
            failure: Some(failure.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final composite verdict for one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskVerdict {
    /// 0-100, one decimal
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub normalized_score: f64,
    pub dimension_scores: BTreeMap<Dimension, f64>,
    pub weights_used: BTreeMap<Dimension, f64>,
    /// Alerts above the gate, before truncation to `top_alerts`
    pub alert_count: usize,
    pub top_alerts: Vec<Alert>,
    pub narrative: String,
}
