//! Weighted fusion of dimension scores into one verdict
//!
//! The composite score is the weighted mean of the dimension maxima, taken
//! over the dimensions that actually ran. A dimension that was disabled or
//! degraded contributes to neither the numerator nor the denominator, so a
//! missing signal never drags the verdict towards zero.

use std::collections::BTreeMap;

use bid_types::{Alert, Dimension, DimensionResult, RiskLevel, RiskVerdict};
use serde::{Deserialize, Serialize};

/// Alerts kept in the verdict
pub const TOP_ALERTS: usize = 10;

const CRITICAL_THRESHOLD: f64 = 0.7;
const HIGH_THRESHOLD: f64 = 0.5;
const MEDIUM_THRESHOLD: f64 = 0.3;

/// Weight of each dimension in the composite score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    pub content_similarity: f64,
    pub metadata_match: f64,
    pub format_match: f64,
    pub timestamp_cluster: f64,
    pub entity_cross: f64,
    pub error_pattern: f64,
    pub price_analysis: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            content_similarity: 0.20,
            metadata_match: 0.12,
            format_match: 0.08,
            timestamp_cluster: 0.10,
            entity_cross: 0.20,
            error_pattern: 0.10,
            price_analysis: 0.20,
        }
    }
}

impl RiskWeights {
    pub fn weight(&self, dimension: Dimension) -> f64 {
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

    pub fn sum(&self) -> f64 {
        Dimension::ALL.iter().map(|d| self.weight(*d)).sum()
    }
}

pub fn classify(normalized: f64) -> RiskLevel {
    if normalized >= CRITICAL_THRESHOLD {
        RiskLevel::Critical
    } else if normalized >= HIGH_THRESHOLD {
        RiskLevel::High
    } else if normalized >= MEDIUM_THRESHOLD {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Risk of a single document pair from its three pairwise scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairRisk {
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub dimension_scores: BTreeMap<Dimension, f64>,
}

#[derive(Debug, Clone)]
pub struct RiskAggregator {
    weights: RiskWeights,
    /// Alerts must score strictly above this to be reported
    alert_gate: f64,
}

impl RiskAggregator {
    pub fn new(weights: RiskWeights, alert_gate: f64) -> Self {
        Self { weights, alert_gate }
    }

    pub fn weights(&self) -> &RiskWeights {
        &self.weights
    }

    fn weighted_mean(&self, scores: &BTreeMap<Dimension, f64>) -> (f64, BTreeMap<Dimension, f64>) {
        let mut total = 0.0;
        let mut weight_sum = 0.0;
        let mut used = BTreeMap::new();
        for (dimension, score) in scores {
            let w = self.weights.weight(*dimension);
            total += score * w;
            weight_sum += w;
            used.insert(*dimension, w);
        }
        let normalized = if weight_sum > 0.0 { total / weight_sum } else { 0.0 };
        (normalized, used)
    }

    /// Fuse the results of one run into a verdict
    pub fn aggregate(&self, results: &[DimensionResult]) -> RiskVerdict {
        let mut dimension_scores = BTreeMap::new();
        let mut scored = BTreeMap::new();
        let mut degraded = Vec::new();
        for result in results {
            if result.degraded {
                dimension_scores.insert(result.dimension, 0.0);
                degraded.push(result.dimension);
            } else {
                dimension_scores.insert(result.dimension, result.max_score);
                scored.insert(result.dimension, result.max_score);
            }
        }

        let (normalized, weights_used) = self.weighted_mean(&scored);
        let risk_level = classify(normalized);

        let mut pool: Vec<&Alert> = results
            .iter()
            .filter(|r| !r.degraded)
            .flat_map(|r| r.alerts.iter())
            .filter(|a| a.score > self.alert_gate)
            .collect();
        pool.sort_by(|a, b| b.score.total_cmp(&a.score));
        let alert_count = pool.len();
        let top_alerts = pool.into_iter().take(TOP_ALERTS).cloned().collect();

        RiskVerdict {
            risk_score: round_to(normalized * 100.0, 1),
            risk_level,
            normalized_score: round_to(normalized, 4),
            narrative: narrative(risk_level, &scored, &degraded, alert_count),
            dimension_scores,
            weights_used,
            alert_count,
            top_alerts,
        }
    }

    /// Risk of one pair from its similarity, metadata and format scores
    pub fn pair_risk(&self, similarity: f64, metadata: f64, format: f64) -> PairRisk {
        let dimension_scores = BTreeMap::from([
            (Dimension::ContentSimilarity, similarity),
            (Dimension::MetadataMatch, metadata),
            (Dimension::FormatMatch, format),
        ]);
        let (normalized, _) = self.weighted_mean(&dimension_scores);
        PairRisk {
            risk_score: round_to(normalized * 100.0, 1),
            risk_level: classify(normalized),
            dimension_scores,
        }
    }
}

impl Default for RiskAggregator {
    fn default() -> Self {
        Self::new(RiskWeights::default(), 0.20)
    }
}

fn level_prefix(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Critical => "Critical risk: strong indications of collusive bidding",
        RiskLevel::High => "High risk: several anomalous indicators detected",
        RiskLevel::Medium => "Medium risk: some indicators need attention",
        RiskLevel::Low => "Low risk: no significant anomalies detected",
    }
}

fn narrative(
    level: RiskLevel,
    scores: &BTreeMap<Dimension, f64>,
    degraded: &[Dimension],
    alert_count: usize,
) -> String {
    let score = |d: Dimension| scores.get(&d).copied().unwrap_or(0.0);
    let pct = |d: Dimension| (score(d) * 100.0).round();

    let checks = [
        (Dimension::ContentSimilarity, 0.2, "abnormal text similarity"),
        (Dimension::MetadataMatch, 0.3, "related document metadata"),
        (Dimension::EntityCross, 0.3, "entities leaked across bids"),
        (Dimension::ErrorPattern, 0.3, "shared error patterns"),
        (Dimension::PriceAnalysis, 0.3, "mathematical patterns in prices"),
        (Dimension::FormatMatch, 0.5, "highly consistent format fingerprints"),
    ];
    let mut details: Vec<String> = checks
        .iter()
        .filter(|(d, threshold, _)| score(*d) > *threshold)
        .map(|(d, _, text)| format!("{text} ({}%)", pct(*d)))
        .collect();
    if score(Dimension::TimestampCluster) > 0.5 {
        details.push("clustered document timestamps".to_string());
    }

    let mut out = level_prefix(level).to_string();
    if !details.is_empty() {
        out.push_str(&format!(". {}. {alert_count} alerts involved.", details.join("; ")));
    }
    if !degraded.is_empty() {
        let names: Vec<&str> = degraded.iter().map(|d| d.as_str()).collect();
        out.push_str(&format!(" Not scored: {}.", names.join(", ")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bid_types::{AlertKind, Evidence};

    fn result(dimension: Dimension, score: f64) -> DimensionResult {
        let kind = match dimension {
            Dimension::ContentSimilarity => AlertKind::ContentSimilarity,
            Dimension::MetadataMatch => AlertKind::MetadataMatch,
            Dimension::FormatMatch => AlertKind::FormatMatch,
            Dimension::TimestampCluster => AlertKind::TimestampCluster,
            Dimension::EntityCross => AlertKind::EntityLeak,
            Dimension::ErrorPattern => AlertKind::CommonTypo,
            Dimension::PriceAnalysis => AlertKind::PriceCluster,
        };
        let alert = Alert::batch(kind, score, "test", Evidence::SharedErrors { items: vec![] });
        DimensionResult::from_alerts(dimension, vec![alert])
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        assert!((RiskWeights::default().sum() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_classification() {
        assert_eq!(classify(0.75), RiskLevel::Critical);
        assert_eq!(classify(0.55), RiskLevel::High);
        assert_eq!(classify(0.35), RiskLevel::Medium);
        assert_eq!(classify(0.10), RiskLevel::Low);
        assert_eq!(classify(0.7), RiskLevel::Critical);
    }

    #[test]
    fn test_all_dimensions_high() {
        let results: Vec<_> = Dimension::ALL.iter().map(|d| result(*d, 0.9)).collect();
        let verdict = RiskAggregator::default().aggregate(&results);
        assert!((verdict.normalized_score - 0.9).abs() < 1e-9);
        assert_eq!(verdict.risk_score, 90.0);
        assert_eq!(verdict.risk_level, RiskLevel::Critical);
        assert_eq!(verdict.alert_count, 7);
        assert!(verdict.narrative.starts_with("Critical risk"));
        assert!(verdict.narrative.contains("7 alerts involved"));
    }

    #[test]
    fn test_missing_dimensions_excluded() {
        let results = vec![
            result(Dimension::ContentSimilarity, 0.8),
            result(Dimension::MetadataMatch, 0.2),
        ];
        let verdict = RiskAggregator::default().aggregate(&results);
        // (0.8 * 0.20 + 0.2 * 0.12) / 0.32
        assert!((verdict.normalized_score - 0.575).abs() < 1e-9);
        assert_eq!(verdict.risk_level, RiskLevel::High);
        assert_eq!(verdict.weights_used.len(), 2);
    }

    #[test]
    fn test_degraded_dimension_reported_but_not_weighted() {
        let results = vec![
            result(Dimension::ContentSimilarity, 0.6),
            DimensionResult::degraded(Dimension::PriceAnalysis, "panicked"),
        ];
        let verdict = RiskAggregator::default().aggregate(&results);
        assert!((verdict.normalized_score - 0.6).abs() < 1e-9);
        assert_eq!(verdict.dimension_scores[&Dimension::PriceAnalysis], 0.0);
        assert!(!verdict.weights_used.contains_key(&Dimension::PriceAnalysis));
        assert!(verdict.narrative.contains("price_analysis"));
    }

    #[test]
    fn test_alert_gate_and_truncation() {
        let mut alerts: Vec<Alert> = (0..15)
            .map(|i| {
                Alert::batch(
                    AlertKind::ContentSimilarity,
                    0.3 + f64::from(i) * 0.01,
                    "",
                    Evidence::SharedErrors { items: vec![] },
                )
            })
            .collect();
        alerts.push(Alert::batch(
            AlertKind::ContentSimilarity,
            0.2,
            "at the gate",
            Evidence::SharedErrors { items: vec![] },
        ));
        let results = vec![DimensionResult::from_alerts(Dimension::ContentSimilarity, alerts)];
        let verdict = RiskAggregator::default().aggregate(&results);
        assert_eq!(verdict.alert_count, 15);
        assert_eq!(verdict.top_alerts.len(), TOP_ALERTS);
        assert!(verdict
            .top_alerts
            .windows(2)
            .all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_empty_results() {
        let verdict = RiskAggregator::default().aggregate(&[]);
        assert_eq!(verdict.risk_score, 0.0);
        assert_eq!(verdict.risk_level, RiskLevel::Low);
        assert_eq!(verdict.narrative, "Low risk: no significant anomalies detected");
    }

    #[test]
    fn test_pair_risk() {
        let risk = RiskAggregator::default().pair_risk(0.9, 0.7, 0.5);
        // (0.18 + 0.084 + 0.04) / 0.40
        assert_eq!(risk.risk_score, 76.0);
        assert_eq!(risk.risk_level, RiskLevel::Critical);
    }
}
