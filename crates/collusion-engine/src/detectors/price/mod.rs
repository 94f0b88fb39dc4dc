//! Price analysis
//!
//! Extracts one total per bid (the declared price when the caller supplied
//! one, otherwise the first amount found in the text) and runs the sequence
//! detectors over the totals, then compares cost structures pair by pair.

pub mod cost_ratio;
pub mod sequence;

use bid_types::{Alert, AlertKind, Dimension, DimensionResult, DocumentRecord, Evidence};
use serde::{Deserialize, Serialize};
use tracing::debug;

use self::cost_ratio::{compare_cost_breakdowns, CostBreakdown, CostRatioMatch};
use self::sequence::{
    detect_arithmetic_sequence, detect_fixed_coefficients, detect_geometric_sequence,
    detect_price_cluster, ArithmeticSequence, GeometricSequence, PriceCluster, PricedBid,
};
use crate::extractors::numeric::{extract_cost_breakdown, extract_total_price};

pub const ARITHMETIC_SEVERITY: f64 = 0.9;
pub const GEOMETRIC_SEVERITY: f64 = 0.9;
pub const FIXED_COEFFICIENT_SEVERITY: f64 = 0.7;
pub const CLUSTER_SEVERITY: f64 = 0.8;

/// Relative tolerances of the sequence detectors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceTolerances {
    pub arithmetic: f64,
    pub geometric: f64,
    pub fixed_coefficient: f64,
    pub cluster: f64,
}

impl Default for PriceTolerances {
    fn default() -> Self {
        Self {
            arithmetic: 0.02,
            geometric: 0.02,
            fixed_coefficient: 0.005,
            cluster: 0.03,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAnalysisReport {
    pub prices: Vec<PricedBid>,
    pub arithmetic: Option<ArithmeticSequence>,
    pub geometric: Option<GeometricSequence>,
    pub fixed_coefficient_pairs: usize,
    pub cluster: Option<PriceCluster>,
    pub cost_breakdowns: Vec<CostBreakdown>,
    pub alerts: Vec<Alert>,
    pub max_severity: f64,
}

#[derive(Debug, Clone, Default)]
pub struct PriceAnalyzer {
    tolerances: PriceTolerances,
}

impl PriceAnalyzer {
    pub fn new(tolerances: PriceTolerances) -> Self {
        Self { tolerances }
    }

    /// Documents with a positive total, in batch order
    pub fn priced_bids(&self, documents: &[DocumentRecord]) -> Vec<PricedBid> {
        documents
            .iter()
            .enumerate()
            .filter_map(|(index, doc)| {
                let price = doc
                    .declared_price
                    .or_else(|| extract_total_price(&doc.normalized_text))?;
                (price > 0.0).then(|| PricedBid {
                    index,
                    doc_id: doc.id.clone(),
                    bidder: doc.bidder_label.clone(),
                    price,
                })
            })
            .collect()
    }

    pub fn cost_breakdowns(&self, documents: &[DocumentRecord]) -> Vec<CostBreakdown> {
        documents
            .iter()
            .enumerate()
            .filter_map(|(index, doc)| {
                CostBreakdown::new(
                    index,
                    doc.id.clone(),
                    doc.bidder_label.clone(),
                    extract_cost_breakdown(&doc.normalized_text),
                )
            })
            .collect()
    }

    pub fn analyze(&self, documents: &[DocumentRecord]) -> PriceAnalysisReport {
        let tol = &self.tolerances;
        let prices = self.priced_bids(documents);
        let values: Vec<f64> = prices.iter().map(|p| p.price).collect();
        let mut alerts = Vec::new();

        let arithmetic = detect_arithmetic_sequence(&values, tol.arithmetic);
        if let Some(seq) = arithmetic.as_ref().filter(|s| s.flagged) {
            let summary = if seq.common_difference == 0.0 {
                "All bid prices are identical".to_string()
            } else {
                format!(
                    "Bid prices form an arithmetic sequence, common difference about {:.2}",
                    seq.common_difference
                )
            };
            alerts.push(Alert::batch(
                AlertKind::ArithmeticSequence,
                ARITHMETIC_SEVERITY,
                summary,
                Evidence::ArithmeticSequence {
                    common_difference: seq.common_difference,
                    max_deviation: seq.max_deviation,
                    sorted_prices: seq.sorted_prices.clone(),
                },
            ));
        }

        let geometric = detect_geometric_sequence(&values, tol.geometric);
        if let Some(seq) = geometric.as_ref().filter(|s| s.flagged) {
            alerts.push(Alert::batch(
                AlertKind::GeometricSequence,
                GEOMETRIC_SEVERITY,
                format!(
                    "Bid prices form a geometric sequence, common ratio about {:.4}",
                    seq.common_ratio
                ),
                Evidence::GeometricSequence {
                    common_ratio: seq.common_ratio,
                    max_deviation: seq.max_deviation,
                    ratios: seq.ratios.clone(),
                },
            ));
        }

        let fixed = detect_fixed_coefficients(&prices, tol.fixed_coefficient);
        let fixed_coefficient_pairs = fixed.len();
        for (i, j, m) in fixed {
            let summary = format!(
                "Price of {} is {:.2}x the price of {}",
                documents[i].bidder_label, m.matched_coefficient, documents[j].bidder_label
            );
            alerts.push(Alert::pairwise(
                AlertKind::FixedCoefficient,
                &documents[i],
                &documents[j],
                FIXED_COEFFICIENT_SEVERITY,
                summary,
                Evidence::FixedCoefficient(m),
            ));
        }

        let cluster = detect_price_cluster(&values, tol.cluster);
        if let Some(c) = cluster.as_ref().filter(|c| c.flagged) {
            alerts.push(Alert::batch(
                AlertKind::PriceCluster,
                CLUSTER_SEVERITY,
                format!(
                    "Bid prices are tightly clustered around {:.2}, max deviation {:.1}%",
                    c.average_price, c.max_deviation_pct
                ),
                Evidence::PriceCluster {
                    average_price: c.average_price,
                    max_deviation_pct: c.max_deviation_pct,
                    avg_deviation_pct: c.avg_deviation_pct,
                    within_threshold: c.within_threshold,
                    total: c.total,
                },
            ));
        }

        let cost_breakdowns = self.cost_breakdowns(documents);
        for m in compare_cost_breakdowns(&cost_breakdowns) {
            alerts.push(cost_ratio_alert(documents, m));
        }

        let max_severity = alerts.iter().map(|a| a.score).fold(0.0, f64::max);
        debug!(
            priced = prices.len(),
            alerts = alerts.len(),
            "price analysis finished"
        );
        PriceAnalysisReport {
            prices,
            arithmetic,
            geometric,
            fixed_coefficient_pairs,
            cluster,
            cost_breakdowns,
            alerts,
            max_severity,
        }
    }

    pub fn detect(&self, documents: &[DocumentRecord]) -> DimensionResult {
        DimensionResult::from_alerts(Dimension::PriceAnalysis, self.analyze(documents).alerts)
    }
}

fn cost_ratio_alert(documents: &[DocumentRecord], m: CostRatioMatch) -> Alert {
    let summary = format!(
        "Cost structures nearly identical over {} categories: mean difference {:.2}%, max {:.2}%",
        m.compared.len(),
        m.avg_ratio_diff * 100.0,
        m.max_ratio_diff * 100.0
    );
    Alert::pairwise(
        AlertKind::CostRatioMatch,
        &documents[m.index_a],
        &documents[m.index_b],
        m.severity,
        summary,
        Evidence::CostRatio {
            avg_ratio_diff: m.avg_ratio_diff,
            max_ratio_diff: m.max_ratio_diff,
            compared: m.compared,
            ratios_a: m.ratios_a,
            ratios_b: m.ratios_b,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn priced(id: &str, price: f64) -> DocumentRecord {
        DocumentRecord::new(id, format!("{id}公司"), "").with_declared_price(price)
    }

    #[test]
    fn test_arithmetic_batch_alert() {
        let docs = vec![
            priced("a", 1_000_000.0),
            priced("b", 1_050_000.0),
            priced("c", 1_100_000.0),
            priced("d", 1_150_000.0),
        ];
        let report = PriceAnalyzer::default().analyze(&docs);
        let alert = report
            .alerts
            .iter()
            .find(|a| a.kind == AlertKind::ArithmeticSequence)
            .unwrap();
        assert_eq!(alert.score, ARITHMETIC_SEVERITY);
        assert!(alert.pair.is_none());
        assert_eq!(report.max_severity, 0.9);
    }

    #[test]
    fn test_prices_from_text_and_declared() {
        let docs = vec![
            DocumentRecord::new("a", "甲", "投标总价：1,000,000元"),
            DocumentRecord::new("b", "乙", "投标总价：999元").with_declared_price(2_000_000.0),
            DocumentRecord::new("c", "丙", "无报价"),
        ];
        let prices = PriceAnalyzer::default().priced_bids(&docs);
        let values: Vec<f64> = prices.iter().map(|p| p.price).collect();
        assert_eq!(values, vec![1_000_000.0, 2_000_000.0]);
    }

    #[test]
    fn test_fixed_coefficient_pair_alert() {
        let docs = vec![priced("a", 950_000.0), priced("b", 1_000_000.0)];
        let report = PriceAnalyzer::default().analyze(&docs);
        assert_eq!(report.fixed_coefficient_pairs, 1);
        let alert = &report.alerts[0];
        assert_eq!(alert.kind, AlertKind::FixedCoefficient);
        assert_eq!(alert.score, FIXED_COEFFICIENT_SEVERITY);
        assert_eq!(alert.pair.as_ref().unwrap().doc_a_id, "a");
        // two prices: no sequence or cluster checks
        assert!(report.arithmetic.is_none());
        assert!(report.cluster.is_none());
    }

    #[test]
    fn test_cluster_and_cost_ratio() {
        let structure = "人工费：300000元，材料费：500000元，税金：90000元";
        let docs = vec![
            DocumentRecord::new("a", "甲", structure).with_declared_price(1_000_000.0),
            DocumentRecord::new("b", "乙", structure).with_declared_price(1_002_000.0),
            DocumentRecord::new("c", "丙", "").with_declared_price(998_000.0),
        ];
        let report = PriceAnalyzer::default().analyze(&docs);
        let kinds: BTreeSet<AlertKind> = report.alerts.iter().map(|a| a.kind).collect();
        assert!(kinds.contains(&AlertKind::PriceCluster));
        assert!(kinds.contains(&AlertKind::CostRatioMatch));
        assert_eq!(report.cost_breakdowns.len(), 2);
        assert_eq!(report.max_severity, 1.0);
    }

    #[test]
    fn test_no_prices() {
        let docs = vec![DocumentRecord::new("a", "甲", ""), DocumentRecord::new("b", "乙", "")];
        let result = PriceAnalyzer::default().detect(&docs);
        assert_eq!(result.max_score, 0.0);
        assert!(result.alerts.is_empty());
    }
}
