// Cost-structure comparison between bids
use std::collections::BTreeMap;

use bid_types::CostCategory;
use serde::{Deserialize, Serialize};

use super::sequence::round_to;
use crate::detectors::unordered_pairs;

/// Pairs must share at least this many categories to be compared
const MIN_SHARED_CATEGORIES: usize = 2;
const MAX_MEAN_DIFF: f64 = 0.01;
const MAX_SINGLE_DIFF: f64 = 0.02;
/// Severity drops by this much per unit of mean difference
const SEVERITY_SLOPE: f64 = 50.0;

/// Cost subtotals of one document and their shares of the subtotal sum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub index: usize,
    pub doc_id: String,
    pub bidder: String,
    pub subtotals: BTreeMap<CostCategory, f64>,
    pub ratios: BTreeMap<CostCategory, f64>,
    pub total: f64,
}

impl CostBreakdown {
    /// `None` when the subtotals are empty or do not sum to a positive amount
    pub fn new(
        index: usize,
        doc_id: impl Into<String>,
        bidder: impl Into<String>,
        subtotals: BTreeMap<CostCategory, f64>,
    ) -> Option<Self> {
        let total: f64 = subtotals.values().sum();
        if subtotals.is_empty() || total <= 0.0 {
            return None;
        }
        let ratios = subtotals
            .iter()
            .map(|(category, value)| (*category, round_to(value / total, 4)))
            .collect();
        Some(Self {
            index,
            doc_id: doc_id.into(),
            bidder: bidder.into(),
            subtotals,
            ratios,
            total,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRatioMatch {
    pub index_a: usize,
    pub index_b: usize,
    pub severity: f64,
    pub avg_ratio_diff: f64,
    pub max_ratio_diff: f64,
    pub compared: Vec<CostCategory>,
    pub ratios_a: BTreeMap<CostCategory, f64>,
    pub ratios_b: BTreeMap<CostCategory, f64>,
}

/// Pairs whose cost structures are nearly identical
pub fn compare_cost_breakdowns(breakdowns: &[CostBreakdown]) -> Vec<CostRatioMatch> {
    let mut matches = Vec::new();
    for (i, j) in unordered_pairs(breakdowns.len()) {
        let (a, b) = (&breakdowns[i], &breakdowns[j]);
        let compared: Vec<CostCategory> = a
            .ratios
            .keys()
            .filter(|k| b.ratios.contains_key(*k))
            .copied()
            .collect();
        if compared.len() < MIN_SHARED_CATEGORIES {
            continue;
        }

        let diffs: Vec<f64> = compared
            .iter()
            .map(|k| (a.ratios[k] - b.ratios[k]).abs())
            .collect();
        let avg = diffs.iter().sum::<f64>() / diffs.len() as f64;
        let max = diffs.iter().copied().fold(0.0, f64::max);

        if avg < MAX_MEAN_DIFF && max < MAX_SINGLE_DIFF {
            matches.push(CostRatioMatch {
                index_a: a.index,
                index_b: b.index,
                severity: round_to((1.0 - avg * SEVERITY_SLOPE).clamp(0.0, 1.0), 4),
                avg_ratio_diff: round_to(avg, 4),
                max_ratio_diff: round_to(max, 4),
                compared,
                ratios_a: a.ratios.clone(),
                ratios_b: b.ratios.clone(),
            });
        }
    }
    matches.sort_by(|x, y| y.severity.total_cmp(&x.severity));
    matches
}
