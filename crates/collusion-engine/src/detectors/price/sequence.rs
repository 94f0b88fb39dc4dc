//! Numeric patterns across the bid totals of one tender
//!
//! Honest bids scatter; coordinated bids are often derived from one another.
//! Four shapes are recognised:
//!
//! - arithmetic progression of the sorted prices
//! - geometric progression of the sorted prices
//! - pairs related by a round coefficient (0.95×, 1.05×, ...)
//! - prices clustered unusually tightly around their mean

use bid_types::FixedCoefficientMatch;
use serde::{Deserialize, Serialize};

use crate::detectors::unordered_pairs;
use crate::patterns::FIXED_COEFFICIENTS;

/// Sequence checks need at least this many prices
pub const MIN_SEQUENCE_PRICES: usize = 3;
/// Share of prices within the threshold that still counts as a cluster
const CLUSTER_MAJORITY: f64 = 0.8;

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn sorted(prices: &[f64]) -> Vec<f64> {
    let mut sorted = prices.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Largest relative deviation of `values` from their mean
fn max_relative_deviation(values: &[f64], center: f64) -> f64 {
    values
        .iter()
        .map(|v| (v - center).abs() / center.abs())
        .fold(0.0, f64::max)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArithmeticSequence {
    pub flagged: bool,
    pub common_difference: f64,
    pub max_deviation: f64,
    pub sorted_prices: Vec<f64>,
    pub differences: Vec<f64>,
}

/// `None` when there are fewer than three prices
pub fn detect_arithmetic_sequence(prices: &[f64], tolerance: f64) -> Option<ArithmeticSequence> {
    if prices.len() < MIN_SEQUENCE_PRICES {
        return None;
    }
    let sorted_prices = sorted(prices);
    let differences: Vec<f64> = sorted_prices.windows(2).map(|w| w[1] - w[0]).collect();
    let avg = mean(&differences);

    // identical prices form a sequence with difference 0
    if avg == 0.0 {
        return Some(ArithmeticSequence {
            flagged: true,
            common_difference: 0.0,
            max_deviation: 0.0,
            sorted_prices,
            differences,
        });
    }

    let max_deviation = max_relative_deviation(&differences, avg);
    Some(ArithmeticSequence {
        flagged: max_deviation <= tolerance,
        common_difference: round_to(avg, 2),
        max_deviation: round_to(max_deviation, 4),
        differences: differences.iter().map(|d| round_to(*d, 2)).collect(),
        sorted_prices,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometricSequence {
    pub flagged: bool,
    pub common_ratio: f64,
    pub max_deviation: f64,
    pub ratios: Vec<f64>,
}

/// `None` when there are fewer than three prices or any price is not positive
pub fn detect_geometric_sequence(prices: &[f64], tolerance: f64) -> Option<GeometricSequence> {
    if prices.len() < MIN_SEQUENCE_PRICES || prices.iter().any(|p| *p <= 0.0) {
        return None;
    }
    let sorted_prices = sorted(prices);
    let ratios: Vec<f64> = sorted_prices.windows(2).map(|w| w[1] / w[0]).collect();
    let avg = mean(&ratios);
    if avg == 0.0 {
        return None;
    }
    let max_deviation = max_relative_deviation(&ratios, avg);
    Some(GeometricSequence {
        flagged: max_deviation <= tolerance,
        common_ratio: round_to(avg, 4),
        max_deviation: round_to(max_deviation, 4),
        ratios: ratios.iter().map(|r| round_to(*r, 4)).collect(),
    })
}

/// A bid total tied to its document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedBid {
    /// Position of the document in the analysed batch
    pub index: usize,
    pub doc_id: String,
    pub bidder: String,
    pub price: f64,
}

/// Every unordered pair whose price ratio sits within `tolerance` of a round coefficient
pub fn detect_fixed_coefficients(bids: &[PricedBid], tolerance: f64) -> Vec<(usize, usize, FixedCoefficientMatch)> {
    let mut matches = Vec::new();
    for (i, j) in unordered_pairs(bids.len()) {
        let (a, b) = (&bids[i], &bids[j]);
        if a.price == 0.0 || b.price == 0.0 {
            continue;
        }
        let ratio = a.price / b.price;
        for &coefficient in FIXED_COEFFICIENTS {
            let deviation = (ratio - coefficient).abs();
            if deviation <= tolerance {
                matches.push((
                    a.index,
                    b.index,
                    FixedCoefficientMatch {
                        doc_a_id: a.doc_id.clone(),
                        doc_b_id: b.doc_id.clone(),
                        price_a: a.price,
                        price_b: b.price,
                        ratio: round_to(ratio, 4),
                        matched_coefficient: coefficient,
                        deviation: round_to(deviation, 6),
                    },
                ));
            }
        }
    }
    matches
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceCluster {
    pub flagged: bool,
    pub average_price: f64,
    pub max_deviation_pct: f64,
    pub avg_deviation_pct: f64,
    pub within_threshold: usize,
    pub total: usize,
}

/// `None` when there are fewer than three prices or their mean is zero
pub fn detect_price_cluster(prices: &[f64], threshold: f64) -> Option<PriceCluster> {
    if prices.len() < MIN_SEQUENCE_PRICES {
        return None;
    }
    let avg = mean(prices);
    if avg == 0.0 {
        return None;
    }
    let deviations: Vec<f64> = prices.iter().map(|p| (p - avg).abs() / avg).collect();
    let max_dev = deviations.iter().copied().fold(0.0, f64::max);
    let avg_dev = mean(&deviations);
    let within = deviations.iter().filter(|d| **d <= threshold).count();
    let share_within = within as f64 / deviations.len() as f64;

    let flagged = within == deviations.len()
        || (share_within >= CLUSTER_MAJORITY && max_dev < threshold * 2.0);
    Some(PriceCluster {
        flagged,
        average_price: round_to(avg, 2),
        max_deviation_pct: round_to(max_dev * 100.0, 2),
        avg_deviation_pct: round_to(avg_dev * 100.0, 2),
        within_threshold: within,
        total: prices.len(),
    })
}
