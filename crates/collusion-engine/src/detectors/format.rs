//! Layout fingerprint comparison
//!
//! Every check that has data on both sides earns a credit; the pair score is the
//! mean credit over the applicable checks.
//!
//! | check        | credit                                          |
//! |--------------|-------------------------------------------------|
//! | font set     | 1.0 identical, 0.6 when Jaccard > 0.8           |
//! | page width   | 0.5 when equal                                  |
//! | page height  | 0.5 when equal                                  |
//! | margins      | 1.0 all equal (≥ 3 compared), else ratio × 0.5  |
//! | font sizes   | 0.8 when the sorted lists are equal             |

use std::collections::BTreeSet;

use bid_types::{
    Alert, AlertKind, Dimension, DimensionResult, DocumentRecord, Evidence, FormatDescriptor,
    FormatFinding,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::unordered_pairs;

const EQUAL_TOLERANCE: f64 = 0.01;
const FONT_OVERLAP_RATIO: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatComparison {
    pub score: f64,
    pub raw_score: f64,
    pub checks_performed: usize,
    pub findings: Vec<FormatFinding>,
}

fn nearly_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < EQUAL_TOLERANCE
}

/// Compare the layout fingerprints of two documents
pub fn compare_pair(a: &FormatDescriptor, b: &FormatDescriptor) -> FormatComparison {
    let mut raw = 0.0;
    let mut checks = 0;
    let mut findings = Vec::new();

    let fonts_a: BTreeSet<&str> = a.fonts.iter().map(String::as_str).collect();
    let fonts_b: BTreeSet<&str> = b.fonts.iter().map(String::as_str).collect();
    if !fonts_a.is_empty() && !fonts_b.is_empty() {
        checks += 1;
        if fonts_a == fonts_b {
            raw += 1.0;
            findings.push(FormatFinding::FontSetMatch {
                fonts: fonts_a.iter().map(|f| f.to_string()).collect(),
            });
        } else {
            let overlap: Vec<String> = fonts_a.intersection(&fonts_b).map(|f| f.to_string()).collect();
            let union = fonts_a.union(&fonts_b).count();
            let ratio = overlap.len() as f64 / union as f64;
            if ratio > FONT_OVERLAP_RATIO {
                raw += 0.6;
                findings.push(FormatFinding::FontHighOverlap { overlap, ratio });
            }
        }
    }

    if let (Some(wa), Some(wb)) = (a.page_width, b.page_width) {
        checks += 1;
        if nearly_equal(wa, wb) {
            raw += 0.5;
            findings.push(FormatFinding::PageWidthMatch { value: wa });
        }
    }
    if let (Some(ha), Some(hb)) = (a.page_height, b.page_height) {
        checks += 1;
        if nearly_equal(ha, hb) {
            raw += 0.5;
            findings.push(FormatFinding::PageHeightMatch { value: ha });
        }
    }

    let margin_pairs: Vec<(f64, f64)> = a
        .margins
        .as_array()
        .into_iter()
        .zip(b.margins.as_array())
        .filter_map(|(ma, mb)| Some((ma?, mb?)))
        .collect();
    if !margin_pairs.is_empty() {
        checks += 1;
        let compared = margin_pairs.len();
        let matched = margin_pairs.iter().filter(|(x, y)| nearly_equal(*x, *y)).count();
        let ratio = matched as f64 / compared as f64;
        if matched == compared && compared >= 3 {
            raw += 1.0;
            findings.push(FormatFinding::MarginExactMatch { compared });
        } else if ratio > 0.5 {
            raw += ratio * 0.5;
            findings.push(FormatFinding::MarginPartialMatch { matched, compared });
        }
    }

    if !a.font_sizes.is_empty() && !b.font_sizes.is_empty() {
        checks += 1;
        let mut sizes_a = a.font_sizes.clone();
        let mut sizes_b = b.font_sizes.clone();
        sizes_a.sort_by(f64::total_cmp);
        sizes_b.sort_by(f64::total_cmp);
        if sizes_a == sizes_b {
            raw += 0.8;
            findings.push(FormatFinding::FontSizeMatch { sizes: sizes_a });
        }
    }

    let score = if checks > 0 { raw / checks as f64 } else { 0.0 };
    FormatComparison {
        score,
        raw_score: raw,
        checks_performed: checks,
        findings,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairFormat {
    pub doc_a_id: String,
    pub doc_b_id: String,
    pub comparison: FormatComparison,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FormatComparator;

impl FormatComparator {
    pub fn batch_compare(&self, documents: &[DocumentRecord]) -> Vec<PairFormat> {
        unordered_pairs(documents.len())
            .map(|(i, j)| PairFormat {
                doc_a_id: documents[i].id.clone(),
                doc_b_id: documents[j].id.clone(),
                comparison: compare_pair(&documents[i].format_descriptor, &documents[j].format_descriptor),
            })
            .collect()
    }

    pub fn detect(&self, documents: &[DocumentRecord]) -> DimensionResult {
        let alerts: Vec<Alert> = unordered_pairs(documents.len())
            .map(|(i, j)| {
                let (a, b) = (&documents[i], &documents[j]);
                let cmp = compare_pair(&a.format_descriptor, &b.format_descriptor);
                let summary = format!(
                    "Format consistency {:.0}% over {} checks",
                    cmp.score * 100.0,
                    cmp.checks_performed
                );
                Alert::pairwise(
                    AlertKind::FormatMatch,
                    a,
                    b,
                    cmp.score,
                    summary,
                    Evidence::Format {
                        checks_performed: cmp.checks_performed,
                        raw_score: cmp.raw_score,
                        findings: cmp.findings,
                    },
                )
            })
            .collect();

        debug!(pairs = alerts.len(), "format fingerprints compared");
        DimensionResult::from_alerts(Dimension::FormatMatch, alerts)
    }
}
