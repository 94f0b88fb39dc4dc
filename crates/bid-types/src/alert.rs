//! Signals emitted by the detectors
//!
//! Every detector reports its findings as [`Alert`] values. The detector-specific
//! payload lives in [`Evidence`], one tagged variant per detector family, so the
//! algorithms never pass untyped bags around and serialization only happens at
//! the edge of the system.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::document::DocumentRecord;
use crate::verdict::Dimension;

/// Clamp a raw score into `[0, 1]`; NaN collapses to 0.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    ContentSimilarity,
    MetadataMatch,
    FormatMatch,
    TimestampCluster,
    EntityLeak,
    CommonTypo,
    CommonObsoleteStandard,
    CommonPunctuationPattern,
    ArithmeticSequence,
    GeometricSequence,
    FixedCoefficient,
    PriceCluster,
    CostRatioMatch,
}

impl AlertKind {
    /// The dimension this kind of alert is scored under
    pub fn dimension(&self) -> Dimension {
        match self {
            AlertKind::ContentSimilarity => Dimension::ContentSimilarity,
            AlertKind::MetadataMatch => Dimension::MetadataMatch,
            AlertKind::FormatMatch => Dimension::FormatMatch,
            AlertKind::TimestampCluster => Dimension::TimestampCluster,
            AlertKind::EntityLeak => Dimension::EntityCross,
            AlertKind::CommonTypo
            | AlertKind::CommonObsoleteStandard
            | AlertKind::CommonPunctuationPattern => Dimension::ErrorPattern,
            AlertKind::ArithmeticSequence
            | AlertKind::GeometricSequence
            | AlertKind::FixedCoefficient
            | AlertKind::PriceCluster
            | AlertKind::CostRatioMatch => Dimension::PriceAnalysis,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::ContentSimilarity => "content_similarity",
            AlertKind::MetadataMatch => "metadata_match",
            AlertKind::FormatMatch => "format_match",
            AlertKind::TimestampCluster => "timestamp_cluster",
            AlertKind::EntityLeak => "entity_leak",
            AlertKind::CommonTypo => "common_typo",
            AlertKind::CommonObsoleteStandard => "common_obsolete_standard",
            AlertKind::CommonPunctuationPattern => "common_punctuation_pattern",
            AlertKind::ArithmeticSequence => "arithmetic_sequence",
            AlertKind::GeometricSequence => "geometric_sequence",
            AlertKind::FixedCoefficient => "fixed_coefficient",
            AlertKind::PriceCluster => "price_cluster",
            AlertKind::CostRatioMatch => "cost_ratio_match",
        }
    }
}

/// The two documents (and their bidders) a pairwise alert refers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPair {
    pub doc_a_id: String,
    pub doc_b_id: String,
    pub company_a: String,
    pub company_b: String,
}

impl DocumentPair {
    pub fn of(a: &DocumentRecord, b: &DocumentRecord) -> Self {
        Self {
            doc_a_id: a.id.clone(),
            doc_b_id: b.id.clone(),
            company_a: a.bidder_label.clone(),
            company_b: b.bidder_label.clone(),
        }
    }
}

/// A single signal produced by a detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub dimension: Dimension,
    /// `None` for whole-batch signals (timestamp clusters, price sequences)
    pub pair: Option<DocumentPair>,
    /// Always within `[0, 1]`
    pub score: f64,
    pub summary: String,
    pub evidence: Evidence,
}

impl Alert {
    /// Alert about two specific documents
    pub fn pairwise(
        kind: AlertKind,
        a: &DocumentRecord,
        b: &DocumentRecord,
        score: f64,
        summary: impl Into<String>,
        evidence: Evidence,
    ) -> Self {
        Self {
            kind,
            dimension: kind.dimension(),
            pair: Some(DocumentPair::of(a, b)),
            score: clamp_score(score),
            summary: summary.into(),
            evidence,
        }
    }

    /// Alert about the batch as a whole
    pub fn batch(kind: AlertKind, score: f64, summary: impl Into<String>, evidence: Evidence) -> Self {
        Self {
            kind,
            dimension: kind.dimension(),
            pair: None,
            score: clamp_score(score),
            summary: summary.into(),
            evidence,
        }
    }
}

/// Detector-specific supporting data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Evidence {
    Similarity {
        simhash: f64,
        cosine: f64,
        jaccard: f64,
        tokenizer: String,
        /// Set when the comparison was skipped (empty or too-short text)
        skipped: Option<String>,
        segments: Vec<SimilarSegment>,
    },
    Metadata {
        checks_applied: usize,
        matches: Vec<FieldMatch>,
    },
    Format {
        checks_performed: usize,
        raw_score: f64,
        findings: Vec<FormatFinding>,
    },
    TimestampClusters {
        clusters: Vec<TimestampCluster>,
    },
    EntityLeak {
        hits: Vec<EntityHit>,
    },
    SharedErrors {
        items: Vec<String>,
    },
    ArithmeticSequence {
        common_difference: f64,
        max_deviation: f64,
        sorted_prices: Vec<f64>,
    },
    GeometricSequence {
        common_ratio: f64,
        max_deviation: f64,
        ratios: Vec<f64>,
    },
    FixedCoefficient(FixedCoefficientMatch),
    PriceCluster {
        average_price: f64,
        max_deviation_pct: f64,
        avg_deviation_pct: f64,
        within_threshold: usize,
        total: usize,
    },
    CostRatio {
        avg_ratio_diff: f64,
        max_ratio_diff: f64,
        compared: Vec<CostCategory>,
        ratios_a: BTreeMap<CostCategory, f64>,
        ratios_b: BTreeMap<CostCategory, f64>,
    },
}

/// A pair of near-identical sentences found in two documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarSegment {
    pub text_a: String,
    pub text_b: String,
    pub similarity: f64,
    pub position_a: usize,
    pub position_b: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataField {
    Author,
    LastModifiedBy,
    Company,
    CreatorProducer,
    SoftwareVersion,
    CreatedTime,
    ModifiedTime,
}

/// A metadata field that carries the same value in both documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMatch {
    pub field: MetadataField,
    pub value_a: String,
    pub value_b: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "finding", rename_all = "snake_case")]
pub enum FormatFinding {
    FontSetMatch { fonts: Vec<String> },
    FontHighOverlap { overlap: Vec<String>, ratio: f64 },
    PageWidthMatch { value: f64 },
    PageHeightMatch { value: f64 },
    MarginExactMatch { compared: usize },
    MarginPartialMatch { matched: usize, compared: usize },
    FontSizeMatch { sizes: Vec<f64> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampField {
    Created,
    Modified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampEntry {
    pub doc_id: String,
    pub bidder: String,
    pub field: TimestampField,
    pub time: NaiveDateTime,
}

/// Timestamps from several bidders that fall within the gap threshold of each other
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampCluster {
    pub bidders: Vec<String>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub span_minutes: f64,
    pub entries: Vec<TimestampEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    PersonName,
    PhoneNumber,
    Email,
    BankAccount,
    IdCard,
    FaxNumber,
    CompanyName,
}

/// One entity of the source document found verbatim in the target document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityHit {
    pub kind: EntityKind,
    /// Masked for bank accounts
    pub entity: String,
    pub role_in_source: Option<String>,
    pub context_in_target: Option<String>,
    pub severity: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedCoefficientMatch {
    pub doc_a_id: String,
    pub doc_b_id: String,
    pub price_a: f64,
    pub price_b: f64,
    pub ratio: f64,
    pub matched_coefficient: f64,
    pub deviation: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostCategory {
    Labor,
    Material,
    Equipment,
    Management,
    Profit,
    Tax,
    Other,
}

impl CostCategory {
    pub const ALL: [CostCategory; 7] = [
        CostCategory::Labor,
        CostCategory::Material,
        CostCategory::Equipment,
        CostCategory::Management,
        CostCategory::Profit,
        CostCategory::Tax,
        CostCategory::Other,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_clamp_score() {
        assert_eq!(clamp_score(-0.5), 0.0);
        assert_eq!(clamp_score(1.7), 1.0);
        assert_eq!(clamp_score(0.42), 0.42);
        assert_eq!(clamp_score(f64::NAN), 0.0);
    }

    #[test]
    fn test_pairwise_alert_clamps_and_records_pair() {
        let a = DocumentRecord::new("a", "甲公司", "");
        let b = DocumentRecord::new("b", "乙公司", "");
        let alert = Alert::pairwise(
            AlertKind::CommonTypo,
            &a,
            &b,
            1.2,
            "shared typos",
            Evidence::SharedErrors {
                items: vec!["混泥土".to_string()],
            },
        );
        assert_eq!(alert.score, 1.0);
        assert_eq!(alert.dimension, Dimension::ErrorPattern);
        let pair = alert.pair.unwrap();
        assert_eq!(pair.doc_a_id, "a");
        assert_eq!(pair.company_b, "乙公司");
    }

    #[test]
    fn test_evidence_is_tagged_on_the_wire() {
        let evidence = Evidence::SharedErrors {
            items: vec!["GB50300-2001".to_string()],
        };
        let json = serde_json::to_value(&evidence).unwrap();
        assert_eq!(json["type"], "shared_errors");
        assert_eq!(json["items"][0], "GB50300-2001");
    }

    #[test]
    fn test_every_kind_maps_to_a_dimension() {
        let kinds = [
            AlertKind::ContentSimilarity,
            AlertKind::EntityLeak,
            AlertKind::CommonPunctuationPattern,
            AlertKind::CostRatioMatch,
        ];
        let dims: Vec<_> = kinds.iter().map(|k| k.dimension()).collect();
        assert_eq!(
            dims,
            vec![
                Dimension::ContentSimilarity,
                Dimension::EntityCross,
                Dimension::ErrorPattern,
                Dimension::PriceAnalysis
            ]
        );
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: constructed alerts always carry a score within [0, 1]
        #[test]
        fn batch_alert_score_is_clamped(raw in proptest::num::f64::ANY) {
            let alert = Alert::batch(
                AlertKind::PriceCluster,
                raw,
                "cluster",
                Evidence::SharedErrors { items: Vec::new() },
            );
            prop_assert!((0.0..=1.0).contains(&alert.score));
        }
    }
}
