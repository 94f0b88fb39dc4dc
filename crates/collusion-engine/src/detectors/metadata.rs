//! Document metadata comparison
//!
//! Two bids written on the same machine tend to share author, last editor,
//! company property and authoring software, and to be saved within minutes of
//! each other. Each field check carries a weight; the pair score is the matched
//! weight divided by the weight of the checks that had data on both sides.

use bid_types::{
    Alert, AlertKind, Dimension, DimensionResult, DocumentMetadata, DocumentRecord, Evidence,
    FieldMatch, MetadataField,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::unordered_pairs;

/// Weight of each metadata check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataWeights {
    pub author: f64,
    pub last_modified_by: f64,
    pub company: f64,
    pub creator_producer: f64,
    pub software_version: f64,
    pub timestamp: f64,
}

impl Default for MetadataWeights {
    fn default() -> Self {
        Self {
            author: 0.25,
            last_modified_by: 0.20,
            company: 0.15,
            creator_producer: 0.05,
            software_version: 0.05,
            timestamp: 0.20,
        }
    }
}

impl MetadataWeights {
    pub fn as_array(&self) -> [f64; 6] {
        [
            self.author,
            self.last_modified_by,
            self.company,
            self.creator_producer,
            self.software_version,
            self.timestamp,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataComparison {
    /// Matched weight over applicable weight, in `[0, 1]`
    pub score: f64,
    pub matched_weight: f64,
    pub applicable_weight: f64,
    pub checks_applied: usize,
    pub matches: Vec<FieldMatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairMetadata {
    pub doc_a_id: String,
    pub doc_b_id: String,
    pub comparison: MetadataComparison,
}

/// Accumulates weighted checks for one document pair
#[derive(Default)]
struct Tally {
    matched: f64,
    applicable: f64,
    checks: usize,
    matches: Vec<FieldMatch>,
}

impl Tally {
    fn apply(&mut self, weight: f64, hit: Option<FieldMatch>) {
        self.applicable += weight;
        self.checks += 1;
        if let Some(m) = hit {
            self.matched += weight;
            self.matches.push(m);
        }
    }

    fn finish(self) -> MetadataComparison {
        let score = if self.applicable > 0.0 {
            (self.matched / self.applicable).min(1.0)
        } else {
            0.0
        };
        MetadataComparison {
            score,
            matched_weight: self.matched,
            applicable_weight: self.applicable,
            checks_applied: self.checks,
            matches: self.matches,
        }
    }
}

/// Trimmed value, or `None` when missing or blank
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn field_match(field: MetadataField, a: &str, b: &str) -> FieldMatch {
    FieldMatch {
        field,
        value_a: a.to_string(),
        value_b: b.to_string(),
        note: None,
    }
}

fn creator_producer(meta: &DocumentMetadata) -> Option<String> {
    let joined = format!(
        "{} {}",
        present(&meta.creator).unwrap_or(""),
        present(&meta.producer).unwrap_or("")
    );
    let joined = joined.trim();
    (!joined.is_empty()).then(|| joined.to_string())
}

pub fn minutes_between(a: NaiveDateTime, b: NaiveDateTime) -> f64 {
    (a - b).num_seconds().abs() as f64 / 60.0
}

pub struct MetadataComparator {
    weights: MetadataWeights,
    timestamp_diff_minutes: f64,
}

impl MetadataComparator {
    pub fn new(weights: MetadataWeights, timestamp_diff_minutes: u32) -> Self {
        Self {
            weights,
            timestamp_diff_minutes: f64::from(timestamp_diff_minutes),
        }
    }

    pub fn compare_pair(&self, a: &DocumentRecord, b: &DocumentRecord) -> MetadataComparison {
        let (ma, mb) = (&a.metadata, &b.metadata);
        let w = &self.weights;
        let mut tally = Tally::default();

        let equal_fields = [
            (MetadataField::Author, &ma.author, &mb.author, w.author),
            (
                MetadataField::LastModifiedBy,
                &ma.last_modified_by,
                &mb.last_modified_by,
                w.last_modified_by,
            ),
        ];
        for (field, va, vb, weight) in equal_fields {
            if let (Some(va), Some(vb)) = (present(va), present(vb)) {
                tally.apply(weight, (va == vb).then(|| field_match(field, va, vb)));
            }
        }

        // A shared company property only means something across different bidders
        let (label_a, label_b) = (a.bidder_label.trim(), b.bidder_label.trim());
        if let (Some(ca), Some(cb)) = (present(&ma.company), present(&mb.company)) {
            if !label_a.is_empty() && !label_b.is_empty() && label_a != label_b {
                let hit = (ca == cb).then(|| FieldMatch {
                    note: Some(format!(
                        "different bidders ({label_a} vs {label_b}) share the company property"
                    )),
                    ..field_match(MetadataField::Company, ca, cb)
                });
                tally.apply(w.company, hit);
            }
        }

        if let (Some(ca), Some(cb)) = (creator_producer(ma), creator_producer(mb)) {
            let hit = (ca == cb).then(|| field_match(MetadataField::CreatorProducer, &ca, &cb));
            tally.apply(w.creator_producer, hit);
        }

        if let (Some(va), Some(vb)) = (present(&ma.software_version), present(&mb.software_version)) {
            let hit = (va == vb).then(|| field_match(MetadataField::SoftwareVersion, va, vb));
            tally.apply(w.software_version, hit);
        }

        let time_pairs = [
            (MetadataField::CreatedTime, ma.created_time, mb.created_time),
            (MetadataField::ModifiedTime, ma.modified_time, mb.modified_time),
        ];
        let comparable: Vec<_> = time_pairs
            .iter()
            .filter_map(|(field, ta, tb)| Some((*field, (*ta)?, (*tb)?)))
            .collect();
        if !comparable.is_empty() {
            let hit = comparable.iter().find_map(|(field, ta, tb)| {
                let diff = minutes_between(*ta, *tb);
                (diff <= self.timestamp_diff_minutes).then(|| FieldMatch {
                    note: Some(format!(
                        "saved {diff:.1} minutes apart (threshold {})",
                        self.timestamp_diff_minutes
                    )),
                    ..field_match(*field, &ta.to_string(), &tb.to_string())
                })
            });
            tally.apply(w.timestamp, hit);
        }

        tally.finish()
    }

    /// Compare every unordered pair of documents once
    pub fn batch_compare(&self, documents: &[DocumentRecord]) -> Vec<PairMetadata> {
        unordered_pairs(documents.len())
            .map(|(i, j)| PairMetadata {
                doc_a_id: documents[i].id.clone(),
                doc_b_id: documents[j].id.clone(),
                comparison: self.compare_pair(&documents[i], &documents[j]),
            })
            .collect()
    }

    pub fn detect(&self, documents: &[DocumentRecord]) -> DimensionResult {
        let alerts: Vec<Alert> = unordered_pairs(documents.len())
            .map(|(i, j)| {
                let (a, b) = (&documents[i], &documents[j]);
                let cmp = self.compare_pair(a, b);
                let summary = if cmp.matches.is_empty() {
                    format!("No matching metadata ({} checks applied)", cmp.checks_applied)
                } else {
                    let fields: Vec<&str> = cmp.matches.iter().map(|m| field_label(m.field)).collect();
                    format!("Matching metadata: {}", fields.join(", "))
                };
                Alert::pairwise(
                    AlertKind::MetadataMatch,
                    a,
                    b,
                    cmp.score,
                    summary,
                    Evidence::Metadata {
                        checks_applied: cmp.checks_applied,
                        matches: cmp.matches,
                    },
                )
            })
            .collect();

        debug!(pairs = alerts.len(), "metadata compared");
        DimensionResult::from_alerts(Dimension::MetadataMatch, alerts)
    }
}

impl Default for MetadataComparator {
    fn default() -> Self {
        Self::new(MetadataWeights::default(), 5)
    }
}

fn field_label(field: MetadataField) -> &'static str {
    match field {
        MetadataField::Author => "author",
        MetadataField::LastModifiedBy => "last modified by",
        MetadataField::Company => "company property",
        MetadataField::CreatorProducer => "creator/producer",
        MetadataField::SoftwareVersion => "software version",
        MetadataField::CreatedTime => "creation time",
        MetadataField::ModifiedTime => "modification time",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn doc(id: &str, bidder: &str, meta: DocumentMetadata) -> DocumentRecord {
        DocumentRecord::new(id, bidder, "").with_metadata(meta)
    }

    #[test]
    fn test_same_author_scores_full() {
        let meta = DocumentMetadata {
            author: Some("张三".into()),
            ..Default::default()
        };
        let a = doc("1", "A", meta.clone());
        let b = doc("2", "B", meta);
        let cmp = MetadataComparator::default().compare_pair(&a, &b);
        assert_eq!(cmp.checks_applied, 1);
        assert_eq!(cmp.score, 1.0);
        assert_eq!(cmp.matches[0].field, MetadataField::Author);
    }

    #[test]
    fn test_different_metadata_scores_zero() {
        let a = doc(
            "1",
            "A",
            DocumentMetadata {
                author: Some("张三".into()),
                company: Some("A公司".into()),
                last_modified_by: Some("张三".into()),
                producer: Some("WPS".into()),
                creator: Some("WPS".into()),
                software_version: Some("11.0".into()),
                ..Default::default()
            },
        );
        let b = doc(
            "2",
            "B",
            DocumentMetadata {
                author: Some("李四".into()),
                company: Some("B公司".into()),
                last_modified_by: Some("李四".into()),
                producer: Some("Word".into()),
                creator: Some("Word".into()),
                software_version: Some("16.0".into()),
                ..Default::default()
            },
        );
        let cmp = MetadataComparator::default().compare_pair(&a, &b);
        assert_eq!(cmp.checks_applied, 5);
        assert_eq!(cmp.score, 0.0);
        assert!(cmp.matches.is_empty());
    }

    #[test]
    fn test_company_check_needs_different_bidders() {
        let meta = DocumentMetadata {
            company: Some("某建设集团".into()),
            ..Default::default()
        };
        let same_bidder = MetadataComparator::default()
            .compare_pair(&doc("1", "甲公司", meta.clone()), &doc("2", "甲公司", meta.clone()));
        assert_eq!(same_bidder.checks_applied, 0);

        let cross = MetadataComparator::default()
            .compare_pair(&doc("1", "甲公司", meta.clone()), &doc("2", "乙公司", meta));
        assert_eq!(cross.score, 1.0);
        assert!(cross.matches[0].note.is_some());
    }

    #[test]
    fn test_timestamp_proximity() {
        let a = doc(
            "1",
            "A",
            DocumentMetadata {
                author: Some("王五".into()),
                created_time: Some(at(10, 0)),
                ..Default::default()
            },
        );
        let b = doc(
            "2",
            "B",
            DocumentMetadata {
                author: Some("赵六".into()),
                created_time: Some(at(10, 3)),
                ..Default::default()
            },
        );
        let cmp = MetadataComparator::default().compare_pair(&a, &b);
        // timestamp 0.20 of (0.25 + 0.20)
        assert!((cmp.score - 0.20 / 0.45).abs() < 1e-9);
        assert_eq!(cmp.matches[0].field, MetadataField::CreatedTime);

        let far = MetadataComparator::new(MetadataWeights::default(), 2).compare_pair(&a, &b);
        assert_eq!(far.score, 0.0);
    }

    #[test]
    fn test_creator_producer_joined() {
        let meta = DocumentMetadata {
            creator: Some("Microsoft Word".into()),
            ..Default::default()
        };
        let cmp = MetadataComparator::default()
            .compare_pair(&doc("1", "A", meta.clone()), &doc("2", "B", meta));
        assert_eq!(cmp.matches[0].value_a, "Microsoft Word");
    }

    #[test]
    fn test_no_metadata_scores_zero() {
        let cmp = MetadataComparator::default()
            .compare_pair(&DocumentRecord::new("1", "A", ""), &DocumentRecord::new("2", "B", ""));
        assert_eq!(cmp.checks_applied, 0);
        assert_eq!(cmp.score, 0.0);
    }

    #[test]
    fn test_detect_one_alert_per_pair() {
        let meta = DocumentMetadata {
            author: Some("张三".into()),
            ..Default::default()
        };
        let docs = vec![
            doc("1", "A", meta.clone()),
            doc("2", "B", meta),
            doc("3", "C", DocumentMetadata::default()),
        ];
        let result = MetadataComparator::default().detect(&docs);
        assert_eq!(result.alerts.len(), 3);
        assert_eq!(result.max_score, 1.0);
        assert_eq!(MetadataComparator::default().batch_compare(&docs).len(), 3);
    }

    #[test]
    fn test_default_weights() {
        let sum: f64 = MetadataWeights::default().as_array().iter().sum();
        assert!((sum - 0.90).abs() < 1e-9);
    }
}
