//! Shared error patterns
//!
//! Independent bidders make independent mistakes. When two bids share the same
//! uncommon typo, cite the same superseded standard or carry the same
//! punctuation quirks, they were likely produced from a common source.
//!
//! Three families are detected per document:
//!
//! - typos from a fixed wrong→correct table of construction terms
//! - citations of obsolete national/industry standards
//! - punctuation anomalies (ASCII punctuation inside CJK text, repeated marks,
//!   mixed-width digits, extra spaces)

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use bid_types::{Alert, AlertKind, Dimension, DimensionResult, DocumentRecord, Evidence};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::unordered_pairs;
use crate::patterns::{char_offset, context_window, OBSOLETE_STANDARDS, TYPO_TABLE};

/// Positions recorded per typo word and document
const MAX_TYPO_POSITIONS: usize = 5;
const TYPO_CONTEXT_CHARS: usize = 15;
const STANDARD_CONTEXT_CHARS: usize = 20;
const PUNCTUATION_EXAMPLE_CHARS: usize = 5;
const MAX_EXAMPLES: usize = 3;

const TYPO_SEVERITY_STEP: f64 = 0.3;
const STANDARD_SEVERITY_STEP: f64 = 0.35;
const PUNCTUATION_SEVERITY_STEP: f64 = 0.2;
/// Fewer shared punctuation anomalies than this are ignored
const MIN_SHARED_PUNCTUATION: usize = 2;

const FULL_WIDTH_MARKS: &[char] = &['，', '。', '！', '？', '；', '：', '、'];

lazy_static! {
    static ref STANDARD_PATTERN: Regex = Regex::new(
        r"(?:GB|GB/T|JGJ|JGJ/T|CJJ|DL/T|SL|JTG|JTGD|SH/T|HG/T)\s*/?\s*[0-9]{4,5}(?:\.[0-9]+)?(?:\s*[-—]\s*[0-9]{4})"
    )
    .unwrap();

    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();

    /// ASCII punctuation rules, each tagged with the anomaly it reveals
    static ref MIXED_PUNCTUATION: Vec<(PunctuationAnomaly, Regex)> = vec![
        (PunctuationAnomaly::AsciiCommaBetweenCjk, Regex::new(r"[\x{4e00}-\x{9fff}],[\x{4e00}-\x{9fff}]").unwrap()),
        (PunctuationAnomaly::AsciiPeriodBetweenCjk, Regex::new(r"[\x{4e00}-\x{9fff}]\.[\x{4e00}-\x{9fff}]").unwrap()),
        (PunctuationAnomaly::AsciiSemicolonBetweenCjk, Regex::new(r"[\x{4e00}-\x{9fff}];[\x{4e00}-\x{9fff}]").unwrap()),
        (PunctuationAnomaly::AsciiParenAfterCjk, Regex::new(r"[\x{4e00}-\x{9fff}]\(").unwrap()),
        (PunctuationAnomaly::AsciiParenBeforeCjk, Regex::new(r"\)[\x{4e00}-\x{9fff}]").unwrap()),
        (PunctuationAnomaly::ExtraSpacesBetweenCjk, Regex::new(r"[\x{4e00}-\x{9fff}]\s{2,}[\x{4e00}-\x{9fff}]").unwrap()),
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PunctuationAnomaly {
    AsciiCommaBetweenCjk,
    AsciiPeriodBetweenCjk,
    AsciiSemicolonBetweenCjk,
    AsciiParenAfterCjk,
    AsciiParenBeforeCjk,
    RepeatedPunctuation,
    MixedWidthDigits,
    ExtraSpacesBetweenCjk,
}

impl PunctuationAnomaly {
    pub fn as_str(&self) -> &'static str {
        match self {
            PunctuationAnomaly::AsciiCommaBetweenCjk => "ascii comma between CJK characters",
            PunctuationAnomaly::AsciiPeriodBetweenCjk => "ascii period between CJK characters",
            PunctuationAnomaly::AsciiSemicolonBetweenCjk => "ascii semicolon between CJK characters",
            PunctuationAnomaly::AsciiParenAfterCjk => "ascii opening parenthesis after CJK text",
            PunctuationAnomaly::AsciiParenBeforeCjk => "ascii closing parenthesis before CJK text",
            PunctuationAnomaly::RepeatedPunctuation => "repeated full-width punctuation",
            PunctuationAnomaly::MixedWidthDigits => "mixed full-width and half-width digits",
            PunctuationAnomaly::ExtraSpacesBetweenCjk => "extra spaces between CJK characters",
        }
    }
}

impl fmt::Display for PunctuationAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypoFinding {
    pub typo: String,
    pub correction: String,
    /// Character offset in the document text
    pub position: usize,
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObsoleteStandardFinding {
    /// Citation as written, spaces removed and dashes normalized
    pub cited: String,
    /// Obsolete code from the reference table
    pub code: String,
    pub replaced_by: String,
    pub title: String,
    pub position: usize,
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PunctuationFinding {
    pub anomaly: PunctuationAnomaly,
    pub count: usize,
    pub examples: Vec<String>,
}

/// Every error found in one document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentErrors {
    pub typos: Vec<TypoFinding>,
    pub obsolete_standards: Vec<ObsoleteStandardFinding>,
    pub punctuation: Vec<PunctuationFinding>,
}

impl DocumentErrors {
    pub fn scan(text: &str) -> Self {
        Self {
            typos: detect_typos(text),
            obsolete_standards: detect_obsolete_standards(text),
            punctuation: detect_punctuation_anomalies(text),
        }
    }

    fn typo_set(&self) -> BTreeSet<&str> {
        self.typos.iter().map(|t| t.typo.as_str()).collect()
    }

    fn standard_set(&self) -> BTreeSet<&str> {
        self.obsolete_standards.iter().map(|s| s.code.as_str()).collect()
    }

    fn anomaly_set(&self) -> BTreeSet<PunctuationAnomaly> {
        self.punctuation.iter().map(|p| p.anomaly).collect()
    }
}

/// Occurrences of table typos, at most five positions per word
pub fn detect_typos(text: &str) -> Vec<TypoFinding> {
    let mut found = Vec::new();
    for (wrong, correct) in TYPO_TABLE {
        for (pos, m) in text.match_indices(wrong).take(MAX_TYPO_POSITIONS) {
            found.push(TypoFinding {
                typo: wrong.to_string(),
                correction: correct.to_string(),
                position: char_offset(text, pos),
                context: context_window(text, pos, pos + m.len(), TYPO_CONTEXT_CHARS),
            });
        }
    }
    found
}

/// Citations of standards that have been superseded
pub fn detect_obsolete_standards(text: &str) -> Vec<ObsoleteStandardFinding> {
    let mut found = Vec::new();
    for m in STANDARD_PATTERN.find_iter(text) {
        let cited = WHITESPACE.replace_all(m.as_str(), "").replace('—', "-");
        for (code, replaced_by, title) in OBSOLETE_STANDARDS {
            if cited.contains(code) {
                found.push(ObsoleteStandardFinding {
                    cited: cited.clone(),
                    code: code.to_string(),
                    replaced_by: replaced_by.to_string(),
                    title: title.to_string(),
                    position: char_offset(text, m.start()),
                    context: context_window(text, m.start(), m.end(), STANDARD_CONTEXT_CHARS),
                });
            }
        }
    }
    found
}

/// Runs of the same full-width mark, e.g. `，，` or `。。。`
fn repeated_mark_runs(text: &str) -> Vec<String> {
    let mut runs = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if !FULL_WIDTH_MARKS.contains(&c) {
            continue;
        }
        let mut run = String::from(c);
        while chars.peek() == Some(&c) {
            run.push(c);
            chars.next();
        }
        if run.chars().count() > 1 {
            runs.push(run);
        }
    }
    runs
}

pub fn detect_punctuation_anomalies(text: &str) -> Vec<PunctuationFinding> {
    let mut found = Vec::new();

    for (anomaly, pattern) in MIXED_PUNCTUATION.iter() {
        let matches: Vec<_> = pattern.find_iter(text).collect();
        if matches.is_empty() {
            continue;
        }
        found.push(PunctuationFinding {
            anomaly: *anomaly,
            count: matches.len(),
            examples: matches
                .iter()
                .take(MAX_EXAMPLES)
                .map(|m| context_window(text, m.start(), m.end(), PUNCTUATION_EXAMPLE_CHARS))
                .collect(),
        });
    }

    let repeated = repeated_mark_runs(text);
    if !repeated.is_empty() {
        found.push(PunctuationFinding {
            anomaly: PunctuationAnomaly::RepeatedPunctuation,
            count: repeated.len(),
            examples: repeated.into_iter().take(MAX_EXAMPLES).collect(),
        });
    }

    let full_width_digit = text.chars().any(|c| ('０'..='９').contains(&c));
    if full_width_digit && text.chars().any(|c| c.is_ascii_digit()) {
        found.push(PunctuationFinding {
            anomaly: PunctuationAnomaly::MixedWidthDigits,
            count: 1,
            examples: Vec::new(),
        });
    }

    found
}

/// Error counts and distinct findings of one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub bidder: String,
    pub typo_count: usize,
    pub punctuation_error_count: usize,
    pub obsolete_standard_count: usize,
    pub typos: Vec<String>,
    pub obsolete_standards: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPatternReport {
    pub total_alerts: usize,
    pub max_severity: f64,
    /// Sorted by score, highest first
    pub alerts: Vec<Alert>,
    pub per_document: BTreeMap<String, ErrorSummary>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorPatternMatcher;

impl ErrorPatternMatcher {
    pub fn analyze(&self, documents: &[DocumentRecord]) -> ErrorPatternReport {
        let scans: Vec<DocumentErrors> = documents
            .iter()
            .map(|d| DocumentErrors::scan(&d.normalized_text))
            .collect();

        let mut alerts = Vec::new();
        for (i, j) in unordered_pairs(documents.len()) {
            let (a, b) = (&documents[i], &documents[j]);
            let (ea, eb) = (&scans[i], &scans[j]);

            let typos: Vec<String> = ea
                .typo_set()
                .intersection(&eb.typo_set())
                .map(|s| s.to_string())
                .collect();
            if !typos.is_empty() {
                let score = (TYPO_SEVERITY_STEP * typos.len() as f64).min(1.0);
                let summary = format!("{} shared typos: {}", typos.len(), preview(&typos, 5));
                alerts.push(Alert::pairwise(
                    AlertKind::CommonTypo,
                    a,
                    b,
                    score,
                    summary,
                    Evidence::SharedErrors { items: typos },
                ));
            }

            let standards: Vec<String> = ea
                .standard_set()
                .intersection(&eb.standard_set())
                .map(|s| s.to_string())
                .collect();
            if !standards.is_empty() {
                let score = (STANDARD_SEVERITY_STEP * standards.len() as f64).min(1.0);
                let summary = format!(
                    "{} shared obsolete standards: {}",
                    standards.len(),
                    preview(&standards, 3)
                );
                alerts.push(Alert::pairwise(
                    AlertKind::CommonObsoleteStandard,
                    a,
                    b,
                    score,
                    summary,
                    Evidence::SharedErrors { items: standards },
                ));
            }

            let anomalies: Vec<PunctuationAnomaly> = ea
                .anomaly_set()
                .intersection(&eb.anomaly_set())
                .copied()
                .collect();
            if anomalies.len() >= MIN_SHARED_PUNCTUATION {
                let score = (PUNCTUATION_SEVERITY_STEP * anomalies.len() as f64).min(1.0);
                let summary = format!("{} shared punctuation anomalies", anomalies.len());
                alerts.push(Alert::pairwise(
                    AlertKind::CommonPunctuationPattern,
                    a,
                    b,
                    score,
                    summary,
                    Evidence::SharedErrors {
                        items: anomalies.iter().map(|p| p.as_str().to_string()).collect(),
                    },
                ));
            }
        }

        alerts.sort_by(|x, y| y.score.total_cmp(&x.score));
        let max_severity = alerts.iter().map(|a| a.score).fold(0.0, f64::max);
        let per_document = documents
            .iter()
            .zip(&scans)
            .map(|(doc, errs)| (doc.id.clone(), summarize(doc, errs)))
            .collect();

        debug!(alerts = alerts.len(), "error patterns compared");
        ErrorPatternReport {
            total_alerts: alerts.len(),
            max_severity,
            alerts,
            per_document,
        }
    }

    pub fn detect(&self, documents: &[DocumentRecord]) -> DimensionResult {
        DimensionResult::from_alerts(Dimension::ErrorPattern, self.analyze(documents).alerts)
    }
}

fn preview(items: &[String], n: usize) -> String {
    items.iter().take(n).cloned().collect::<Vec<_>>().join(", ")
}

fn summarize(doc: &DocumentRecord, errs: &DocumentErrors) -> ErrorSummary {
    ErrorSummary {
        bidder: doc.bidder_label.clone(),
        typo_count: errs.typos.len(),
        punctuation_error_count: errs.punctuation.len(),
        obsolete_standard_count: errs.obsolete_standards.len(),
        typos: errs.typos.iter().map(|t| t.typo.clone()).collect(),
        obsolete_standards: errs.obsolete_standards.iter().map(|s| s.cited.clone()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_detect_typos() {
        let typos = detect_typos("基础采用钢筋混泥土结构，屋面铺设沥清防水层。");
        let words: Vec<&str> = typos.iter().map(|t| t.typo.as_str()).collect();
        assert_eq!(words, vec!["钢筋混泥土", "混泥土", "沥清"]);
        assert_eq!(typos[2].correction, "沥青");
        assert_eq!(typos[0].position, 4);
    }

    #[test]
    fn test_typo_positions_capped() {
        let text = "混泥土，".repeat(8);
        assert_eq!(detect_typos(&text).len(), MAX_TYPO_POSITIONS);
    }

    #[test]
    fn test_detect_obsolete_standard_with_spaces_and_em_dash() {
        let found = detect_obsolete_standards("质量验收依据《GB 50300—2001》执行");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].cited, "GB50300-2001");
        assert_eq!(found[0].replaced_by, "GB50300-2013");
    }

    #[test]
    fn test_current_standard_not_flagged() {
        assert!(detect_obsolete_standards("依据GB50300-2013及GB/T50328-2014").is_empty());
        let found = detect_obsolete_standards("依据GB/T 50328-2001归档");
        assert_eq!(found[0].code, "GB/T50328-2001");
    }

    #[test]
    fn test_punctuation_anomalies() {
        let text = "施工,组织。。设计(方案)说明  文件，数量１２与12";
        let found: Vec<PunctuationAnomaly> = detect_punctuation_anomalies(text)
            .into_iter()
            .map(|p| p.anomaly)
            .collect();
        assert_eq!(
            found,
            vec![
                PunctuationAnomaly::AsciiCommaBetweenCjk,
                PunctuationAnomaly::AsciiParenAfterCjk,
                PunctuationAnomaly::AsciiParenBeforeCjk,
                PunctuationAnomaly::ExtraSpacesBetweenCjk,
                PunctuationAnomaly::RepeatedPunctuation,
                PunctuationAnomaly::MixedWidthDigits,
            ]
        );
    }

    #[test]
    fn test_clean_text_has_no_anomalies() {
        assert!(detect_punctuation_anomalies("施工组织设计，详见附件（一）。").is_empty());
    }

    #[test]
    fn test_shared_errors_between_bids() {
        let shared = "采用钢筋混泥土结构，依据GB50300-2001验收,工期(日历天)。。";
        let docs = vec![
            DocumentRecord::new("1", "甲", shared),
            DocumentRecord::new("2", "乙", shared),
            DocumentRecord::new("3", "丙", "采用钢筋混凝土结构，依据GB50300-2013验收。"),
        ];
        let report = ErrorPatternMatcher.analyze(&docs);

        let kinds: BTreeSet<AlertKind> = report.alerts.iter().map(|a| a.kind).collect();
        assert!(kinds.contains(&AlertKind::CommonTypo));
        assert!(kinds.contains(&AlertKind::CommonObsoleteStandard));
        assert!(kinds.contains(&AlertKind::CommonPunctuationPattern));
        assert!(report
            .alerts
            .iter()
            .all(|a| a.pair.as_ref().unwrap().doc_b_id == "2"));

        // two shared typos: 钢筋混泥土 and 混泥土
        let typo = report.alerts.iter().find(|a| a.kind == AlertKind::CommonTypo).unwrap();
        assert!((typo.score - 0.6).abs() < 1e-9);
        assert!(report.alerts.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(report.per_document["3"].typo_count, 0);
        assert_eq!(report.per_document["1"].obsolete_standards, vec!["GB50300-2001"]);
    }

    #[test]
    fn test_single_shared_punctuation_anomaly_ignored() {
        let docs = vec![
            DocumentRecord::new("1", "甲", "施工,组织"),
            DocumentRecord::new("2", "乙", "设计,方案"),
        ];
        assert!(ErrorPatternMatcher.detect(&docs).alerts.is_empty());
    }
}
