//! Pairwise text similarity
//!
//! Combines three independent measures into one composite score:
//!
//! - SimHash (64-bit, Hamming distance) for a coarse structural match
//! - TF-IDF cosine for weighted vocabulary overlap
//! - Jaccard over token sets
//!
//! `composite = 0.2 * simhash + 0.5 * cosine + 0.3 * jaccard`
//!
//! Besides the score, each comparison reports the sentences that were copied
//! almost verbatim between the two texts.

pub mod metrics;
pub mod segments;
pub mod text;
pub mod tokenizer;

use bid_types::{clamp_score, Alert, AlertKind, Dimension, DimensionResult, DocumentRecord, Evidence, SimilarSegment};
use serde::{Deserialize, Serialize};
use tracing::debug;

use self::metrics::{jaccard, simhash_similarity, tfidf_cosine};
use self::segments::{find_similar_segments, prepare_sentences, Sentence};
use self::text::{clean_text, MIN_TEXT_CHARS};
use self::tokenizer::{LexiconTokenizer, ShingleTokenizer, Tokenizer};
use super::unordered_pairs;
use crate::patterns::char_len;

pub const SIMHASH_WEIGHT: f64 = 0.2;
pub const COSINE_WEIGHT: f64 = 0.5;
pub const JACCARD_WEIGHT: f64 = 0.3;

/// Why a comparison produced no score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    EmptyText,
    TooShort,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::EmptyText => "empty text",
            SkipReason::TooShort => "text too short after cleaning",
        }
    }
}

/// Outcome of comparing two texts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityScore {
    pub score: f64,
    pub simhash: f64,
    pub cosine: f64,
    pub jaccard: f64,
    pub text_a_chars: usize,
    pub text_b_chars: usize,
    pub tokenizer: String,
    pub skipped: Option<SkipReason>,
    pub segments: Vec<SimilarSegment>,
}

impl SimilarityScore {
    fn skipped(reason: SkipReason, a: &PreparedText, b: &PreparedText, tokenizer: &str) -> Self {
        Self {
            score: 0.0,
            simhash: 0.0,
            cosine: 0.0,
            jaccard: 0.0,
            text_a_chars: a.raw_chars,
            text_b_chars: b.raw_chars,
            tokenizer: tokenizer.to_string(),
            skipped: Some(reason),
            segments: Vec::new(),
        }
    }
}

/// Similarity of one unordered document pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairSimilarity {
    pub doc_a_id: String,
    pub doc_b_id: String,
    pub company_a: String,
    pub company_b: String,
    pub similarity: SimilarityScore,
}

/// A text cleaned, tokenized and split into sentences, ready for comparison
#[derive(Debug, Clone)]
pub struct PreparedText {
    raw_chars: usize,
    cleaned_chars: usize,
    tokens: Vec<String>,
    sentences: Vec<Sentence>,
}

pub struct SimilarityEngine {
    tokenizer: Box<dyn Tokenizer>,
}

impl SimilarityEngine {
    /// Engine with the bigram fallback tokenizer
    pub fn new() -> Self {
        Self::with_tokenizer(Box::new(ShingleTokenizer))
    }

    /// Engine that segments CJK text with the given word list
    pub fn with_lexicon<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_tokenizer(Box::new(LexiconTokenizer::new(words)))
    }

    pub fn with_tokenizer(tokenizer: Box<dyn Tokenizer>) -> Self {
        Self { tokenizer }
    }

    pub fn tokenizer_name(&self) -> &'static str {
        self.tokenizer.name()
    }

    pub fn prepare(&self, text: &str) -> PreparedText {
        let cleaned = clean_text(text);
        PreparedText {
            raw_chars: char_len(text),
            cleaned_chars: char_len(&cleaned),
            tokens: self.tokenizer.tokenize(&cleaned),
            sentences: prepare_sentences(text, self.tokenizer.as_ref()),
        }
    }

    /// Composite similarity of two raw texts. Never fails: degenerate input scores 0.
    pub fn compute_similarity(&self, text_a: &str, text_b: &str) -> SimilarityScore {
        let a = self.prepare(text_a);
        let b = self.prepare(text_b);
        self.compare_prepared(&a, &b)
    }

    pub fn compare_prepared(&self, a: &PreparedText, b: &PreparedText) -> SimilarityScore {
        let name = self.tokenizer.name();
        if a.raw_chars == 0 || b.raw_chars == 0 {
            return SimilarityScore::skipped(SkipReason::EmptyText, a, b, name);
        }
        if a.cleaned_chars < MIN_TEXT_CHARS || b.cleaned_chars < MIN_TEXT_CHARS {
            return SimilarityScore::skipped(SkipReason::TooShort, a, b, name);
        }

        let simhash = simhash_similarity(&a.tokens, &b.tokens);
        let cosine = tfidf_cosine(&a.tokens, &b.tokens);
        let jaccard = jaccard(&a.tokens, &b.tokens);
        let score = SIMHASH_WEIGHT * simhash + COSINE_WEIGHT * cosine + JACCARD_WEIGHT * jaccard;

        SimilarityScore {
            score: clamp_score(score),
            simhash,
            cosine,
            jaccard,
            text_a_chars: a.raw_chars,
            text_b_chars: b.raw_chars,
            tokenizer: name.to_string(),
            skipped: None,
            segments: find_similar_segments(&a.sentences, &b.sentences),
        }
    }

    /// Compare every unordered pair of documents exactly once
    pub fn batch_compare(&self, documents: &[DocumentRecord]) -> Vec<PairSimilarity> {
        let prepared: Vec<PreparedText> = documents
            .iter()
            .map(|d| self.prepare(&d.normalized_text))
            .collect();

        unordered_pairs(documents.len())
            .map(|(i, j)| {
                let (a, b) = (&documents[i], &documents[j]);
                PairSimilarity {
                    doc_a_id: a.id.clone(),
                    doc_b_id: b.id.clone(),
                    company_a: a.bidder_label.clone(),
                    company_b: b.bidder_label.clone(),
                    similarity: self.compare_prepared(&prepared[i], &prepared[j]),
                }
            })
            .collect()
    }

    /// Content-similarity dimension: one alert per document pair
    pub fn detect(&self, documents: &[DocumentRecord]) -> DimensionResult {
        // batch_compare yields pairs in unordered_pairs order
        let alerts: Vec<Alert> = unordered_pairs(documents.len())
            .zip(self.batch_compare(documents))
            .map(|((i, j), pair)| similarity_alert(&documents[i], &documents[j], pair.similarity))
            .collect();

        debug!(
            pairs = alerts.len(),
            tokenizer = self.tokenizer.name(),
            "content similarity compared"
        );
        DimensionResult::from_alerts(Dimension::ContentSimilarity, alerts)
    }
}

impl Default for SimilarityEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn similarity_alert(a: &DocumentRecord, b: &DocumentRecord, sim: SimilarityScore) -> Alert {
    let summary = match sim.skipped {
        Some(reason) => format!("Similarity not computed: {}", reason.as_str()),
        None => format!(
            "Text similarity {:.1}% ({} near-identical sentences)",
            sim.score * 100.0,
            sim.segments.len()
        ),
    };
    Alert::pairwise(
        AlertKind::ContentSimilarity,
        a,
        b,
        sim.score,
        summary,
        Evidence::Similarity {
            simhash: sim.simhash,
            cosine: sim.cosine,
            jaccard: sim.jaccard,
            tokenizer: sim.tokenizer,
            skipped: sim.skipped.map(|r| r.as_str().to_string()),
            segments: sim.segments,
        },
    )
}
