// Sentence-level copy detection
use bid_types::SimilarSegment;

use super::metrics::tfidf_cosine;
use super::text::{split_sentences, MIN_SENTENCE_CHARS};
use super::tokenizer::Tokenizer;
use crate::patterns::truncate_chars;

/// Sentences considered per document; bounds the cross comparison
pub const MAX_SENTENCES: usize = 100;
/// Sentence pairs must score strictly above this
pub const SEGMENT_THRESHOLD: f64 = 0.6;
pub const MAX_SEGMENTS: usize = 20;
const SEGMENT_PREVIEW_CHARS: usize = 200;

/// A sentence with its tokens, prepared once per document
#[derive(Debug, Clone)]
pub struct Sentence {
    pub text: String,
    pub tokens: Vec<String>,
}

pub fn prepare_sentences(text: &str, tokenizer: &dyn Tokenizer) -> Vec<Sentence> {
    split_sentences(text, MIN_SENTENCE_CHARS)
        .into_iter()
        .take(MAX_SENTENCES)
        .map(|s| Sentence {
            text: s.to_string(),
            tokens: tokenizer.tokenize(s),
        })
        .collect()
}

/// Score every cross pair of sentences and keep the most similar ones
pub fn find_similar_segments(a: &[Sentence], b: &[Sentence]) -> Vec<SimilarSegment> {
    let mut segments = Vec::new();
    for (i, sa) in a.iter().enumerate() {
        for (j, sb) in b.iter().enumerate() {
            let similarity = tfidf_cosine(&sa.tokens, &sb.tokens);
            if similarity > SEGMENT_THRESHOLD {
                segments.push(SimilarSegment {
                    text_a: truncate_chars(&sa.text, SEGMENT_PREVIEW_CHARS),
                    text_b: truncate_chars(&sb.text, SEGMENT_PREVIEW_CHARS),
                    similarity,
                    position_a: i,
                    position_b: j,
                });
            }
        }
    }
    segments.sort_by(|x, y| y.similarity.total_cmp(&x.similarity));
    segments.truncate(MAX_SEGMENTS);
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::similarity::tokenizer::ShingleTokenizer;

    #[test]
    fn test_finds_copied_sentence() {
        let a = "本工程基坑支护采用钻孔灌注桩加内支撑体系施工。其他内容完全不同的一句话在这里出现。";
        let b = "我方认为基坑支护采用钻孔灌注桩加内支撑体系施工。屋面防水采用两道改性沥青卷材做法。";
        let sa = prepare_sentences(a, &ShingleTokenizer);
        let sb = prepare_sentences(b, &ShingleTokenizer);
        let segments = find_similar_segments(&sa, &sb);
        assert!(!segments.is_empty());
        assert_eq!(segments[0].position_a, 0);
        assert_eq!(segments[0].position_b, 0);
        assert!(segments[0].similarity > SEGMENT_THRESHOLD);
    }

    #[test]
    fn test_caps_sentence_count() {
        let text = "这是一个用于测试数量上限的足够长的句子。".repeat(150);
        let sentences = prepare_sentences(&text, &ShingleTokenizer);
        assert_eq!(sentences.len(), MAX_SENTENCES);
    }

    #[test]
    fn test_caps_segment_count_and_orders_descending() {
        let text = "这是一个用于测试数量上限的足够长的句子。".repeat(10);
        let sentences = prepare_sentences(&text, &ShingleTokenizer);
        let segments = find_similar_segments(&sentences, &sentences);
        assert_eq!(segments.len(), MAX_SEGMENTS);
        assert!(segments
            .windows(2)
            .all(|w| w[0].similarity >= w[1].similarity));
    }
}
