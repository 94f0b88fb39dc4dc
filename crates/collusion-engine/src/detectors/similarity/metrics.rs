// SimHash, TF-IDF cosine and Jaccard over token lists
use std::collections::{BTreeMap, BTreeSet};

use sha2::{Digest, Sha256};

const SIMHASH_BITS: u32 = 64;

/// 64-bit hash of a token: the first eight bytes of its SHA-256 digest
fn token_hash(token: &str) -> u64 {
    let digest = Sha256::digest(token.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// Weighted SimHash fingerprint; every token votes +1/-1 on each bit
pub fn simhash(tokens: &[String]) -> u64 {
    if tokens.is_empty() {
        return 0;
    }
    let mut votes = [0i64; SIMHASH_BITS as usize];
    for token in tokens {
        let h = token_hash(token);
        for (bit, vote) in votes.iter_mut().enumerate() {
            if h & (1u64 << bit) != 0 {
                *vote += 1;
            } else {
                *vote -= 1;
            }
        }
    }
    votes
        .iter()
        .enumerate()
        .filter(|(_, v)| **v > 0)
        .fold(0u64, |fp, (bit, _)| fp | (1u64 << bit))
}

/// 1 - hamming / 64; zero when either side has no tokens
pub fn simhash_similarity(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let hamming = (simhash(a) ^ simhash(b)).count_ones();
    1.0 - f64::from(hamming) / f64::from(SIMHASH_BITS)
}

fn term_counts(tokens: &[String]) -> BTreeMap<&str, f64> {
    let mut counts = BTreeMap::new();
    for token in tokens {
        *counts.entry(token.as_str()).or_insert(0.0) += 1.0;
    }
    counts
}

/// Cosine of the tf·idf vectors of two token lists, with idf(t) = ln(2/df) + 1
pub fn tfidf_cosine(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let tf_a = term_counts(a);
    let tf_b = term_counts(b);
    let vocabulary: BTreeSet<&str> = tf_a.keys().chain(tf_b.keys()).copied().collect();

    let mut dot = 0.0;
    let mut mag_a = 0.0;
    let mut mag_b = 0.0;
    for term in vocabulary {
        let ca = tf_a.get(term).copied().unwrap_or(0.0);
        let cb = tf_b.get(term).copied().unwrap_or(0.0);
        let df = f64::from(u8::from(ca > 0.0) + u8::from(cb > 0.0));
        let idf = (2.0 / df).ln() + 1.0;
        let wa = ca * idf;
        let wb = cb * idf;
        dot += wa * wb;
        mag_a += wa * wa;
        mag_b += wb * wb;
    }

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    (dot / (mag_a.sqrt() * mag_b.sqrt())).min(1.0)
}

/// |A ∩ B| / |A ∪ B| over the token sets
pub fn jaccard(a: &[String], b: &[String]) -> f64 {
    let set_a: BTreeSet<&str> = a.iter().map(String::as_str).collect();
    let set_b: BTreeSet<&str> = b.iter().map(String::as_str).collect();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    set_a.intersection(&set_b).count() as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_simhash_identical_tokens() {
        let a = toks(&["基坑", "支护", "降水"]);
        assert_eq!(simhash_similarity(&a, &a), 1.0);
    }

    #[test]
    fn test_simhash_empty_side_is_zero() {
        assert_eq!(simhash_similarity(&[], &toks(&["基坑"])), 0.0);
        assert_eq!(simhash(&[]), 0);
    }

    #[test]
    fn test_tfidf_cosine_identical_is_one() {
        let a = toks(&["基坑", "支护", "基坑"]);
        assert!((tfidf_cosine(&a, &a) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_tfidf_cosine_disjoint_is_zero() {
        assert_eq!(tfidf_cosine(&toks(&["基坑"]), &toks(&["屋面"])), 0.0);
    }

    #[test]
    fn test_tfidf_cosine_partial_overlap() {
        // shared term idf = 1, unique terms idf = 1 + ln 2
        let a = toks(&["基坑", "支护"]);
        let b = toks(&["基坑", "屋面"]);
        let idf_unique = 1.0 + 2f64.ln();
        let expected = 1.0 / (1.0 + idf_unique * idf_unique);
        assert!((tfidf_cosine(&a, &b) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_jaccard() {
        let a = toks(&["a1", "b2", "c3"]);
        let b = toks(&["b2", "c3", "d4"]);
        assert!((jaccard(&a, &b) - 0.5).abs() < 1e-12);
        assert_eq!(jaccard(&[], &[]), 0.0);
    }
}
