//! Tokenizers used by the similarity metrics
//!
//! Two strategies sit behind the [`Tokenizer`] trait:
//!
//! - [`LexiconTokenizer`] segments CJK runs by forward maximum matching against a
//!   word list and drops stop words.
//! - [`ShingleTokenizer`] is the fallback when no word list is available: CJK
//!   words become overlapping character bigrams, other words are lower-cased.

use std::collections::HashSet;

use lazy_static::lazy_static;

use crate::patterns::{char_len, contains_cjk, is_cjk, STOP_WORDS};

lazy_static! {
    static ref STOP_WORD_SET: HashSet<&'static str> = STOP_WORDS.iter().copied().collect();
}

pub fn is_stop_word(token: &str) -> bool {
    STOP_WORD_SET.contains(token)
}

pub trait Tokenizer: Send + Sync {
    /// Short identifier reported alongside similarity scores
    fn name(&self) -> &'static str;

    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// Character-bigram fallback tokenizer
#[derive(Debug, Clone, Copy, Default)]
pub struct ShingleTokenizer;

impl Tokenizer for ShingleTokenizer {
    fn name(&self) -> &'static str {
        "ngram"
    }

    fn tokenize(&self, text: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        for word in text.split_whitespace() {
            if contains_cjk(word) {
                push_bigrams(word, &mut tokens);
            } else if char_len(word) > 1 {
                tokens.push(word.to_lowercase());
            }
        }
        tokens
    }
}

fn push_bigrams(word: &str, tokens: &mut Vec<String>) {
    let chars: Vec<char> = word.chars().collect();
    for pair in chars.windows(2) {
        tokens.push(pair.iter().collect());
    }
}

/// Dictionary-driven segmenter with stop-word removal.
///
/// CJK runs are cut greedily into the longest lexicon words. Characters that no
/// lexicon word covers fall out as single characters and are dropped with the
/// other one-character tokens.
#[derive(Debug, Clone)]
pub struct LexiconTokenizer {
    lexicon: HashSet<String>,
    max_word_chars: usize,
}

impl LexiconTokenizer {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lexicon: HashSet<String> = words
            .into_iter()
            .map(Into::into)
            .filter(|w: &String| char_len(w) > 1)
            .collect();
        let max_word_chars = lexicon.iter().map(|w| char_len(w)).max().unwrap_or(0);
        Self {
            lexicon,
            max_word_chars,
        }
    }

    pub fn lexicon_size(&self) -> usize {
        self.lexicon.len()
    }

    fn segment_cjk(&self, run: &[char], out: &mut Vec<String>) {
        let mut i = 0;
        while i < run.len() {
            let longest = self.max_word_chars.min(run.len() - i);
            let matched = (2..=longest).rev().find_map(|len| {
                let candidate: String = run[i..i + len].iter().collect();
                self.lexicon.contains(&candidate).then_some((candidate, len))
            });
            match matched {
                Some((word, len)) => {
                    out.push(word);
                    i += len;
                }
                None => {
                    out.push(run[i].to_string());
                    i += 1;
                }
            }
        }
    }
}

impl Tokenizer for LexiconTokenizer {
    fn name(&self) -> &'static str {
        "lexicon"
    }

    fn tokenize(&self, text: &str) -> Vec<String> {
        let mut raw = Vec::new();
        let mut cjk_run: Vec<char> = Vec::new();
        let mut word = String::new();

        for c in text.chars() {
            if is_cjk(c) {
                if !word.is_empty() {
                    raw.push(std::mem::take(&mut word).to_lowercase());
                }
                cjk_run.push(c);
            } else {
                if !cjk_run.is_empty() {
                    self.segment_cjk(&cjk_run, &mut raw);
                    cjk_run.clear();
                }
                if c.is_alphanumeric() {
                    word.push(c);
                } else if !word.is_empty() {
                    raw.push(std::mem::take(&mut word).to_lowercase());
                }
            }
        }
        if !cjk_run.is_empty() {
            self.segment_cjk(&cjk_run, &mut raw);
        }
        if !word.is_empty() {
            raw.push(word.to_lowercase());
        }

        raw.into_iter()
            .filter(|t| char_len(t) > 1 && !is_stop_word(t))
            .collect()
    }
}
