// Text cleaning and sentence splitting for similarity scoring
use lazy_static::lazy_static;
use regex::Regex;

use crate::patterns::char_len;

/// Cleaned texts shorter than this are not compared
pub const MIN_TEXT_CHARS: usize = 10;

/// Sentences shorter than this are ignored when looking for copied segments
pub const MIN_SENTENCE_CHARS: usize = 15;

lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();

    /// Anything outside CJK ideographs, word characters, whitespace and common punctuation
    static ref DISALLOWED_CHARS: Regex =
        Regex::new(r"[^\x{4e00}-\x{9fff}\w\s.,;:!?。，；：！？、（）()]").unwrap();

    static ref SENTENCE_BREAK: Regex = Regex::new(r"[。！？\n]").unwrap();
}

/// Collapse whitespace runs and strip characters outside the permitted charset
pub fn clean_text(text: &str) -> String {
    let collapsed = WHITESPACE_RUN.replace_all(text, " ");
    let stripped = DISALLOWED_CHARS.replace_all(&collapsed, "");
    stripped.trim().to_string()
}

/// Split on sentence-ending punctuation and newlines, keeping sentences of at least `min_chars`
pub fn split_sentences(text: &str, min_chars: usize) -> Vec<&str> {
    SENTENCE_BREAK
        .split(text)
        .map(str::trim)
        .filter(|s| char_len(s) >= min_chars)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  施工\n\n  组织\t设计  "), "施工 组织 设计");
    }

    #[test]
    fn test_clean_text_strips_symbols() {
        assert_eq!(clean_text("★投标★文件《目录》#1"), "投标文件目录1");
        assert_eq!(clean_text("工期：120天（日历天）。"), "工期：120天（日历天）。");
    }

    #[test]
    fn test_split_sentences_drops_short_ones() {
        let text = "短句。这是一个足够长的句子用于相似度比较测试！\n另一个同样足够长的句子也会被保留下来？";
        let sentences = split_sentences(text, MIN_SENTENCE_CHARS);
        assert_eq!(sentences.len(), 2);
        assert!(sentences[0].starts_with("这是"));
    }
}
