//! # Text Processing Module
//!
//! ## Purpose
//! Text cleanup pipeline for legal documents: Unicode normalization,
//! boilerplate stripping, whitespace collapsing, and sentence splitting.
//!
//! ## Input/Output Specification
//! - **Input**: Raw text extracted from PDFs or metadata snippets
//! - **Output**: Normalized text and sentence lists
//! - **Guarantee**: Normalization never fails and is idempotent
//!
//! ## Key Features
//! - Unicode NFKC normalization
//! - "Page N of M" boilerplate removal
//! - Ellipsis and blank-line collapsing
//! - Sentence splitting with terminators preserved

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Text normalizer with precompiled patterns
pub struct TextNormalizer {
    ellipsis: Regex,
    blank_lines: Regex,
    page_boilerplate: Regex,
    whitespace: Regex,
}

impl TextNormalizer {
    /// Create a new normalizer
    pub fn new() -> Self {
        Self {
            ellipsis: Regex::new(r"\.{3,}").unwrap(),
            blank_lines: Regex::new(r"\n\s*\n+").unwrap(),
            page_boilerplate: Regex::new(r"(?i)Page\s+\d+\s+of\s+\d+").unwrap(),
            whitespace: Regex::new(r"\s+").unwrap(),
        }
    }

    /// Normalize raw document text.
    ///
    /// Best-effort cleanup that never fails on malformed input. Applying it
    /// twice yields the same result as applying it once.
    pub fn normalize(&self, text: &str) -> String {
        let text: String = text.nfkc().collect();
        let text = self.ellipsis.replace_all(&text, ".");
        let text = self.blank_lines.replace_all(&text, "\n\n");
        let text = self.page_boilerplate.replace_all(&text, "");
        let text = self.whitespace.replace_all(&text, " ");
        text.trim().to_string()
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Split text into sentences, keeping terminators attached.
///
/// A sentence boundary is a run of `.`, `!` or `?` followed by whitespace.
/// Trailing text without a terminator forms the final sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            // Consume any further terminators before testing the boundary
            while let Some(&next) = chars.peek() {
                if matches!(next, '.' | '!' | '?') {
                    current.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            if chars.peek().map_or(true, |next| next.is_whitespace()) {
                let sentence = current.trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                current.clear();
            }
        }
    }

    let sentence = current.trim();
    if !sentence.is_empty() {
        sentences.push(sentence.to_string());
    }

    sentences
}

/// Count whitespace-delimited words (the token measure used throughout the
/// chunking pipeline)
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_is_idempotent() {
        let normalizer = TextNormalizer::new();
        let inputs = [
            "Case: Smith v. Jones....  The court\n\n\nheld...  Page 3 of 12  otherwise.",
            "  plain text  ",
            "",
            "\u{FB01}ling a motion", // ligature, NFKC expands to "filing"
        ];
        for input in inputs {
            let once = normalizer.normalize(input);
            let twice = normalizer.normalize(&once);
            assert_eq!(once, twice, "not idempotent for {:?}", input);
        }
    }

    #[test]
    fn strips_page_boilerplate_case_insensitively() {
        let normalizer = TextNormalizer::new();
        let out = normalizer.normalize("Intro PAGE 2 OF 9 body page 3 of 9 end");
        assert_eq!(out, "Intro body end");
    }

    #[test]
    fn collapses_ellipses_and_whitespace() {
        let normalizer = TextNormalizer::new();
        let out = normalizer.normalize("The motion was denied.....   Next\n\n\nparagraph.");
        assert_eq!(out, "The motion was denied. Next paragraph.");
    }

    #[test]
    fn splits_sentences_with_terminators() {
        let sentences = split_sentences("The court held X. Was it proper? Yes! No appeal followed");
        assert_eq!(
            sentences,
            vec![
                "The court held X.",
                "Was it proper?",
                "Yes!",
                "No appeal followed"
            ]
        );
    }

    #[test]
    fn abbreviation_periods_mid_token_do_not_split() {
        // "v." is followed by whitespace so it does split, but "U.S" internal
        // periods followed by letters must not
        let sentences = split_sentences("See U.S.C. section 1983.");
        assert_eq!(sentences.last().unwrap(), "section 1983.");
    }

    #[test]
    fn counts_words() {
        assert_eq!(word_count("one two  three"), 3);
        assert_eq!(word_count(""), 0);
    }
}
