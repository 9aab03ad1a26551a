//! Claim extraction: split text into sentences and keep the claim-like ones.

use crate::verifier::contains_digit;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("valid regex"));

/// Lower-cased words that end with a period without ending the sentence.
const ABBREVIATIONS: &[&str] = &[
    "al", "approx", "dr", "e.g", "eq", "fig", "i.e", "jr", "mr", "mrs", "ms", "prof", "sr", "st",
    "vs",
];

/// Produces the ordered claim sentences of a text.
pub trait ClaimExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Vec<String>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Phrases that mark a sentence as a claim (case-insensitive).
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
    /// Treat any sentence containing a digit as a claim.
    #[serde(default = "default_include_numeric")]
    pub include_numeric: bool,
}

fn default_keywords() -> Vec<String> {
    [
        "according to",
        "studies show",
        "research indicates",
        "research shows",
        "reported that",
        "found that",
        "suggests",
        "evidence shows",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_include_numeric() -> bool {
    true
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
            include_numeric: default_include_numeric(),
        }
    }
}

/// Keyword and number based extractor.
#[derive(Debug, Clone)]
pub struct HeuristicClaimExtractor {
    keywords: Vec<String>,
    include_numeric: bool,
}

impl Default for HeuristicClaimExtractor {
    fn default() -> Self {
        Self::new(&ExtractorConfig::default())
    }
}

impl HeuristicClaimExtractor {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            keywords: config
                .keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            include_numeric: config.include_numeric,
        }
    }

    pub fn is_claim(&self, sentence: &str) -> bool {
        let lowered = sentence.to_lowercase();
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
            || (self.include_numeric && contains_digit(sentence))
    }
}

impl ClaimExtractor for HeuristicClaimExtractor {
    fn extract(&self, text: &str) -> Vec<String> {
        split_sentences(text)
            .into_iter()
            .filter(|s| self.is_claim(s))
            .collect()
    }
}

/// Split `text` into whitespace-normalised sentences.
///
/// A sentence ends at `.`, `!` or `?` (plus any closing quotes or brackets)
/// when followed by whitespace and an upper-case letter, digit, or opening
/// quote. Common abbreviations and single-letter initials do not end a
/// sentence. Blank lines always do.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    for paragraph in PARAGRAPH_BREAK.split(text) {
        split_paragraph(paragraph, &mut sentences);
    }
    sentences
}

fn split_paragraph(text: &str, out: &mut Vec<String>) {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        if !matches!(c, '.' | '!' | '?') {
            i += 1;
            continue;
        }

        let mut j = i + 1;
        while j < chars.len() && is_closing(chars[j].1) {
            j += 1;
        }
        let mut k = j;
        while k < chars.len() && chars[k].1.is_whitespace() {
            k += 1;
        }

        let boundary = k > j
            && k < chars.len()
            && opens_sentence(chars[k].1)
            && !(c == '.' && ends_with_abbreviation(&text[start..pos]));
        if boundary {
            push_sentence(&text[start..chars[j].0], out);
            start = chars[k].0;
            i = k;
        } else {
            i = j;
        }
    }
    push_sentence(&text[start..], out);
}

fn is_closing(c: char) -> bool {
    matches!(
        c,
        '.' | '!' | '?' | '"' | '\'' | ')' | ']' | '\u{201D}' | '\u{2019}'
    )
}

fn opens_sentence(c: char) -> bool {
    c.is_uppercase() || c.is_numeric() || matches!(c, '"' | '\'' | '\u{201C}' | '\u{2018}')
}

fn ends_with_abbreviation(before_period: &str) -> bool {
    let word = before_period
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or("")
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    if word.chars().count() == 1 && word.chars().all(char::is_alphabetic) {
        return true;
    }
    ABBREVIATIONS.contains(&word.as_str())
}

fn push_sentence(raw: &str, out: &mut Vec<String>) {
    let sentence = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if !sentence.is_empty() {
        out.push(sentence);
    }
}
