//! # Text Processing Module
//!
//! ## Purpose
//! Cleaning and strict tokenization for queries and legal document text.
//! Everything here is deterministic and pure: the same input always yields
//! the same output, which keeps indexing and retrieval reproducible.
//!
//! ## Input/Output Specification
//! - **Input**: raw query or document text
//! - **Output**: a cleaned display string, or an ordered sequence of
//!   lowercase alphanumeric tokens (apostrophes allowed inside tokens)
//!
//! ## Strictness
//! Tokenization removes stopwords and any token shorter than three
//! characters. A query that survives with zero tokens is rejected upstream
//! rather than matched loosely.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Minimum length a token must have to be kept.
pub const MIN_TOKEN_LEN: usize = 3;

/// Fixed stopword set applied during tokenization.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "have", "in", "is",
    "it", "of", "on", "or", "that", "the", "their", "they", "this", "to", "was", "were", "with",
    "you", "your",
];

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z0-9']+").unwrap())
}

fn non_text_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9\s']").unwrap())
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

fn stopwords() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOPWORDS.iter().copied().collect())
}

/// Clean text for display and downstream tokenization.
///
/// Replaces real and escaped newline sequences with spaces (PDF extraction
/// leaves literal `\n` and `/n` in text), strips every character other than
/// alphanumerics, whitespace and apostrophes, and collapses repeated
/// whitespace. The result is what the engine echoes back as the clean query.
pub fn clean_text(input: &str) -> String {
    let replaced = input
        .trim()
        .replace("\\n", " ")
        .replace("/n", " ")
        .replace(['\n', '\r'], " ");
    let stripped = non_text_re().replace_all(&replaced, " ");
    whitespace_re()
        .replace_all(&stripped, " ")
        .trim()
        .to_string()
}

/// Tokenize text into lowercase tokens, dropping stopwords and tokens
/// shorter than [`MIN_TOKEN_LEN`]. Empty input yields an empty sequence.
pub fn tokenize(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let lowered = text.to_lowercase();
    token_re()
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .filter(|t| t.len() >= MIN_TOKEN_LEN && !stopwords().contains(t.as_str()))
        .collect()
}

/// Clean then tokenize in one pass; the common query path.
pub fn clean_and_tokenize(input: &str) -> (String, Vec<String>) {
    let clean = clean_text(input);
    let tokens = tokenize(&clean);
    (clean, tokens)
}
