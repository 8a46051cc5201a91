//! # Lexical Index Module
//!
//! ## Purpose
//! Term-frequency lexical scoring (BM25) over the full document collection,
//! plus the strict candidate gate that decides whether a document is allowed
//! into ranking at all.
//!
//! ## Input/Output Specification
//! - **Input**: tokenized documents at build time, query token sequences at
//!   query time
//! - **Output**: per-document BM25 scores; distinct-token overlap counts
//!
//! ## Contract
//! A document sharing zero tokens with the query scores exactly 0; scores
//! grow with shared, rare-term overlap. Collection statistics (document
//! frequency, average length) are computed once at build time, which is why
//! corpus changes require a rebuild rather than an in-place patch.

use crate::text::tokenize;
use crate::Document;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};

const K1: f32 = 1.2;
const B: f32 = 0.75;

/// BM25 index over a fixed document collection.
///
/// Document order matches the order the documents were supplied in; scores
/// are returned positionally.
pub struct LexicalIndex {
    /// Token frequency per document
    doc_term_freqs: Vec<HashMap<String, usize>>,
    /// Distinct token set per document, used by the overlap gate
    doc_token_sets: Vec<HashSet<String>>,
    /// Token length per document
    doc_lens: Vec<usize>,
    /// Number of documents each token appears in
    doc_freq: HashMap<String, usize>,
    avg_doc_len: f32,
}

impl LexicalIndex {
    /// Build the index over a document collection. Each document is indexed
    /// as the concatenation of its title and text.
    pub fn build(documents: &[Document]) -> Self {
        let doc_tokens: Vec<Vec<String>> = documents
            .par_iter()
            .map(|doc| tokenize(&format!("{} {}", doc.title, doc.text)))
            .collect();

        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut doc_term_freqs = Vec::with_capacity(doc_tokens.len());
        let mut doc_token_sets = Vec::with_capacity(doc_tokens.len());
        let mut doc_lens = Vec::with_capacity(doc_tokens.len());

        for tokens in &doc_tokens {
            let mut tf: HashMap<String, usize> = HashMap::new();
            for token in tokens {
                *tf.entry(token.clone()).or_insert(0) += 1;
            }
            for token in tf.keys() {
                *doc_freq.entry(token.clone()).or_insert(0) += 1;
            }
            doc_token_sets.push(tf.keys().cloned().collect());
            doc_lens.push(tokens.len());
            doc_term_freqs.push(tf);
        }

        let avg_doc_len = if doc_lens.is_empty() {
            0.0
        } else {
            doc_lens.iter().sum::<usize>() as f32 / doc_lens.len() as f32
        };

        Self {
            doc_term_freqs,
            doc_token_sets,
            doc_lens,
            doc_freq,
            avg_doc_len,
        }
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.doc_term_freqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_term_freqs.is_empty()
    }

    /// BM25 score of every document against the query token sequence,
    /// positionally aligned with the build-time document order.
    pub fn scores(&self, query_tokens: &[String]) -> Vec<f32> {
        (0..self.len())
            .map(|idx| self.score_doc(idx, query_tokens))
            .collect()
    }

    fn score_doc(&self, idx: usize, query_tokens: &[String]) -> f32 {
        let doc_len = self.doc_lens[idx] as f32;
        if doc_len == 0.0 || self.avg_doc_len <= f32::EPSILON {
            return 0.0;
        }

        let total_docs = self.len() as f32;
        let tf = &self.doc_term_freqs[idx];

        let mut score = 0.0_f32;
        for token in query_tokens {
            let term_tf = tf.get(token).copied().unwrap_or(0) as f32;
            if term_tf <= 0.0 {
                continue;
            }
            let df = self.doc_freq.get(token).copied().unwrap_or(0) as f32;
            let idf = (((total_docs - df + 0.5) / (df + 0.5)) + 1.0).ln();
            let denom = term_tf + K1 * (1.0 - B + B * (doc_len / self.avg_doc_len));
            score += idf * ((term_tf * (K1 + 1.0)) / denom.max(f32::EPSILON));
        }
        score
    }

    /// Count of distinct query tokens present in the document's token set.
    pub fn overlap(&self, idx: usize, query_token_set: &HashSet<String>) -> usize {
        query_token_set
            .iter()
            .filter(|t| self.doc_token_sets[idx].contains(*t))
            .count()
    }
}

/// Minimum number of distinct query tokens a gated candidate must share with
/// a document: 1 for single-token queries, otherwise
/// `ceil(ratio * query_token_count)`, never below 1.
///
/// Intentionally harsher than a positive BM25 score; it suppresses spurious
/// single-term matches on long queries.
pub fn required_hits(query_token_count: usize, min_match_ratio: f32) -> usize {
    if query_token_count <= 1 {
        1
    } else {
        ((min_match_ratio * query_token_count as f32).ceil() as usize).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Document, DocumentStatus};

    fn doc(id: &str, title: &str, text: &str) -> Document {
        Document {
            id: id.to_string(),
            entity_id: "act_1".to_string(),
            title: title.to_string(),
            text: text.to_string(),
            section_no: None,
            valid_from: None,
            valid_to: None,
            status: DocumentStatus::Active,
            citations: Vec::new(),
            amended_by: Vec::new(),
            repealed_by: None,
            jurisdiction: None,
        }
    }

    fn sample_index() -> LexicalIndex {
        LexicalIndex::build(&[
            doc("d1", "Grounds for divorce", "marriage may be dissolved on grounds of adultery"),
            doc("d2", "Custody of children", "custody orders consider the welfare of the child"),
            doc("d3", "Maintenance", "maintenance payable after dissolution of marriage"),
        ])
    }

    #[test]
    fn zero_overlap_scores_zero() {
        let index = sample_index();
        let scores = index.scores(&tokenize("tax assessment"));
        assert!(scores.iter().all(|&s| s <= 0.0));
    }

    #[test]
    fn relevant_document_scores_highest() {
        let index = sample_index();
        let scores = index.scores(&tokenize("custody child welfare"));
        assert!(scores[1] > scores[0]);
        assert!(scores[1] > scores[2]);
        assert!(scores[1] > 0.0);
    }

    #[test]
    fn extra_matching_token_increases_score() {
        let index = sample_index();
        let fewer = index.scores(&tokenize("custody"))[1];
        let more = index.scores(&tokenize("custody welfare"))[1];
        assert!(more > fewer);
    }

    #[test]
    fn overlap_counts_distinct_tokens() {
        let index = sample_index();
        let q: HashSet<String> = tokenize("custody custody welfare missing")
            .into_iter()
            .collect();
        assert_eq!(index.overlap(1, &q), 2);
        assert_eq!(index.overlap(0, &q), 0);
    }

    #[test]
    fn required_hits_thresholds() {
        assert_eq!(required_hits(1, 0.5), 1);
        assert_eq!(required_hits(2, 0.5), 1);
        assert_eq!(required_hits(3, 0.5), 2);
        assert_eq!(required_hits(4, 0.5), 2);
        assert_eq!(required_hits(5, 0.5), 3);
        // the floor never drops below one hit
        assert_eq!(required_hits(4, 0.0), 1);
    }

    #[test]
    fn empty_collection_builds() {
        let index = LexicalIndex::build(&[]);
        assert!(index.is_empty());
        assert!(index.scores(&tokenize("anything")).is_empty());
    }
}
