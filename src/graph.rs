//! # Citation Graph Module
//!
//! ## Purpose
//! Citation-graph proximity scoring for case-precedent retrieval, plus the
//! ingestion-side pieces: heuristic extraction of citation candidates from
//! document text and idempotent node/edge upserts.
//!
//! ## Input/Output Specification
//! - **Input**: query-entity id (real or synthetic) and candidate entity id
//! - **Output**: a graph relevance score; 0 when the signal does not apply
//!
//! ## Scoring
//! +0.30 when the query entity directly cites the candidate, +0.20 when the
//! candidate cites the query entity back, +0.10 per shared two-hop citation
//! neighbor up to three. Unbounded above by construction, practically capped
//! near 0.8.
//!
//! The graph store is external and pluggable; `MemoryGraphStore` implements
//! the same interface in process for tests and single-node deployments.

use crate::config::GraphConfig;
use crate::errors::{Result, RetrievalError};
use crate::{Document, EntityId};
use async_trait::async_trait;
use dashmap::DashMap;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// External citation-graph store seam.
///
/// Writes must be idempotent upserts keyed by stable entity id so that
/// concurrent re-ingestion of the same document cannot create duplicate
/// nodes or edges.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create or update a node.
    async fn upsert_node(&self, id: &str, title: &str) -> Result<()>;

    /// Create a CITES edge, creating the target node if needed.
    async fn upsert_edge(&self, from: &str, to: &str) -> Result<()>;

    /// Whether `a` cites `b`.
    async fn direct_citation(&self, a: &str, b: &str) -> Result<bool>;

    /// Whether `b` cites `a`.
    async fn reverse_citation(&self, a: &str, b: &str) -> Result<bool>;

    /// Number of distinct nodes cited by both `a` and `b`.
    async fn shared_neighbor_count(&self, a: &str, b: &str) -> Result<usize>;
}

/// In-process graph store backed by concurrent maps.
#[derive(Default)]
pub struct MemoryGraphStore {
    nodes: DashMap<EntityId, String>,
    /// outbound CITES adjacency
    edges: DashMap<EntityId, HashSet<EntityId>>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().map(|e| e.value().len()).sum()
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn upsert_node(&self, id: &str, title: &str) -> Result<()> {
        self.nodes.insert(id.to_string(), title.to_string());
        Ok(())
    }

    async fn upsert_edge(&self, from: &str, to: &str) -> Result<()> {
        self.nodes.entry(to.to_string()).or_default();
        self.nodes.entry(from.to_string()).or_default();
        self.edges
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
        Ok(())
    }

    async fn direct_citation(&self, a: &str, b: &str) -> Result<bool> {
        Ok(self
            .edges
            .get(a)
            .map(|targets| targets.contains(b))
            .unwrap_or(false))
    }

    async fn reverse_citation(&self, a: &str, b: &str) -> Result<bool> {
        self.direct_citation(b, a).await
    }

    async fn shared_neighbor_count(&self, a: &str, b: &str) -> Result<usize> {
        // One shard guard at a time: holding the `a` guard across the `b`
        // lookup can deadlock against a queued writer on the same shard.
        let out_a: HashSet<EntityId> = match self.edges.get(a) {
            Some(targets) => targets.clone(),
            None => return Ok(0),
        };
        Ok(self
            .edges
            .get(b)
            .map(|out_b| out_a.intersection(out_b.value()).count())
            .unwrap_or(0))
    }
}

/// Weighted citation-proximity scorer over a [`GraphStore`].
pub struct CitationScorer {
    store: Arc<dyn GraphStore>,
    config: GraphConfig,
}

impl CitationScorer {
    pub fn new(store: Arc<dyn GraphStore>, config: GraphConfig) -> Self {
        Self { store, config }
    }

    /// Graph relevance between the query entity and a candidate entity.
    pub async fn score(&self, query_entity: &str, candidate_entity: &str) -> Result<f32> {
        let mut score = 0.0_f32;
        if self
            .store
            .direct_citation(query_entity, candidate_entity)
            .await?
        {
            score += self.config.direct_citation_weight;
        }
        if self
            .store
            .reverse_citation(query_entity, candidate_entity)
            .await?
        {
            score += self.config.reverse_citation_weight;
        }
        let shared = self
            .store
            .shared_neighbor_count(query_entity, candidate_entity)
            .await?;
        score += self.config.shared_neighbor_weight
            * shared.min(self.config.shared_neighbor_cap) as f32;
        Ok(score)
    }

    /// Ingest a document's outbound citations: upsert its entity node and a
    /// CITES edge per explicit citation, then per heuristic candidate found
    /// in the text.
    pub async fn ingest_document(&self, doc: &Document) -> Result<()> {
        self.store.upsert_node(&doc.entity_id, &doc.title).await?;
        for target in &doc.citations {
            self.store.upsert_edge(&doc.entity_id, target).await?;
        }
        for target in
            extract_citation_candidates(&doc.text, self.config.max_extracted_citations)
        {
            if target != doc.entity_id {
                self.store.upsert_edge(&doc.entity_id, &target).await?;
            }
        }
        Ok(())
    }

    /// Register an ad-hoc query document as a synthetic graph node: a fresh
    /// uuid-keyed node whose text is scanned for citations. Returns the
    /// synthetic entity id to use as the query node during ranking.
    pub async fn register_query_document(&self, text: &str) -> Result<EntityId> {
        let id = format!("query-{}", Uuid::new_v4());
        self.store.upsert_node(&id, "query document").await?;
        for target in extract_citation_candidates(text, self.config.max_extracted_citations) {
            self.store.upsert_edge(&id, &target).await?;
        }
        tracing::debug!(
            node = %id,
            "Registered query document ({})",
            crate::utils::preview(text, 12)
        );
        Ok(id)
    }
}

fn versus_re() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b([A-Z][A-Za-z]{2,})\s+v(?:\.|s\.?)?\s+([A-Z][A-Za-z]{2,})\b").unwrap()
    })
}

fn case_token_re() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z][A-Za-z0-9_\-]{2,}\b").unwrap())
}

/// Heuristic extraction of case-like citation tokens.
///
/// Matches `Name v Name` party patterns first, then conservative standalone
/// capitalized tokens between 3 and 30 characters. Citation formats vary by
/// jurisdiction; this stays deliberately narrow to keep edge precision high.
pub fn extract_citation_candidates(text: &str, max_candidates: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for caps in versus_re().captures_iter(text) {
        let token = format!("{}_v_{}", &caps[1], &caps[2]);
        if seen.insert(token.clone()) {
            candidates.push(token);
        }
        if candidates.len() >= max_candidates {
            return candidates;
        }
    }

    for m in case_token_re().find_iter(text) {
        let token = m.as_str();
        if token.len() <= 30 && seen.insert(token.to_string()) {
            candidates.push(token.to_string());
        }
        if candidates.len() >= max_candidates {
            break;
        }
    }

    candidates
}

/// Fallible wrapper used by the engine: a store error degrades the score to
/// zero instead of failing the query; the caller logs the degraded mode.
pub async fn score_or_zero(
    scorer: &CitationScorer,
    query_entity: &str,
    candidate_entity: &str,
) -> (f32, Option<RetrievalError>) {
    match scorer.score(query_entity, candidate_entity).await {
        Ok(score) => (score, None),
        Err(err) => (0.0, Some(err)),
    }
}
