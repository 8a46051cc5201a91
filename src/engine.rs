//! # Fusion & Ranking Engine
//!
//! ## Purpose
//! Orchestrates the full retrieval pipeline: strict query cleaning, entity
//! expansion, lexical gating, temporal filtering, semantic reranking,
//! optional citation-graph scoring, score normalization and fusion.
//!
//! ## Pipeline
//! 1. Clean and tokenize the query; zero usable tokens is a strict rejection.
//! 2. Whole-entity expansion takes priority over section-level gating.
//! 3. Otherwise every document is BM25-scored and must clear the minimum-hit
//!    gate, the jurisdiction filter and the temporal filter; an empty gated
//!    set is a strict rejection (out-of-corpus), never silently broadened.
//! 4. The candidate pool is capped, lexical scores are min-max normalized,
//!    semantic cosines are computed for survivors and mapped to [0, 1].
//! 5. `fused = alpha * lexical_norm + beta * semantic_norm + graph_score`.
//! 6. Sort descending by fused score with document id as the deterministic
//!    tie-break, then cap at `top_k` (0 returns every survivor).
//!
//! ## Concurrency
//! Read-mostly: queries share an immutable index snapshot behind an `Arc`
//! and never lock each other out. Rebuilds are single-writer; a complete
//! snapshot is built off to the side and swapped in atomically, so queries
//! during a rebuild serve the previous snapshot.

use crate::config::Config;
use crate::corpus::Corpus;
use crate::errors::{Result, RetrievalError};
use crate::expansion::EntityMatcher;
use crate::graph::{CitationScorer, GraphStore};
use crate::lexical::{required_hits, LexicalIndex};
use crate::semantic::{semantic_unit_score, EmbeddingModel, SemanticIndex};
use crate::temporal::{temporally_valid, today};
use crate::text::clean_and_tokenize;
use crate::{Document, Entity, EntityId, SearchRequest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// One ranked result, carrying every per-signal score so downstream
/// explanation endpoints need no recomputation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    pub document: Document,
    /// Raw BM25 score
    pub lexical_score: f32,
    /// BM25 min-max normalized within the candidate pool
    pub lexical_score_normalized: f32,
    /// Raw cosine in [-1, 1]
    pub semantic_cosine: f32,
    /// Citation-graph score; 0 when the signal does not apply
    pub graph_score: f32,
    /// Weighted fusion of the above
    pub fused_score: f32,
}

/// Point-in-time view of one Act: its documents valid on the as-of date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActSnapshot {
    pub entity_id: EntityId,
    pub as_of_date: String,
    pub documents: Vec<Document>,
}

/// Node in an Act's structural graph view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    /// "act" or "section"
    pub kind: String,
}

/// Edge in an Act's structural graph view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub relation: String,
}

/// Structural view of one Act: the act node and its section nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActGraph {
    pub entity_id: EntityId,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Version history of one section within an Act.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionTimeline {
    pub entity_id: EntityId,
    pub section_no: String,
    pub versions: Vec<Document>,
}

/// Engine statistics for the stats endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStats {
    pub document_count: usize,
    pub entity_count: usize,
    pub embedding_dimension: usize,
    pub graph_enabled: bool,
    pub built_at: DateTime<Utc>,
}

/// Immutable index state shared by all in-flight queries.
struct IndexSnapshot {
    documents: Vec<Document>,
    lexical: LexicalIndex,
    semantic: SemanticIndex,
    matcher: EntityMatcher,
    entities: HashMap<EntityId, Entity>,
    built_at: DateTime<Utc>,
}

/// Transient per-candidate scoring record; lives for one query only.
struct ScoredCandidate {
    idx: usize,
    lexical: f32,
    lexical_norm: f32,
    cosine: f32,
    graph: f32,
}

/// Main retrieval engine.
pub struct RetrievalEngine {
    config: Arc<Config>,
    model: Arc<dyn EmbeddingModel>,
    graph: Option<CitationScorer>,
    snapshot: RwLock<Arc<IndexSnapshot>>,
    rebuild_guard: Mutex<()>,
}

impl RetrievalEngine {
    /// Build the engine and its first index snapshot from a corpus.
    pub async fn build(
        config: Arc<Config>,
        corpus: Corpus,
        model: Arc<dyn EmbeddingModel>,
        graph_store: Option<Arc<dyn GraphStore>>,
    ) -> Result<Self> {
        corpus.validate()?;
        let snapshot = Self::build_snapshot(&config, corpus, model.as_ref()).await?;
        let graph = graph_store
            .map(|store| CitationScorer::new(store, config.graph.clone()));
        Ok(Self {
            config,
            model,
            graph,
            snapshot: RwLock::new(Arc::new(snapshot)),
            rebuild_guard: Mutex::new(()),
        })
    }

    async fn build_snapshot(
        config: &Config,
        corpus: Corpus,
        model: &dyn EmbeddingModel,
    ) -> Result<IndexSnapshot> {
        let Corpus {
            entities,
            documents,
        } = corpus;

        tracing::info!(
            documents = documents.len(),
            entities = entities.len(),
            "Building index snapshot"
        );

        let lexical = LexicalIndex::build(&documents);
        let matcher = EntityMatcher::build(&entities, &documents);
        let texts: Vec<String> = documents
            .iter()
            .map(|d| format!("{} {}", d.title, d.text))
            .collect();
        let semantic = SemanticIndex::build(
            model,
            &texts,
            config.index.embedding_dimension,
            config.index.embedding_batch_size,
        )
        .await?;

        let entities: HashMap<EntityId, Entity> = entities
            .into_iter()
            .map(|e| (e.id.clone(), e))
            .collect();

        Ok(IndexSnapshot {
            documents,
            lexical,
            semantic,
            matcher,
            entities,
            built_at: Utc::now(),
        })
    }

    /// Rebuild the index from a new corpus and swap it in atomically.
    /// Single-writer: concurrent rebuild calls serialize; queries keep
    /// serving the previous snapshot until the swap.
    pub async fn rebuild(&self, corpus: Corpus) -> Result<()> {
        let _guard = self.rebuild_guard.lock().await;
        corpus.validate()?;
        let snapshot = Self::build_snapshot(&self.config, corpus, self.model.as_ref()).await?;
        *self.snapshot.write().await = Arc::new(snapshot);
        tracing::info!("Index snapshot swapped");
        Ok(())
    }

    /// Run the full hybrid ranking pipeline for one request.
    pub async fn search(&self, request: SearchRequest) -> Result<Vec<RankedResult>> {
        let timer = crate::utils::Timer::new("search");
        let snapshot = self.snapshot.read().await.clone();
        let as_of = request
            .as_of_date
            .clone()
            .unwrap_or_else(today);

        let (clean, query_tokens) = clean_and_tokenize(&request.query);
        if query_tokens.is_empty() {
            tracing::debug!(query = %request.query, "Strict rejection: no usable tokens");
            return Ok(Vec::new());
        }
        let query_set: HashSet<String> = query_tokens.iter().cloned().collect();

        let lexical_scores = snapshot.lexical.scores(&query_tokens);

        // Semantic scoring is required on every path; an embedding failure
        // is fatal to the query rather than silently degrading to
        // lexical-only ranking.
        let query_embedding = self.model.encode(&clean).await?;
        if query_embedding.len() != snapshot.semantic.dimension() {
            return Err(RetrievalError::EmbeddingDimension {
                expected: snapshot.semantic.dimension(),
                actual: query_embedding.len(),
            });
        }

        let matched = snapshot.matcher.matches(
            &query_tokens,
            &query_set,
            self.config.fusion.expansion_overlap_ratio,
        );

        let (pool, expansion_path) = if matched.is_empty() {
            let pool = self.gate_sections(
                &snapshot,
                &lexical_scores,
                &query_set,
                query_tokens.len(),
                request.jurisdiction.as_deref(),
                &as_of,
            );
            (pool, false)
        } else {
            tracing::debug!(entities = ?matched, "Entity expansion matched");
            let pool = self.expand_entities(
                &snapshot,
                &matched,
                request.jurisdiction.as_deref(),
                &as_of,
            );
            (pool, true)
        };

        if pool.is_empty() {
            tracing::debug!(query = %clean, "Strict rejection: no candidates survive gating");
            return Ok(Vec::new());
        }

        let mut candidates = self.score_pool(
            &snapshot,
            &pool,
            &lexical_scores,
            &query_embedding,
            expansion_path,
        );

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        self.apply_graph_scores(&request, &snapshot, &mut candidates)
            .await;

        let alpha = self.config.fusion.alpha_lexical;
        let beta = self.config.fusion.beta_semantic;
        let mut results: Vec<RankedResult> = candidates
            .into_iter()
            .map(|c| {
                let fused = alpha * c.lexical_norm
                    + beta * semantic_unit_score(c.cosine)
                    + c.graph;
                RankedResult {
                    document: snapshot.documents[c.idx].clone(),
                    lexical_score: c.lexical,
                    lexical_score_normalized: c.lexical_norm,
                    semantic_cosine: c.cosine,
                    graph_score: c.graph,
                    fused_score: fused,
                }
            })
            .collect();

        // descending fused score; document id breaks ties deterministically
        // (discovery order is not stable across rebuilds)
        results.sort_by(|a, b| {
            b.fused_score
                .partial_cmp(&a.fused_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.document.id.cmp(&b.document.id))
        });

        if request.top_k > 0 {
            results.truncate(request.top_k);
        }
        tracing::debug!(
            results = results.len(),
            expansion = expansion_path,
            elapsed_ms = timer.elapsed_ms(),
            "Query complete"
        );
        Ok(results)
    }

    /// Section-level strict gate: positive BM25, minimum distinct-token
    /// overlap, jurisdiction and temporal filters. Survivors are ordered by
    /// raw BM25 descending and capped for cost control.
    fn gate_sections(
        &self,
        snapshot: &IndexSnapshot,
        lexical_scores: &[f32],
        query_set: &HashSet<String>,
        query_token_count: usize,
        jurisdiction: Option<&str>,
        as_of: &str,
    ) -> Vec<usize> {
        let min_hits = required_hits(query_token_count, self.config.fusion.min_match_ratio);

        let mut candidates: Vec<usize> = snapshot
            .documents
            .iter()
            .enumerate()
            .filter(|(idx, doc)| {
                if let Some(j) = jurisdiction {
                    if doc.jurisdiction.as_deref() != Some(j) {
                        return false;
                    }
                }
                if !temporally_valid(doc, as_of) {
                    return false;
                }
                if lexical_scores[*idx] <= 0.0 {
                    return false;
                }
                snapshot.lexical.overlap(*idx, query_set) >= min_hits
            })
            .map(|(idx, _)| idx)
            .collect();

        candidates.sort_by(|&a, &b| {
            lexical_scores[b]
                .partial_cmp(&lexical_scores[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(self.config.fusion.bm25_candidates);
        candidates
    }

    /// Expansion path: the candidate set is the union of all documents of
    /// the matched entities, still subject to jurisdiction and temporal
    /// filters. The minimum-hit lexical gate is bypassed.
    fn expand_entities(
        &self,
        snapshot: &IndexSnapshot,
        matched: &[EntityId],
        jurisdiction: Option<&str>,
        as_of: &str,
    ) -> Vec<usize> {
        snapshot
            .matcher
            .documents_of(matched)
            .into_iter()
            .filter(|&idx| {
                let doc = &snapshot.documents[idx];
                if let Some(j) = jurisdiction {
                    if doc.jurisdiction.as_deref() != Some(j) {
                        return false;
                    }
                }
                temporally_valid(doc, as_of)
            })
            .collect()
    }

    /// Normalize lexical scores within the pool, compute cosines, and apply
    /// the per-candidate strict filter.
    fn score_pool(
        &self,
        snapshot: &IndexSnapshot,
        pool: &[usize],
        lexical_scores: &[f32],
        query_embedding: &[f32],
        expansion_path: bool,
    ) -> Vec<ScoredCandidate> {
        let raw: Vec<f32> = pool.iter().map(|&idx| lexical_scores[idx]).collect();
        let max = raw.iter().cloned().fold(f32::MIN, f32::max);
        let min = raw.iter().cloned().fold(f32::MAX, f32::min);

        let normalize = |score: f32| -> f32 {
            if (max - min).abs() <= f32::EPSILON {
                // degenerate pool: identical scores normalize to 1 when the
                // common value is positive, else 0
                if max > 0.0 {
                    1.0
                } else {
                    0.0
                }
            } else {
                (score - min) / (max - min)
            }
        };

        let floor = self.config.fusion.min_semantic_cosine;
        let lexical_miss_rule =
            expansion_path && self.config.fusion.expansion_filter_requires_lexical_miss;

        pool.iter()
            .zip(raw.iter())
            .filter_map(|(&idx, &lexical)| {
                let cosine = snapshot.semantic.cosine(query_embedding, idx);
                let discard = if lexical_miss_rule {
                    cosine < floor && lexical <= 0.0
                } else {
                    cosine < floor
                };
                if discard {
                    return None;
                }
                Some(ScoredCandidate {
                    idx,
                    lexical,
                    lexical_norm: normalize(lexical),
                    cosine,
                    graph: 0.0,
                })
            })
            .collect()
    }

    /// Fan out graph scoring across candidates and join. A graph-store
    /// failure degrades the whole query to lexical+semantic fusion rather
    /// than failing it.
    async fn apply_graph_scores(
        &self,
        request: &SearchRequest,
        snapshot: &IndexSnapshot,
        candidates: &mut [ScoredCandidate],
    ) {
        let Some(scorer) = &self.graph else {
            return;
        };
        if !self.config.graph.enabled {
            return;
        }
        let Some(query_entity) = &request.query_entity_id else {
            return;
        };

        let futures = candidates.iter().map(|c| {
            let candidate_entity = snapshot.documents[c.idx].entity_id.clone();
            async move {
                crate::graph::score_or_zero(scorer, query_entity, &candidate_entity).await
            }
        });
        let scored = futures::future::join_all(futures).await;

        let mut degraded = false;
        for (candidate, (score, err)) in candidates.iter_mut().zip(scored) {
            candidate.graph = score;
            if let Some(err) = err {
                if !degraded {
                    tracing::warn!(error = %err, "Graph store unavailable, serving degraded lexical+semantic ranking");
                    degraded = true;
                }
            }
        }
    }

    /// Register an ad-hoc query document as a synthetic citation-graph node,
    /// returning the entity id to pass as `query_entity_id`.
    pub async fn register_query_document(&self, text: &str) -> Result<EntityId> {
        let scorer = self
            .graph
            .as_ref()
            .ok_or_else(|| RetrievalError::GraphUnavailable {
                details: "no graph store configured".to_string(),
            })?;
        scorer.register_query_document(text).await
    }

    /// Ingest every document's citations into the graph store. Upserts are
    /// idempotent, so repeated ingestion is safe.
    pub async fn ingest_citations(&self) -> Result<usize> {
        let scorer = self
            .graph
            .as_ref()
            .ok_or_else(|| RetrievalError::GraphUnavailable {
                details: "no graph store configured".to_string(),
            })?;
        let snapshot = self.snapshot.read().await.clone();
        for doc in &snapshot.documents {
            scorer.ingest_document(doc).await?;
        }
        Ok(snapshot.documents.len())
    }

    /// Point-in-time snapshot of one Act: all of its documents valid on the
    /// as-of date.
    pub async fn statute_as_of(&self, entity_id: &str, as_of: Option<String>) -> Result<ActSnapshot> {
        let snapshot = self.snapshot.read().await.clone();
        if !snapshot.matcher.contains(entity_id) {
            return Err(RetrievalError::UnknownEntity {
                entity_id: entity_id.to_string(),
            });
        }
        let as_of = as_of.unwrap_or_else(today);
        let documents: Vec<Document> = snapshot
            .matcher
            .documents_of(&[entity_id.to_string()])
            .into_iter()
            .map(|idx| &snapshot.documents[idx])
            .filter(|doc| temporally_valid(doc, &as_of))
            .cloned()
            .collect();
        Ok(ActSnapshot {
            entity_id: entity_id.to_string(),
            as_of_date: as_of,
            documents,
        })
    }

    /// Structural graph view of one Act: the act node plus a section node
    /// and containment edge per document, every version included.
    pub async fn act_graph(&self, entity_id: &str) -> Result<ActGraph> {
        let snapshot = self.snapshot.read().await.clone();
        if !snapshot.matcher.contains(entity_id) {
            return Err(RetrievalError::UnknownEntity {
                entity_id: entity_id.to_string(),
            });
        }
        let act_label = snapshot
            .entities
            .get(entity_id)
            .map(|e| e.title.clone())
            .unwrap_or_else(|| entity_id.to_string());

        let mut nodes = vec![GraphNode {
            id: entity_id.to_string(),
            label: act_label,
            kind: "act".to_string(),
        }];
        let mut edges = Vec::new();
        for idx in snapshot.matcher.documents_of(&[entity_id.to_string()]) {
            let doc = &snapshot.documents[idx];
            nodes.push(GraphNode {
                id: doc.id.clone(),
                label: doc.title.clone(),
                kind: "section".to_string(),
            });
            edges.push(GraphEdge {
                from: entity_id.to_string(),
                to: doc.id.clone(),
                relation: "has_section".to_string(),
            });
        }
        Ok(ActGraph {
            entity_id: entity_id.to_string(),
            nodes,
            edges,
        })
    }

    /// Version history of one section within an Act, ordered by the start of
    /// each version's validity window (unbounded starts first), then id.
    pub async fn section_timeline(
        &self,
        entity_id: &str,
        section_no: &str,
    ) -> Result<SectionTimeline> {
        let snapshot = self.snapshot.read().await.clone();
        if !snapshot.matcher.contains(entity_id) {
            return Err(RetrievalError::UnknownEntity {
                entity_id: entity_id.to_string(),
            });
        }
        let mut versions: Vec<Document> = snapshot
            .matcher
            .documents_of(&[entity_id.to_string()])
            .into_iter()
            .map(|idx| &snapshot.documents[idx])
            .filter(|doc| doc.section_no.as_deref() == Some(section_no))
            .cloned()
            .collect();
        versions.sort_by(|a, b| {
            a.valid_from
                .cmp(&b.valid_from)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(SectionTimeline {
            entity_id: entity_id.to_string(),
            section_no: section_no.to_string(),
            versions,
        })
    }

    /// Engine statistics for the stats endpoint.
    pub async fn stats(&self) -> EngineStats {
        let snapshot = self.snapshot.read().await.clone();
        EngineStats {
            document_count: snapshot.documents.len(),
            entity_count: snapshot.entities.len(),
            embedding_dimension: snapshot.semantic.dimension(),
            graph_enabled: self.config.graph.enabled && self.graph.is_some(),
            built_at: snapshot.built_at,
        }
    }

    /// Health check: a snapshot exists and the embedding model answers.
    pub async fn health_check(&self) -> Result<()> {
        let snapshot = self.snapshot.read().await.clone();
        if snapshot.documents.is_empty() {
            return Err(RetrievalError::IndexNotBuilt {
                index_name: "lexical".to_string(),
            });
        }
        self.model.encode("health check").await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Corpus;
    use crate::graph::MemoryGraphStore;
    use crate::semantic::HashEmbedder;
    use crate::{DocumentStatus, Entity};

    const DIM: usize = 128;

    fn doc(
        id: &str,
        entity_id: &str,
        title: &str,
        text: &str,
        valid_from: Option<&str>,
        valid_to: Option<&str>,
        jurisdiction: Option<&str>,
    ) -> Document {
        Document {
            id: id.to_string(),
            entity_id: entity_id.to_string(),
            title: title.to_string(),
            text: text.to_string(),
            section_no: None,
            valid_from: valid_from.map(String::from),
            valid_to: valid_to.map(String::from),
            status: DocumentStatus::Active,
            citations: Vec::new(),
            amended_by: Vec::new(),
            repealed_by: None,
            jurisdiction: jurisdiction.map(String::from),
        }
    }

    fn family_corpus() -> Corpus {
        Corpus::new(
            vec![
                Entity {
                    id: "divorce_act".to_string(),
                    code: "divorce_act".to_string(),
                    title: "Divorce Act".to_string(),
                    jurisdiction: Some("federal".to_string()),
                },
                Entity {
                    id: "tax_act".to_string(),
                    code: "tax_act".to_string(),
                    title: "Income Tax Act".to_string(),
                    jurisdiction: Some("federal".to_string()),
                },
            ],
            vec![
                doc(
                    "divorce_s3_v1",
                    "divorce_act",
                    "Grounds for divorce",
                    "A marriage may be dissolved where the court finds adultery or cruelty.",
                    Some("1985-06-01"),
                    None,
                    Some("federal"),
                ),
                doc(
                    "divorce_s16_v1",
                    "divorce_act",
                    "Custody orders",
                    "Upon granting a divorce, the court may make an order for custody of any child, considering the welfare of the child.",
                    Some("1985-06-01"),
                    None,
                    Some("federal"),
                ),
                doc(
                    "divorce_s16_v0",
                    "divorce_act",
                    "Custody orders (former)",
                    "Custody of a child of the marriage follows the former welfare standard.",
                    Some("1968-01-01"),
                    Some("1985-05-31"),
                    Some("federal"),
                ),
                doc(
                    "tax_s5_v1",
                    "tax_act",
                    "Income assessment",
                    "Tax is payable on taxable income assessed for each taxation year.",
                    Some("1990-01-01"),
                    None,
                    Some("federal"),
                ),
            ],
        )
    }

    async fn engine_with(corpus: Corpus) -> RetrievalEngine {
        let mut config = Config::default();
        config.index.embedding_dimension = DIM;
        RetrievalEngine::build(
            Arc::new(config),
            corpus,
            Arc::new(HashEmbedder::new(DIM)),
            None,
        )
        .await
        .unwrap()
    }

    fn request(query: &str) -> SearchRequest {
        SearchRequest::new(query)
    }

    #[tokio::test]
    async fn stopword_only_query_is_rejected() {
        let engine = engine_with(family_corpus()).await;
        assert!(engine.search(request("the and of")).await.unwrap().is_empty());
        assert!(engine.search(request("")).await.unwrap().is_empty());
        assert!(engine.search(request("!!! ??")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn out_of_corpus_query_is_rejected() {
        let engine = engine_with(family_corpus()).await;
        let results = engine
            .search(request("submarine navigation sonar"))
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn topical_query_ranks_relevant_section_first() {
        let engine = engine_with(family_corpus()).await;
        let results = engine.search(request("custody child welfare")).await.unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].document.id, "divorce_s16_v1");
        assert!(results[0].semantic_cosine >= 0.20);
        // fused scores descend
        for pair in results.windows(2) {
            assert!(pair[0].fused_score >= pair[1].fused_score);
        }
    }

    #[tokio::test]
    async fn temporal_filter_excludes_expired_versions() {
        let engine = engine_with(family_corpus()).await;
        let results = engine.search(request("custody child welfare")).await.unwrap();
        assert!(results
            .iter()
            .all(|r| r.document.id != "divorce_s16_v0"));

        // as of 1980, only the former version is in force
        let mut req = request("custody child welfare");
        req.as_of_date = Some("1980-01-01".to_string());
        let results = engine.search(req).await.unwrap();
        assert!(!results.is_empty());
        assert!(results
            .iter()
            .all(|r| r.document.id == "divorce_s16_v0"));
    }

    #[tokio::test]
    async fn entity_expansion_returns_exactly_the_acts_children() {
        let engine = engine_with(family_corpus()).await;
        let results = engine.search(request("divorce")).await.unwrap();
        assert!(!results.is_empty());
        let ids: HashSet<String> =
            results.iter().map(|r| r.document.id.clone()).collect();
        // every currently valid child of divorce_act, nothing else
        assert!(ids.contains("divorce_s3_v1"));
        assert!(ids.contains("divorce_s16_v1"));
        assert!(!ids.contains("divorce_s16_v0"));
        assert!(!ids.contains("tax_s5_v1"));
    }

    #[tokio::test]
    async fn jurisdiction_filter_is_exact() {
        let mut corpus = family_corpus();
        corpus.documents[1].jurisdiction = Some("provincial".to_string());
        let engine = engine_with(corpus).await;
        let mut req = request("custody child welfare");
        req.jurisdiction = Some("provincial".to_string());
        let results = engine.search(req).await.unwrap();
        assert!(!results.is_empty());
        assert!(results.iter().all(|r| {
            r.document.jurisdiction.as_deref() == Some("provincial")
        }));

        let mut req = request("custody child welfare");
        req.jurisdiction = Some("federal".to_string());
        let results = engine.search(req).await.unwrap();
        assert!(results.iter().all(|r| r.document.id != "divorce_s16_v1"));
    }

    #[tokio::test]
    async fn top_k_zero_returns_all_survivors() {
        let engine = engine_with(family_corpus()).await;
        let mut capped = request("divorce");
        capped.top_k = 1;
        let mut uncapped = request("divorce");
        uncapped.top_k = 0;
        let a = engine.search(capped).await.unwrap();
        let b = engine.search(uncapped).await.unwrap();
        assert_eq!(a.len(), 1);
        assert!(b.len() > 1);
    }

    #[tokio::test]
    async fn ranking_is_deterministic_across_runs() {
        let engine = engine_with(family_corpus()).await;
        let first = engine.search(request("custody child welfare")).await.unwrap();
        let second = engine.search(request("custody child welfare")).await.unwrap();
        let ids = |rs: &[RankedResult]| -> Vec<String> {
            rs.iter().map(|r| r.document.id.clone()).collect()
        };
        assert_eq!(ids(&first), ids(&second));
    }

    #[tokio::test]
    async fn degenerate_pool_normalizes_to_one() {
        // single candidate: min == max > 0
        let corpus = Corpus::new(
            vec![],
            vec![doc(
                "only",
                "act_x",
                "Custody",
                "custody welfare child orders considered by the court",
                None,
                None,
                None,
            )],
        );
        let engine = engine_with(corpus).await;
        let results = engine.search(request("custody welfare")).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].lexical_score_normalized, 1.0);
        assert!(results[0].lexical_score > 0.0);
    }

    #[tokio::test]
    async fn graph_signal_boosts_cited_candidate() {
        let mut config = Config::default();
        config.index.embedding_dimension = DIM;
        config.graph.enabled = true;
        let store = Arc::new(MemoryGraphStore::new());
        let engine = RetrievalEngine::build(
            Arc::new(config),
            family_corpus(),
            Arc::new(HashEmbedder::new(DIM)),
            Some(store.clone()),
        )
        .await
        .unwrap();
        engine.ingest_citations().await.unwrap();

        let query_node = engine
            .register_query_document("This matter concerns custody and welfare of a child.")
            .await
            .unwrap();
        store.upsert_edge(&query_node, "divorce_act").await.unwrap();

        let mut req = request("custody child welfare");
        req.query_entity_id = Some(query_node);
        let results = engine.search(req).await.unwrap();
        assert!(!results.is_empty());
        let top = &results[0];
        assert_eq!(top.document.entity_id, "divorce_act");
        assert!((top.graph_score - 0.30).abs() < 1e-6);
    }

    struct FailingGraphStore;

    #[async_trait::async_trait]
    impl GraphStore for FailingGraphStore {
        async fn upsert_node(&self, _id: &str, _title: &str) -> crate::errors::Result<()> {
            Err(RetrievalError::GraphUnavailable {
                details: "connection refused".to_string(),
            })
        }

        async fn upsert_edge(&self, _from: &str, _to: &str) -> crate::errors::Result<()> {
            Err(RetrievalError::GraphUnavailable {
                details: "connection refused".to_string(),
            })
        }

        async fn direct_citation(&self, _a: &str, _b: &str) -> crate::errors::Result<bool> {
            Err(RetrievalError::GraphUnavailable {
                details: "connection refused".to_string(),
            })
        }

        async fn reverse_citation(&self, _a: &str, _b: &str) -> crate::errors::Result<bool> {
            Err(RetrievalError::GraphUnavailable {
                details: "connection refused".to_string(),
            })
        }

        async fn shared_neighbor_count(&self, _a: &str, _b: &str) -> crate::errors::Result<usize> {
            Err(RetrievalError::GraphUnavailable {
                details: "connection refused".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn graph_failure_degrades_instead_of_failing_the_query() {
        let mut config = Config::default();
        config.index.embedding_dimension = DIM;
        config.graph.enabled = true;
        let engine = RetrievalEngine::build(
            Arc::new(config),
            family_corpus(),
            Arc::new(HashEmbedder::new(DIM)),
            Some(Arc::new(FailingGraphStore)),
        )
        .await
        .unwrap();

        let mut req = request("custody child welfare");
        req.query_entity_id = Some("some_case".to_string());
        let results = engine.search(req).await.unwrap();
        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.graph_score == 0.0));
    }

    #[tokio::test]
    async fn graph_score_is_zero_without_query_entity() {
        let mut config = Config::default();
        config.index.embedding_dimension = DIM;
        config.graph.enabled = true;
        let engine = RetrievalEngine::build(
            Arc::new(config),
            family_corpus(),
            Arc::new(HashEmbedder::new(DIM)),
            Some(Arc::new(MemoryGraphStore::new())),
        )
        .await
        .unwrap();
        let results = engine.search(request("custody child welfare")).await.unwrap();
        assert!(results.iter().all(|r| r.graph_score == 0.0));
    }

    #[tokio::test]
    async fn rebuild_swaps_in_the_new_corpus() {
        let engine = engine_with(family_corpus()).await;
        assert!(!engine.search(request("custody child welfare")).await.unwrap().is_empty());

        let replacement = Corpus::new(
            vec![],
            vec![doc(
                "patent_s1_v1",
                "patent_act",
                "Patentable subject matter",
                "An invention must be novel and useful to be patentable.",
                None,
                None,
                None,
            )],
        );
        engine.rebuild(replacement).await.unwrap();

        assert!(engine.search(request("custody child welfare")).await.unwrap().is_empty());
        assert!(!engine
            .search(request("patentable invention novel"))
            .await
            .unwrap()
            .is_empty());
        assert_eq!(engine.stats().await.document_count, 1);
    }

    #[tokio::test]
    async fn statute_as_of_filters_by_date() {
        let engine = engine_with(family_corpus()).await;
        let current = engine
            .statute_as_of("divorce_act", None)
            .await
            .unwrap();
        let ids: Vec<&str> = current.documents.iter().map(|d| d.id.as_str()).collect();
        assert!(ids.contains(&"divorce_s16_v1"));
        assert!(!ids.contains(&"divorce_s16_v0"));

        let historic = engine
            .statute_as_of("divorce_act", Some("1980-01-01".to_string()))
            .await
            .unwrap();
        let ids: Vec<&str> = historic.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["divorce_s16_v0"]);
    }

    #[tokio::test]
    async fn act_graph_lists_sections_under_the_act() {
        let engine = engine_with(family_corpus()).await;
        let graph = engine.act_graph("divorce_act").await.unwrap();
        assert_eq!(graph.nodes[0].kind, "act");
        assert_eq!(graph.nodes[0].label, "Divorce Act");
        // act node plus every section version
        assert_eq!(graph.nodes.len(), 4);
        assert_eq!(graph.edges.len(), 3);
        assert!(graph
            .edges
            .iter()
            .all(|e| e.from == "divorce_act" && e.relation == "has_section"));

        let err = engine.act_graph("ghost_act").await.unwrap_err();
        assert!(matches!(err, RetrievalError::UnknownEntity { .. }));
    }

    #[tokio::test]
    async fn section_timeline_orders_versions_by_validity_start() {
        let mut corpus = family_corpus();
        corpus.documents[1].section_no = Some("16".to_string());
        corpus.documents[2].section_no = Some("16".to_string());
        let engine = engine_with(corpus).await;

        let timeline = engine.section_timeline("divorce_act", "16").await.unwrap();
        let ids: Vec<&str> = timeline.versions.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["divorce_s16_v0", "divorce_s16_v1"]);

        // a section number with no versions is an empty history, not an error
        let empty = engine.section_timeline("divorce_act", "99").await.unwrap();
        assert!(empty.versions.is_empty());
    }

    #[tokio::test]
    async fn statute_as_of_rejects_unknown_entity() {
        let engine = engine_with(family_corpus()).await;
        let err = engine.statute_as_of("ghost_act", None).await.unwrap_err();
        assert!(matches!(err, RetrievalError::UnknownEntity { .. }));
    }

    #[tokio::test]
    async fn monotonicity_extra_matching_token_improves_rank() {
        let corpus = Corpus::new(
            vec![],
            vec![
                doc(
                    "x",
                    "act_a",
                    "Custody orders",
                    "custody orders made by the court",
                    None,
                    None,
                    None,
                ),
                doc(
                    "y",
                    "act_b",
                    "Custody appeals",
                    "custody appeals heard by the court",
                    None,
                    None,
                    None,
                ),
            ],
        );
        let engine = engine_with(corpus).await;
        // "orders" appears only in x; adding it must put x first
        let results = engine.search(request("custody orders")).await.unwrap();
        assert_eq!(results[0].document.id, "x");
        assert!(results[0].lexical_score > results[1].lexical_score);
    }
}
