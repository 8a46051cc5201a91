//! # Hybrid Legal Retrieval Engine
//!
//! ## Overview
//! This library implements a hybrid relevance engine for legal retrieval: it
//! ranks statute sections and case records against a free-text query by
//! fusing lexical term overlap (BM25), semantic embedding similarity, and
//! citation-graph proximity.
//!
//! The engine is deliberately strict: a query that shares no usable tokens
//! with the corpus, or whose candidates all fail the lexical and temporal
//! gates, returns an empty result list rather than a weak guess.
//!
//! ## Architecture
//! - `text`: query/document cleaning and strict tokenization
//! - `lexical`: BM25 index and the minimum-hit candidate gate
//! - `temporal`: point-in-time validity filtering
//! - `expansion`: whole-entity (Act/Case) query expansion
//! - `semantic`: embedding store and cosine reranking
//! - `graph`: citation-graph store, scoring, and ingestion
//! - `engine`: fusion and ranking pipeline tying the above together
//! - `corpus`: document loading from the external text source
//! - `api`: REST endpoints
//! - `config`: configuration management and settings
//! - `errors`: centralized error handling and types
//!
//! ## Input/Output Specification
//! - **Input**: document corpus (JSON), search queries with optional
//!   jurisdiction filter and as-of date
//! - **Output**: ranked results carrying every per-signal score for
//!   downstream explanation
//!
//! ## Usage
//! ```rust,no_run
//! use hybrid_legal_retrieval::{Config, SearchRequest};
//! use hybrid_legal_retrieval::corpus::load_corpus;
//! use hybrid_legal_retrieval::engine::RetrievalEngine;
//! use hybrid_legal_retrieval::semantic::HashEmbedder;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(Config::from_file("config.toml")?);
//!     let corpus = load_corpus("corpus.json")?;
//!     let model = Arc::new(HashEmbedder::new(config.index.embedding_dimension));
//!     let engine = RetrievalEngine::build(config, corpus, model, None).await?;
//!     let results = engine.search(SearchRequest::new("divorce custody")).await?;
//!     println!("Found {} results", results.len());
//!     Ok(())
//! }
//! ```

// Core modules
pub mod config;
pub mod errors;
pub mod text;
pub mod lexical;
pub mod temporal;
pub mod expansion;
pub mod semantic;
pub mod graph;
pub mod engine;
pub mod corpus;
pub mod api;

// Utilities
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use engine::{RankedResult, RetrievalEngine};
pub use errors::{Result, RetrievalError};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Stable identifier of an indexed document (a statute section version or a
/// role-aggregated case excerpt).
pub type DocumentId = String;

/// Identifier of a grouping entity (an Act or a Case).
pub type EntityId = String;

/// Lifecycle status of a document version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Active,
    Amended,
    Repealed,
}

impl Default for DocumentStatus {
    fn default() -> Self {
        DocumentStatus::Active
    }
}

/// An indexed retrievable unit.
///
/// Documents are created at ingest time and are immutable for the life of an
/// index snapshot; collection-wide lexical statistics make in-place patching
/// unsound, so corpus changes require a rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier (e.g. a section version id)
    pub id: DocumentId,
    /// Enclosing Act or Case
    pub entity_id: EntityId,
    /// Display title
    pub title: String,
    /// Full text
    pub text: String,
    /// Section number within the Act, when applicable
    #[serde(default)]
    pub section_no: Option<String>,
    /// Start of the validity window (ISO date, inclusive); None = unbounded
    #[serde(default)]
    pub valid_from: Option<String>,
    /// End of the validity window (ISO date, inclusive); None = unbounded
    #[serde(default)]
    pub valid_to: Option<String>,
    /// Lifecycle status
    #[serde(default)]
    pub status: DocumentStatus,
    /// Outbound citation identifiers
    #[serde(default)]
    pub citations: Vec<String>,
    /// Identifiers of amending instruments
    #[serde(default)]
    pub amended_by: Vec<String>,
    /// Identifier of the repealing instrument, if repealed
    #[serde(default)]
    pub repealed_by: Option<String>,
    /// Jurisdiction tag
    #[serde(default)]
    pub jurisdiction: Option<String>,
}

/// A grouping parent of one or more documents: an Act or a Case.
///
/// The identifying metadata here (not the children's text) feeds the
/// whole-entity query matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Stable identifier (e.g. an act id)
    pub id: EntityId,
    /// Short code or statute name (e.g. "divorce_act")
    pub code: String,
    /// Display title
    pub title: String,
    /// Jurisdiction tag
    #[serde(default)]
    pub jurisdiction: Option<String>,
}

/// A search request as submitted by a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Raw query text
    pub query: String,
    /// Exact-match jurisdiction filter
    #[serde(default)]
    pub jurisdiction: Option<String>,
    /// Point-in-time validity date (ISO); defaults to today
    #[serde(default)]
    pub as_of_date: Option<String>,
    /// Result cap; 0 returns every surviving candidate
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Entity id to use as the query node for citation-graph scoring
    #[serde(default)]
    pub query_entity_id: Option<EntityId>,
}

fn default_top_k() -> usize {
    5
}

impl SearchRequest {
    /// Request with default parameters for the given query text.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            jurisdiction: None,
            as_of_date: None,
            top_k: default_top_k(),
            query_entity_id: None,
        }
    }
}

/// Application state shared across components
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Config>,
    pub engine: Arc<engine::RetrievalEngine>,
}
