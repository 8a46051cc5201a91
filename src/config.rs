//! # Configuration Management Module
//!
//! ## Purpose
//! Centralized configuration for the retrieval engine, supporting TOML files
//! with environment variable overrides, validation, and defaults that match
//! the engine's strict-search tuning.
//!
//! ## Configuration Sources (in order of precedence)
//! 1. Environment variables (`LEGAL_RETRIEVAL_*`)
//! 2. Configuration file (TOML)
//! 3. Default values
//!
//! ## Usage
//! ```rust,no_run
//! use hybrid_legal_retrieval::config::Config;
//!
//! let config = Config::from_file("config.toml").unwrap();
//! println!("Server port: {}", config.server.port);
//! ```

use crate::errors::{Result, RetrievalError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure containing all system settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Server and API configuration
    pub server: ServerConfig,
    /// Index build settings
    pub index: IndexConfig,
    /// Fusion and ranking behavior
    pub fusion: FusionConfig,
    /// Citation-graph scoring
    pub graph: GraphConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server and API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Enable CORS (permissive; the service sits behind a gateway)
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            enable_cors: true,
        }
    }
}

/// Index build settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Expected embedding vector dimension; vectors from the model must match
    pub embedding_dimension: usize,
    /// Batch size for embedding generation at index build
    pub embedding_batch_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            embedding_dimension: 768,
            embedding_batch_size: 32,
        }
    }
}

/// Fusion and ranking behavior.
///
/// Defaults are the tuned strict-search constants: lexical weight 0.65,
/// semantic weight 0.35, an 80-candidate BM25 pool, a 0.20 cosine floor and
/// a 0.5 minimum query-token match ratio.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Weight of the normalized lexical score (alpha)
    pub alpha_lexical: f32,
    /// Weight of the [0, 1] semantic score (beta)
    pub beta_semantic: f32,
    /// Candidate pool cap before semantic scoring
    pub bm25_candidates: usize,
    /// Fraction of query tokens a section-gated candidate must contain
    pub min_match_ratio: f32,
    /// Minimum raw cosine a candidate must reach to survive the strict filter
    pub min_semantic_cosine: f32,
    /// Fraction of query tokens that must hit an entity's metadata token set
    /// for whole-entity expansion
    pub expansion_overlap_ratio: f32,
    /// In the expansion path, drop a candidate only when its cosine is below
    /// the floor AND its BM25 score is non-positive. When false, the cosine
    /// floor alone applies in both paths.
    pub expansion_filter_requires_lexical_miss: bool,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            alpha_lexical: 0.65,
            beta_semantic: 0.35,
            bm25_candidates: 80,
            min_match_ratio: 0.5,
            min_semantic_cosine: 0.20,
            expansion_overlap_ratio: 0.6,
            expansion_filter_requires_lexical_miss: true,
        }
    }
}

/// Citation-graph scoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Enable citation-graph scoring (case-precedent search); statute search
    /// leaves this off
    pub enabled: bool,
    /// Score for a direct citation (query cites candidate)
    pub direct_citation_weight: f32,
    /// Score for a reverse citation (candidate cites query)
    pub reverse_citation_weight: f32,
    /// Score per shared two-hop neighbor
    pub shared_neighbor_weight: f32,
    /// Cap on counted shared neighbors
    pub shared_neighbor_cap: usize,
    /// Maximum citation candidates extracted from one document
    pub max_extracted_citations: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            direct_citation_weight: 0.30,
            reverse_citation_weight: 0.20,
            shared_neighbor_weight: 0.10,
            shared_neighbor_cap: 3,
            max_extracted_citations: 50,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable structured JSON logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let mut config = if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| RetrievalError::Config {
                    message: format!("Failed to read config file {:?}: {}", path, e),
                })?;
            toml::from_str(&content)?
        } else {
            tracing::warn!("Configuration file not found: {:?}, using defaults", path);
            Self::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("LEGAL_RETRIEVAL_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("LEGAL_RETRIEVAL_PORT") {
            self.server.port = port.parse().map_err(|_| RetrievalError::Config {
                message: "Invalid port number in LEGAL_RETRIEVAL_PORT".to_string(),
            })?;
        }
        if let Ok(level) = std::env::var("LEGAL_RETRIEVAL_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(enabled) = std::env::var("LEGAL_RETRIEVAL_GRAPH_ENABLED") {
            self.graph.enabled = enabled.parse().map_err(|_| RetrievalError::Config {
                message: "Invalid boolean in LEGAL_RETRIEVAL_GRAPH_ENABLED".to_string(),
            })?;
        }
        Ok(())
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(RetrievalError::ValidationFailed {
                field: "server.port".to_string(),
                reason: "Port cannot be zero".to_string(),
            });
        }

        if self.index.embedding_dimension == 0 {
            return Err(RetrievalError::ValidationFailed {
                field: "index.embedding_dimension".to_string(),
                reason: "Embedding dimension must be greater than zero".to_string(),
            });
        }

        for (field, value) in [
            ("fusion.alpha_lexical", self.fusion.alpha_lexical),
            ("fusion.beta_semantic", self.fusion.beta_semantic),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(RetrievalError::ValidationFailed {
                    field: field.to_string(),
                    reason: format!("Weight must lie in [0, 1], got {}", value),
                });
            }
        }

        if !(0.0..=1.0).contains(&self.fusion.min_match_ratio) {
            return Err(RetrievalError::ValidationFailed {
                field: "fusion.min_match_ratio".to_string(),
                reason: "Match ratio must lie in [0, 1]".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.fusion.expansion_overlap_ratio) {
            return Err(RetrievalError::ValidationFailed {
                field: "fusion.expansion_overlap_ratio".to_string(),
                reason: "Expansion overlap ratio must lie in [0, 1]".to_string(),
            });
        }

        if !(-1.0..=1.0).contains(&self.fusion.min_semantic_cosine) {
            return Err(RetrievalError::ValidationFailed {
                field: "fusion.min_semantic_cosine".to_string(),
                reason: "Cosine floor must lie in [-1, 1]".to_string(),
            });
        }

        if self.fusion.bm25_candidates == 0 {
            return Err(RetrievalError::ValidationFailed {
                field: "fusion.bm25_candidates".to_string(),
                reason: "Candidate pool cap must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}
