//! # Error Handling Module
//!
//! ## Purpose
//! Centralized error handling for the retrieval engine, providing structured
//! error types and conversion utilities for all system components.
//!
//! ## Input/Output Specification
//! - **Input**: Error conditions from various system components
//! - **Output**: Structured error types with context and error chains
//! - **Error Categories**: Configuration, Corpus, Embedding, Graph, Engine, API
//!
//! ## Design
//! Empty-query and out-of-corpus outcomes are *not* errors: strict rejection
//! is signalled by an empty result list. The variants here cover genuine
//! failures. An embedding failure is fatal to the query it occurs in, since
//! every non-expansion ranking path requires semantic scores; a graph-store
//! failure is recoverable and degrades the query to lexical+semantic fusion.

use thiserror::Error;

/// Result type used throughout the application
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Error types for the hybrid retrieval engine
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Validation errors
    #[error("Validation failed for field '{field}': {reason}")]
    ValidationFailed { field: String, reason: String },

    /// Corpus file could not be read or parsed
    #[error("Corpus error in {path}: {details}")]
    Corpus { path: String, details: String },

    /// A document failed ingest-time validation
    #[error("Invalid document '{document_id}': {reason}")]
    InvalidDocument { document_id: String, reason: String },

    /// The embedding model failed to produce a vector
    #[error("Embedding generation failed: {details}")]
    Embedding { details: String },

    /// Embedding dimension does not match the configured index dimension
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    EmbeddingDimension { expected: usize, actual: usize },

    /// The citation-graph store is unreachable or returned an error
    #[error("Graph store error: {details}")]
    GraphUnavailable { details: String },

    /// An index snapshot is required but none has been built
    #[error("Index not built: {index_name}")]
    IndexNotBuilt { index_name: String },

    /// Invalid search request
    #[error("Invalid search request: {reason}")]
    InvalidRequest { reason: String },

    /// Requested entity does not exist in the corpus
    #[error("Unknown entity: {entity_id}")]
    UnknownEntity { entity_id: String },

    /// Serialization/deserialization errors
    #[error("Serialization failed: {message}")]
    SerializationFailed { message: String },

    /// Generic I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Internal system errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl RetrievalError {
    /// Check if the error is recoverable within a single query.
    ///
    /// Graph-store failures degrade to lexical+semantic fusion; everything
    /// else fails the operation it occurred in.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RetrievalError::GraphUnavailable { .. })
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            RetrievalError::Config { .. } | RetrievalError::ValidationFailed { .. } => {
                "configuration"
            }
            RetrievalError::Corpus { .. } | RetrievalError::InvalidDocument { .. } => "corpus",
            RetrievalError::Embedding { .. } | RetrievalError::EmbeddingDimension { .. } => {
                "embedding"
            }
            RetrievalError::GraphUnavailable { .. } => "graph",
            RetrievalError::IndexNotBuilt { .. }
            | RetrievalError::InvalidRequest { .. }
            | RetrievalError::UnknownEntity { .. } => "engine",
            RetrievalError::SerializationFailed { .. }
            | RetrievalError::Io { .. }
            | RetrievalError::Internal { .. } => "system",
        }
    }
}

// Conversion from common error types
impl From<std::io::Error> for RetrievalError {
    fn from(err: std::io::Error) -> Self {
        RetrievalError::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for RetrievalError {
    fn from(err: serde_json::Error) -> Self {
        RetrievalError::SerializationFailed {
            message: format!("JSON serialization error: {}", err),
        }
    }
}

impl From<toml::de::Error> for RetrievalError {
    fn from(err: toml::de::Error) -> Self {
        RetrievalError::Config {
            message: format!("TOML parse error: {}", err),
        }
    }
}
