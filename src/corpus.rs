//! # Corpus Module
//!
//! ## Purpose
//! Boundary to the external text source. Upstream extraction, segmentation
//! and role classification are out of scope; this module consumes their
//! output as a JSON corpus file of entity and document records, validates
//! it, and hands it to the engine for index building.
//!
//! ## Input/Output Specification
//! - **Input**: JSON file with `entities` and `documents` arrays
//! - **Output**: a validated [`Corpus`] ready for an index build

use crate::errors::{Result, RetrievalError};
use crate::{Document, Entity};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// A validated document collection with its grouping entities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Corpus {
    #[serde(default)]
    pub entities: Vec<Entity>,
    pub documents: Vec<Document>,
}

impl Corpus {
    pub fn new(entities: Vec<Entity>, documents: Vec<Document>) -> Self {
        Self {
            entities,
            documents,
        }
    }

    /// Ingest-time validation: every document needs an id, an entity id and
    /// some text; document ids must be unique since they key results and
    /// graph nodes.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for doc in &self.documents {
            if doc.id.is_empty() {
                return Err(RetrievalError::InvalidDocument {
                    document_id: "<empty>".to_string(),
                    reason: "missing document id".to_string(),
                });
            }
            if !seen.insert(doc.id.as_str()) {
                return Err(RetrievalError::InvalidDocument {
                    document_id: doc.id.clone(),
                    reason: "duplicate document id".to_string(),
                });
            }
            if doc.entity_id.is_empty() {
                return Err(RetrievalError::InvalidDocument {
                    document_id: doc.id.clone(),
                    reason: "missing entity id".to_string(),
                });
            }
            if doc.title.is_empty() && doc.text.is_empty() {
                return Err(RetrievalError::InvalidDocument {
                    document_id: doc.id.clone(),
                    reason: "document has no text".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Load and validate a corpus file.
pub fn load_corpus<P: AsRef<Path>>(path: P) -> Result<Corpus> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| RetrievalError::Corpus {
        path: path.display().to_string(),
        details: format!("read failed: {}", e),
    })?;
    let corpus: Corpus = serde_json::from_str(&content).map_err(|e| RetrievalError::Corpus {
        path: path.display().to_string(),
        details: format!("parse failed: {}", e),
    })?;
    corpus.validate()?;
    tracing::info!(
        documents = corpus.documents.len(),
        entities = corpus.entities.len(),
        "Corpus loaded from {}",
        path.display()
    );
    Ok(corpus)
}
