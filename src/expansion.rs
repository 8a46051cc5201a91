//! # Entity Expansion Module
//!
//! ## Purpose
//! Detects when a query names a whole legal instrument (an Act, or a case by
//! its identifier) rather than a topic. Lexical overlap with individual
//! sections is fragile for such queries; instead the candidate set expands
//! to every document belonging to the matched entity.
//!
//! ## Input/Output Specification
//! - **Input**: query token sequence and set
//! - **Output**: the entity ids whose metadata token sets match the query
//!
//! An entity's metadata token set is the union of tokens derived from its
//! own identifying fields (id, code, title, jurisdiction), never from its
//! children's text.

use crate::text::tokenize;
use crate::{Document, Entity, EntityId};
use std::collections::{HashMap, HashSet};

/// Whole-entity query matcher built at index time.
pub struct EntityMatcher {
    /// entity id -> metadata token set
    meta_tokens: HashMap<EntityId, HashSet<String>>,
    /// entity id -> positional indexes of its documents, in corpus order
    children: HashMap<EntityId, Vec<usize>>,
}

impl EntityMatcher {
    /// Build metadata token sets and the entity -> documents relation.
    ///
    /// Documents whose `entity_id` has no declared [`Entity`] still get a
    /// children relation; their metadata tokens come from the id alone.
    pub fn build(entities: &[Entity], documents: &[Document]) -> Self {
        let mut meta_tokens: HashMap<EntityId, HashSet<String>> = HashMap::new();
        let mut children: HashMap<EntityId, Vec<usize>> = HashMap::new();

        for entity in entities {
            let meta = format!(
                "{} {} {} {}",
                entity.id,
                entity.code,
                entity.title,
                entity.jurisdiction.as_deref().unwrap_or("")
            );
            meta_tokens
                .entry(entity.id.clone())
                .or_default()
                .extend(tokenize(&meta));
        }

        for (idx, doc) in documents.iter().enumerate() {
            children.entry(doc.entity_id.clone()).or_default().push(idx);
            meta_tokens
                .entry(doc.entity_id.clone())
                .or_default()
                .extend(tokenize(&doc.entity_id));
        }

        Self {
            meta_tokens,
            children,
        }
    }

    /// Entity ids matched by the query.
    ///
    /// A single-token query matches an entity when the token is a member of
    /// its metadata token set; a multi-token query matches when the fraction
    /// of query tokens present in the set reaches `overlap_ratio`.
    pub fn matches(
        &self,
        query_tokens: &[String],
        query_set: &HashSet<String>,
        overlap_ratio: f32,
    ) -> Vec<EntityId> {
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let mut matched: Vec<EntityId> = self
            .meta_tokens
            .iter()
            .filter(|(_, meta)| {
                if query_tokens.len() == 1 {
                    meta.contains(&query_tokens[0])
                } else {
                    let overlap = query_set.iter().filter(|t| meta.contains(*t)).count();
                    overlap as f32 / query_set.len() as f32 >= overlap_ratio
                }
            })
            .map(|(id, _)| id.clone())
            .collect();

        // deterministic order regardless of map iteration
        matched.sort();
        matched
    }

    /// Positional document indexes belonging to the given entities, sorted
    /// and deduplicated.
    pub fn documents_of(&self, entity_ids: &[EntityId]) -> Vec<usize> {
        let mut idxs: Vec<usize> = entity_ids
            .iter()
            .filter_map(|id| self.children.get(id))
            .flatten()
            .copied()
            .collect();
        idxs.sort_unstable();
        idxs.dedup();
        idxs
    }

    /// Whether the entity exists in the corpus.
    pub fn contains(&self, entity_id: &str) -> bool {
        self.children.contains_key(entity_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Document, DocumentStatus};

    fn entity(id: &str, code: &str, title: &str, jurisdiction: &str) -> Entity {
        Entity {
            id: id.to_string(),
            code: code.to_string(),
            title: title.to_string(),
            jurisdiction: Some(jurisdiction.to_string()),
        }
    }

    fn doc(id: &str, entity_id: &str) -> Document {
        Document {
            id: id.to_string(),
            entity_id: entity_id.to_string(),
            title: String::new(),
            text: String::new(),
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

    fn matcher() -> EntityMatcher {
        EntityMatcher::build(
            &[
                entity("divorce_act", "divorce_act", "Divorce Act", "federal"),
                entity("evidence_act", "evidence_act", "Evidence Act", "federal"),
            ],
            &[
                doc("d1", "divorce_act"),
                doc("d2", "divorce_act"),
                doc("d3", "evidence_act"),
            ],
        )
    }

    fn query(text: &str) -> (Vec<String>, HashSet<String>) {
        let tokens = tokenize(text);
        let set = tokens.iter().cloned().collect();
        (tokens, set)
    }

    #[test]
    fn single_token_membership_matches() {
        let m = matcher();
        let (tokens, set) = query("divorce");
        assert_eq!(m.matches(&tokens, &set, 0.6), vec!["divorce_act"]);
    }

    #[test]
    fn multi_token_overlap_matches_at_threshold() {
        let m = matcher();
        // both tokens hit the divorce_act metadata set, and "act" also hits
        // evidence_act (1/2 = 0.5 < 0.6, so evidence_act stays out)
        let (tokens, set) = query("divorce act");
        assert_eq!(m.matches(&tokens, &set, 0.6), vec!["divorce_act"]);
    }

    #[test]
    fn topical_query_matches_nothing() {
        let m = matcher();
        let (tokens, set) = query("custody child welfare");
        assert!(m.matches(&tokens, &set, 0.6).is_empty());
    }

    #[test]
    fn children_are_sorted_and_deduplicated() {
        let m = matcher();
        let idxs = m.documents_of(&["divorce_act".to_string(), "divorce_act".to_string()]);
        assert_eq!(idxs, vec![0, 1]);
    }

    #[test]
    fn undeclared_entity_is_matchable_by_id_tokens() {
        let m = EntityMatcher::build(&[], &[doc("d1", "smith_v_jones")]);
        let (tokens, set) = query("smith jones");
        assert_eq!(m.matches(&tokens, &set, 0.6), vec!["smith_v_jones"]);
        assert!(m.contains("smith_v_jones"));
    }
}
