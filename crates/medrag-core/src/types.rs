//! Domain types shared by the chunker, the indexes and the query engine.

use serde::{Deserialize, Serialize};

pub type EntityId = String;

/// A bounded token window of an entity's source text, embedded and indexed
/// independently.
///
/// - `entity_id`/`entity_name`: the owning entity (e.g. a disease)
/// - `chunk_index`: position of the window within the entity's text
/// - `text`: detokenized window text; this is what gets embedded and stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub entity_id: EntityId,
    pub entity_name: String,
    pub chunk_index: usize,
    pub text: String,
}

/// One row of a single-row collection: an entity with a delimiter-joined
/// payload (e.g. a disease and its treatments).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityEntry {
    pub entity_id: EntityId,
    pub entity_name: String,
    pub payload: String,
}

/// A chunk returned by a similarity search. Higher `score` is more relevant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredHit {
    pub entity_id: EntityId,
    pub entity_name: String,
    pub chunk_index: usize,
    pub text: String,
    pub score: f32,
}

/// A single-row collection entry returned by a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredEntry {
    pub entity_id: EntityId,
    pub entity_name: String,
    pub payload: String,
    pub score: f32,
}

/// All hits of one entity, best first, with the score derived from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityAggregate {
    pub entity_id: EntityId,
    pub entity_name: String,
    pub score: f32,
    pub ranked_chunks: Vec<ScoredHit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub score: f32,
    pub chunk_index: usize,
    pub text: String,
}

/// The externally visible ranking unit for the chunked (symptom) path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub entity_id: EntityId,
    pub entity_name: String,
    pub score: f32,
    pub context: String,
    pub evidence: Vec<Evidence>,
}

/// The externally visible ranking unit for the single-row (treatment) path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMatch {
    pub entity_id: EntityId,
    pub entity_name: String,
    pub payload: Vec<String>,
    pub score: f32,
}

/// Which record layout a collection stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionKind {
    /// Many rows per entity: `chunk_index` + `chunk_text`.
    Chunked,
    /// One row per entity with a joined payload field.
    SingleRow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSpec {
    pub name: String,
    pub kind: CollectionKind,
    pub dim: usize,
}

impl CollectionSpec {
    pub fn chunked(name: impl Into<String>, dim: usize) -> Self {
        Self { name: name.into(), kind: CollectionKind::Chunked, dim }
    }

    pub fn single_row(name: impl Into<String>, dim: usize) -> Self {
        Self { name: name.into(), kind: CollectionKind::SingleRow, dim }
    }
}
