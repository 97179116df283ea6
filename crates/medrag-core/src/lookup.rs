//! Single-row lookup: one stored vector per entity, no aggregation.

use crate::error::{Error, Result};
use crate::traits::VectorIndex;
use crate::types::{EntityMatch, ScoredEntry};

pub const PAYLOAD_DELIMITER: &str = ", ";

/// Split a delimiter-joined stored payload. An empty payload has no items.
pub fn split_payload(payload: &str) -> Vec<String> {
    if payload.is_empty() {
        return Vec::new();
    }
    payload.split(PAYLOAD_DELIMITER).map(str::to_string).collect()
}

pub fn join_payload<S: AsRef<str>>(items: &[S]) -> String {
    items.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(PAYLOAD_DELIMITER)
}

impl From<ScoredEntry> for EntityMatch {
    fn from(entry: ScoredEntry) -> Self {
        Self {
            payload: split_payload(&entry.payload),
            entity_id: entry.entity_id,
            entity_name: entry.entity_name,
            score: entry.score,
        }
    }
}

/// Search a single-row collection. The index's ranking is kept as-is; an
/// empty result means no match and is not an error.
pub fn lookup(index: &dyn VectorIndex, collection: &str, query_vector: &[f32], top_k: usize) -> Result<Vec<EntityMatch>> {
    let entries = index.search_entries(collection, query_vector, top_k).map_err(|e| Error::index(&e))?;
    tracing::debug!(collection, hits = entries.len(), "single-row lookup");
    Ok(entries.into_iter().map(EntityMatch::from).collect())
}
