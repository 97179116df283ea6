//! In-memory vector index for tests and development.
//!
//! Brute-force inner product over every stored vector; not meant for large
//! collections.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};

use crate::traits::VectorIndex;
use crate::types::{Chunk, CollectionKind, CollectionSpec, EntityEntry, ScoredEntry, ScoredHit};
use crate::vector::dot;

struct Collection {
    spec: CollectionSpec,
    chunks: Vec<(Chunk, Vec<f32>)>,
    entries: Vec<(EntityEntry, Vec<f32>)>,
}

impl Collection {
    fn check(&self, kind: CollectionKind, vector: &[f32]) -> Result<()> {
        if self.spec.kind != kind {
            bail!("collection '{}' stores {:?} records", self.spec.name, self.spec.kind);
        }
        if vector.len() != self.spec.dim {
            bail!("vector dimension {} does not match collection '{}' ({})", vector.len(), self.spec.name, self.spec.dim);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryIndex {
    collections: RwLock<HashMap<String, Collection>>,
}

fn rank<T>(scored: &mut Vec<(f32, T)>, limit: usize) {
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    scored.truncate(limit);
}

impl MemoryIndex {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .ok()
            .and_then(|c| c.get(collection).map(|c| c.chunks.len() + c.entries.len()))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

impl VectorIndex for MemoryIndex {
    fn ensure_collection(&self, spec: &CollectionSpec) -> Result<()> {
        let mut collections = self.collections.write().map_err(|_| anyhow!("memory index lock poisoned"))?;
        if let Some(existing) = collections.get(&spec.name) {
            if existing.spec != *spec {
                bail!("collection '{}' exists with a different layout", spec.name);
            }
            return Ok(());
        }
        collections.insert(spec.name.clone(), Collection { spec: spec.clone(), chunks: Vec::new(), entries: Vec::new() });
        tracing::debug!(collection = %spec.name, "created in-memory collection");
        Ok(())
    }

    fn reset_collection(&self, spec: &CollectionSpec) -> Result<()> {
        let mut collections = self.collections.write().map_err(|_| anyhow!("memory index lock poisoned"))?;
        collections.insert(spec.name.clone(), Collection { spec: spec.clone(), chunks: Vec::new(), entries: Vec::new() });
        tracing::debug!(collection = %spec.name, "reset in-memory collection");
        Ok(())
    }

    fn insert_chunks(&self, collection: &str, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<usize> {
        if chunks.len() != vectors.len() {
            bail!("{} chunks but {} vectors", chunks.len(), vectors.len());
        }
        let mut collections = self.collections.write().map_err(|_| anyhow!("memory index lock poisoned"))?;
        let target = collections.get_mut(collection).ok_or_else(|| anyhow!("collection '{collection}' does not exist"))?;
        // All-or-nothing: check the whole batch before storing any row.
        vectors.iter().try_for_each(|v| target.check(CollectionKind::Chunked, v))?;
        target.chunks.extend(chunks.iter().cloned().zip(vectors.iter().cloned()));
        Ok(chunks.len())
    }

    fn insert_entries(&self, collection: &str, entries: &[EntityEntry], vectors: &[Vec<f32>]) -> Result<usize> {
        if entries.len() != vectors.len() {
            bail!("{} entries but {} vectors", entries.len(), vectors.len());
        }
        let mut collections = self.collections.write().map_err(|_| anyhow!("memory index lock poisoned"))?;
        let target = collections.get_mut(collection).ok_or_else(|| anyhow!("collection '{collection}' does not exist"))?;
        vectors.iter().try_for_each(|v| target.check(CollectionKind::SingleRow, v))?;
        target.entries.extend(entries.iter().cloned().zip(vectors.iter().cloned()));
        Ok(entries.len())
    }

    fn search_chunks(&self, collection: &str, query: &[f32], limit: usize) -> Result<Vec<ScoredHit>> {
        let collections = self.collections.read().map_err(|_| anyhow!("memory index lock poisoned"))?;
        let source = collections.get(collection).ok_or_else(|| anyhow!("collection '{collection}' does not exist"))?;
        source.check(CollectionKind::Chunked, query)?;
        let mut scored: Vec<(f32, &Chunk)> = source.chunks.iter().map(|(c, v)| (dot(query, v), c)).collect();
        rank(&mut scored, limit);
        Ok(scored
            .into_iter()
            .map(|(score, c)| ScoredHit {
                entity_id: c.entity_id.clone(),
                entity_name: c.entity_name.clone(),
                chunk_index: c.chunk_index,
                text: c.text.clone(),
                score,
            })
            .collect())
    }

    fn search_entries(&self, collection: &str, query: &[f32], limit: usize) -> Result<Vec<ScoredEntry>> {
        let collections = self.collections.read().map_err(|_| anyhow!("memory index lock poisoned"))?;
        let source = collections.get(collection).ok_or_else(|| anyhow!("collection '{collection}' does not exist"))?;
        source.check(CollectionKind::SingleRow, query)?;
        let mut scored: Vec<(f32, &EntityEntry)> = source.entries.iter().map(|(e, v)| (dot(query, v), e)).collect();
        rank(&mut scored, limit);
        Ok(scored
            .into_iter()
            .map(|(score, e)| ScoredEntry {
                entity_id: e.entity_id.clone(),
                entity_name: e.entity_name.clone(),
                payload: e.payload.clone(),
                score,
            })
            .collect())
    }
}
