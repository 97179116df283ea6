use crate::types::{Chunk, CollectionSpec, EntityEntry, ScoredEntry, ScoredHit};

/// Text → fixed-dimension vector. Must be deterministic for a given model.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Tokenizer used to cut text into token windows and to turn windows back
/// into text. Must match the vocabulary of the embedder that consumes the
/// windows.
pub trait TokenCodec: Send + Sync {
    fn encode(&self, text: &str) -> anyhow::Result<Vec<u32>>;
    fn decode(&self, ids: &[u32]) -> anyhow::Result<String>;
}

/// Inner-product nearest-neighbour store. Query vectors are expected to be
/// unit length so that scores approximate cosine similarity.
pub trait VectorIndex: Send + Sync {
    /// Create the collection if it does not exist yet.
    fn ensure_collection(&self, spec: &CollectionSpec) -> anyhow::Result<()>;
    /// Leave the collection existing and empty, discarding any stored rows.
    fn reset_collection(&self, spec: &CollectionSpec) -> anyhow::Result<()>;
    /// Build an approximate nearest-neighbour index over the stored vectors
    /// when the backend has one. Returns whether an index was built.
    fn build_ann_index(&self, _collection: &str) -> anyhow::Result<bool> { Ok(false) }
    fn insert_chunks(&self, collection: &str, chunks: &[Chunk], vectors: &[Vec<f32>]) -> anyhow::Result<usize>;
    fn insert_entries(&self, collection: &str, entries: &[EntityEntry], vectors: &[Vec<f32>]) -> anyhow::Result<usize>;
    /// Top `limit` chunks, best first.
    fn search_chunks(&self, collection: &str, query: &[f32], limit: usize) -> anyhow::Result<Vec<ScoredHit>>;
    /// Top `limit` single-row entries, best first.
    fn search_entries(&self, collection: &str, query: &[f32], limit: usize) -> anyhow::Result<Vec<ScoredEntry>>;
}
