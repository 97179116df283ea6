//! Query façades over an [`Embedder`] and a [`VectorIndex`].
//!
//! - [`SymptomSearch`]: symptoms → ranked diseases with evidence (chunked collection)
//! - [`TreatmentSearch`]: disease name → treatment lists (single-row collection)
//! - [`Ingestor`]: knowledge-base records → stored vectors
use std::fmt;
use std::sync::Arc;

use medrag_core::aggregate::aggregate;
use medrag_core::config::SymptomSettings;
use medrag_core::context::assemble;
use medrag_core::error::{Error, Result};
use medrag_core::lookup::lookup;
use medrag_core::traits::{Embedder, VectorIndex};
use medrag_core::types::{CollectionSpec, EntityMatch, RankedResult};
use medrag_core::vector::normalized;

pub mod ingest;

pub use ingest::Ingestor;

/// Embed one query. Blank input is rejected before the provider is called.
pub fn embed_query(embedder: &dyn Embedder, query: &str) -> Result<Vec<f32>> {
    let text = query.trim();
    if text.is_empty() {
        return Err(Error::EmptyQuery);
    }
    let vectors = embedder.embed_batch(&[text.to_string()]).map_err(|e| Error::embedding(&e))?;
    let [vector]: [Vec<f32>; 1] = vectors
        .try_into()
        .map_err(|v: Vec<Vec<f32>>| Error::EmbeddingFailure(format!("expected 1 vector, provider returned {}", v.len())))?;
    if vector.len() != embedder.dim() {
        return Err(Error::EmbeddingFailure(format!("vector has {} dimensions, expected {}", vector.len(), embedder.dim())));
    }
    Ok(normalized(vector))
}

pub struct SymptomSearch {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    collection: String,
    params: SymptomSettings,
}

impl SymptomSearch {
    /// Ensures the chunk collection exists before the first query.
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>, collection: &str, params: SymptomSettings) -> Result<Self> {
        index.ensure_collection(&CollectionSpec::chunked(collection, embedder.dim())).map_err(|e| Error::index(&e))?;
        Ok(Self { embedder, index, collection: collection.to_string(), params })
    }

    /// Ranked diseases for free-text symptoms. No hits is an empty list.
    pub fn search(&self, query: &str) -> Result<Vec<RankedResult>> {
        let vector = embed_query(self.embedder.as_ref(), query)?;
        let hits = self
            .index
            .search_chunks(&self.collection, &vector, self.params.top_k_chunks)
            .map_err(|e| Error::index(&e))?;
        tracing::debug!(collection = %self.collection, hits = hits.len(), "chunk search");
        let results: Vec<RankedResult> = aggregate(hits, self.params.top_n_diseases, self.params.top_k_scores_for_mean)
            .iter()
            .map(|entity| assemble(entity, self.params.top_m_chunks))
            .collect();
        tracing::info!(results = results.len(), "symptom search");
        Ok(results)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TreatmentOutcome {
    Found(Vec<EntityMatch>),
    NoMatch { query: String },
}

impl fmt::Display for TreatmentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMatch { query } => write!(f, "No treatments found for {query}."),
            Self::Found(matches) => {
                for (i, m) in matches.iter().enumerate() {
                    if i > 0 { writeln!(f)?; }
                    write!(f, "{} ({}): {}", m.entity_name, m.entity_id, m.payload.join(", "))?;
                }
                Ok(())
            }
        }
    }
}

pub struct TreatmentSearch {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    collection: String,
    top_k: usize,
}

impl TreatmentSearch {
    /// `top_k` must be positive: a zero limit could never find a match.
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>, collection: &str, top_k: usize) -> Result<Self> {
        if top_k == 0 {
            return Err(Error::InvalidConfig("treatment limit must be greater than zero".to_string()));
        }
        index.ensure_collection(&CollectionSpec::single_row(collection, embedder.dim())).map_err(|e| Error::index(&e))?;
        Ok(Self { embedder, index, collection: collection.to_string(), top_k })
    }

    pub fn lookup(&self, query: &str) -> Result<TreatmentOutcome> {
        let vector = embed_query(self.embedder.as_ref(), query)?;
        let matches = lookup(self.index.as_ref(), &self.collection, &vector, self.top_k)?;
        if matches.is_empty() {
            return Ok(TreatmentOutcome::NoMatch { query: query.trim().to_string() });
        }
        Ok(TreatmentOutcome::Found(matches))
    }
}
