//! Knowledge-base ingestion: records → chunks → vectors → index.
use std::sync::Arc;
use std::time::Instant;

use medrag_core::chunker::chunk_entity;
use medrag_core::config::ChunkingSettings;
use medrag_core::error::{Error, Result};
use medrag_core::kb::{DiseaseRecord, TreatmentRecord};
use medrag_core::traits::{Embedder, TokenCodec, VectorIndex};
use medrag_core::types::{Chunk, CollectionSpec, EntityEntry};
use medrag_core::vector::normalized;

pub struct Ingestor {
    embedder: Arc<dyn Embedder>,
    codec: Arc<dyn TokenCodec>,
    index: Arc<dyn VectorIndex>,
    chunking: ChunkingSettings,
}

impl Ingestor {
    pub fn new(embedder: Arc<dyn Embedder>, codec: Arc<dyn TokenCodec>, index: Arc<dyn VectorIndex>, chunking: ChunkingSettings) -> Self {
        Self { embedder, codec, index, chunking }
    }

    fn embed_normalized(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let vectors = self.embedder.embed_batch(texts).map_err(|e| Error::embedding(&e))?;
        if vectors.len() != texts.len() {
            return Err(Error::EmbeddingFailure(format!("{} texts but {} vectors", texts.len(), vectors.len())));
        }
        Ok(vectors.into_iter().map(normalized).collect())
    }

    fn finish(&self, collection: &str) -> Result<()> {
        let built = self.index.build_ann_index(collection).map_err(|e| Error::index(&e))?;
        tracing::debug!(collection, built, "ANN index step");
        Ok(())
    }

    /// Replace the collection's contents with every disease, chunked and
    /// embedded. Returns the number of chunks written.
    pub fn ingest_diseases(&self, collection: &str, records: &[DiseaseRecord]) -> Result<usize> {
        let start = Instant::now();
        self.index.reset_collection(&CollectionSpec::chunked(collection, self.embedder.dim())).map_err(|e| Error::index(&e))?;
        let window = self.chunking.window();

        let mut chunks: Vec<Chunk> = Vec::new();
        for record in records {
            let before = chunks.len();
            chunks.extend(chunk_entity(self.codec.as_ref(), &record.disease_id, &record.name, &record.text, &window, self.chunking.max_chunk_chars)?);
            if chunks.len() == before {
                tracing::warn!(disease_id = %record.disease_id, "disease has no text, skipped");
            }
        }
        tracing::info!(diseases = records.len(), chunks = chunks.len(), "chunked disease KB");

        let mut written = 0usize;
        for batch in chunks.chunks(self.chunking.batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embed_normalized(&texts)?;
            written += self.index.insert_chunks(collection, batch, &vectors).map_err(|e| Error::index(&e))?;
            tracing::debug!(written, total = chunks.len(), "stored chunk batch");
        }
        self.finish(collection)?;
        tracing::info!(collection, written, elapsed_ms = start.elapsed().as_millis(), "disease ingestion complete");
        Ok(written)
    }

    /// Replace the collection's contents with one row per disease: the
    /// embedded name and its joined treatment list.
    pub fn ingest_treatments(&self, collection: &str, records: &[TreatmentRecord]) -> Result<usize> {
        self.index.reset_collection(&CollectionSpec::single_row(collection, self.embedder.dim())).map_err(|e| Error::index(&e))?;
        let mut written = 0usize;
        for batch in records.chunks(self.chunking.batch_size.max(1)) {
            let entries: Vec<EntityEntry> = batch.iter().map(TreatmentRecord::to_entry).collect();
            let names: Vec<String> = entries.iter().map(|e| e.entity_name.clone()).collect();
            let vectors = self.embed_normalized(&names)?;
            written += self.index.insert_entries(collection, &entries, &vectors).map_err(|e| Error::index(&e))?;
        }
        self.finish(collection)?;
        tracing::info!(collection, written, "treatment ingestion complete");
        Ok(written)
    }
}
