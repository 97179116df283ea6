//! LanceDB-backed [`VectorIndex`].
//!
//! The engine is synchronous; `LanceIndex` owns a Tokio runtime and blocks on
//! the async LanceDB API for every call.
use anyhow::Result;
use lancedb::Connection;
use tokio::runtime::Runtime;

use medrag_core::traits::VectorIndex;
use medrag_core::types::{Chunk, CollectionSpec, EntityEntry, ScoredEntry, ScoredHit};

pub mod ann;
pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub struct LanceIndex { runtime: Runtime, db: Connection, uri: String, ann_min_rows: usize }

impl LanceIndex {
    pub fn open(uri: &str) -> Result<Self> {
        let runtime = Runtime::new()?;
        let db = runtime.block_on(table::open_db(uri))?;
        tracing::info!(uri, "opened lancedb");
        Ok(Self { runtime, db, uri: uri.to_string(), ann_min_rows: ann::DEFAULT_MIN_ROWS })
    }

    /// Row count at which [`VectorIndex::build_ann_index`] starts building an index.
    pub fn with_ann_min_rows(mut self, rows: usize) -> Self {
        self.ann_min_rows = rows;
        self
    }

    /// Row count of `collection`, 0 when it does not exist.
    pub fn count(&self, collection: &str) -> Result<usize> {
        self.runtime.block_on(async {
            if !table::table_exists(&self.db, collection).await? { return Ok(0); }
            Ok::<_, anyhow::Error>(self.db.open_table(collection).execute().await?.count_rows(None).await?)
        })
    }

    pub fn close(self) {
        tracing::debug!(uri = %self.uri, "closing lancedb");
        drop(self.db);
        self.runtime.shutdown_background();
    }
}

impl VectorIndex for LanceIndex {
    fn ensure_collection(&self, spec: &CollectionSpec) -> Result<()> {
        let schema = schema::schema_for(spec)?;
        self.runtime.block_on(table::ensure_table(&self.db, &spec.name, schema))
    }

    fn reset_collection(&self, spec: &CollectionSpec) -> Result<()> {
        let schema = schema::schema_for(spec)?;
        self.runtime.block_on(table::reset_table(&self.db, &spec.name, schema))
    }

    fn build_ann_index(&self, collection: &str) -> Result<bool> {
        self.runtime.block_on(async {
            let table = table::open_existing(&self.db, collection).await?;
            ann::build_ann_index(&table, self.ann_min_rows).await
        })
    }

    fn insert_chunks(&self, collection: &str, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<usize> {
        anyhow::ensure!(chunks.len() == vectors.len(), "{} chunks but {} vectors", chunks.len(), vectors.len());
        self.runtime.block_on(async {
            let table = table::open_existing(&self.db, collection).await?;
            let schema = table.schema().await?;
            writer::append_rows(&table, chunks.len(), |r| writer::chunk_batch(schema.clone(), &chunks[r.clone()], &vectors[r])).await
        })
    }

    fn insert_entries(&self, collection: &str, entries: &[EntityEntry], vectors: &[Vec<f32>]) -> Result<usize> {
        anyhow::ensure!(entries.len() == vectors.len(), "{} entries but {} vectors", entries.len(), vectors.len());
        self.runtime.block_on(async {
            let table = table::open_existing(&self.db, collection).await?;
            let schema = table.schema().await?;
            writer::append_rows(&table, entries.len(), |r| writer::entry_batch(schema.clone(), &entries[r.clone()], &vectors[r])).await
        })
    }

    fn search_chunks(&self, collection: &str, query: &[f32], limit: usize) -> Result<Vec<ScoredHit>> {
        self.runtime.block_on(async {
            let table = table::open_existing(&self.db, collection).await?;
            search::search_chunks(&table, query, limit).await
        })
    }

    fn search_entries(&self, collection: &str, query: &[f32], limit: usize) -> Result<Vec<ScoredEntry>> {
        self.runtime.block_on(async {
            let table = table::open_existing(&self.db, collection).await?;
            search::search_entries(&table, query, limit).await
        })
    }
}
