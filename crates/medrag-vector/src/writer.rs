//! Record batch building and batched appends.
use anyhow::{bail, Result};
use arrow_array::{FixedSizeListArray, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use arrow_schema::SchemaRef;
use indicatif::{ProgressBar, ProgressStyle};
use std::ops::Range;
use std::sync::Arc;

use lancedb::Table;
use medrag_core::types::{Chunk, EntityEntry};

use crate::schema::vector_dim;

/// Rows per append.
pub const WRITE_BATCH: usize = 1000;

fn vector_array(vectors: &[Vec<f32>], dim: usize) -> Result<FixedSizeListArray> {
	if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
		bail!("vector dimension {} does not match collection ({dim})", bad.len());
	}
	let size = i32::try_from(dim)?;
	let rows = vectors.iter().map(|v| Some(v.iter().map(|&x| Some(x)).collect::<Vec<_>>()));
	Ok(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(rows, size))
}

pub fn chunk_batch(schema: SchemaRef, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<RecordBatch> {
	let dim = vector_dim(&schema)?;
	let indices = chunks.iter().map(|c| i32::try_from(c.chunk_index)).collect::<Result<Vec<_>, _>>()?;
	Ok(RecordBatch::try_new(schema, vec![
		Arc::new(StringArray::from_iter_values(chunks.iter().map(|c| c.entity_id.as_str()))),
		Arc::new(StringArray::from_iter_values(chunks.iter().map(|c| c.entity_name.as_str()))),
		Arc::new(Int32Array::from(indices)),
		Arc::new(StringArray::from_iter_values(chunks.iter().map(|c| c.text.as_str()))),
		Arc::new(vector_array(vectors, dim)?),
	])?)
}

pub fn entry_batch(schema: SchemaRef, entries: &[EntityEntry], vectors: &[Vec<f32>]) -> Result<RecordBatch> {
	let dim = vector_dim(&schema)?;
	Ok(RecordBatch::try_new(schema, vec![
		Arc::new(StringArray::from_iter_values(entries.iter().map(|e| e.entity_id.as_str()))),
		Arc::new(StringArray::from_iter_values(entries.iter().map(|e| e.entity_name.as_str()))),
		Arc::new(StringArray::from_iter_values(entries.iter().map(|e| e.payload.as_str()))),
		Arc::new(vector_array(vectors, dim)?),
	])?)
}

/// Append `total` rows to `table` in slices of [`WRITE_BATCH`]; `build` turns
/// a row range into a record batch.
pub async fn append_rows<F>(table: &Table, total: usize, mut build: F) -> Result<usize>
where
	F: FnMut(Range<usize>) -> Result<RecordBatch>,
{
	if total == 0 { return Ok(0); }
	let pb = ProgressBar::new(total as u64);
	pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} rows ({percent}%) {msg}")?.progress_chars("#>-"));
	pb.set_message(table.name().to_string());
	let mut start = 0usize;
	while start < total {
		let end = (start + WRITE_BATCH).min(total);
		let batch = build(start..end)?;
		let schema = batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
		table.add(reader).execute().await?;
		pb.set_position(end as u64);
		start = end;
	}
	pb.finish_and_clear();
	tracing::info!(table = table.name(), rows = total, "appended rows");
	Ok(total)
}
