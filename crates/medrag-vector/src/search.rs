use anyhow::{anyhow, Result};
use arrow_array::{Array, Float32Array, Int32Array, RecordBatch, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{DistanceType, Table};
use std::cmp::Ordering;

use medrag_core::types::{ScoredEntry, ScoredHit};

use crate::schema::DISTANCE_COLUMN;

const CHUNK_COLUMNS: [&str; 4] = ["entity_id", "entity_name", "chunk_index", "chunk_text"];
const ENTRY_COLUMNS: [&str; 3] = ["entity_id", "entity_name", "payload"];

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<T>())
		.ok_or_else(|| anyhow!("result column '{name}' missing or mistyped"))
}

/// Exact inner-product search over unit vectors. Lance reports the dot
/// distance as `1 - dot`, so the score is recovered as `1 - _distance`.
async fn nearest(table: &Table, query: &[f32], limit: usize, columns: &[&str]) -> Result<Vec<RecordBatch>> {
	if limit == 0 || table.count_rows(None).await? == 0 { return Ok(Vec::new()); }
	let stream = table
		.vector_search(query.to_vec())?
		.distance_type(DistanceType::Dot)
		.select(Select::columns(columns))
		.limit(limit)
		.execute()
		.await?;
	Ok(stream.try_collect::<Vec<_>>().await?)
}

fn by_score_desc(a: f32, b: f32) -> Ordering { b.partial_cmp(&a).unwrap_or(Ordering::Equal) }

pub async fn search_chunks(table: &Table, query: &[f32], limit: usize) -> Result<Vec<ScoredHit>> {
	let mut hits = Vec::new();
	for batch in nearest(table, query, limit, &CHUNK_COLUMNS).await? {
		let ids = column::<StringArray>(&batch, "entity_id")?;
		let names = column::<StringArray>(&batch, "entity_name")?;
		let indices = column::<Int32Array>(&batch, "chunk_index")?;
		let texts = column::<StringArray>(&batch, "chunk_text")?;
		let distances = column::<Float32Array>(&batch, DISTANCE_COLUMN)?;
		for i in 0..batch.num_rows() {
			hits.push(ScoredHit {
				entity_id: ids.value(i).to_string(),
				entity_name: names.value(i).to_string(),
				chunk_index: usize::try_from(indices.value(i))?,
				text: texts.value(i).to_string(),
				score: 1.0 - distances.value(i),
			});
		}
	}
	hits.sort_by(|a, b| by_score_desc(a.score, b.score));
	hits.truncate(limit);
	Ok(hits)
}

pub async fn search_entries(table: &Table, query: &[f32], limit: usize) -> Result<Vec<ScoredEntry>> {
	let mut hits = Vec::new();
	for batch in nearest(table, query, limit, &ENTRY_COLUMNS).await? {
		let ids = column::<StringArray>(&batch, "entity_id")?;
		let names = column::<StringArray>(&batch, "entity_name")?;
		let payloads = column::<StringArray>(&batch, "payload")?;
		let distances = column::<Float32Array>(&batch, DISTANCE_COLUMN)?;
		for i in 0..batch.num_rows() {
			hits.push(ScoredEntry {
				entity_id: ids.value(i).to_string(),
				entity_name: names.value(i).to_string(),
				payload: payloads.value(i).to_string(),
				score: 1.0 - distances.value(i),
			});
		}
	}
	hits.sort_by(|a, b| by_score_desc(a.score, b.score));
	hits.truncate(limit);
	Ok(hits)
}
