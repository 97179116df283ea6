//! Approximate nearest-neighbour index over the vector column.
use anyhow::Result;
use lancedb::index::vector::IvfHnswSqIndexBuilder;
use lancedb::index::Index;
use lancedb::{DistanceType, Table};

use crate::schema::VECTOR_COLUMN;

/// Below this many rows a flat scan is cheap and IVF training is unreliable.
pub const DEFAULT_MIN_ROWS: usize = 10_000;

/// IVF partitions for `rows` vectors: about sqrt(n)/8, at least 1.
pub fn num_partitions(rows: usize) -> u32 {
	#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
	let p = ((rows as f64).sqrt() / 8.0) as u32;
	p.max(1)
}

/// (Re)build an IVF-HNSW-SQ index with the dot metric used by search.
/// Tables smaller than `min_rows` are left to flat search.
pub async fn build_ann_index(table: &Table, min_rows: usize) -> Result<bool> {
	let rows = table.count_rows(None).await?;
	if rows < min_rows {
		tracing::debug!(table = table.name(), rows, min_rows, "skipping ANN index");
		return Ok(false);
	}
	let partitions = num_partitions(rows);
	table
		.create_index(
			&[VECTOR_COLUMN],
			Index::IvfHnswSq(IvfHnswSqIndexBuilder::default().distance_type(DistanceType::Dot).num_partitions(partitions)),
		)
		.execute()
		.await?;
	tracing::info!(table = table.name(), rows, partitions, "built IVF-HNSW-SQ index");
	Ok(true)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn partitions_grow_with_rows() {
		assert_eq!(num_partitions(0), 1);
		assert_eq!(num_partitions(300), 2);
		assert_eq!(num_partitions(10_000), 12);
		assert_eq!(num_partitions(1_000_000), 125);
	}
}
