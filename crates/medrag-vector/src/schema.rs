use anyhow::{anyhow, Result};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use std::sync::Arc;

use medrag_core::types::{CollectionKind, CollectionSpec};

pub const VECTOR_COLUMN: &str = "vector";
pub const DISTANCE_COLUMN: &str = "_distance";

fn vector_field(dim: usize) -> Result<Field> {
	let size = i32::try_from(dim).map_err(|_| anyhow!("vector dimension {dim} is too large"))?;
	Ok(Field::new(VECTOR_COLUMN, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), size), true))
}

/// One row per chunk of a long entity text.
pub fn chunk_schema(dim: usize) -> Result<SchemaRef> {
	Ok(Arc::new(Schema::new(vec![
		Field::new("entity_id", DataType::Utf8, false),
		Field::new("entity_name", DataType::Utf8, false),
		Field::new("chunk_index", DataType::Int32, false),
		Field::new("chunk_text", DataType::Utf8, false),
		vector_field(dim)?,
	])))
}

/// One row per entity, payload stored as delimited text.
pub fn entry_schema(dim: usize) -> Result<SchemaRef> {
	Ok(Arc::new(Schema::new(vec![
		Field::new("entity_id", DataType::Utf8, false),
		Field::new("entity_name", DataType::Utf8, false),
		Field::new("payload", DataType::Utf8, false),
		vector_field(dim)?,
	])))
}

pub fn schema_for(spec: &CollectionSpec) -> Result<SchemaRef> {
	match spec.kind {
		CollectionKind::Chunked => chunk_schema(spec.dim),
		CollectionKind::SingleRow => entry_schema(spec.dim),
	}
}

/// Width of the vector column.
pub fn vector_dim(schema: &Schema) -> Result<usize> {
	match schema.field_with_name(VECTOR_COLUMN)?.data_type() {
		DataType::FixedSizeList(_, n) => usize::try_from(*n).map_err(|_| anyhow!("negative vector width {n}")),
		other => Err(anyhow!("vector column has unexpected type {other}")),
	}
}

/// Column names and vector width agree; nullability and metadata are ignored.
pub fn same_layout(a: &Schema, b: &Schema) -> bool {
	let names = |s: &Schema| s.fields().iter().map(|f| f.name().clone()).collect::<Vec<_>>();
	names(a) == names(b) && matches!((vector_dim(a), vector_dim(b)), (Ok(x), Ok(y)) if x == y)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn layouts_distinguish_kind_and_dim() {
		let chunked = schema_for(&CollectionSpec::chunked("kb", 384)).unwrap();
		let rows = schema_for(&CollectionSpec::single_row("t", 384)).unwrap();
		assert_eq!(vector_dim(&chunked).unwrap(), 384);
		assert!(same_layout(&chunked, &chunk_schema(384).unwrap()));
		assert!(!same_layout(&chunked, &rows));
		assert!(!same_layout(&chunked, &chunk_schema(768).unwrap()));
	}
}
