//! Arrow schema for the `LanceDB` records table.

use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

/// Column holding the embedding vector.
pub const VECTOR_COLUMN: &str = "vector";

/// Schema for the records table.
#[must_use]
pub fn records_schema(dimension: usize) -> Schema {
    Schema::new(vec![
        // Identity
        Field::new("id", DataType::Utf8, false),
        // Metadata
        Field::new("source", DataType::Utf8, false),
        Field::new("chunk", DataType::UInt32, false),
        Field::new("text", DataType::Utf8, false),
        // Embedding
        Field::new(
            VECTOR_COLUMN,
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                i32::try_from(dimension).unwrap_or(i32::MAX),
            ),
            false,
        ),
    ])
}

/// Vector width declared by an existing table schema.
#[must_use]
pub fn vector_dimension(schema: &Schema) -> Option<usize> {
    match schema.field_with_name(VECTOR_COLUMN).ok()?.data_type() {
        DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
        _ => None,
    }
}
