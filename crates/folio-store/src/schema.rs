use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

pub const CHUNK_TABLE: &str = "chunks";

pub fn build_chunk_schema(dims: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("doc_id", DataType::Utf8, false),
        Field::new("project_id", DataType::Utf8, false),
        Field::new("project_name", DataType::Utf8, false),
        Field::new("chunk_type", DataType::Utf8, false),
        Field::new("content", DataType::Utf8, false),
        Field::new("ingested_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
        Field::new(
            "vector",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dims),
            true,
        ),
    ]))
}
