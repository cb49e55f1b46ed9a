//! The document store: open, upsert, nearest-neighbor query, listing.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use arrow_array::{
    types::Float32Type, Array, FixedSizeListArray, Float32Array, RecordBatch,
    RecordBatchIterator, StringArray, TimestampMillisecondArray,
};
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};

use folio_core::types::{ChunkMetadata, ChunkRecord, ScoredChunk};
use folio_embed::EmbeddingProvider;

use crate::error::{Result, StoreError};
use crate::schema::{build_chunk_schema, CHUNK_TABLE};

/// Durable mapping from chunk id to (embedding, text, metadata) over one
/// LanceDB table. Chunks are keyed by `doc_id`; re-adding an id replaces
/// the stored row.
pub struct DocumentStore {
    conn: Connection,
    table_name: String,
    provider: Arc<dyn EmbeddingProvider>,
    dims: i32,
}

impl DocumentStore {
    /// Open the store at `dir`, creating the chunk table if absent. The
    /// vector column dimension is taken from the embedding provider.
    pub async fn open(dir: &Path, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let conn = connect(dir.to_string_lossy().as_ref()).execute().await?;
        let dims = provider.dimensions() as i32;
        let store = Self { conn, table_name: CHUNK_TABLE.to_string(), provider, dims };
        store.ensure_table().await?;
        let total = store.count().await?;
        tracing::info!(rows = total, dir = %dir.display(), "document store opened");
        Ok(store)
    }

    async fn ensure_table(&self) -> Result<()> {
        let names = self.conn.table_names().execute().await?;
        if names.contains(&self.table_name) {
            return Ok(());
        }
        // create empty table with 0 rows
        let schema = build_chunk_schema(self.dims);
        let iter = RecordBatchIterator::new(vec![].into_iter(), schema);
        self.conn
            .create_table(&self.table_name, Box::new(iter))
            .execute()
            .await?;
        Ok(())
    }

    /// Embed and upsert chunk records, one batched provider call per
    /// invocation. Returns the number of rows written.
    pub async fn add_chunks(&self, records: &[ChunkRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let embeddings = self.provider.embed_batch(&texts).await?;
        assert_eq!(records.len(), embeddings.len(), "records and embeddings length must match");
        let batch = records_to_batch(records, &embeddings, self.dims)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        let table = self.conn.open_table(&self.table_name).execute().await?;
        // Upsert behavior via merge_insert: doc_id is unique
        let mut merge = table.merge_insert(&["doc_id"]);
        merge.when_matched_update_all(None).when_not_matched_insert_all();
        let _ = merge.execute(reader).await?;
        tracing::debug!(rows = records.len(), "chunks upserted");
        Ok(records.len())
    }

    /// Embed `query_text` and return the `top_k` nearest chunks, ascending
    /// by distance. An empty store yields an empty list, not an error.
    pub async fn query(&self, query_text: &str, top_k: usize) -> Result<Vec<ScoredChunk>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let query_vector = self.provider.embed(query_text).await?;
        let table = self.conn.open_table(&self.table_name).execute().await?;
        let mut stream = table
            .vector_search(query_vector.as_slice())?
            .limit(top_k)
            .execute()
            .await?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            collect_scored_chunks(&batch, &mut hits)?;
        }
        Ok(hits)
    }

    /// Scan all chunk metadata into a `project_id -> project_name` map.
    ///
    /// First-seen-wins in scan order: the first row scanned for a project
    /// fixes its name and later differing names are ignored. Catalog
    /// validation prevents conflicts at ingestion time; the rule matters
    /// only for rows written by other tools.
    pub async fn list_all_projects(&self) -> Result<BTreeMap<String, String>> {
        let table = self.conn.open_table(&self.table_name).execute().await?;
        let mut stream = table.query().execute().await?;
        let mut projects = BTreeMap::new();
        while let Some(batch) = stream.try_next().await? {
            let ids = string_column(&batch, "project_id")?;
            let names = string_column(&batch, "project_name")?;
            for i in 0..batch.num_rows() {
                projects
                    .entry(ids.value(i).to_string())
                    .or_insert_with(|| names.value(i).to_string());
            }
        }
        Ok(projects)
    }

    /// Number of stored chunks.
    pub async fn count(&self) -> Result<usize> {
        let table = self.conn.open_table(&self.table_name).execute().await?;
        Ok(table.count_rows(None).await?)
    }
}

fn records_to_batch(
    records: &[ChunkRecord],
    embeddings: &[Vec<f32>],
    dims: i32,
) -> Result<RecordBatch> {
    let schema = build_chunk_schema(dims);
    let mut doc_ids = Vec::new();
    let mut project_ids = Vec::new();
    let mut project_names = Vec::new();
    let mut chunk_types = Vec::new();
    let mut contents = Vec::new();
    let mut stamps = Vec::new();
    let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::new();
    let now = Utc::now().timestamp_millis();
    for (record, embedding) in records.iter().zip(embeddings.iter()) {
        doc_ids.push(record.metadata.doc_id.clone());
        project_ids.push(record.metadata.project_id.clone());
        project_names.push(record.metadata.project_name.clone());
        chunk_types.push(record.metadata.chunk_type.clone());
        contents.push(record.text.clone());
        stamps.push(now);
        vectors.push(Some(embedding.iter().map(|&x| Some(x)).collect()));
    }
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(doc_ids)),
            Arc::new(StringArray::from(project_ids)),
            Arc::new(StringArray::from(project_names)),
            Arc::new(StringArray::from(chunk_types)),
            Arc::new(StringArray::from(contents)),
            Arc::new(TimestampMillisecondArray::from(stamps)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
                vectors.into_iter(),
                dims,
            )),
        ],
    )?;
    Ok(batch)
}

fn collect_scored_chunks(batch: &RecordBatch, out: &mut Vec<ScoredChunk>) -> Result<()> {
    let doc_ids = string_column(batch, "doc_id")?;
    let project_ids = string_column(batch, "project_id")?;
    let project_names = string_column(batch, "project_name")?;
    let chunk_types = string_column(batch, "chunk_type")?;
    let contents = string_column(batch, "content")?;
    let distances = batch
        .column_by_name("_distance")
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
        .ok_or(StoreError::MissingColumn("_distance"))?;
    for i in 0..batch.num_rows() {
        out.push(ScoredChunk {
            metadata: ChunkMetadata {
                doc_id: doc_ids.value(i).to_string(),
                project_id: project_ids.value(i).to_string(),
                project_name: project_names.value(i).to_string(),
                chunk_type: chunk_types.value(i).to_string(),
            },
            text: contents.value(i).to_string(),
            distance: distances.value(i),
        });
    }
    Ok(())
}

fn string_column<'a>(batch: &'a RecordBatch, name: &'static str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or(StoreError::MissingColumn(name))
}
