//! `LanceDB` implementation of `VectorStore`.

use arrow_array::builder::{FixedSizeListBuilder, Float32Builder};
use arrow_array::{
    Array, ArrayRef, Float32Array, RecordBatch, RecordBatchIterator, StringArray, UInt32Array,
};
use async_trait::async_trait;
use docrag_core::{
    check_dimension, DistanceMetric, IndexSpec, RecordMetadata, SearchHit, StoreConfigError,
    StoreError, StoreStats, StoredRecord, VectorStore,
};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType, Table};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::manifest;
use crate::schema::{records_schema, vector_dimension};

/// LanceDB-based vector store.
///
/// One table per index, named after the index. The database lives in
/// `<data_dir>/lancedb`; the manifest sits beside it in `data_dir`.
pub struct LanceStore {
    /// Directory holding the database and manifests
    data_dir: PathBuf,
    spec: IndexSpec,
    /// Database connection (lazy initialized)
    connection: RwLock<Option<Connection>>,
    /// Records table handle
    table: RwLock<Option<Table>>,
}

impl LanceStore {
    /// Create a new `LanceStore`. Nothing touches disk until [`VectorStore::init`].
    #[must_use]
    pub fn new(data_dir: PathBuf, spec: IndexSpec) -> Self {
        Self {
            data_dir,
            spec,
            connection: RwLock::new(None),
            table: RwLock::new(None),
        }
    }

    /// Path to the `LanceDB` database.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("lancedb")
    }

    /// Directory holding the database and manifests.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn distance_type(&self) -> DistanceType {
        match self.spec.metric {
            DistanceMetric::Cosine => DistanceType::Cosine,
            DistanceMetric::L2 => DistanceType::L2,
        }
    }

    /// Get or create connection.
    async fn get_connection(&self) -> Result<Connection, StoreError> {
        {
            let conn = self.connection.read().await;
            if let Some(c) = conn.as_ref() {
                return Ok(c.clone());
            }
        }

        let mut conn = self.connection.write().await;
        if let Some(c) = conn.as_ref() {
            return Ok(c.clone());
        }
        let db_path = self.db_path().to_string_lossy().to_string();
        let new_conn = connect(&db_path)
            .execute()
            .await
            .map_err(|e| StoreError::Init(format!("Failed to connect to LanceDB: {e}")))?;
        *conn = Some(new_conn.clone());
        Ok(new_conn)
    }

    /// Get or open the records table.
    async fn get_table(&self) -> Result<Table, StoreError> {
        {
            let table = self.table.read().await;
            if let Some(t) = table.as_ref() {
                return Ok(t.clone());
            }
        }

        let conn = self.get_connection().await?;
        let mut table_lock = self.table.write().await;
        if let Some(t) = table_lock.as_ref() {
            return Ok(t.clone());
        }
        let t = conn
            .open_table(&self.spec.name)
            .execute()
            .await
            .map_err(|e| StoreError::Init(format!("Failed to open table '{}': {e}", self.spec.name)))?;
        *table_lock = Some(t.clone());
        Ok(t)
    }

    /// Convert records to an Arrow `RecordBatch`.
    fn records_to_batch(&self, records: &[StoredRecord]) -> Result<RecordBatch, StoreError> {
        let schema = Arc::new(records_schema(self.spec.dimension));

        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        let sources: Vec<&str> = records.iter().map(|r| r.metadata.source.as_str()).collect();
        let chunks: Vec<u32> = records.iter().map(|r| r.metadata.chunk).collect();
        let texts: Vec<&str> = records.iter().map(|r| r.metadata.text.as_str()).collect();
        let vectors = build_vector_array(records, self.spec.dimension)?;

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(sources)),
                Arc::new(UInt32Array::from(chunks)),
                Arc::new(StringArray::from(texts)),
                vectors,
            ],
        )
        .map_err(|e| StoreError::Insert(format!("Failed to create RecordBatch: {e}")))
    }
}

#[async_trait]
impl VectorStore for LanceStore {
    fn spec(&self) -> &IndexSpec {
        &self.spec
    }

    async fn init(&self) -> Result<(), StoreError> {
        info!("Initializing LanceDB at {:?}", self.db_path());

        tokio::fs::create_dir_all(&self.data_dir)
            .await
            .map_err(|e| StoreError::Init(format!("Failed to create data directory: {e}")))?;
        manifest::ensure(&manifest::manifest_path(&self.data_dir, &self.spec.name), &self.spec)
            .await?;

        let conn = self.get_connection().await?;
        let tables = conn
            .table_names()
            .execute()
            .await
            .map_err(|e| StoreError::Init(format!("Failed to list tables: {e}")))?;

        if tables.iter().any(|t| t == &self.spec.name) {
            let table = self.get_table().await?;
            let schema = table
                .schema()
                .await
                .map_err(|e| StoreError::Schema(format!("Failed to read table schema: {e}")))?;
            let actual = vector_dimension(&schema).ok_or_else(|| {
                StoreConfigError::InvalidSpec(format!(
                    "table '{}' has no vector column",
                    self.spec.name
                ))
            })?;
            if actual != self.spec.dimension {
                return Err(StoreConfigError::DimensionMismatch {
                    expected: actual,
                    actual: self.spec.dimension,
                }
                .into());
            }
        } else {
            info!("Creating table '{}'", self.spec.name);
            let schema = Arc::new(records_schema(self.spec.dimension));
            conn.create_empty_table(&self.spec.name, schema)
                .execute()
                .await
                .map_err(|e| StoreError::Init(format!("Failed to create table: {e}")))?;
        }

        info!("LanceDB initialized successfully");
        Ok(())
    }

    async fn upsert(&self, records: &[StoredRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        for record in records {
            check_dimension(&self.spec, &record.vector)?;
        }

        debug!("Upserting {} records", records.len());
        let table = self.get_table().await?;

        // Delete-then-add keeps ids unique
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        table
            .delete(&id_filter(&ids))
            .await
            .map_err(|e| StoreError::Delete(format!("Failed to replace records: {e}")))?;

        let batch = self.records_to_batch(records)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
        table
            .add(Box::new(batches))
            .execute()
            .await
            .map_err(|e| StoreError::Insert(format!("Failed to insert records: {e}")))?;

        debug!("Successfully upserted {} records", records.len());
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>, StoreError> {
        check_dimension(&self.spec, vector)?;
        if k == 0 {
            return Ok(Vec::new());
        }
        debug!("Searching with limit {}", k);

        let table = self.get_table().await?;
        let mut results = table
            .query()
            .nearest_to(vector.to_vec())
            .map_err(|e| StoreError::Query(format!("Failed to create search query: {e}")))?
            .distance_type(self.distance_type())
            .limit(k)
            .execute()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to execute search: {e}")))?;

        let mut hits = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to fetch results: {e}")))?
        {
            hits.extend(batch_to_hits(&batch)?);
        }

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(k);
        debug!("Found {} results", hits.len());
        Ok(hits)
    }

    async fn delete_source_from(&self, source: &str, first_index: u32) -> Result<u64, StoreError> {
        let table = self.get_table().await?;
        let filter = format!("source = '{}' AND chunk >= {first_index}", escape(source));

        let stale = table
            .count_rows(Some(filter.clone()))
            .await
            .map_err(|e| StoreError::Query(format!("Failed to count records: {e}")))?;
        if stale == 0 {
            return Ok(0);
        }

        table
            .delete(&filter)
            .await
            .map_err(|e| StoreError::Delete(format!("Failed to delete records: {e}")))?;
        debug!("Deleted {} stale records of {}", stale, source);
        Ok(stale as u64)
    }

    async fn delete_ids(&self, ids: &[String]) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let table = self.get_table().await?;
        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
        let filter = id_filter(&ids);

        let existing = table
            .count_rows(Some(filter.clone()))
            .await
            .map_err(|e| StoreError::Query(format!("Failed to count records: {e}")))?;
        if existing == 0 {
            return Ok(0);
        }

        table
            .delete(&filter)
            .await
            .map_err(|e| StoreError::Delete(format!("Failed to delete records: {e}")))?;
        debug!("Deleted {} records by id", existing);
        Ok(existing as u64)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let table = self.get_table().await?;
        let rows = table
            .count_rows(None)
            .await
            .map_err(|e| StoreError::Query(format!("Failed to count records: {e}")))?;
        Ok(rows as u64)
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        Ok(StoreStats {
            spec: self.spec.clone(),
            total_records: self.count().await?,
            backend: "lancedb".to_string(),
        })
    }
}

/// Quote a value for a `LanceDB` SQL filter.
fn escape(value: &str) -> String {
    value.replace('\'', "''")
}

/// `id IN (...)` filter over quoted ids.
fn id_filter(ids: &[&str]) -> String {
    let quoted: Vec<String> = ids.iter().map(|id| format!("'{}'", escape(id))).collect();
    format!("id IN ({})", quoted.join(", "))
}

fn build_vector_array(records: &[StoredRecord], dim: usize) -> Result<ArrayRef, StoreError> {
    let width = i32::try_from(dim)
        .map_err(|_| StoreError::Schema(format!("dimension {dim} is too large")))?;
    let mut builder = FixedSizeListBuilder::new(Float32Builder::new(), width);

    for record in records {
        builder.values().append_slice(&record.vector);
        builder.append(true);
    }

    Ok(Arc::new(builder.finish()))
}

fn batch_to_hits(batch: &RecordBatch) -> Result<Vec<SearchHit>, StoreError> {
    let ids = batch
        .column_by_name("id")
        .and_then(|c| c.as_any().downcast_ref::<StringArray>());
    let sources = batch
        .column_by_name("source")
        .and_then(|c| c.as_any().downcast_ref::<StringArray>());
    let chunks = batch
        .column_by_name("chunk")
        .and_then(|c| c.as_any().downcast_ref::<UInt32Array>());
    let texts = batch
        .column_by_name("text")
        .and_then(|c| c.as_any().downcast_ref::<StringArray>());
    let distances = batch
        .column_by_name("_distance")
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

    let (Some(ids), Some(sources), Some(chunks), Some(texts), Some(distances)) =
        (ids, sources, chunks, texts, distances)
    else {
        return Err(StoreError::Query("Missing required columns".to_string()));
    };

    let mut hits = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        if distances.is_null(i) {
            continue;
        }
        hits.push(SearchHit {
            id: ids.value(i).to_string(),
            metadata: RecordMetadata {
                source: sources.value(i).to_string(),
                chunk: chunks.value(i),
                text: texts.value(i).to_string(),
            },
            distance: distances.value(i),
        });
    }
    Ok(hits)
}
