//! In-memory vector store.
//!
//! Brute-force search over every record. Optionally snapshotted to a JSON
//! file after each write, so an index built by `docrag ingest` can be served
//! by a later `docrag serve` without LanceDB.

use async_trait::async_trait;
use docrag_core::{
    check_dimension, IndexSpec, SearchHit, StoreConfigError, StoreError, StoreStats, StoredRecord,
    VectorStore,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::manifest;

/// On-disk form of a snapshot.
#[derive(Serialize, Deserialize)]
struct Snapshot {
    spec: IndexSpec,
    records: Vec<StoredRecord>,
}

/// In-memory vector store.
///
/// # Example
///
/// ```rust
/// use docrag_core::{DistanceMetric, IndexSpec, StoredRecord, VectorStore};
/// use docrag_store::MemoryStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new(IndexSpec {
///     name: "docs".to_string(),
///     dimension: 2,
///     metric: DistanceMetric::Cosine,
///     model: "test".to_string(),
/// });
/// store.init().await?;
/// store
///     .upsert(&[StoredRecord::new("a.txt", 0, "hello".to_string(), vec![1.0, 0.0])])
///     .await?;
/// let hits = store.query(&[1.0, 0.0], 5).await?;
/// assert_eq!(hits[0].id, "a.txt-0");
/// # Ok(())
/// # }
/// ```
pub struct MemoryStore {
    spec: IndexSpec,
    /// Keyed by record id
    records: RwLock<BTreeMap<String, StoredRecord>>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryStore {
    /// Create a store that lives only in memory.
    #[must_use]
    pub fn new(spec: IndexSpec) -> Self {
        Self {
            spec,
            records: RwLock::new(BTreeMap::new()),
            snapshot_path: None,
        }
    }

    /// Create a store persisted to `<dir>/<index name>.json`.
    #[must_use]
    pub fn persistent(spec: IndexSpec, dir: &Path) -> Self {
        let snapshot_path = dir.join(format!("{}.json", spec.name));
        Self {
            spec,
            records: RwLock::new(BTreeMap::new()),
            snapshot_path: Some(snapshot_path),
        }
    }

    /// Snapshot file, if this store is persistent.
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    async fn load_snapshot(&self, path: &Path) -> Result<(), StoreError> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(StoreError::Init(format!(
                    "failed to read {}: {e}",
                    path.display()
                )))
            }
        };
        let snapshot: Snapshot = serde_json::from_str(&raw)
            .map_err(|e| StoreConfigError::Manifest(format!("{}: {e}", path.display())))?;
        manifest::verify(&snapshot.spec, &self.spec)?;

        let mut records = self.records.write().await;
        records.clear();
        for record in snapshot.records {
            records.insert(record.id.clone(), record);
        }
        info!("Loaded {} records from {:?}", records.len(), path);
        Ok(())
    }

    /// Apply `change` and persist the result. Returns what `change` returned.
    ///
    /// A persistent store applies the change to a copy, writes the snapshot,
    /// and swaps the copy in only after the write succeeded. The snapshot is
    /// skipped when `change` reports zero affected records.
    async fn commit<F>(&self, change: F) -> Result<u64, StoreError>
    where
        F: FnOnce(&mut BTreeMap<String, StoredRecord>) -> u64,
    {
        let mut records = self.records.write().await;
        if self.snapshot_path.is_none() {
            return Ok(change(&mut records));
        }

        let mut next = records.clone();
        let affected = change(&mut next);
        if affected > 0 {
            self.write_snapshot(&next).await?;
            *records = next;
        }
        Ok(affected)
    }

    async fn write_snapshot(
        &self,
        records: &BTreeMap<String, StoredRecord>,
    ) -> Result<(), StoreError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let snapshot = Snapshot {
            spec: self.spec.clone(),
            records: records.values().cloned().collect(),
        };
        let json = serde_json::to_vec(&snapshot)
            .map_err(|e| StoreError::Insert(format!("failed to serialize snapshot: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| StoreError::Insert(format!("failed to write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| StoreError::Insert(format!("failed to write {}: {e}", path.display())))
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    fn spec(&self) -> &IndexSpec {
        &self.spec
    }

    async fn init(&self) -> Result<(), StoreError> {
        manifest::validate(&self.spec)?;
        if let Some(path) = &self.snapshot_path {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    StoreError::Init(format!("failed to create {}: {e}", parent.display()))
                })?;
            }
            self.load_snapshot(path).await?;
        }
        debug!(
            "MemoryStore '{}' initialized (dimension: {})",
            self.spec.name, self.spec.dimension
        );
        Ok(())
    }

    async fn upsert(&self, records: &[StoredRecord]) -> Result<(), StoreError> {
        for record in records {
            check_dimension(&self.spec, &record.vector)?;
        }

        self.commit(|store| {
            for record in records {
                store.insert(record.id.clone(), record.clone());
            }
            records.len() as u64
        })
        .await?;
        debug!("Upserted {} records", records.len());
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>, StoreError> {
        check_dimension(&self.spec, vector)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let records = self.records.read().await;
        let mut scored: Vec<(f32, &StoredRecord)> = records
            .values()
            .map(|r| (self.spec.metric.distance(vector, &r.vector), r))
            .collect();

        // Ascending distance; ties by id so results are reproducible.
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(distance, record)| SearchHit {
                id: record.id.clone(),
                metadata: record.metadata.clone(),
                distance,
            })
            .collect())
    }

    async fn delete_source_from(&self, source: &str, first_index: u32) -> Result<u64, StoreError> {
        let removed = self
            .commit(|store| {
                let before = store.len();
                store.retain(|_, r| {
                    !(r.metadata.source == source && r.metadata.chunk >= first_index)
                });
                (before - store.len()) as u64
            })
            .await?;
        if removed > 0 {
            debug!("Deleted {} stale records of {}", removed, source);
        }
        Ok(removed)
    }

    async fn delete_ids(&self, ids: &[String]) -> Result<u64, StoreError> {
        let removed = self
            .commit(|store| {
                ids.iter()
                    .filter(|id| store.remove(id.as_str()).is_some())
                    .count() as u64
            })
            .await?;
        if removed > 0 {
            debug!("Deleted {} records by id", removed);
        }
        Ok(removed)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.records.read().await.len() as u64)
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        Ok(StoreStats {
            spec: self.spec.clone(),
            total_records: self.count().await?,
            backend: "memory".to_string(),
        })
    }
}
