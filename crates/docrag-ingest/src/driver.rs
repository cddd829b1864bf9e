//! Directory ingestion: extract → chunk → embed → store.

use docrag_core::{ChunkConfig, Chunker, Error, ExtractError, Result, StoredRecord, VectorStore};
use docrag_embed::EmbedderPool;
use docrag_extract::ExtractorRegistry;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Configuration for the ingestion driver.
#[derive(Debug, Clone, Copy)]
pub struct IngestConfig {
    /// Chunk configuration
    pub chunk_config: ChunkConfig,
    /// Chunks per embedding request
    pub batch_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_config: ChunkConfig::default(),
            batch_size: 100,
        }
    }
}

/// What happened to a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FileStatus {
    /// Chunks were stored (possibly with some failed batches)
    Stored { chunks: u64, failed_batches: u64 },
    /// Unsupported type or no text
    Skipped { reason: String },
    /// Extraction, chunking or storage failed
    Failed { error: String },
}

/// Per-file line of an [`IngestReport`].
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub file_name: String,
    #[serde(flatten)]
    pub status: FileStatus,
}

/// Summary of one ingestion pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub files_processed: u64,
    pub files_skipped: u64,
    pub files_failed: u64,
    pub chunks_stored: u64,
    pub batches_failed: u64,
    pub files: Vec<FileReport>,
}

impl IngestReport {
    fn record(&mut self, file_name: String, status: FileStatus) {
        match &status {
            FileStatus::Stored {
                chunks,
                failed_batches,
            } => {
                self.files_processed += 1;
                self.chunks_stored += chunks;
                self.batches_failed += failed_batches;
            }
            FileStatus::Skipped { .. } => self.files_skipped += 1,
            FileStatus::Failed { .. } => self.files_failed += 1,
        }
        self.files.push(FileReport { file_name, status });
    }
}

/// Runs documents through the ingestion pipeline.
pub struct IngestDriver {
    extractors: Arc<ExtractorRegistry>,
    chunker: Arc<dyn Chunker>,
    embedder: Arc<EmbedderPool>,
    store: Arc<dyn VectorStore>,
    config: IngestConfig,
}

impl IngestDriver {
    /// Create a new driver. The store must already be initialized.
    pub fn new(
        extractors: Arc<ExtractorRegistry>,
        chunker: Arc<dyn Chunker>,
        embedder: Arc<EmbedderPool>,
        store: Arc<dyn VectorStore>,
        config: IngestConfig,
    ) -> Self {
        Self {
            extractors,
            chunker,
            embedder,
            store,
            config,
        }
    }

    /// Ingest every regular file directly inside `dir`.
    ///
    /// Files are processed in file-name order. Per-file failures are logged
    /// and counted; a store configuration error aborts the pass.
    pub async fn ingest_dir(&self, dir: &Path) -> Result<IngestReport> {
        info!("Ingesting documents from {:?}", dir);
        let files = list_files(dir).await?;
        debug!("Found {} candidate files", files.len());

        let mut report = IngestReport::default();
        for path in files {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let status = match self.ingest_file(&path).await {
                Ok(status) => status,
                Err(e) if e.is_fatal() => {
                    error!("Aborting ingestion at {}: {}", file_name, e);
                    return Err(e);
                }
                Err(e) => {
                    error!("Failed to ingest {}: {}", file_name, e);
                    FileStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };
            report.record(file_name, status);
        }

        info!(
            "Ingestion finished: {} processed, {} skipped, {} failed, {} chunks stored, {} batches failed",
            report.files_processed,
            report.files_skipped,
            report.files_failed,
            report.chunks_stored,
            report.batches_failed
        );
        Ok(report)
    }

    /// Run one file through the pipeline.
    pub async fn ingest_file(&self, path: &Path) -> Result<FileStatus> {
        let document = match self.extractors.extract(path).await {
            Ok(document) => document,
            Err(ExtractError::UnsupportedType(name)) => {
                warn!("Skipping {}: unsupported file type", name);
                return Ok(FileStatus::Skipped {
                    reason: "unsupported file type".to_string(),
                });
            }
            Err(e) => return Err(Error::Extraction(e)),
        };

        if document.text.trim().is_empty() {
            warn!("Skipping {}: no text extracted", document.file_name);
            return Ok(FileStatus::Skipped {
                reason: "no text extracted".to_string(),
            });
        }

        let chunks = self
            .chunker
            .chunk(&document.text, &self.config.chunk_config)
            .await?;
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();

        let mut stored = 0u64;
        let mut failed_batches = 0u64;
        for outcome in self
            .embedder
            .embed_batches(&texts, self.config.batch_size)
            .await
        {
            let vectors = match outcome.result {
                Ok(vectors) => vectors,
                Err(e) => {
                    warn!(
                        "Skipping chunks {:?} of {}: {}",
                        outcome.range, document.file_name, e
                    );
                    failed_batches += 1;

                    // A previous version of the file may still own these ids
                    let ids: Vec<String> = chunks[outcome.range.clone()]
                        .iter()
                        .map(|chunk| StoredRecord::id_for(&document.file_name, chunk.index))
                        .collect();
                    self.store.delete_ids(&ids).await?;
                    continue;
                }
            };

            let records: Vec<StoredRecord> = chunks[outcome.range.clone()]
                .iter()
                .zip(vectors)
                .map(|(chunk, vector)| {
                    StoredRecord::new(
                        &document.file_name,
                        chunk.index,
                        chunk.content.clone(),
                        vector,
                    )
                })
                .collect();
            self.store.upsert(&records).await?;
            stored += records.len() as u64;
        }

        // Drop chunks left over from a longer previous version of the file
        let last = u32::try_from(chunks.len()).unwrap_or(u32::MAX);
        let pruned = self.store.delete_source_from(&document.file_name, last).await?;
        if pruned > 0 {
            debug!("Pruned {} stale chunks of {}", pruned, document.file_name);
        }

        info!(
            "Ingested {} ({}, {} bytes): {} chunks stored",
            document.file_name, document.file_type, document.size_bytes, stored
        );
        Ok(FileStatus::Stored {
            chunks: stored,
            failed_batches,
        })
    }
}

/// Regular, non-hidden files directly inside `dir`, sorted by name.
///
/// Symlinks are followed; a link to a regular file counts as one.
async fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| Error::Other(format!("Failed to read directory {}: {e}", dir.display())))?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_name().to_string_lossy().starts_with('.') {
            debug!("Skipping hidden entry {:?}", path);
            continue;
        }
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => files.push(path),
            Ok(_) => debug!("Skipping {:?}: not a regular file", path),
            Err(e) => warn!("Skipping {:?}: {}", path, e),
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docrag_chunker::FixedOffsetChunker;
    use docrag_core::{
        DistanceMetric, EmbedError, Embedder, EmbeddingOutput, IndexSpec, StoreConfigError,
        StoreError,
    };
    use docrag_embed::HashingEmbedder;
    use docrag_store::MemoryStore;
    use tempfile::tempdir;

    const DIM: usize = 64;

    fn spec(model: &str) -> IndexSpec {
        IndexSpec {
            name: "test".to_string(),
            dimension: DIM,
            metric: DistanceMetric::Cosine,
            model: model.to_string(),
        }
    }

    async fn driver_with(
        embedder: Arc<dyn Embedder>,
        batch_size: usize,
    ) -> (IngestDriver, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new(spec(embedder.model_name())));
        store.init().await.unwrap();
        let driver = IngestDriver::new(
            Arc::new(ExtractorRegistry::with_defaults()),
            Arc::new(FixedOffsetChunker::new()),
            Arc::new(EmbedderPool::new(embedder, 2)),
            store.clone(),
            IngestConfig {
                batch_size,
                ..IngestConfig::default()
            },
        );
        (driver, store)
    }

    async fn driver() -> (IngestDriver, Arc<MemoryStore>) {
        driver_with(Arc::new(HashingEmbedder::new(DIM)), 100).await
    }

    fn text_of_len(n: usize) -> String {
        "abcdefghij".repeat(n / 10)
    }

    /// Fails any batch containing the marker.
    struct PoisonEmbedder(HashingEmbedder);

    #[async_trait]
    impl Embedder for PoisonEmbedder {
        fn model_name(&self) -> &str {
            self.0.model_name()
        }

        fn dimension(&self) -> usize {
            DIM
        }

        fn max_tokens(&self) -> usize {
            usize::MAX
        }

        async fn embed_text(
            &self,
            texts: &[&str],
        ) -> std::result::Result<Vec<EmbeddingOutput>, EmbedError> {
            if texts.iter().any(|t| t.contains("POISON")) {
                return Err(EmbedError::Request("upstream unavailable".to_string()));
            }
            self.0.embed_text(texts).await
        }
    }

    #[tokio::test]
    async fn test_unsupported_file_skipped() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("image.png"), [0x89, b'P', b'N', b'G']).unwrap();
        std::fs::write(temp.path().join("notes.txt"), "hello world").unwrap();

        let (driver, store) = driver().await;
        let report = driver.ingest_dir(temp.path()).await.unwrap();

        assert_eq!(report.files_processed, 1);
        assert_eq!(report.files_skipped, 1);
        assert_eq!(report.files_failed, 0);
        assert_eq!(report.chunks_stored, 1);

        let query = HashingEmbedder::new(DIM).embed_one("hello").embedding;
        let hits = store.query(&query, 10).await.unwrap();
        assert!(hits.iter().all(|h| h.metadata.source == "notes.txt"));
    }

    #[tokio::test]
    async fn test_chunks_stored_with_ids() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("doc.txt"), text_of_len(2500)).unwrap();

        let (driver, store) = driver().await;
        let report = driver.ingest_dir(temp.path()).await.unwrap();

        assert_eq!(report.chunks_stored, 3);
        assert_eq!(store.count().await.unwrap(), 3);

        let hits = store.query(&vec![1.0; DIM], 10).await.unwrap();
        let mut lens: Vec<(String, usize)> = hits
            .into_iter()
            .map(|h| (h.id, h.metadata.text.chars().count()))
            .collect();
        lens.sort();
        assert_eq!(
            lens,
            vec![
                ("doc.txt-0".to_string(), 1000),
                ("doc.txt-1".to_string(), 1000),
                ("doc.txt-2".to_string(), 500),
            ]
        );
    }

    #[tokio::test]
    async fn test_reingest_is_idempotent() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("a.md"), "# Title\n\nBody text.").unwrap();
        std::fs::write(temp.path().join("b.txt"), text_of_len(1500)).unwrap();

        let (driver, store) = driver().await;
        driver.ingest_dir(temp.path()).await.unwrap();
        let before = store.query(&vec![0.5; DIM], 10).await.unwrap();

        let report = driver.ingest_dir(temp.path()).await.unwrap();
        assert_eq!(report.files_processed, 2);
        assert_eq!(store.count().await.unwrap(), 3);
        assert_eq!(store.query(&vec![0.5; DIM], 10).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_shrunk_file_is_pruned() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("doc.txt");
        std::fs::write(&path, text_of_len(3000)).unwrap();

        let (driver, store) = driver().await;
        driver.ingest_dir(temp.path()).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 3);

        std::fs::write(&path, text_of_len(1000)).unwrap();
        driver.ingest_dir(temp.path()).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_batch_is_isolated() {
        let temp = tempdir().unwrap();
        let mut text = text_of_len(3000);
        text.replace_range(1200..1206, "POISON");
        std::fs::write(temp.path().join("doc.txt"), text).unwrap();

        let embedder = Arc::new(PoisonEmbedder(HashingEmbedder::new(DIM)));
        let (driver, store) = driver_with(embedder, 1).await;
        let report = driver.ingest_dir(temp.path()).await.unwrap();

        assert_eq!(report.files_processed, 1);
        assert_eq!(report.chunks_stored, 2);
        assert_eq!(report.batches_failed, 1);

        let ids: Vec<String> = store
            .query(&vec![1.0; DIM], 10)
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.id)
            .collect();
        assert!(!ids.contains(&"doc.txt-1".to_string()));
        assert_eq!(ids.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_batch_drops_previous_version() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("doc.txt");
        std::fs::write(&path, "a".repeat(3000)).unwrap();

        let embedder = Arc::new(PoisonEmbedder(HashingEmbedder::new(DIM)));
        let (driver, store) = driver_with(embedder, 1).await;
        driver.ingest_dir(temp.path()).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 3);

        let mut text = "b".repeat(3000);
        text.replace_range(1200..1206, "POISON");
        std::fs::write(&path, text).unwrap();
        let report = driver.ingest_dir(temp.path()).await.unwrap();

        assert_eq!(report.chunks_stored, 2);
        assert_eq!(report.batches_failed, 1);

        let hits = store.query(&vec![1.0; DIM], 10).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(!ids.contains(&"doc.txt-1"));
        assert!(hits.iter().all(|h| h.metadata.text.starts_with('b')));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_files_are_followed() {
        let docs = tempdir().unwrap();
        let elsewhere = tempdir().unwrap();
        let target = elsewhere.path().join("real.txt");
        std::fs::write(&target, "linked document").unwrap();
        std::os::unix::fs::symlink(&target, docs.path().join("link.txt")).unwrap();
        std::os::unix::fs::symlink(
            elsewhere.path().join("missing.txt"),
            docs.path().join("dangling.txt"),
        )
        .unwrap();

        let (driver, store) = driver().await;
        let report = driver.ingest_dir(docs.path()).await.unwrap();

        assert_eq!(report.files.len(), 1);
        assert_eq!(report.files[0].file_name, "link.txt");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_hidden_and_empty_files() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join(".secret.txt"), "hidden").unwrap();
        std::fs::write(temp.path().join("blank.txt"), "  \n\n ").unwrap();
        std::fs::create_dir(temp.path().join("nested")).unwrap();
        std::fs::write(temp.path().join("nested").join("deep.txt"), "deep").unwrap();

        let (driver, store) = driver().await;
        let report = driver.ingest_dir(temp.path()).await.unwrap();

        assert_eq!(report.files.len(), 1);
        assert_eq!(report.files_skipped, 1);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_file_counted_as_failed() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("bad.txt"), [0xff, 0xfe, 0xfd]).unwrap();
        std::fs::write(temp.path().join("good.txt"), "fine").unwrap();

        let (driver, _store) = driver().await;
        let report = driver.ingest_dir(temp.path()).await.unwrap();

        assert_eq!(report.files_failed, 1);
        assert_eq!(report.files_processed, 1);
        assert_eq!(report.files[0].file_name, "bad.txt");
        assert!(matches!(report.files[0].status, FileStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_aborts() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("a.txt"), "first").unwrap();
        std::fs::write(temp.path().join("b.txt"), "second").unwrap();

        let store = Arc::new(MemoryStore::new(IndexSpec {
            dimension: DIM * 2,
            ..spec("docrag/hashing-64")
        }));
        store.init().await.unwrap();
        let driver = IngestDriver::new(
            Arc::new(ExtractorRegistry::with_defaults()),
            Arc::new(FixedOffsetChunker::new()),
            Arc::new(EmbedderPool::new(Arc::new(HashingEmbedder::new(DIM)), 1)),
            store,
            IngestConfig::default(),
        );

        let err = driver.ingest_dir(temp.path()).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            err,
            Error::Store(StoreError::Config(
                StoreConfigError::DimensionMismatch { .. }
            ))
        ));
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let (driver, _store) = driver().await;
        let result = driver.ingest_dir(Path::new("/nonexistent/docrag/docs")).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_report_serializes() {
        let mut report = IngestReport::default();
        report.record(
            "a.txt".to_string(),
            FileStatus::Stored {
                chunks: 3,
                failed_batches: 0,
            },
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["files_processed"], 1);
        assert_eq!(json["files"][0]["status"], "stored");
        assert_eq!(json["files"][0]["chunks"], 3);
    }
}
