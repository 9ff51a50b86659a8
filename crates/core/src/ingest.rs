use crate::builder::{build_documents, FileFacts};
use crate::chunking::{chunk_text, normalize_whitespace};
use crate::embeddings::Embedder;
use crate::error::{EmbeddingError, IngestError};
use crate::models::{Chunk, Document, ExtractedText, FileType, RawFile};
use crate::orchestrator::KnowledgeBase;
use crate::store::StoreRecord;
use crate::traits::VectorStore;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Discovery {
    pub files: Vec<PathBuf>,
    /// Entries the walk could not read, with the reason. Files below an unreadable
    /// directory are missing from `files`.
    pub unreadable: Vec<(PathBuf, String)>,
}

/// Every file under `root` whose extension maps to a [`FileType`], sorted for a stable order.
/// Symlinks are followed; dangling links and loops land in `unreadable`.
pub fn discover_supported_files(root: &Path) -> Discovery {
    let mut discovery = Discovery::default();

    for item in WalkDir::new(root).follow_links(true) {
        let entry = match item {
            Ok(entry) => entry,
            Err(error) => {
                let path = error
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.to_path_buf());
                warn!(path = %path.display(), %error, "cannot walk directory entry");
                discovery.unreadable.push((path, error.to_string()));
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        if FileType::from_path(entry.path()).is_some() {
            discovery.files.push(entry.path().to_path_buf());
        }
    }

    discovery.files.sort_unstable();
    discovery.unreadable.sort_unstable();
    discovery
}

/// Shared stop signal for a directory run. Checked between files, so the file in flight
/// always finishes.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Ingested,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub status: FileStatus,
    /// Documents written to the store, including those from batches before a failure.
    pub documents: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionReport {
    pub root: PathBuf,
    pub files: Vec<FileReport>,
    /// Set when the run stopped early; files after the stop point are absent from `files`.
    pub cancelled: bool,
}

impl IngestionReport {
    fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            files: Vec::new(),
            cancelled: false,
        }
    }

    pub fn documents_added(&self) -> usize {
        self.files.iter().map(|file| file.documents).sum()
    }

    pub fn count(&self, status: FileStatus) -> usize {
        self.files.iter().filter(|file| file.status == status).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileReport> {
        self.files
            .iter()
            .filter(|file| file.status == FileStatus::Failed)
    }

    fn record(&mut self, path: PathBuf, status: FileStatus, documents: usize, error: Option<String>) {
        self.files.push(FileReport {
            path,
            status,
            documents,
            error,
        });
    }
}

impl<E, S> KnowledgeBase<E, S>
where
    E: Embedder,
    S: VectorStore,
{
    /// Extracts, chunks, embeds and stores one file. Returns the number of documents written;
    /// zero means the file held no text.
    ///
    /// Document ids are derived from the path and chunk index, so re-ingesting a file replaces
    /// its documents instead of duplicating them.
    pub async fn ingest_file(&self, path: &Path) -> Result<usize, IngestError> {
        let documents = self.prepare_documents(path).await?;
        if documents.is_empty() {
            debug!(path = %path.display(), "no text to ingest");
            return Ok(0);
        }
        self.store_documents(path, documents).await
    }

    /// Ingests every supported file under `root`, one at a time.
    ///
    /// Per-file failures are recorded in the report and do not stop the run. Configuration and
    /// metadata errors abort it, since every later file would hit them too.
    pub async fn ingest_directory(
        &self,
        root: &Path,
        cancel: &CancellationFlag,
    ) -> Result<IngestionReport, IngestError> {
        let metadata = tokio::fs::metadata(root)
            .await
            .map_err(|error| IngestError::io(root, error))?;
        if !metadata.is_dir() {
            return Err(IngestError::io(
                root,
                io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
            ));
        }

        let discovery = discover_supported_files(root);
        info!(
            root = %root.display(),
            files = discovery.files.len(),
            unreadable = discovery.unreadable.len(),
            "starting directory ingestion"
        );

        let mut report = IngestionReport::new(root);
        for (path, reason) in discovery.unreadable {
            report.record(path, FileStatus::Failed, 0, Some(reason));
        }
        for path in discovery.files {
            if cancel.is_cancelled() {
                warn!(
                    root = %root.display(),
                    processed = report.files.len(),
                    "ingestion cancelled"
                );
                report.cancelled = true;
                break;
            }

            match self.ingest_file(&path).await {
                Ok(0) => {
                    report.record(path, FileStatus::Skipped, 0, Some("no extractable text".to_string()))
                }
                Ok(documents) => report.record(path, FileStatus::Ingested, documents, None),
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) if error.is_skip() => {
                    info!(path = %path.display(), %error, "skipping file");
                    report.record(path, FileStatus::Skipped, 0, Some(error.to_string()));
                }
                Err(error) => {
                    let stored = error.documents_stored();
                    warn!(path = %path.display(), stored, %error, "failed to ingest file");
                    report.record(path, FileStatus::Failed, stored, Some(error.to_string()));
                }
            }
        }

        info!(
            root = %root.display(),
            ingested = report.count(FileStatus::Ingested),
            skipped = report.count(FileStatus::Skipped),
            failed = report.count(FileStatus::Failed),
            documents = report.documents_added(),
            cancelled = report.cancelled,
            "directory ingestion finished"
        );
        Ok(report)
    }

    async fn prepare_documents(&self, path: &Path) -> Result<Vec<Document>, IngestError> {
        let file_type = FileType::from_path(path).ok_or_else(|| IngestError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: path
                .extension()
                .map(|extension| extension.to_string_lossy().to_string())
                .unwrap_or_default(),
        })?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|error| IngestError::io(path, error))?;
        let facts = tokio::fs::metadata(path)
            .await
            .map(|metadata| FileFacts::from_metadata(&metadata))
            .map_err(|error| IngestError::io(path, error))?;

        let extracted = self
            .extractors
            .extract(&RawFile::new(path, file_type, bytes))
            .await?;
        for warning in &extracted.warnings {
            debug!(path = %path.display(), warning = %warning, "extraction fallback");
        }

        let extracted = if self.options.normalize_whitespace {
            ExtractedText {
                text: normalize_whitespace(&extracted.text),
                ..extracted
            }
        } else {
            extracted
        };

        let chunks: Vec<Chunk> = chunk_text(&extracted.text, &self.options.chunking())?.collect();
        debug!(
            path = %path.display(),
            method = %extracted.extraction_method,
            chunks = chunks.len(),
            "chunked file"
        );

        build_documents(&extracted, &chunks, &facts)
    }

    async fn store_documents(
        &self,
        path: &Path,
        documents: Vec<Document>,
    ) -> Result<usize, IngestError> {
        let mut stored = 0usize;

        for batch in documents.chunks(self.options.batch_size) {
            let texts: Vec<String> = batch.iter().map(|document| document.text.clone()).collect();
            let vectors = self
                .embedder
                .embed_batch(&texts)
                .map_err(|source| IngestError::Embedding {
                    path: path.to_path_buf(),
                    stored,
                    source,
                })?;

            if vectors.len() != batch.len() {
                return Err(IngestError::Embedding {
                    path: path.to_path_buf(),
                    stored,
                    source: EmbeddingError::Backend(format!(
                        "returned {} vectors for {} texts",
                        vectors.len(),
                        batch.len()
                    )),
                });
            }

            let records: Vec<StoreRecord> = batch
                .iter()
                .cloned()
                .zip(vectors)
                .map(|(document, vector)| StoreRecord::from_document(document, vector))
                .collect();

            self.store
                .upsert(&records)
                .await
                .map_err(|source| IngestError::Store {
                    path: path.to_path_buf(),
                    stored,
                    source,
                })?;
            stored += records.len();
        }

        info!(path = %path.display(), documents = stored, "ingested file");
        Ok(stored)
    }
}
