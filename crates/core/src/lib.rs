pub mod builder;
pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod export;
pub mod extractors;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod store;
pub mod stores;
pub mod traits;

pub use builder::{build_documents, make_document_id, normalize_source_path, FileFacts};
pub use chunking::{chunk_text, normalize_whitespace, ChunkingConfig, Chunks};
pub use embeddings::{CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{EmbeddingError, ExportError, IngestError, SearchError, StoreError};
pub use export::{export_results, read_export, ExportRecord, ExportedResult};
pub use extractors::{ExtractionConfig, ExtractionStrategy, Extractors, OcrEndpointConfig, StrategyChain};
pub use ingest::{
    discover_supported_files, CancellationFlag, Discovery, FileReport, FileStatus, IngestionReport,
};
pub use models::{
    Chunk, CollectionInfo, Document, DocumentMetadata, ExtractedText, ExtractionMethod, FileType,
    IngestionOptions, MetadataField, MetadataFilter, RawFile, ScoreConvention, SearchResult,
};
pub use orchestrator::KnowledgeBase;
pub use store::{StoreHit, StoreRecord};
pub use stores::{InMemoryStore, QdrantStore};
pub use traits::VectorStore;
