use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use docvault_core::{
    export_results, CancellationFlag, CharacterNgramEmbedder, Embedder, ExtractionConfig,
    FileStatus, FileType, IngestionOptions, KnowledgeBase, MetadataFilter, OcrEndpointConfig,
    QdrantStore,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docvault", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Qdrant base URL
    #[arg(long, env = "DOCVAULT_QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant collection
    #[arg(long, env = "DOCVAULT_COLLECTION", default_value = "documents")]
    collection: String,

    /// Qdrant API key
    #[arg(long, env = "DOCVAULT_QDRANT_API_KEY", hide_env_values = true)]
    qdrant_api_key: Option<String>,

    /// Timeout in seconds for each Qdrant request.
    #[arg(long, env = "DOCVAULT_QDRANT_TIMEOUT", default_value = "30")]
    qdrant_timeout: u64,

    /// Maximum characters per chunk.
    #[arg(long, env = "DOCVAULT_CHUNK_SIZE", default_value = "1000")]
    chunk_size: usize,

    /// Characters shared by consecutive chunks.
    #[arg(long, env = "DOCVAULT_CHUNK_OVERLAP", default_value = "200")]
    chunk_overlap: usize,

    /// Documents embedded and written per store request.
    #[arg(long, env = "DOCVAULT_BATCH_SIZE", default_value = "64")]
    batch_size: usize,

    /// Timeout in seconds for pdftotext, tesseract and OCR requests.
    #[arg(long, env = "DOCVAULT_COMMAND_TIMEOUT", default_value = "30")]
    command_timeout: u64,

    /// Tesseract language list.
    #[arg(long, env = "DOCVAULT_OCR_LANGUAGES", default_value = "chi_sim+eng")]
    ocr_languages: String,

    /// Optional OCR service used after the local tools fail.
    #[arg(long, env = "LLM_OCR_ENDPOINT")]
    ocr_endpoint: Option<String>,

    #[arg(long, env = "LLM_OCR_API_KEY", hide_env_values = true)]
    ocr_api_key: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a file, or every supported file under a directory.
    Ingest {
        #[arg(long)]
        path: PathBuf,
    },
    /// Semantic search over ingested documents.
    Search {
        #[arg(long)]
        query: String,
        /// Number of results to return.
        #[arg(long, default_value = "5")]
        top_k: usize,
        /// Restrict to one file type: .txt, .pdf, .docx or .image
        #[arg(long)]
        file_type: Option<String>,
        /// Restrict to one source file.
        #[arg(long)]
        source_path: Option<String>,
        /// Also write the results to this JSON file.
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Show collection statistics.
    Info,
}

impl Cli {
    fn ingestion_options(&self) -> IngestionOptions {
        let ocr_endpoint = self
            .ocr_endpoint
            .as_deref()
            .and_then(|endpoint| OcrEndpointConfig::new(endpoint, self.ocr_api_key.as_deref()));

        IngestionOptions {
            chunk_max_chars: self.chunk_size,
            chunk_overlap_chars: self.chunk_overlap,
            batch_size: self.batch_size,
            extraction: ExtractionConfig {
                command_timeout: Duration::from_secs(self.command_timeout),
                ocr_languages: self.ocr_languages.clone(),
                ocr_endpoint,
                ..ExtractionConfig::default()
            },
            ..IngestionOptions::default()
        }
    }

    fn filter(file_type: Option<&str>, source_path: Option<String>) -> anyhow::Result<Option<MetadataFilter>> {
        let mut filter = MetadataFilter::default();
        if let Some(label) = file_type {
            let parsed = FileType::from_label(label)
                .or_else(|| FileType::from_extension(label))
                .with_context(|| format!("unknown file type `{label}`"))?;
            filter = MetadataFilter::file_type(parsed);
        }
        if let Some(source_path) = source_path {
            filter = filter.with_source_path(source_path);
        }
        Ok((!filter.is_empty()).then_some(filter))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let embedder = CharacterNgramEmbedder::default();
    let store = QdrantStore::new(
        &cli.qdrant_url,
        cli.collection.clone(),
        cli.qdrant_api_key.clone(),
        embedder.dimensions(),
        Duration::from_secs(cli.qdrant_timeout),
    )?;
    store
        .ensure_collection()
        .await
        .with_context(|| format!("cannot prepare qdrant collection `{}`", cli.collection))?;

    let knowledge_base = KnowledgeBase::new(embedder, store, cli.ingestion_options())?;
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        collection = %cli.collection,
        "docvault boot"
    );

    match cli.command {
        Command::Ingest { path } => {
            if path.is_file() {
                let documents = knowledge_base.ingest_file(&path).await?;
                println!("{documents} documents ingested from {}", path.display());
                return Ok(());
            }

            let cancel = CancellationFlag::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received; stopping after the current file");
                    on_signal.cancel();
                }
            });

            let report = knowledge_base.ingest_directory(&path, &cancel).await?;
            for failure in report.failures() {
                warn!(
                    path = %failure.path.display(),
                    reason = failure.error.as_deref().unwrap_or_default(),
                    "file not ingested"
                );
            }

            println!(
                "{} documents from {} files ({} skipped, {} failed){}",
                report.documents_added(),
                report.count(FileStatus::Ingested),
                report.count(FileStatus::Skipped),
                report.count(FileStatus::Failed),
                if report.cancelled { ", cancelled" } else { "" }
            );
            if report.cancelled {
                bail!("ingestion of {} was cancelled", path.display());
            }
        }
        Command::Search {
            query,
            top_k,
            file_type,
            source_path,
            export,
        } => {
            let filter = Cli::filter(file_type.as_deref(), source_path)?;
            let results = knowledge_base
                .search(&query, top_k, filter.as_ref())
                .await?;
            let convention = knowledge_base.score_convention();

            println!("query: {query}");
            println!("scores: {}", convention.describe());
            for (position, result) in results.iter().enumerate() {
                println!(
                    "[{}] score={:.4} type={} chunk={}/{} source={}",
                    position + 1,
                    result.similarity_score,
                    result.metadata.file_type,
                    result.metadata.chunk_index + 1,
                    result.metadata.total_chunks,
                    result.metadata.source_path
                );
                println!("  {}", result.text);
            }

            if let Some(destination) = export {
                export_results(&query, &results, convention, &destination)?;
                println!("exported {} results to {}", results.len(), destination.display());
            }
        }
        Command::Info => {
            let info = knowledge_base.collection_info().await?;
            println!("collection: {}", cli.collection);
            println!("documents: {}", info.total_documents);
            println!(
                "file types: {}",
                info.file_types.into_iter().collect::<Vec<_>>().join(", ")
            );
            println!("source files: {}", info.source_files.len());
            for source in &info.source_files {
                println!("  {source}");
            }
            println!("scores: {}", info.score_convention.describe());
        }
    }

    Ok(())
}
