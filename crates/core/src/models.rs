use crate::chunking::ChunkingConfig;
use crate::extractors::ExtractionConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Formats the pipeline knows how to extract. Adding a variant forces every dispatch site to handle it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileType {
    #[serde(rename = ".txt")]
    Text,
    #[serde(rename = ".pdf")]
    Pdf,
    #[serde(rename = ".docx")]
    Docx,
    #[serde(rename = ".image")]
    Image,
}

pub const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "bmp", "tiff", "tif", "gif"];

impl FileType {
    pub const ALL: [FileType; 4] = [Self::Text, Self::Pdf, Self::Docx, Self::Image];

    pub fn from_extension(extension: &str) -> Option<Self> {
        let lowered = extension.trim_start_matches('.').to_ascii_lowercase();
        match lowered.as_str() {
            "txt" => Some(Self::Text),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            other if IMAGE_EXTENSIONS.contains(&other) => Some(Self::Image),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Label stored in document metadata and used by filters.
    pub fn label(self) -> &'static str {
        match self {
            Self::Text => ".txt",
            Self::Pdf => ".pdf",
            Self::Docx => ".docx",
            Self::Image => ".image",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.label() == label)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Bytes decoded directly, no parser involved.
    Native,
    /// In-process parser library.
    Library,
    /// External command-line extractor.
    CommandLine,
    Ocr,
}

impl ExtractionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Library => "library",
            Self::CommandLine => "command_line",
            Self::Ocr => "ocr",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct RawFile {
    pub path: PathBuf,
    pub file_type: FileType,
    pub bytes: Vec<u8>,
}

impl RawFile {
    pub fn new(path: impl Into<PathBuf>, file_type: FileType, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            file_type,
            bytes,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        let extension = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "txt" => "text/plain",
            "pdf" => "application/pdf",
            "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "bmp" => "image/bmp",
            "gif" => "image/gif",
            "tiff" | "tif" => "image/tiff",
            _ => "application/octet-stream",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    pub source_path: PathBuf,
    pub file_type: FileType,
    pub text: String,
    pub extraction_method: ExtractionMethod,
    pub warnings: Vec<String>,
}

/// A window over extracted text. Offsets count chars, end exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub chunk_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentMetadata {
    pub source_path: String,
    pub file_name: String,
    pub file_type: FileType,
    pub file_extension: String,
    pub extraction_method: ExtractionMethod,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub start_offset: usize,
    pub end_offset: usize,
    pub file_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MetadataField {
    FileType,
    SourcePath,
    FileName,
    ExtractionMethod,
}

impl MetadataField {
    pub fn key(self) -> &'static str {
        match self {
            Self::FileType => "file_type",
            Self::SourcePath => "source_path",
            Self::FileName => "file_name",
            Self::ExtractionMethod => "extraction_method",
        }
    }

    pub fn value_of(self, metadata: &DocumentMetadata) -> String {
        match self {
            Self::FileType => metadata.file_type.label().to_string(),
            Self::SourcePath => metadata.source_path.clone(),
            Self::FileName => metadata.file_name.clone(),
            Self::ExtractionMethod => metadata.extraction_method.as_str().to_string(),
        }
    }
}

/// Conjunction of exact-match conditions on document metadata. Unset fields match anything.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct MetadataFilter {
    pub file_type: Option<FileType>,
    pub source_path: Option<String>,
    pub file_name: Option<String>,
    pub extraction_method: Option<ExtractionMethod>,
}

impl MetadataFilter {
    pub fn file_type(file_type: FileType) -> Self {
        Self {
            file_type: Some(file_type),
            ..Self::default()
        }
    }

    pub fn with_source_path(mut self, source_path: impl Into<String>) -> Self {
        self.source_path = Some(source_path.into());
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_extraction_method(mut self, method: ExtractionMethod) -> Self {
        self.extraction_method = Some(method);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions().is_empty()
    }

    /// `(metadata key, expected value)` pairs, in a stable order.
    pub fn conditions(&self) -> Vec<(MetadataField, String)> {
        let mut conditions = Vec::new();
        if let Some(file_type) = self.file_type {
            conditions.push((MetadataField::FileType, file_type.label().to_string()));
        }
        if let Some(source_path) = &self.source_path {
            conditions.push((MetadataField::SourcePath, source_path.clone()));
        }
        if let Some(file_name) = &self.file_name {
            conditions.push((MetadataField::FileName, file_name.clone()));
        }
        if let Some(method) = self.extraction_method {
            conditions.push((MetadataField::ExtractionMethod, method.as_str().to_string()));
        }
        conditions
    }

    pub fn matches(&self, metadata: &DocumentMetadata) -> bool {
        self.conditions()
            .iter()
            .all(|(field, expected)| field.value_of(metadata) == *expected)
    }
}

/// How a store's similarity scores should be read. Scores are passed through untouched;
/// this tag travels with them so callers never have to assume a fixed range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScoreConvention {
    /// Cosine similarity in [-1, 1]; 1 means identical direction.
    CosineSimilarity,
    /// `1 - distance` as reported by the store; upper bound 1, no fixed lower bound.
    InvertedDistance,
}

impl ScoreConvention {
    pub fn describe(self) -> &'static str {
        match self {
            Self::CosineSimilarity => "cosine similarity in [-1, 1], higher is more similar",
            Self::InvertedDistance => "1 - distance, higher is more similar",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub id: String,
    pub text: String,
    pub metadata: DocumentMetadata,
    pub similarity_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionInfo {
    pub total_documents: u64,
    pub file_types: BTreeSet<String>,
    pub source_files: BTreeSet<String>,
    pub score_convention: ScoreConvention,
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub chunk_max_chars: usize,
    pub chunk_overlap_chars: usize,
    pub normalize_whitespace: bool,
    pub batch_size: usize,
    pub extraction: ExtractionConfig,
}

impl IngestionOptions {
    pub fn chunking(&self) -> ChunkingConfig {
        ChunkingConfig {
            max_chars: self.chunk_max_chars,
            overlap_chars: self.chunk_overlap_chars,
        }
    }
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_max_chars: 1_000,
            chunk_overlap_chars: 200,
            normalize_whitespace: true,
            batch_size: 64,
            extraction: ExtractionConfig::default(),
        }
    }
}
