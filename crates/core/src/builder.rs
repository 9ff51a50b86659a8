use crate::error::IngestError;
use crate::models::{Chunk, Document, DocumentMetadata, ExtractedText};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::path::{Component, Path};

/// Filesystem facts captured once per source file and copied into every chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileFacts {
    pub file_size: u64,
    pub modified_at: Option<DateTime<Utc>>,
}

impl FileFacts {
    pub fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        Self {
            file_size: metadata.len(),
            modified_at: metadata.modified().ok().map(DateTime::<Utc>::from),
        }
    }
}

pub fn build_documents(
    extracted: &ExtractedText,
    chunks: &[Chunk],
    facts: &FileFacts,
) -> Result<Vec<Document>, IngestError> {
    let source_path = normalize_source_path(&extracted.source_path);
    if source_path.is_empty() {
        return Err(IngestError::Metadata(
            "extracted text has an empty source path".to_string(),
        ));
    }

    if chunks.is_empty() && !extracted.text.trim().is_empty() {
        return Err(IngestError::Metadata(format!(
            "chunker produced no chunks for non-empty text from {source_path}"
        )));
    }

    let file_name = extracted
        .source_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string();
    let file_extension = extracted
        .source_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let documents = chunks
        .iter()
        .map(|chunk| Document {
            id: make_document_id(&source_path, chunk.chunk_index),
            text: chunk.text.clone(),
            metadata: DocumentMetadata {
                source_path: source_path.clone(),
                file_name: file_name.clone(),
                file_type: extracted.file_type,
                file_extension: file_extension.clone(),
                extraction_method: extracted.extraction_method,
                chunk_index: chunk.chunk_index,
                total_chunks: chunks.len(),
                start_offset: chunk.start_offset,
                end_offset: chunk.end_offset,
                file_size: facts.file_size,
                modified_at: facts.modified_at,
            },
        })
        .collect();

    Ok(documents)
}

/// Lexical normalization: `.` components dropped, `/` separators. Does not touch the filesystem.
pub fn normalize_source_path(path: &Path) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut absolute = false;

    for component in path.components() {
        match component {
            Component::Prefix(prefix) => parts.push(prefix.as_os_str().to_string_lossy().into_owned()),
            Component::RootDir => absolute = true,
            Component::CurDir => {}
            Component::ParentDir => parts.push("..".to_string()),
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
        }
    }

    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

pub fn make_document_id(normalized_source_path: &str, chunk_index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized_source_path.as_bytes());
    hasher.update(b"#");
    hasher.update(chunk_index.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}
