//! JSON artifact for a ranked result set.
//!
//! One export is one file holding the query, when it ran, how to read the scores and the
//! results in the order the search returned them.

use crate::error::ExportError;
use crate::models::{DocumentMetadata, FileType, ScoreConvention, SearchResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportRecord {
    pub query: String,
    pub exported_at: DateTime<Utc>,
    pub score_convention: ScoreConvention,
    pub results: Vec<ExportedResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportedResult {
    /// 1-based position in the result list.
    pub rank: usize,
    pub id: String,
    pub source_path: String,
    pub file_type: FileType,
    pub similarity_score: f64,
    pub text_excerpt: String,
    pub metadata: DocumentMetadata,
}

impl ExportRecord {
    pub fn new(query: &str, results: &[SearchResult], score_convention: ScoreConvention) -> Self {
        let results = results
            .iter()
            .enumerate()
            .map(|(position, result)| ExportedResult {
                rank: position + 1,
                id: result.id.clone(),
                source_path: result.metadata.source_path.clone(),
                file_type: result.metadata.file_type,
                similarity_score: result.similarity_score,
                text_excerpt: result.text.clone(),
                metadata: result.metadata.clone(),
            })
            .collect();

        Self {
            query: query.to_string(),
            exported_at: Utc::now(),
            score_convention,
            results,
        }
    }
}

/// Writes `results` to `destination` as pretty-printed JSON, replacing any existing file.
/// The parent directory must already exist.
pub fn export_results(
    query: &str,
    results: &[SearchResult],
    score_convention: ScoreConvention,
    destination: &Path,
) -> Result<ExportRecord, ExportError> {
    let record = ExportRecord::new(query, results, score_convention);
    let payload = serde_json::to_string_pretty(&record)?;

    fs::write(destination, payload).map_err(|source| ExportError::Io {
        path: destination.to_path_buf(),
        source,
    })?;

    info!(
        query,
        results = record.results.len(),
        destination = %destination.display(),
        "exported search results"
    );
    Ok(record)
}

pub fn read_export(path: &Path) -> Result<ExportRecord, ExportError> {
    let raw = fs::read_to_string(path).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&raw)?)
}
