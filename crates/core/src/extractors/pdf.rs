use super::command::run_command;
use super::ExtractionStrategy;
use crate::error::IngestError;
use crate::models::{ExtractionMethod, RawFile};
use async_trait::async_trait;
use lopdf::Document;
use std::ffi::OsStr;
use std::time::Duration;
use tracing::debug;

/// In-process extraction with lopdf, page by page in page order.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfStrategy;

#[async_trait]
impl ExtractionStrategy for LopdfStrategy {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Library
    }

    async fn extract(&self, raw: &RawFile) -> Result<String, IngestError> {
        let bytes = raw.bytes.clone();
        let pages = tokio::task::spawn_blocking(move || extract_page_texts(&bytes))
            .await
            .map_err(|error| IngestError::extraction(&raw.path, format!("pdf task failed: {error}")))?
            .map_err(|details| IngestError::extraction(&raw.path, details))?;

        Ok(pages.join("\n\n"))
    }
}

/// Non-blank page texts, ordered by page number.
pub fn extract_page_texts(bytes: &[u8]) -> Result<Vec<String>, String> {
    let document = Document::load_mem(bytes).map_err(|error| format!("pdf parse error: {error}"))?;

    let mut pages = Vec::new();
    for page_no in document.get_pages().into_keys() {
        match document.extract_text(&[page_no]) {
            Ok(text) if !text.trim().is_empty() => pages.push(text.trim_end().to_string()),
            Ok(_) => {}
            Err(error) => debug!(page = page_no, %error, "skipping unreadable pdf page"),
        }
    }

    Ok(pages)
}

/// Poppler's `pdftotext`, used when the embedded text layer confuses lopdf.
#[derive(Debug, Clone)]
pub struct PdftotextStrategy {
    program: String,
    timeout: Duration,
}

impl PdftotextStrategy {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ExtractionStrategy for PdftotextStrategy {
    fn name(&self) -> &'static str {
        "pdftotext"
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::CommandLine
    }

    async fn extract(&self, raw: &RawFile) -> Result<String, IngestError> {
        let args = [
            OsStr::new("-enc"),
            OsStr::new("UTF-8"),
            raw.path.as_os_str(),
            OsStr::new("-"),
        ];
        let stdout = run_command(&self.program, args, self.timeout)
            .await
            .map_err(|details| IngestError::extraction(&raw.path, details))?;

        // pdftotext separates pages with form feeds
        let pages: Vec<&str> = stdout
            .split('\u{000c}')
            .map(str::trim_end)
            .filter(|page| !page.trim().is_empty())
            .collect();
        Ok(pages.join("\n\n"))
    }
}
