use super::command::run_command;
use super::ExtractionStrategy;
use crate::error::IngestError;
use crate::models::{ExtractionMethod, RawFile};
use async_trait::async_trait;
use std::ffi::OsStr;
use std::time::Duration;

/// OCR through the `tesseract` CLI, writing recognized text to stdout.
#[derive(Debug, Clone)]
pub struct TesseractStrategy {
    program: String,
    languages: String,
    timeout: Duration,
}

impl TesseractStrategy {
    pub fn new(program: impl Into<String>, languages: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            languages: languages.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ExtractionStrategy for TesseractStrategy {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Ocr
    }

    async fn extract(&self, raw: &RawFile) -> Result<String, IngestError> {
        let args = [
            raw.path.as_os_str(),
            OsStr::new("stdout"),
            OsStr::new("-l"),
            OsStr::new(self.languages.as_str()),
        ];

        run_command(&self.program, args, self.timeout)
            .await
            .map(|text| text.trim().to_string())
            .map_err(|details| IngestError::extraction(&raw.path, details))
    }
}
