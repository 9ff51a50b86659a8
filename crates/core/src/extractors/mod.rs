//! Format-specific text extraction.
//!
//! Plain text and DOCX have a single decoding path. PDF and image extraction are ordered
//! [`StrategyChain`]s: each [`ExtractionStrategy`] is tried in turn until one yields enough
//! text, and every rejected attempt is kept as a warning on the result.

pub mod command;
pub mod docx;
pub mod image;
pub mod ocr;
pub mod pdf;
pub mod text;

use crate::error::IngestError;
use crate::models::{ExtractedText, ExtractionMethod, FileType, RawFile};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

pub use docx::extract_docx_paragraphs;
pub use image::TesseractStrategy;
pub use ocr::{OcrEndpointConfig, OcrEndpointStrategy};
pub use pdf::{LopdfStrategy, PdftotextStrategy};
pub use text::{decode_text, DecodedText};

#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Upper bound for each external command (pdftotext, tesseract) and OCR request.
    pub command_timeout: Duration,
    /// PDF output with fewer non-whitespace chars than this falls through to the next strategy.
    pub min_pdf_chars: usize,
    pub pdftotext_bin: String,
    pub tesseract_bin: String,
    /// Tesseract language list; must cover Latin and CJK scripts.
    pub ocr_languages: String,
    pub ocr_endpoint: Option<OcrEndpointConfig>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(30),
            min_pdf_chars: 16,
            pdftotext_bin: "pdftotext".to_string(),
            tesseract_bin: "tesseract".to_string(),
            ocr_languages: "chi_sim+eng".to_string(),
            ocr_endpoint: None,
        }
    }
}

#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn method(&self) -> ExtractionMethod;

    async fn extract(&self, raw: &RawFile) -> Result<String, IngestError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainOutput {
    pub text: String,
    pub method: ExtractionMethod,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainFailure {
    pub reasons: Vec<String>,
    /// At least one strategy ran cleanly but found (almost) no text.
    pub saw_blank_output: bool,
}

pub struct StrategyChain {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    min_chars: usize,
}

impl StrategyChain {
    pub fn new(min_chars: usize) -> Self {
        Self {
            strategies: Vec::new(),
            min_chars: min_chars.max(1),
        }
    }

    pub fn then(mut self, strategy: impl ExtractionStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|strategy| strategy.name()).collect()
    }

    pub async fn run(&self, raw: &RawFile) -> Result<ChainOutput, ChainFailure> {
        let mut reasons = Vec::new();
        let mut saw_blank_output = false;

        for strategy in &self.strategies {
            match strategy.extract(raw).await {
                Ok(text) => {
                    let visible = text.chars().filter(|c| !c.is_whitespace()).count();
                    if visible >= self.min_chars {
                        debug!(
                            path = %raw.path.display(),
                            strategy = strategy.name(),
                            chars = visible,
                            "extraction strategy succeeded"
                        );
                        return Ok(ChainOutput {
                            text,
                            method: strategy.method(),
                            warnings: reasons,
                        });
                    }
                    saw_blank_output = true;
                    reasons.push(format!(
                        "{}: only {visible} non-whitespace chars (minimum {})",
                        strategy.name(),
                        self.min_chars
                    ));
                }
                Err(error) => reasons.push(format!("{}: {error}", strategy.name())),
            }
        }

        if self.strategies.is_empty() {
            reasons.push("no extraction strategy configured".to_string());
        }

        Err(ChainFailure {
            reasons,
            saw_blank_output,
        })
    }
}

pub struct Extractors {
    pdf: StrategyChain,
    image: StrategyChain,
}

impl Extractors {
    pub fn new(config: &ExtractionConfig) -> Result<Self, IngestError> {
        let mut pdf = StrategyChain::new(config.min_pdf_chars)
            .then(LopdfStrategy)
            .then(PdftotextStrategy::new(
                &config.pdftotext_bin,
                config.command_timeout,
            ));
        let mut image = StrategyChain::new(1).then(TesseractStrategy::new(
            &config.tesseract_bin,
            &config.ocr_languages,
            config.command_timeout,
        ));

        if let Some(endpoint) = &config.ocr_endpoint {
            pdf = pdf.then(OcrEndpointStrategy::new(endpoint.clone(), config.command_timeout)?);
            image = image.then(OcrEndpointStrategy::new(endpoint.clone(), config.command_timeout)?);
        }

        Ok(Self::with_chains(pdf, image))
    }

    pub fn with_chains(pdf: StrategyChain, image: StrategyChain) -> Self {
        Self { pdf, image }
    }

    pub async fn extract(&self, raw: &RawFile) -> Result<ExtractedText, IngestError> {
        match raw.file_type {
            FileType::Text => {
                let decoded = decode_text(&raw.bytes).ok_or_else(|| {
                    IngestError::UnsupportedEncoding {
                        path: raw.path.clone(),
                    }
                })?;
                let warnings = if decoded.used_fallback {
                    vec![format!("decoded as {} after UTF-8 failed", decoded.encoding)]
                } else {
                    Vec::new()
                };
                Ok(extracted(raw, decoded.text, ExtractionMethod::Native, warnings))
            }
            FileType::Pdf => {
                let output = self
                    .pdf
                    .run(raw)
                    .await
                    .map_err(|failure| IngestError::extraction(&raw.path, failure.reasons.join("; ")))?;
                Ok(extracted(raw, output.text, output.method, output.warnings))
            }
            FileType::Docx => {
                let bytes = raw.bytes.clone();
                let paragraphs = tokio::task::spawn_blocking(move || extract_docx_paragraphs(&bytes))
                    .await
                    .map_err(|error| IngestError::extraction(&raw.path, format!("docx task failed: {error}")))?
                    .map_err(|details| IngestError::extraction(&raw.path, details))?;
                Ok(extracted(
                    raw,
                    paragraphs.join("\n"),
                    ExtractionMethod::Library,
                    Vec::new(),
                ))
            }
            FileType::Image => match self.image.run(raw).await {
                Ok(output) => Ok(extracted(raw, output.text, output.method, output.warnings)),
                Err(failure) if failure.saw_blank_output => Err(IngestError::NoTextRecognized {
                    path: raw.path.clone(),
                }),
                Err(failure) => Err(IngestError::extraction(&raw.path, failure.reasons.join("; "))),
            },
        }
    }
}

fn extracted(
    raw: &RawFile,
    text: String,
    method: ExtractionMethod,
    warnings: Vec<String>,
) -> ExtractedText {
    ExtractedText {
        source_path: raw.path.clone(),
        file_type: raw.file_type,
        text,
        extraction_method: method,
        warnings,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    /// Strategy returning a canned answer, for exercising chains without external tools.
    pub(crate) struct Canned {
        pub name: &'static str,
        pub method: ExtractionMethod,
        pub answer: Result<String, String>,
    }

    #[async_trait]
    impl ExtractionStrategy for Canned {
        fn name(&self) -> &'static str {
            self.name
        }

        fn method(&self) -> ExtractionMethod {
            self.method
        }

        async fn extract(&self, raw: &RawFile) -> Result<String, IngestError> {
            self.answer
                .clone()
                .map_err(|details| IngestError::extraction(&raw.path, details))
        }
    }

    pub(crate) fn canned(
        name: &'static str,
        method: ExtractionMethod,
        answer: Result<&str, &str>,
    ) -> Canned {
        Canned {
            name,
            method,
            answer: answer.map(str::to_string).map_err(str::to_string),
        }
    }

    pub(crate) fn minimal_docx(paragraphs: &[&str]) -> Vec<u8> {
        let body: String = paragraphs
            .iter()
            .map(|text| format!("<w:p><w:r><w:t xml:space=\"preserve\">{text}</w:t></w:r></w:p>"))
            .collect();
        let xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{body}</w:body></w:document>"
        );

        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
                .expect("start docx entry");
            zip.write_all(xml.as_bytes()).expect("write docx entry");
            zip.finish().expect("finish docx");
        }
        buf
    }

    /// Single-page PDF with a Helvetica text run, xref offsets computed so parsers accept it.
    pub(crate) fn minimal_pdf(phrase: &str) -> Vec<u8> {
        let content = format!("BT /F1 12 Tf 72 700 Td ({phrase}) Tj ET");
        let mut out = Vec::new();
        let mut offsets = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n");
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>".to_string(),
            format!("<< /Length {} >>\nstream\n{content}\nendstream", content.len()),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        ];
        for (index, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", index + 1).as_bytes());
        }
        let xref_start = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
        for offset in offsets {
            out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_start}\n%%EOF\n",
                objects.len() + 1
            )
            .as_bytes(),
        );
        out
    }

    fn raw(name: &str, file_type: FileType, bytes: &[u8]) -> RawFile {
        RawFile::new(format!("/fixtures/{name}"), file_type, bytes.to_vec())
    }

    fn stub_extractors(pdf: StrategyChain, image: StrategyChain) -> Extractors {
        Extractors::with_chains(pdf, image)
    }

    #[tokio::test]
    async fn chain_falls_through_to_first_sufficient_strategy() {
        let chain = StrategyChain::new(5)
            .then(canned("broken", ExtractionMethod::Library, Err("parse error")))
            .then(canned("sparse", ExtractionMethod::CommandLine, Ok("  ab ")))
            .then(canned("ocr", ExtractionMethod::Ocr, Ok("scanned page text")));

        let output = chain
            .run(&raw("a.pdf", FileType::Pdf, b""))
            .await
            .expect("third strategy should win");

        assert_eq!(output.method, ExtractionMethod::Ocr);
        assert_eq!(output.text, "scanned page text");
        assert_eq!(output.warnings.len(), 2);
        assert!(output.warnings[0].starts_with("broken:"));
        assert!(output.warnings[1].starts_with("sparse:"));
    }

    #[tokio::test]
    async fn chain_reports_every_failure() {
        let chain = StrategyChain::new(1)
            .then(canned("a", ExtractionMethod::Library, Err("first")))
            .then(canned("b", ExtractionMethod::CommandLine, Err("second")));

        let failure = chain
            .run(&raw("a.pdf", FileType::Pdf, b""))
            .await
            .expect_err("both strategies fail");

        assert_eq!(failure.reasons.len(), 2);
        assert!(!failure.saw_blank_output);
    }

    #[tokio::test]
    async fn plain_text_is_native_utf8() -> Result<(), IngestError> {
        let extractors = stub_extractors(StrategyChain::new(1), StrategyChain::new(1));
        let text = extractors
            .extract(&raw("a.txt", FileType::Text, "héllo wörld".as_bytes()))
            .await?;

        assert_eq!(text.text, "héllo wörld");
        assert_eq!(text.extraction_method, ExtractionMethod::Native);
        assert!(text.warnings.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn plain_text_falls_back_to_gbk() -> Result<(), IngestError> {
        let (encoded, _, had_errors) = encoding_rs::GBK.encode("汽车零部件研究");
        assert!(!had_errors);
        assert!(std::str::from_utf8(&encoded).is_err());

        let extractors = stub_extractors(StrategyChain::new(1), StrategyChain::new(1));
        let text = extractors
            .extract(&raw("gbk.txt", FileType::Text, &encoded))
            .await?;

        assert_eq!(text.text, "汽车零部件研究");
        assert_eq!(text.warnings.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn undecodable_text_is_unsupported_encoding() {
        let extractors = stub_extractors(StrategyChain::new(1), StrategyChain::new(1));
        let result = extractors
            .extract(&raw("bad.txt", FileType::Text, &[0xff, 0xfe, 0xff]))
            .await;

        assert!(matches!(result, Err(IngestError::UnsupportedEncoding { .. })));
    }

    #[tokio::test]
    async fn docx_paragraphs_are_joined_in_order() -> Result<(), IngestError> {
        let extractors = stub_extractors(StrategyChain::new(1), StrategyChain::new(1));
        let docx = minimal_docx(&["First paragraph", "Second paragraph"]);
        let text = extractors
            .extract(&raw("a.docx", FileType::Docx, &docx))
            .await?;

        assert_eq!(text.text, "First paragraph\nSecond paragraph");
        assert_eq!(text.extraction_method, ExtractionMethod::Library);
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_docx_is_an_extraction_error() {
        let extractors = stub_extractors(StrategyChain::new(1), StrategyChain::new(1));
        let result = extractors
            .extract(&raw("a.docx", FileType::Docx, b"not a zip"))
            .await;

        assert!(matches!(result, Err(IngestError::Extraction { .. })));
    }

    #[tokio::test]
    async fn pdf_library_path_preserves_text() -> Result<(), IngestError> {
        let extractors = stub_extractors(
            StrategyChain::new(4).then(LopdfStrategy),
            StrategyChain::new(1),
        );
        let pdf = minimal_pdf("hydraulic manual phrase");
        let text = extractors
            .extract(&raw("a.pdf", FileType::Pdf, &pdf))
            .await?;

        assert!(text.text.contains("hydraulic manual phrase"));
        assert_eq!(text.extraction_method, ExtractionMethod::Library);
        Ok(())
    }

    #[tokio::test]
    async fn unreadable_pdf_is_an_extraction_error() {
        let extractors = stub_extractors(
            StrategyChain::new(4).then(LopdfStrategy),
            StrategyChain::new(1),
        );
        let result = extractors
            .extract(&raw("a.pdf", FileType::Pdf, b"%PDF-1.4\n%broken"))
            .await;

        assert!(matches!(result, Err(IngestError::Extraction { .. })));
    }

    #[tokio::test]
    async fn image_with_blank_ocr_is_no_text_recognized() {
        let extractors = stub_extractors(
            StrategyChain::new(1),
            StrategyChain::new(1).then(canned("tesseract", ExtractionMethod::Ocr, Ok("\n \n"))),
        );
        let result = extractors
            .extract(&raw("a.png", FileType::Image, b"png"))
            .await;

        assert!(matches!(result, Err(IngestError::NoTextRecognized { .. })));
    }

    #[tokio::test]
    async fn image_ocr_text_is_tagged_ocr() -> Result<(), IngestError> {
        let extractors = stub_extractors(
            StrategyChain::new(1),
            StrategyChain::new(1).then(canned(
                "tesseract",
                ExtractionMethod::Ocr,
                Ok("停机时间 downtime"),
            )),
        );
        let text = extractors
            .extract(&raw("a.png", FileType::Image, b"png"))
            .await?;

        assert_eq!(text.text, "停机时间 downtime");
        assert_eq!(text.extraction_method, ExtractionMethod::Ocr);
        assert_eq!(text.file_type, FileType::Image);
        Ok(())
    }

    #[test]
    fn default_chains_are_ordered() -> Result<(), IngestError> {
        let extractors = Extractors::new(&ExtractionConfig::default())?;
        assert_eq!(extractors.pdf.strategy_names(), vec!["lopdf", "pdftotext"]);
        assert_eq!(extractors.image.strategy_names(), vec!["tesseract"]);
        Ok(())
    }
}
