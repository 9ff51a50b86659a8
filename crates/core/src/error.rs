use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unsupported file format `{extension}`: {}", path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("text is neither valid UTF-8 nor GBK: {}", path.display())]
    UnsupportedEncoding { path: PathBuf },

    #[error("extraction failed for {}: {details}", path.display())]
    Extraction { path: PathBuf, details: String },

    #[error("no text recognized in {}", path.display())]
    NoTextRecognized { path: PathBuf },

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("document metadata invariant violated: {0}")]
    Metadata(String),

    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `stored` counts documents of this file already written by earlier batches.
    #[error("embedding failed for {} after {stored} documents were stored: {source}", path.display())]
    Embedding {
        path: PathBuf,
        stored: usize,
        #[source]
        source: EmbeddingError,
    },

    #[error("store rejected documents from {} after {stored} were stored: {source}", path.display())]
    Store {
        path: PathBuf,
        stored: usize,
        #[source]
        source: StoreError,
    },
}

impl IngestError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn extraction(path: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        Self::Extraction {
            path: path.into(),
            details: details.into(),
        }
    }

    /// Errors that indicate a bug or a bad startup configuration rather than a bad input file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Metadata(_))
    }

    /// Documents of the failing file that reached the store before the error.
    pub fn documents_stored(&self) -> usize {
        match self {
            Self::Embedding { stored, .. } | Self::Store { stored, .. } => *stored,
            _ => 0,
        }
    }

    /// Errors that mean "nothing to ingest here" rather than "ingestion broke".
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat { .. } | Self::NoTextRecognized { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search query is empty: {query:?}")]
    InvalidQuery { query: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("embedding query {query:?} failed: {source}")]
    Embedding {
        query: String,
        #[source]
        source: EmbeddingError,
    },

    #[error("store lookup for {query:?} failed: {source}")]
    Store {
        query: String,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding dimension {actual} != expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding backend failed: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("cannot write export to {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("export serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
