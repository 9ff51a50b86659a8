use crate::models::{Document, DocumentMetadata, SearchResult};

#[derive(Debug, Clone, PartialEq)]
pub struct StoreRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: DocumentMetadata,
    pub text: String,
}

impl StoreRecord {
    pub fn from_document(document: Document, vector: Vec<f32>) -> Self {
        Self {
            id: document.id,
            vector,
            metadata: document.metadata,
            text: document.text,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreHit {
    pub id: String,
    pub text: String,
    pub metadata: DocumentMetadata,
    pub score: f64,
}

impl StoreHit {
    pub fn into_result(self) -> SearchResult {
        SearchResult {
            id: self.id,
            text: self.text,
            metadata: self.metadata,
            similarity_score: self.score,
        }
    }
}
