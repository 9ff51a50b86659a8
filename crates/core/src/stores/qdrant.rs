use crate::error::StoreError;
use crate::models::{DocumentMetadata, MetadataField, MetadataFilter, ScoreConvention};
use crate::store::{StoreHit, StoreRecord};
use crate::traits::VectorStore;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

const BACKEND: &str = "qdrant";
const SCROLL_PAGE: usize = 256;

/// Qdrant over its REST API. The collection uses cosine distance, so scores are cosine
/// similarities.
pub struct QdrantStore {
    base: Url,
    collection: String,
    api_key: Option<String>,
    client: Client,
    vector_size: usize,
}

impl QdrantStore {
    pub fn new(
        endpoint: &str,
        collection: impl Into<String>,
        api_key: Option<String>,
        vector_size: usize,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let mut base = Url::parse(endpoint)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            base,
            collection: collection.into(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            client: Client::builder().timeout(timeout).build()?,
            vector_size,
        })
    }

    fn url(&self, suffix: &str) -> Result<Url, StoreError> {
        let path = if suffix.is_empty() {
            format!("collections/{}", self.collection)
        } else {
            format!("collections/{}/{suffix}", self.collection)
        };
        Ok(self.base.join(&path)?)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("api-key", key),
            None => request,
        }
    }

    async fn post_json(&self, suffix: &str, body: &Value) -> Result<Value, StoreError> {
        let request = self.client.post(self.url(suffix)?).json(body);
        let response = self.authorize(request).send().await?;
        read_success(response).await
    }

    /// Creates the collection with cosine distance unless it already exists.
    pub async fn ensure_collection(&self) -> Result<(), StoreError> {
        let response = self
            .authorize(self.client.get(self.url("")?))
            .send()
            .await?;

        if response.status() == StatusCode::OK {
            return Ok(());
        }
        if response.status() != StatusCode::NOT_FOUND {
            return Err(backend_error(format!(
                "collection lookup returned {}",
                response.status()
            )));
        }

        let request = self.client.put(self.url("")?).json(&json!({
            "vectors": { "size": self.vector_size, "distance": "Cosine" }
        }));
        read_success(self.authorize(request).send().await?).await?;
        info!(collection = %self.collection, size = self.vector_size, "created qdrant collection");
        Ok(())
    }
}

async fn read_success(response: reqwest::Response) -> Result<Value, StoreError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(backend_error(format!("{status}: {body}")));
    }
    Ok(response.json().await?)
}

fn backend_error(details: String) -> StoreError {
    StoreError::BackendResponse {
        backend: BACKEND.to_string(),
        details,
    }
}

/// Qdrant only accepts integers or UUIDs as point ids, so the document id is hashed into a UUID
/// and kept verbatim in the payload.
pub fn point_id(document_id: &str) -> Uuid {
    let digest = Sha256::digest(document_id.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

pub fn build_filter(filter: &MetadataFilter) -> Option<Value> {
    let must: Vec<Value> = filter
        .conditions()
        .into_iter()
        .map(|(field, value)| json!({ "key": field.key(), "match": { "value": value } }))
        .collect();

    if must.is_empty() {
        None
    } else {
        Some(json!({ "must": must }))
    }
}

fn payload_for(record: &StoreRecord) -> Result<Value, StoreError> {
    let mut payload = match serde_json::to_value(&record.metadata)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    payload.insert("document_id".into(), Value::String(record.id.clone()));
    payload.insert("text".into(), Value::String(record.text.clone()));
    Ok(Value::Object(payload))
}

fn hit_from_point(point: &Value) -> Result<StoreHit, StoreError> {
    let payload = point
        .pointer("/payload")
        .cloned()
        .ok_or_else(|| backend_error("search hit without payload".to_string()))?;
    let id = payload
        .pointer("/document_id")
        .and_then(Value::as_str)
        .ok_or_else(|| backend_error("search hit without document_id".to_string()))?
        .to_string();
    let text = payload
        .pointer("/text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let score = point.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0);
    let metadata: DocumentMetadata = serde_json::from_value(payload)?;

    Ok(StoreHit {
        id,
        text,
        metadata,
        score,
    })
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn upsert(&self, records: &[StoreRecord]) -> Result<(), StoreError> {
        let points = records
            .iter()
            .map(|record| {
                if record.vector.len() != self.vector_size {
                    return Err(StoreError::Request(format!(
                        "embedding dimension {} != {}",
                        record.vector.len(),
                        self.vector_size
                    )));
                }

                Ok(json!({
                    "id": point_id(&record.id).to_string(),
                    "vector": record.vector,
                    "payload": payload_for(record)?,
                }))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        if points.is_empty() {
            return Ok(());
        }

        let mut url = self.url("points")?;
        url.set_query(Some("wait=true"));
        let request = self.client.put(url).json(&json!({ "points": points }));
        read_success(self.authorize(request).send().await?).await?;
        debug!(collection = %self.collection, points = records.len(), "upserted qdrant points");
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        n_results: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<StoreHit>, StoreError> {
        if vector.len() != self.vector_size {
            return Err(StoreError::Request(format!(
                "query vector dim {} is not {}",
                vector.len(),
                self.vector_size
            )));
        }

        let mut body = json!({
            "vector": vector,
            "limit": n_results,
            "with_payload": true,
        });
        if let Some(filter) = filter.and_then(build_filter) {
            body["filter"] = filter;
        }

        let parsed = self.post_json("points/search", &body).await?;
        parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .map(|hits| hits.iter().map(hit_from_point).collect::<Result<Vec<_>, _>>())
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let parsed = self
            .post_json("points/count", &json!({ "exact": true }))
            .await?;
        parsed
            .pointer("/result/count")
            .and_then(Value::as_u64)
            .ok_or_else(|| backend_error("count response without result.count".to_string()))
    }

    async fn list_distinct(&self, field: MetadataField) -> Result<BTreeSet<String>, StoreError> {
        let mut values = BTreeSet::new();
        let mut offset = Value::Null;

        loop {
            let body = json!({
                "limit": SCROLL_PAGE,
                "offset": offset,
                "with_payload": [field.key()],
                "with_vector": false,
            });
            let parsed = self.post_json("points/scroll", &body).await?;

            let points = parsed
                .pointer("/result/points")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for point in &points {
                if let Some(value) = point
                    .pointer(&format!("/payload/{}", field.key()))
                    .and_then(Value::as_str)
                {
                    values.insert(value.to_string());
                }
            }

            match parsed.pointer("/result/next_page_offset") {
                Some(next) if !next.is_null() => offset = next.clone(),
                _ => break,
            }
        }

        Ok(values)
    }

    fn score_convention(&self) -> ScoreConvention {
        ScoreConvention::CosineSimilarity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractionMethod, FileType};

    #[test]
    fn point_ids_are_stable_uuids() {
        let first = point_id("abc#0");
        assert_eq!(first, point_id("abc#0"));
        assert_ne!(first, point_id("abc#1"));
    }

    #[test]
    fn filter_translates_to_must_matches() {
        let filter = MetadataFilter::file_type(FileType::Text)
            .with_extraction_method(ExtractionMethod::Native);
        let built = build_filter(&filter).expect("non-empty filter");

        assert_eq!(
            built,
            json!({ "must": [
                { "key": "file_type", "match": { "value": ".txt" } },
                { "key": "extraction_method", "match": { "value": "native" } },
            ]})
        );
        assert!(build_filter(&MetadataFilter::default()).is_none());
    }

    #[test]
    fn urls_are_scoped_to_the_collection() -> Result<(), StoreError> {
        let store = QdrantStore::new(
            "http://localhost:6333",
            "kb",
            None,
            8,
            Duration::from_secs(5),
        )?;
        assert_eq!(
            store.url("points/search")?.as_str(),
            "http://localhost:6333/collections/kb/points/search"
        );
        assert_eq!(store.url("")?.as_str(), "http://localhost:6333/collections/kb");
        Ok(())
    }

    #[test]
    fn payload_round_trips_into_a_hit() -> Result<(), StoreError> {
        let record = StoreRecord {
            id: "doc-1".to_string(),
            vector: vec![0.0; 4],
            text: "coil downtime".to_string(),
            metadata: DocumentMetadata {
                source_path: "/kb/a.txt".to_string(),
                file_name: "a.txt".to_string(),
                file_type: FileType::Text,
                file_extension: "txt".to_string(),
                extraction_method: ExtractionMethod::Native,
                chunk_index: 2,
                total_chunks: 3,
                start_offset: 10,
                end_offset: 20,
                file_size: 99,
                modified_at: None,
            },
        };

        let point = json!({ "id": point_id(&record.id).to_string(), "score": 0.75, "payload": payload_for(&record)? });
        let hit = hit_from_point(&point)?;

        assert_eq!(hit.id, "doc-1");
        assert_eq!(hit.text, "coil downtime");
        assert_eq!(hit.metadata, record.metadata);
        assert!((hit.score - 0.75).abs() < f64::EPSILON);
        Ok(())
    }

    #[tokio::test]
    async fn stalled_backend_times_out() -> Result<(), Box<dyn std::error::Error>> {
        // accepts connections through the backlog but never answers
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let endpoint = format!("http://{}", listener.local_addr()?);
        let store = QdrantStore::new(&endpoint, "kb", None, 8, Duration::from_millis(200))?;

        let outcome = tokio::time::timeout(Duration::from_secs(10), store.count()).await?;

        assert!(matches!(outcome, Err(StoreError::Http(_))));
        drop(listener);
        Ok(())
    }

    #[test]
    fn hit_without_document_id_is_rejected() {
        let point = json!({ "score": 0.5, "payload": { "text": "orphan", "file_type": ".txt" } });
        assert!(matches!(
            hit_from_point(&point),
            Err(StoreError::BackendResponse { .. })
        ));
    }
}
