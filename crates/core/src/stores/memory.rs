//! In-memory [`VectorStore`] for tests and one-shot runs.
//!
//! Records live in a `HashMap` keyed by document id behind a `RwLock`, so re-upserting an id
//! replaces it. Queries are brute-force cosine similarity over every stored vector.

use crate::error::StoreError;
use crate::models::{MetadataField, MetadataFilter, ScoreConvention};
use crate::store::{StoreHit, StoreRecord};
use crate::traits::VectorStore;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<String, StoreRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, StoreRecord>>, StoreError> {
        self.records
            .read()
            .map_err(|_| StoreError::Request("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, StoreRecord>>, StoreError> {
        self.records
            .write()
            .map_err(|_| StoreError::Request("in-memory store lock poisoned".to_string()))
    }
}

fn cosine_sim(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        f64::from(dot / (mag_a * mag_b))
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn upsert(&self, records: &[StoreRecord]) -> Result<(), StoreError> {
        let mut stored = self.write()?;
        for record in records {
            stored.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        n_results: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<StoreHit>, StoreError> {
        let stored = self.read()?;
        let mut hits: Vec<StoreHit> = stored
            .values()
            .filter(|record| filter.map_or(true, |filter| filter.matches(&record.metadata)))
            .map(|record| StoreHit {
                id: record.id.clone(),
                text: record.text.clone(),
                metadata: record.metadata.clone(),
                score: cosine_sim(vector, &record.vector),
            })
            .collect();

        // ties broken by id so results are stable across runs
        hits.sort_by(|left, right| {
            right
                .score
                .total_cmp(&left.score)
                .then_with(|| left.id.cmp(&right.id))
        });
        hits.truncate(n_results);
        Ok(hits)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.read()?.len() as u64)
    }

    async fn list_distinct(&self, field: MetadataField) -> Result<BTreeSet<String>, StoreError> {
        Ok(self
            .read()?
            .values()
            .map(|record| field.value_of(&record.metadata))
            .collect())
    }

    fn score_convention(&self) -> ScoreConvention {
        ScoreConvention::CosineSimilarity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentMetadata, ExtractionMethod, FileType};

    fn record(id: &str, file_type: FileType, vector: Vec<f32>) -> StoreRecord {
        StoreRecord {
            id: id.to_string(),
            vector,
            text: format!("text of {id}"),
            metadata: DocumentMetadata {
                source_path: format!("/docs/{id}"),
                file_name: id.to_string(),
                file_type,
                file_extension: String::new(),
                extraction_method: ExtractionMethod::Native,
                chunk_index: 0,
                total_chunks: 1,
                start_offset: 0,
                end_offset: 0,
                file_size: 0,
                modified_at: None,
            },
        }
    }

    #[tokio::test]
    async fn query_orders_by_descending_cosine() -> Result<(), StoreError> {
        let store = InMemoryStore::new();
        store
            .upsert(&[
                record("far", FileType::Text, vec![0.0, 1.0]),
                record("near", FileType::Text, vec![1.0, 0.1]),
                record("exact", FileType::Pdf, vec![1.0, 0.0]),
            ])
            .await?;

        let hits = store.query(&[1.0, 0.0], 10, None).await?;
        let ids: Vec<&str> = hits.iter().map(|hit| hit.id.as_str()).collect();
        assert_eq!(ids, vec!["exact", "near", "far"]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        Ok(())
    }

    #[tokio::test]
    async fn query_applies_filter_and_limit() -> Result<(), StoreError> {
        let store = InMemoryStore::new();
        store
            .upsert(&[
                record("a", FileType::Text, vec![1.0, 0.0]),
                record("b", FileType::Pdf, vec![1.0, 0.0]),
                record("c", FileType::Text, vec![0.5, 0.5]),
            ])
            .await?;

        let filter = MetadataFilter::file_type(FileType::Text);
        let hits = store.query(&[1.0, 0.0], 1, Some(&filter)).await?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
        Ok(())
    }

    #[tokio::test]
    async fn upsert_replaces_by_id_and_aggregates() -> Result<(), StoreError> {
        let store = InMemoryStore::new();
        store.upsert(&[record("a", FileType::Text, vec![1.0])]).await?;
        store.upsert(&[record("a", FileType::Pdf, vec![1.0])]).await?;
        store.upsert(&[record("b", FileType::Pdf, vec![1.0])]).await?;

        assert_eq!(store.count().await?, 2);
        let types = store.list_distinct(MetadataField::FileType).await?;
        assert_eq!(types.into_iter().collect::<Vec<_>>(), vec![".pdf".to_string()]);
        Ok(())
    }
}
