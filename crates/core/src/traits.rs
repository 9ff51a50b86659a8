use crate::error::StoreError;
use crate::models::{MetadataField, MetadataFilter, ScoreConvention};
use crate::store::{StoreHit, StoreRecord};
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Nearest-neighbour store holding embedded documents.
///
/// Writes are upserts keyed by document id, last write wins. `query` returns hits ordered by
/// descending similarity, read according to [`VectorStore::score_convention`].
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, records: &[StoreRecord]) -> Result<(), StoreError>;

    async fn query(
        &self,
        vector: &[f32],
        n_results: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<StoreHit>, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;

    async fn list_distinct(&self, field: MetadataField) -> Result<BTreeSet<String>, StoreError>;

    fn score_convention(&self) -> ScoreConvention;
}
