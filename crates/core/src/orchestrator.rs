use crate::embeddings::Embedder;
use crate::error::{IngestError, SearchError, StoreError};
use crate::extractors::Extractors;
use crate::models::{
    CollectionInfo, IngestionOptions, MetadataField, MetadataFilter, ScoreConvention, SearchResult,
};
use crate::store::StoreHit;
use crate::traits::VectorStore;
use std::cmp::Ordering;
use tracing::{info, warn};

/// Handle over one document collection: the embedder, the store and the ingestion settings.
/// Built once and passed by reference to every ingest and search call.
pub struct KnowledgeBase<E, S>
where
    E: Embedder,
    S: VectorStore,
{
    pub(crate) embedder: E,
    pub(crate) store: S,
    pub(crate) extractors: Extractors,
    pub(crate) options: IngestionOptions,
}

impl<E, S> KnowledgeBase<E, S>
where
    E: Embedder,
    S: VectorStore,
{
    /// Validates the options up front; a bad chunking setup never reaches ingestion.
    pub fn new(embedder: E, store: S, options: IngestionOptions) -> Result<Self, IngestError> {
        let extractors = Extractors::new(&options.extraction)?;
        Self::with_extractors(embedder, store, options, extractors)
    }

    pub fn with_extractors(
        embedder: E,
        store: S,
        options: IngestionOptions,
        extractors: Extractors,
    ) -> Result<Self, IngestError> {
        options.chunking().validate()?;
        if options.batch_size == 0 {
            return Err(IngestError::Configuration(
                "batch_size must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            embedder,
            store,
            extractors,
            options,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn options(&self) -> &IngestionOptions {
        &self.options
    }

    /// How `similarity_score` values returned by [`KnowledgeBase::search`] should be read.
    pub fn score_convention(&self) -> ScoreConvention {
        self.store.score_convention()
    }

    /// Nearest documents to `query`, most similar first, at most `n_results` of them.
    ///
    /// Results keep the store's order and scores. An out-of-order answer is logged, not fixed.
    pub async fn search(
        &self,
        query: &str,
        n_results: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::InvalidQuery {
                query: query.to_string(),
            });
        }
        if n_results == 0 {
            return Err(SearchError::InvalidArgument(format!(
                "n_results must be positive for query {query:?}"
            )));
        }

        let vector = self
            .embedder
            .embed(query)
            .map_err(|source| SearchError::Embedding {
                query: query.to_string(),
                source,
            })?;

        let hits = self
            .store
            .query(&vector, n_results, filter)
            .await
            .map_err(|source| SearchError::Store {
                query: query.to_string(),
                source,
            })?;

        if let Some(position) = first_order_violation(&hits) {
            warn!(
                query,
                position,
                "store returned results out of similarity order; passing them through unchanged"
            );
        }

        let mut results: Vec<SearchResult> = hits.into_iter().map(StoreHit::into_result).collect();
        if results.len() > n_results {
            warn!(
                query,
                returned = results.len(),
                requested = n_results,
                "store over-returned; truncating"
            );
            results.truncate(n_results);
        }

        info!(query, results = results.len(), "search completed");
        Ok(results)
    }

    pub async fn collection_info(&self) -> Result<CollectionInfo, StoreError> {
        let total_documents = self.store.count().await?;
        let file_types = self.store.list_distinct(MetadataField::FileType).await?;
        let source_files = self.store.list_distinct(MetadataField::SourcePath).await?;

        Ok(CollectionInfo {
            total_documents,
            file_types,
            source_files,
            score_convention: self.store.score_convention(),
        })
    }
}

/// Index of the first hit scoring higher than its predecessor.
fn first_order_violation(hits: &[StoreHit]) -> Option<usize> {
    hits.windows(2)
        .position(|pair| pair[1].score.total_cmp(&pair[0].score) == Ordering::Greater)
        .map(|position| position + 1)
}
