//! Retrieval adapter: the single entry point from the turn pipeline into
//! catalog search.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::catalog::CategoryVocabulary;
use crate::core::Item;
use crate::error::AgentError;
use crate::services::RetrievalBackend;

/// Wraps a [`RetrievalBackend`] with the shared category vocabulary and a
/// fixed result count.
///
/// The vocabulary is snapshotted per call, so a concurrent refresh never
/// blocks a search and never changes the list under an in-flight one.
#[derive(Clone)]
pub struct RetrievalAdapter {
    backend: Arc<dyn RetrievalBackend>,
    vocabulary: Arc<CategoryVocabulary>,
    top_k: usize,
}

impl RetrievalAdapter {
    /// Creates an adapter returning up to `top_k` items per query.
    pub fn new(
        backend: Arc<dyn RetrievalBackend>,
        vocabulary: Arc<CategoryVocabulary>,
        top_k: usize,
    ) -> Self {
        Self {
            backend,
            vocabulary,
            top_k: top_k.max(1),
        }
    }

    /// Runs the search and reports backend failures.
    ///
    /// The search tool uses this so it can tell the model what went wrong.
    pub async fn try_decompose_and_search(&self, text: &str) -> Result<Vec<Item>, AgentError> {
        let vocabulary = self.vocabulary.snapshot();
        let items = self
            .backend
            .decompose_and_search(text, self.top_k, &vocabulary)
            .await?;
        debug!(query = text, hits = items.len(), "retrieval complete");
        Ok(items)
    }

    /// Runs the search, treating any failure as zero items.
    pub async fn decompose_and_search(&self, text: &str) -> Vec<Item> {
        match self.try_decompose_and_search(text).await {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, query = text, "retrieval failed, treating as no results");
                Vec::new()
            }
        }
    }
}

impl std::fmt::Debug for RetrievalAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalAdapter")
            .field("top_k", &self.top_k)
            .finish_non_exhaustive()
    }
}
