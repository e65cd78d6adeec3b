//! Self-querying retrieval: decompose free text, then run a filtered search.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::filter::DecomposedQuery;
use crate::core::Item;
use crate::error::AgentError;
use crate::services::RetrievalBackend;

/// Turns free text into a semantic query plus a metadata filter.
#[async_trait]
pub trait QueryDecomposer: Send + Sync {
    /// Decomposes `text`. Category values in the filter must come from
    /// `vocabulary`.
    async fn decompose(
        &self,
        text: &str,
        vocabulary: &[String],
    ) -> Result<DecomposedQuery, AgentError>;
}

/// Decomposer that applies no filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughDecomposer;

#[async_trait]
impl QueryDecomposer for PassthroughDecomposer {
    async fn decompose(
        &self,
        text: &str,
        _vocabulary: &[String],
    ) -> Result<DecomposedQuery, AgentError> {
        Ok(DecomposedQuery::unfiltered(text))
    }
}

/// An index that supports filtered similarity search.
#[async_trait]
pub trait FilteredIndex: Send + Sync {
    /// Returns up to `k` items matching `query.filter`, most relevant first.
    async fn search(&self, query: &DecomposedQuery, k: usize) -> Result<Vec<Item>, AgentError>;
}

/// [`RetrievalBackend`] built from a decomposer and a filtered index.
///
/// A decomposition failure degrades to an unfiltered search over the raw
/// text rather than failing the lookup.
pub struct SelfQueryRetriever {
    decomposer: Arc<dyn QueryDecomposer>,
    index: Arc<dyn FilteredIndex>,
}

impl SelfQueryRetriever {
    /// Creates a retriever.
    pub fn new(decomposer: Arc<dyn QueryDecomposer>, index: Arc<dyn FilteredIndex>) -> Self {
        Self { decomposer, index }
    }
}

impl std::fmt::Debug for SelfQueryRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelfQueryRetriever").finish_non_exhaustive()
    }
}

#[async_trait]
impl RetrievalBackend for SelfQueryRetriever {
    async fn decompose_and_search(
        &self,
        query: &str,
        k: usize,
        vocabulary: &[String],
    ) -> Result<Vec<Item>, AgentError> {
        let mut decomposed = match self.decomposer.decompose(query, vocabulary).await {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, query, "query decomposition failed, searching unfiltered");
                DecomposedQuery::unfiltered(query)
            }
        };
        if decomposed.query.trim().is_empty() {
            decomposed.query = query.trim().to_string();
        }
        debug!(
            semantic = %decomposed.query,
            conditions = decomposed.filter.conditions.len(),
            k,
            "running filtered search"
        );
        self.index.search(&decomposed, k).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::filter::{Bound, Condition, MetadataFilter};
    use std::sync::Mutex;

    struct FailingDecomposer;

    #[async_trait]
    impl QueryDecomposer for FailingDecomposer {
        async fn decompose(&self, text: &str, _v: &[String]) -> Result<DecomposedQuery, AgentError> {
            Err(AgentError::ResponseParse {
                message: "bad json".to_string(),
                content: text.to_string(),
            })
        }
    }

    struct FixedDecomposer(DecomposedQuery);

    #[async_trait]
    impl QueryDecomposer for FixedDecomposer {
        async fn decompose(&self, _t: &str, _v: &[String]) -> Result<DecomposedQuery, AgentError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct RecordingIndex {
        seen: Mutex<Vec<DecomposedQuery>>,
    }

    #[async_trait]
    impl FilteredIndex for RecordingIndex {
        async fn search(&self, query: &DecomposedQuery, _k: usize) -> Result<Vec<Item>, AgentError> {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(query.clone());
            }
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_decomposition_failure_searches_unfiltered() {
        let index = Arc::new(RecordingIndex::default());
        let retriever = SelfQueryRetriever::new(Arc::new(FailingDecomposer), index.clone());
        let result = retriever.decompose_and_search(" gaming monitor ", 5, &[]).await;
        assert!(result.is_ok());
        let seen = index.seen.lock().map(|s| s.clone()).unwrap_or_default();
        assert_eq!(seen, vec![DecomposedQuery::unfiltered("gaming monitor")]);
    }

    #[tokio::test]
    async fn test_empty_semantic_query_uses_raw_text() {
        let fixed = DecomposedQuery {
            query: String::new(),
            filter: MetadataFilter {
                conditions: vec![Condition::SalePrice {
                    bound: Bound::Lte(50.0),
                }],
            },
        };
        let index = Arc::new(RecordingIndex::default());
        let retriever = SelfQueryRetriever::new(Arc::new(FixedDecomposer(fixed)), index.clone());
        let _ = retriever.decompose_and_search("anything under $50", 5, &[]).await;
        let seen = index.seen.lock().map(|s| s.clone()).unwrap_or_default();
        assert_eq!(seen[0].query, "anything under $50");
        assert_eq!(seen[0].filter.conditions.len(), 1);
    }
}
