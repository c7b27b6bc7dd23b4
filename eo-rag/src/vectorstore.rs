//! Similarity search backend trait.

use async_trait::async_trait;

use crate::document::SearchResult;
use crate::error::Result;

/// A single retrieval request handed to a [`SimilaritySearchBackend`].
#[derive(Debug, Clone, Copy)]
pub struct SearchQuery<'a> {
    /// The raw query text. Backends without vector support search on it.
    pub text: &'a str,
    /// The query embedding.
    pub embedding: &'a [f32],
    /// Maximum number of results.
    pub top_k: usize,
    /// Minimum similarity score, applied before truncation to `top_k`.
    pub score_threshold: Option<f32>,
}

/// A backend that ranks stored documents against a query.
///
/// The retriever is written against this trait only. Every implementation
/// returns the same [`SearchResult`] shape, ordered by descending score and
/// at most `top_k` long, so callers cannot tell backends apart structurally.
///
/// # Example
///
/// ```rust,ignore
/// use eo_rag::{InMemoryVectorStore, SearchQuery, SimilaritySearchBackend};
///
/// let store = InMemoryVectorStore::new();
/// let results = store
///     .search(&SearchQuery { text: "", embedding: &query, top_k: 4, score_threshold: None })
///     .await?;
/// ```
#[async_trait]
pub trait SimilaritySearchBackend: Send + Sync {
    /// A short backend name used in logs and errors.
    fn name(&self) -> &str;

    /// Search for the documents most similar to the query.
    ///
    /// An empty result is not an error.
    async fn search(&self, query: &SearchQuery<'_>) -> Result<Vec<SearchResult>>;
}
