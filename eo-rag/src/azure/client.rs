//! Transport seam between the adapter and the search service.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::types::{IndexBatch, IndexDefinition, IndexingResult, SearchRequest};
use crate::error::Result;

/// The search-service operations the adapter relies on.
///
/// [`RestSearchClient`](super::RestSearchClient) implements this over HTTP;
/// tests substitute scripted implementations.
#[async_trait]
pub trait SearchServiceClient: Send + Sync {
    /// Names of every index in the service.
    async fn list_index_names(&self) -> Result<Vec<String>>;

    /// Fetch an index definition.
    async fn get_index(&self, name: &str) -> Result<IndexDefinition>;

    /// Create an index.
    async fn create_index(&self, index: &IndexDefinition) -> Result<()>;

    /// Delete an index and its documents.
    async fn delete_index(&self, name: &str) -> Result<()>;

    /// Apply a batch of upload/delete actions, returning one result per action.
    async fn index_documents(&self, index: &str, batch: &IndexBatch) -> Result<Vec<IndexingResult>>;

    /// Run a search and return the raw hits, best first.
    async fn search(&self, index: &str, request: &SearchRequest) -> Result<Vec<Map<String, Value>>>;
}
