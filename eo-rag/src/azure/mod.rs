//! Azure AI Search backend.
//!
//! [`AzureSearchVectorStore`] satisfies the same [`SimilaritySearchBackend`]
//! contract as the in-memory store, delegating ranking to a managed search
//! index. It runs in one of two modes, decided by inspecting the index:
//!
//! - [`SearchMode::Vector`] when the index declares the configured vector
//!   field: a vector query. The service reports cosine matches as
//!   `1 / (2 - cos)`; scores are converted back to cosine similarity so the
//!   threshold means the same thing it does for the in-memory store.
//! - [`SearchMode::Keyword`] otherwise: a full-text query on the user's text,
//!   scored by the service's relevance score.
//!
//! Both modes return the same [`SearchResult`] shape. A failed capability
//! check falls back to keyword mode for that query and is retried next time.
//!
//! Document metadata is stored JSON-encoded in a single string field, with
//! `chunk_id`, `source_filename`, `title` and `eo_number` also promoted to
//! top-level fields.

mod client;
#[cfg(feature = "azure-search")]
mod rest;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

pub use client::SearchServiceClient;
#[cfg(feature = "azure-search")]
pub use rest::{DEFAULT_API_VERSION, RestSearchClient};

use self::types::{
    IndexAction, IndexActionKind, IndexBatch, IndexDefinition, IndexField, KnnParameters,
    SearchRequest, VectorAlgorithm, VectorProfile, VectorQuery, VectorSearch,
};
use crate::document::{Document, Metadata, SearchResult, keys, metadata_text, parse_metadata_json};
use crate::error::{RagError, Result};
use crate::vectorstore::{SearchQuery, SimilaritySearchBackend};

const BACKEND: &str = "AzureSearch";
const VECTOR_PROFILE: &str = "eo-vector-profile";
const VECTOR_ALGORITHM: &str = "eo-exhaustive-knn";

/// Top-level fields promoted out of the metadata for filtering and display.
const PROMOTED_FIELDS: [&str; 3] = [keys::SOURCE_FILENAME, keys::TITLE, keys::EO_NUMBER];

/// Settings for an [`AzureSearchVectorStore`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AzureSearchConfig {
    /// Name of the search index.
    pub index_name: String,
    /// Dimension of the vector field created by [`AzureSearchVectorStore::create_index`].
    pub embedding_dimension: usize,
    /// Whether `create_index` adds a vector field at all.
    pub vector_search: bool,
    pub vector_field: String,
    pub content_field: String,
    pub metadata_field: String,
    /// Maximum documents per upload request.
    pub upload_batch_size: usize,
}

impl AzureSearchConfig {
    /// Default settings for the named index. The default dimension (384)
    /// matches `all-MiniLM-L6-v2` embeddings.
    pub fn new(index_name: impl Into<String>) -> Self {
        Self {
            index_name: index_name.into(),
            embedding_dimension: 384,
            vector_search: true,
            vector_field: "embedding".to_string(),
            content_field: "content".to_string(),
            metadata_field: "metadata".to_string(),
            upload_batch_size: 1000,
        }
    }

    pub fn with_embedding_dimension(mut self, dimension: usize) -> Self {
        self.embedding_dimension = dimension;
        self
    }

    /// Create indexes without a vector field; every query then runs in
    /// keyword mode.
    pub fn without_vector_search(mut self) -> Self {
        self.vector_search = false;
        self
    }

    pub fn with_vector_field(mut self, name: impl Into<String>) -> Self {
        self.vector_field = name.into();
        self
    }

    pub fn with_content_field(mut self, name: impl Into<String>) -> Self {
        self.content_field = name.into();
        self
    }

    pub fn with_metadata_field(mut self, name: impl Into<String>) -> Self {
        self.metadata_field = name.into();
        self
    }

    pub fn with_upload_batch_size(mut self, size: usize) -> Self {
        self.upload_batch_size = size.max(1);
        self
    }

    fn select(&self) -> String {
        format!(
            "id,{},{},chunk_id,source_filename,title,eo_number",
            self.content_field, self.metadata_field
        )
    }
}

/// How the remote index can be queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// The index has a vector field of the given dimension.
    Vector { dimensions: usize },
    /// The index only supports full-text search.
    Keyword,
}

/// A [`SimilaritySearchBackend`] backed by an Azure AI Search index.
///
/// # Example
///
/// ```rust,ignore
/// use eo_rag::azure::{AzureSearchConfig, AzureSearchVectorStore, RestSearchClient};
///
/// let client = Arc::new(RestSearchClient::from_env()?);
/// let store = AzureSearchVectorStore::new(client, AzureSearchConfig::new("executive-orders"));
/// store.create_index(false).await?;
/// store.add_documents(&documents).await?;
/// ```
pub struct AzureSearchVectorStore {
    client: Arc<dyn SearchServiceClient>,
    config: AzureSearchConfig,
    mode: RwLock<Option<SearchMode>>,
}

impl AzureSearchVectorStore {
    /// Create a store over an existing service client.
    pub fn new(client: Arc<dyn SearchServiceClient>, config: AzureSearchConfig) -> Self {
        Self { client, config, mode: RwLock::new(None) }
    }

    /// Create a store talking to `endpoint` over HTTP.
    #[cfg(feature = "azure-search")]
    pub fn from_endpoint(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        config: AzureSearchConfig,
    ) -> Result<Self> {
        Ok(Self::new(Arc::new(RestSearchClient::new(endpoint, api_key)?), config))
    }

    pub fn config(&self) -> &AzureSearchConfig {
        &self.config
    }

    /// The definition [`create_index`](Self::create_index) submits.
    pub fn index_definition(&self) -> IndexDefinition {
        let mut fields = vec![
            IndexField::string("id").key().filterable(),
            IndexField::string(&self.config.content_field).searchable(),
            IndexField::string(&self.config.metadata_field),
            IndexField::string(keys::CHUNK_ID).searchable().filterable(),
            IndexField::string(keys::SOURCE_FILENAME).searchable().filterable(),
            IndexField::string(keys::TITLE).searchable().filterable(),
            IndexField::string(keys::EO_NUMBER).searchable().filterable(),
        ];

        let vector_search = self.config.vector_search.then(|| {
            fields.push(IndexField::vector(
                &self.config.vector_field,
                self.config.embedding_dimension,
                VECTOR_PROFILE,
            ));
            // Exhaustive KNN keeps remote results exact, like the local store.
            VectorSearch {
                algorithms: vec![VectorAlgorithm {
                    name: VECTOR_ALGORITHM.to_string(),
                    kind: "exhaustiveKnn".to_string(),
                    exhaustive_knn_parameters: Some(KnnParameters { metric: "cosine".to_string() }),
                }],
                profiles: vec![VectorProfile {
                    name: VECTOR_PROFILE.to_string(),
                    algorithm: VECTOR_ALGORITHM.to_string(),
                }],
            }
        });

        IndexDefinition { name: self.config.index_name.clone(), fields, vector_search }
    }

    /// Create the index. Returns `false` if it already existed and
    /// `recreate` was not requested.
    pub async fn create_index(&self, recreate: bool) -> Result<bool> {
        let exists = self.index_exists().await?;
        if exists {
            if !recreate {
                info!(index = %self.config.index_name, "index already exists");
                return Ok(false);
            }
            info!(index = %self.config.index_name, "deleting existing index");
            self.client.delete_index(&self.config.index_name).await?;
        }

        self.client.create_index(&self.index_definition()).await.inspect_err(|e| {
            error!(index = %self.config.index_name, error = %e, "error creating index");
        })?;
        self.refresh_search_mode().await;
        info!(index = %self.config.index_name, vector = self.config.vector_search, "index created");
        Ok(true)
    }

    async fn index_exists(&self) -> Result<bool> {
        let names = self.client.list_index_names().await?;
        Ok(names.iter().any(|n| *n == self.config.index_name))
    }

    /// Forget the cached capability check so the next query re-inspects the index.
    pub async fn refresh_search_mode(&self) {
        *self.mode.write().await = None;
    }

    /// Determine how the index can be queried.
    ///
    /// A successful inspection is cached; a failed one yields
    /// [`SearchMode::Keyword`] without caching.
    pub async fn search_mode(&self) -> SearchMode {
        if let Some(mode) = *self.mode.read().await {
            return mode;
        }

        match self.client.get_index(&self.config.index_name).await {
            Ok(index) => {
                let mode = match index.vector_dimensions(&self.config.vector_field) {
                    Some(dimensions) => SearchMode::Vector { dimensions },
                    None => SearchMode::Keyword,
                };
                debug!(index = %self.config.index_name, ?mode, "detected search capabilities");
                *self.mode.write().await = Some(mode);
                mode
            }
            Err(e) => {
                warn!(
                    index = %self.config.index_name,
                    error = %e,
                    "could not determine if index supports vector search, using keyword search"
                );
                SearchMode::Keyword
            }
        }
    }

    /// Upload documents, creating the index first if it does not exist.
    ///
    /// Documents with blank content are skipped. A document without an id
    /// uses its `chunk_id` metadata, else `doc-{n}`. Embeddings are sent only
    /// when the index has a vector field. Returns the number of documents the
    /// service accepted.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] before uploading anything if an
    /// embedding does not match the index's vector field, and propagates
    /// service failures.
    pub async fn add_documents(&self, documents: &[Document]) -> Result<usize> {
        if documents.is_empty() {
            warn!("no documents to add");
            return Ok(0);
        }

        if !self.index_exists().await? {
            info!(index = %self.config.index_name, "index does not exist, creating");
            self.create_index(false).await?;
        }
        let mode = self.search_mode().await;

        let mut actions = Vec::with_capacity(documents.len());
        for doc in documents {
            if doc.content.trim().is_empty() {
                warn!(document.id = ?doc.id, "document missing content, skipping");
                continue;
            }
            let position = actions.len();
            actions.push(IndexAction {
                action: IndexActionKind::Upload,
                document: self.encode(doc, position, mode)?,
            });
        }

        let mut uploaded = 0;
        let batch_size = self.config.upload_batch_size.max(1);
        let batch_count = actions.len().div_ceil(batch_size);
        for (batch_no, chunk) in actions.chunks(batch_size).enumerate() {
            let batch = IndexBatch { value: chunk.to_vec() };
            let results = self.client.index_documents(&self.config.index_name, &batch).await?;
            let succeeded = results.iter().filter(|r| r.status).count();
            for failed in results.iter().filter(|r| !r.status) {
                warn!(key = %failed.key, error = ?failed.error_message, "document rejected by index");
            }
            info!(batch = batch_no + 1, batch_count, succeeded, size = chunk.len(), "uploaded batch");
            uploaded += succeeded;
        }

        info!(index = %self.config.index_name, uploaded, "uploaded documents");
        Ok(uploaded)
    }

    fn encode(&self, doc: &Document, position: usize, mode: SearchMode) -> Result<Map<String, Value>> {
        let id = doc
            .id
            .clone()
            .or_else(|| doc.metadata_text(keys::CHUNK_ID))
            .unwrap_or_else(|| format!("doc-{position}"));

        let metadata_json = serde_json::to_string(&doc.metadata).map_err(|e| RagError::VectorStoreError {
            backend: BACKEND.to_string(),
            message: format!("failed to encode metadata for '{id}': {e}"),
        })?;

        let mut fields = Map::new();
        fields.insert(
            keys::CHUNK_ID.to_string(),
            Value::String(doc.metadata_text(keys::CHUNK_ID).unwrap_or_else(|| id.clone())),
        );
        for key in PROMOTED_FIELDS {
            fields.insert(key.to_string(), Value::String(doc.metadata_text(key).unwrap_or_default()));
        }
        fields.insert(self.config.content_field.clone(), Value::String(doc.content.clone()));
        fields.insert(self.config.metadata_field.clone(), Value::String(metadata_json));

        if let SearchMode::Vector { dimensions } = mode {
            if !doc.embedding.is_empty() {
                if doc.embedding.len() != dimensions {
                    return Err(RagError::DimensionMismatch {
                        expected: dimensions,
                        actual: doc.embedding.len(),
                    });
                }
                fields.insert(
                    self.config.vector_field.clone(),
                    Value::Array(doc.embedding.iter().map(|&x| Value::from(f64::from(x))).collect()),
                );
            }
        }

        fields.insert("id".to_string(), Value::String(id));
        Ok(fields)
    }

    /// Delete documents by id. Returns the number the service removed.
    pub async fn delete_documents(&self, ids: &[&str]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let batch = IndexBatch {
            value: ids
                .iter()
                .map(|id| {
                    let mut document = Map::new();
                    document.insert("id".to_string(), Value::String((*id).to_string()));
                    IndexAction { action: IndexActionKind::Delete, document }
                })
                .collect(),
        };
        let results = self.client.index_documents(&self.config.index_name, &batch).await?;
        let deleted = results.iter().filter(|r| r.status).count();
        info!(index = %self.config.index_name, deleted, requested = ids.len(), "deleted documents");
        Ok(deleted)
    }

    /// Rank indexed documents against a query.
    ///
    /// In vector mode scores are cosine similarities in `[-1, 1]` and
    /// `score_threshold` drops results below it; in keyword mode scores are
    /// the service's relevance scores and the threshold is ignored.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidInput`] if `k == 0`
    /// - [`RagError::DimensionMismatch`] if the query embedding does not
    ///   match the index's vector field
    /// - service failures, unchanged
    pub async fn similarity_search(
        &self,
        text: &str,
        query_embedding: &[f32],
        k: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Err(RagError::InvalidInput("k must be greater than zero".to_string()));
        }

        let mode = self.search_mode().await;
        let request = match mode {
            SearchMode::Vector { dimensions } => {
                if query_embedding.len() != dimensions {
                    return Err(RagError::DimensionMismatch {
                        expected: dimensions,
                        actual: query_embedding.len(),
                    });
                }
                debug!("using vector search");
                SearchRequest {
                    vector_queries: vec![VectorQuery {
                        kind: "vector".to_string(),
                        vector: query_embedding.to_vec(),
                        fields: self.config.vector_field.clone(),
                        k,
                    }],
                    select: self.config.select(),
                    top: k,
                    ..Default::default()
                }
            }
            SearchMode::Keyword => {
                debug!("vector search not available, using keyword search");
                let search = if text.trim().is_empty() { "*".to_string() } else { text.to_string() };
                SearchRequest { search: Some(search), select: self.config.select(), top: k, ..Default::default() }
            }
        };

        let hits = self.client.search(&self.config.index_name, &request).await.inspect_err(|e| {
            error!(index = %self.config.index_name, error = %e, "error in similarity search");
        })?;

        let mut results: Vec<SearchResult> = hits.iter().map(|hit| self.decode(hit, mode)).collect();
        results.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
        if let (SearchMode::Vector { .. }, Some(threshold)) = (mode, score_threshold) {
            results.retain(|r| r.similarity_score >= threshold);
        }
        results.truncate(k);

        info!(index = %self.config.index_name, count = results.len(), "retrieved documents from search");
        Ok(results)
    }

    fn decode(&self, hit: &Map<String, Value>, mode: SearchMode) -> SearchResult {
        let id = match hit.get("id") {
            Some(Value::String(s)) => Some(s.clone()),
            _ => None,
        };

        let mut metadata = match hit.get(&self.config.metadata_field) {
            Some(Value::String(encoded)) if !encoded.is_empty() => {
                parse_metadata_json(encoded).unwrap_or_else(|| {
                    warn!(document.id = ?id, "could not parse metadata JSON");
                    Metadata::new()
                })
            }
            Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            _ => Metadata::new(),
        };

        let promoted: Metadata = PROMOTED_FIELDS
            .iter()
            .filter_map(|key| hit.get(*key).map(|v| ((*key).to_string(), v.clone())))
            .collect();
        for key in PROMOTED_FIELDS {
            if metadata_text(&metadata, key).is_none() {
                if let Some(text) = metadata_text(&promoted, key) {
                    metadata.insert(key.to_string(), Value::String(text));
                }
            }
        }

        let content = match hit.get(&self.config.content_field) {
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        };
        let raw_score = hit.get("@search.score").and_then(Value::as_f64);
        let similarity_score = match mode {
            SearchMode::Vector { .. } => raw_score.map_or(-1.0, cosine_from_search_score),
            SearchMode::Keyword => raw_score.map(|s| s as f32).unwrap_or(0.0),
        };

        SearchResult { id, content, metadata, similarity_score }
    }
}

/// Invert the service's cosine score `1 / (2 - cos)` back to cosine
/// similarity, clamped to `[-1, 1]`. Unusable scores map to `-1.0`.
pub fn cosine_from_search_score(score: f64) -> f32 {
    if !score.is_finite() || score <= 0.0 {
        return -1.0;
    }
    ((2.0 - 1.0 / score).clamp(-1.0, 1.0) as f32) + 0.0
}

#[async_trait]
impl SimilaritySearchBackend for AzureSearchVectorStore {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn search(&self, query: &SearchQuery<'_>) -> Result<Vec<SearchResult>> {
        self.similarity_search(query.text, query.embedding, query.top_k, query.score_threshold).await
    }
}
