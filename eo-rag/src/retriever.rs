//! Retrieval and answer orchestration.
//!
//! The [`Retriever`] composes an [`EmbeddingProvider`], a
//! [`SimilaritySearchBackend`] and, for answer generation, an [`LlmClient`].
//! Every step runs sequentially: embed, search, then optionally generate.
//!
//! # Example
//!
//! ```rust,ignore
//! use eo_rag::{InMemoryVectorStore, RagConfig, Retriever};
//!
//! let store = Arc::new(InMemoryVectorStore::new());
//! store.load("data/vector_store.json").await?;
//!
//! let retriever = Retriever::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .backend(store)
//!     .llm(Arc::new(my_llm))
//!     .build()?;
//!
//! let answer = retriever.process_query("What does EO 14110 require?", &[]).await?;
//! println!("{}", retriever.format_response_with_sources(&answer.answer, &answer.sources));
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::RagConfig;
use crate::document::{SearchResult, SourceCitation};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::llm::{ChatMessage, LlmClient};
use crate::prompt;
use crate::vectorstore::{SearchQuery, SimilaritySearchBackend};

/// The outcome of [`Retriever::query`]: what would be sent to an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPreview {
    pub query: String,
    pub documents: Vec<SearchResult>,
    pub prompt: String,
}

/// The outcome of [`Retriever::process_query`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagAnswer {
    /// The generated answer, or the fixed no-results message.
    pub answer: String,
    /// Citations for every retrieved document, in rank order.
    pub sources: Vec<SourceCitation>,
}

/// The retrieval orchestrator.
///
/// Holds shared handles to its collaborators and never mutates them.
/// Construct one via [`Retriever::builder()`].
pub struct Retriever {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    backend: Arc<dyn SimilaritySearchBackend>,
    llm: Option<Arc<dyn LlmClient>>,
}

impl Retriever {
    /// Create a new [`RetrieverBuilder`].
    pub fn builder() -> RetrieverBuilder {
        RetrieverBuilder::default()
    }

    /// Return a reference to the retriever configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the search backend.
    pub fn backend(&self) -> &Arc<dyn SimilaritySearchBackend> {
        &self.backend
    }

    /// Returns `true` if an LLM client is configured.
    pub fn can_generate(&self) -> bool {
        self.llm.is_some()
    }

    /// Retrieve the documents most relevant to `query`.
    ///
    /// `top_k` overrides the configured value; `None` or `Some(0)` uses the
    /// configuration. The configured similarity threshold always applies.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidInput`] if the query has no embeddable text
    /// - embedding and search failures, unchanged
    pub async fn retrieve(&self, query: &str, top_k: Option<usize>) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(RagError::InvalidInput("query has no embeddable text".to_string()));
        }
        let top_k = top_k.filter(|k| *k > 0).unwrap_or(self.config.top_k);

        // 1. Embed the query as a single-element batch
        let query_embedding = self.embed_query(query).await?;

        // 2. Search the backend
        let search = SearchQuery {
            text: query,
            embedding: &query_embedding,
            top_k,
            score_threshold: self.config.similarity_threshold,
        };
        let results = self.backend.search(&search).await.inspect_err(|e| {
            error!(backend = self.backend.name(), error = %e, "similarity search failed");
        })?;

        info!(backend = self.backend.name(), top_k, result_count = results.len(), "retrieval completed");
        Ok(results)
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let provider = self.embedding_provider.name();
        let embeddings = self.embedding_provider.embed_batch(&[query]).await.inspect_err(|e| {
            error!(provider, error = %e, "embedding failed during query");
        })?;
        embeddings.into_iter().next().ok_or_else(|| RagError::EmbeddingError {
            provider: provider.to_string(),
            message: "provider returned no embedding for the query".to_string(),
        })
    }

    /// Format retrieved documents into an LLM context block.
    /// See [`prompt::format_context`].
    pub fn format_context(&self, documents: &[SearchResult]) -> String {
        prompt::format_context(documents)
    }

    /// Build the full answering prompt. See [`prompt::generate_prompt`].
    pub fn generate_prompt(&self, query: &str, documents: &[SearchResult]) -> String {
        prompt::generate_prompt(query, documents)
    }

    /// Citation details for retrieved documents.
    /// See [`prompt::extract_source_documents`].
    pub fn extract_source_documents(&self, documents: &[SearchResult]) -> Vec<SourceCitation> {
        prompt::extract_source_documents(documents)
    }

    /// Append a numbered source list to an answer.
    /// See [`prompt::format_response_with_sources`].
    pub fn format_response_with_sources(&self, answer: &str, sources: &[SourceCitation]) -> String {
        prompt::format_response_with_sources(answer, sources)
    }

    /// Retrieve and build the prompt without calling an LLM.
    pub async fn query(&self, query: &str) -> Result<QueryPreview> {
        let documents = self.retrieve(query, None).await?;
        let prompt = self.generate_prompt(query, &documents);
        Ok(QueryPreview { query: query.to_string(), documents, prompt })
    }

    /// Answer `query` from retrieved context.
    ///
    /// When nothing is retrieved the fixed [`prompt::NO_RESULTS_MESSAGE`] is
    /// returned with no sources and the LLM is not called. Otherwise the LLM
    /// receives the formatted context as a single block, and the sources list
    /// every retrieved document whether or not the answer relies on it.
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigError`] if documents were retrieved but no LLM
    ///   client is configured
    /// - retrieval failures and LLM failures (including
    ///   [`RagError::LlmTimeout`]), unchanged
    pub async fn process_query(
        &self,
        query: &str,
        chat_history: &[ChatMessage],
    ) -> Result<RagAnswer> {
        let documents = self.retrieve(query, None).await?;
        if documents.is_empty() {
            info!("no relevant documents, skipping generation");
            return Ok(RagAnswer { answer: prompt::NO_RESULTS_MESSAGE.to_string(), sources: Vec::new() });
        }

        let llm = self
            .llm
            .as_ref()
            .ok_or_else(|| RagError::ConfigError("no LLM client configured".to_string()))?;

        let context = vec![self.format_context(&documents)];
        debug!(llm = llm.name(), documents = documents.len(), history = chat_history.len(), "generating answer");

        let answer = llm.generate(query, &context, chat_history).await.inspect_err(|e| {
            error!(llm = llm.name(), error = %e, "answer generation failed");
        })?;

        let sources = self.extract_source_documents(&documents);
        info!(source_count = sources.len(), "query answered");
        Ok(RagAnswer { answer, sources })
    }
}

/// Builder for constructing a [`Retriever`].
///
/// The embedding provider and backend are required; the configuration
/// defaults to [`RagConfig::default()`] and the LLM client is optional.
#[derive(Default)]
pub struct RetrieverBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    backend: Option<Arc<dyn SimilaritySearchBackend>>,
    llm: Option<Arc<dyn LlmClient>>,
}

impl RetrieverBuilder {
    /// Set the retriever configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the similarity search backend.
    pub fn backend(mut self, backend: Arc<dyn SimilaritySearchBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the LLM client used by [`Retriever::process_query`].
    pub fn llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Build the [`Retriever`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or
    /// the configured `top_k` is zero.
    pub fn build(self) -> Result<Retriever> {
        let config = self.config.unwrap_or_default();
        if config.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let backend =
            self.backend.ok_or_else(|| RagError::ConfigError("backend is required".to_string()))?;

        Ok(Retriever { config, embedding_provider, backend, llm: self.llm })
    }
}
