//! Retrieval-augmented generation core for an executive-order assistant.
//!
//! This crate provides:
//! - An exact, brute-force cosine [`InMemoryVectorStore`] with JSON snapshots
//! - A [`Retriever`] that embeds a query, searches a backend, formats context,
//!   and optionally asks an [`LlmClient`] for an answer with citations
//! - An Azure AI Search backend with automatic keyword fallback
//!   ([`azure::AzureSearchVectorStore`])
//!
//! Embedding and LLM providers are traits; HTTP implementations sit behind
//! the `openai`, `azure-search` and `foundry` features.

pub mod azure;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod inmemory;
pub mod llm;
pub mod prompt;
pub mod retriever;
pub mod snapshot;
pub mod vectorstore;

#[cfg(feature = "foundry")]
pub mod foundry;
#[cfg(feature = "openai")]
pub mod openai;

pub use azure::{AzureSearchConfig, AzureSearchVectorStore, SearchMode, SearchServiceClient};
pub use config::{FieldNames, RagConfig, RagConfigBuilder};
pub use document::{Document, Metadata, RecordIssue, SearchResult, SourceCitation};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use inmemory::{InMemoryVectorStore, cosine_similarity};
pub use llm::{ChatMessage, ChatRole, LlmClient};
pub use prompt::{
    NO_RESULTS_MESSAGE, extract_source_documents, format_context, format_response_with_sources,
    generate_prompt,
};
pub use retriever::{QueryPreview, RagAnswer, Retriever, RetrieverBuilder};
pub use snapshot::{Snapshot, SnapshotMetadata};
pub use vectorstore::{SearchQuery, SimilaritySearchBackend};
