//! Error types for the `eo-rag` crate.

use thiserror::Error;

/// Errors that can occur in retrieval and generation operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in a similarity search backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An embedding does not match the dimensionality established by the store.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The dimension every stored embedding has.
        expected: usize,
        /// The dimension of the offending embedding.
        actual: usize,
    },

    /// A single-item operation received unusable input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A snapshot could not be written or read.
    #[error("Snapshot error ({path}): {message}")]
    SnapshotError {
        /// The snapshot file involved.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// The LLM client failed to produce an answer.
    #[error("LLM error ({provider}): {message}")]
    LlmError {
        /// The LLM provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The LLM request did not complete within its deadline.
    #[error("LLM request to {provider} timed out after {timeout_secs}s")]
    LlmTimeout {
        /// The LLM provider that timed out.
        provider: String,
        /// The configured deadline in seconds.
        timeout_secs: u64,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error in the retrieval pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

impl RagError {
    /// Returns `true` for failures caused by a collaborator outside this crate
    /// (embedding provider, LLM, remote search service).
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingError { .. }
                | Self::VectorStoreError { .. }
                | Self::LlmError { .. }
                | Self::LlmTimeout { .. }
        )
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
