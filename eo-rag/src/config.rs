//! Configuration for retrieval.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Names of the fields a flat document record stores its parts under.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldNames {
    /// Field holding the embedding array.
    pub embeddings_field: String,
    /// Field holding the text content.
    pub content_field: String,
    /// Field holding the metadata object.
    pub metadata_field: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            embeddings_field: "embedding".to_string(),
            content_field: "content".to_string(),
            metadata_field: "metadata".to_string(),
        }
    }
}

/// Configuration parameters for the retriever.
///
/// Record field names belong to the store that reads the records; see
/// [`InMemoryVectorStore::with_fields`](crate::InMemoryVectorStore::with_fields).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Number of top results to return from similarity search.
    pub top_k: usize,
    /// Minimum similarity score for results. `None` disables filtering.
    pub similarity_threshold: Option<f32>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self { top_k: 4, similarity_threshold: Some(0.4) }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the number of top results to return from similarity search.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity threshold for filtering results.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = Some(threshold);
        self
    }

    /// Disable threshold filtering.
    pub fn no_similarity_threshold(mut self) -> Self {
        self.config.similarity_threshold = None;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `top_k == 0`
    /// - `similarity_threshold` lies outside `[-1, 1]`
    pub fn build(self) -> Result<RagConfig> {
        if self.config.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if let Some(threshold) = self.config.similarity_threshold {
            if !(-1.0..=1.0).contains(&threshold) {
                return Err(RagError::ConfigError(format!(
                    "similarity_threshold ({threshold}) must lie in [-1, 1]"
                )));
            }
        }
        Ok(self.config)
    }
}
