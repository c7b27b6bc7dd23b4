//! JSON snapshot format for the in-memory vector store.
//!
//! ```json
//! {
//!   "documents": [{"id": "...", "content": "...", "metadata": {...}, "embedding": [...]}],
//!   "metadata": {
//!     "count": 1,
//!     "created_at": "2025-01-20T12:00:00+00:00",
//!     "embeddings_field": "embedding",
//!     "content_field": "content",
//!     "metadata_field": "metadata"
//!   }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::FieldNames;
use crate::document::Document;
use crate::error::{RagError, Result};

/// A serialized vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Flat document records.
    #[serde(default)]
    pub documents: Vec<Value>,
    /// Header describing the records.
    #[serde(default)]
    pub metadata: SnapshotMetadata,
}

/// Snapshot header.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Number of records in the snapshot.
    #[serde(default)]
    pub count: usize,
    /// When the snapshot was written (RFC 3339).
    #[serde(default)]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embeddings_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_field: Option<String>,
}

impl Snapshot {
    /// Encode documents into a snapshot stamped with the current time.
    pub fn from_documents(documents: &[Document], fields: &FieldNames) -> Self {
        Self {
            documents: documents.iter().map(|d| d.to_record(fields)).collect(),
            metadata: SnapshotMetadata {
                count: documents.len(),
                created_at: chrono::Utc::now().to_rfc3339(),
                embeddings_field: Some(fields.embeddings_field.clone()),
                content_field: Some(fields.content_field.clone()),
                metadata_field: Some(fields.metadata_field.clone()),
            },
        }
    }

    /// The field names the snapshot declares, with `fallback` filling any gap.
    pub fn field_names(&self, fallback: &FieldNames) -> FieldNames {
        FieldNames {
            embeddings_field: self
                .metadata
                .embeddings_field
                .clone()
                .unwrap_or_else(|| fallback.embeddings_field.clone()),
            content_field: self
                .metadata
                .content_field
                .clone()
                .unwrap_or_else(|| fallback.content_field.clone()),
            metadata_field: self
                .metadata
                .metadata_field
                .clone()
                .unwrap_or_else(|| fallback.metadata_field.clone()),
        }
    }

    /// Read and parse a snapshot file.
    pub async fn read(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| snapshot_error(path, format!("failed to read: {e}")))?;
        serde_json::from_str(&text).map_err(|e| snapshot_error(path, format!("malformed JSON: {e}")))
    }

    /// Write the snapshot to `path`, creating parent directories.
    ///
    /// The file is written next to its destination and renamed into place, so
    /// a failed write never leaves a truncated snapshot behind.
    pub async fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self)
            .map_err(|e| snapshot_error(path, format!("failed to encode: {e}")))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| snapshot_error(path, format!("failed to create directory: {e}")))?;
        }

        let partial = path.with_extension("json.partial");
        tokio::fs::write(&partial, json)
            .await
            .map_err(|e| snapshot_error(path, format!("failed to write: {e}")))?;
        tokio::fs::rename(&partial, path)
            .await
            .map_err(|e| snapshot_error(path, format!("failed to move into place: {e}")))
    }
}

fn snapshot_error(path: &Path, message: String) -> RagError {
    RagError::SnapshotError { path: path.display().to_string(), message }
}
