//! In-memory vector store using exact cosine similarity.
//!
//! [`InMemoryVectorStore`] keeps every document in insertion order behind a
//! `tokio::sync::RwLock` and ranks all of them on each query. Search is O(n)
//! and exact; there is no approximate index.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::config::FieldNames;
use crate::document::{Document, SearchResult};
use crate::error::{RagError, Result};
use crate::snapshot::Snapshot;
use crate::vectorstore::{SearchQuery, SimilaritySearchBackend};

const BACKEND: &str = "InMemory";

/// Documents plus the precomputed norm of each embedding, index for index.
#[derive(Debug, Default)]
struct StoreState {
    documents: Vec<Document>,
    norms: Vec<f64>,
    dimension: Option<usize>,
}

impl StoreState {
    /// Validate a batch against the established dimension and append it.
    ///
    /// Documents with blank content or no embedding are skipped. A dimension
    /// mismatch rejects the whole batch and leaves the state untouched.
    fn append(&mut self, documents: Vec<Document>) -> Result<usize> {
        let mut dimension = self.dimension;
        let mut accepted = Vec::with_capacity(documents.len());

        for doc in documents {
            if doc.content.trim().is_empty() {
                warn!(document.id = ?doc.id, "document content is empty, skipping");
                continue;
            }
            if doc.embedding.is_empty() {
                warn!(document.id = ?doc.id, "document has no embedding, skipping");
                continue;
            }
            match dimension {
                Some(expected) if expected != doc.embedding.len() => {
                    error!(
                        document.id = ?doc.id,
                        expected,
                        actual = doc.embedding.len(),
                        "embedding dimension mismatch, rejecting batch"
                    );
                    return Err(RagError::DimensionMismatch {
                        expected,
                        actual: doc.embedding.len(),
                    });
                }
                Some(_) => {}
                None => dimension = Some(doc.embedding.len()),
            }
            accepted.push(doc);
        }

        let added = accepted.len();
        self.norms.extend(accepted.iter().map(|d| l2_norm(&d.embedding)));
        self.documents.extend(accepted);
        self.dimension = dimension;
        Ok(added)
    }
}

/// An in-memory vector store with exact brute-force cosine similarity search.
///
/// # Example
///
/// ```rust,ignore
/// use eo_rag::{Document, InMemoryVectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.add(vec![Document::new("text", vec![1.0, 0.0])]).await?;
/// let results = store.similarity_search(&[1.0, 0.0], 4, Some(0.4)).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    fields: FieldNames,
    state: RwLock<StoreState>,
}

impl InMemoryVectorStore {
    /// Create a new empty store using the default record field names.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty store reading and writing records with `fields`.
    pub fn with_fields(fields: FieldNames) -> Self {
        Self { fields, state: RwLock::default() }
    }

    /// Build a store from a JSON array of flat document records, such as the
    /// output of an embedding run.
    pub async fn from_records_file(path: impl AsRef<Path>, fields: FieldNames) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            RagError::SnapshotError { path: path.display().to_string(), message: e.to_string() }
        })?;
        let records: Vec<Value> = serde_json::from_str(&text).map_err(|e| {
            RagError::SnapshotError {
                path: path.display().to_string(),
                message: format!("expected a JSON array of records: {e}"),
            }
        })?;
        info!(path = %path.display(), records = records.len(), "loaded embedded records");

        let store = Self::with_fields(fields);
        store.add_documents(&records).await?;
        Ok(store)
    }

    /// The record field names this store uses.
    pub fn fields(&self) -> &FieldNames {
        &self.fields
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.state.read().await.documents.len()
    }

    /// Returns `true` if the store holds no documents.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.documents.is_empty()
    }

    /// The embedding dimension established by the first stored document.
    pub async fn dimension(&self) -> Option<usize> {
        self.state.read().await.dimension
    }

    /// Add flat JSON records, resolved with this store's field names.
    ///
    /// Records missing content or an embedding are logged and skipped; the
    /// returned count says how many were actually added.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if any record's embedding
    /// length differs from the store's dimension (or from the first record of
    /// the batch for an empty store). Nothing from the batch is added then.
    pub async fn add_documents(&self, records: &[Value]) -> Result<usize> {
        let documents = resolve_records(records, &self.fields);
        let (added, _) = self.insert(documents, records.len()).await?;
        Ok(added)
    }

    /// Add typed documents. Skipping and dimension rules match
    /// [`add_documents`](Self::add_documents).
    pub async fn add(&self, documents: Vec<Document>) -> Result<usize> {
        let offered = documents.len();
        let (added, _) = self.insert(documents, offered).await?;
        Ok(added)
    }

    /// Append `documents`, counting as skipped everything out of `offered`
    /// that was not added, including records that never resolved.
    async fn insert(&self, documents: Vec<Document>, offered: usize) -> Result<(usize, usize)> {
        let added = self.state.write().await.append(documents)?;
        let skipped = offered.saturating_sub(added);
        info!(added, skipped, "added documents to vector store");
        Ok((added, skipped))
    }

    /// Rank every stored document against `query_embedding` by cosine
    /// similarity and return the best `k`.
    ///
    /// Documents whose embedding has zero norm are never returned, and a
    /// zero-norm query matches nothing. Ties keep insertion order. With a
    /// `score_threshold`, results below it are dropped before truncating to
    /// `k`.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidInput`] if `k == 0`
    /// - [`RagError::DimensionMismatch`] if the query length differs from the
    ///   stored embeddings
    pub async fn similarity_search(
        &self,
        query_embedding: &[f32],
        k: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Err(RagError::InvalidInput("k must be greater than zero".to_string()));
        }

        let state = self.state.read().await;
        if state.documents.is_empty() {
            warn!("vector store is empty");
            return Ok(Vec::new());
        }
        if let Some(expected) = state.dimension {
            if query_embedding.len() != expected {
                return Err(RagError::DimensionMismatch {
                    expected,
                    actual: query_embedding.len(),
                });
            }
        }

        let query_norm = l2_norm(query_embedding);
        if !is_usable_norm(query_norm) {
            warn!("query embedding has zero norm, similarity is undefined");
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = state
            .documents
            .iter()
            .zip(&state.norms)
            .enumerate()
            .filter(|(_, (_, norm))| is_usable_norm(**norm))
            .filter_map(|(idx, (doc, norm))| {
                let score = dot(query_embedding, &doc.embedding) / (query_norm * norm);
                score.is_finite().then(|| (idx, clamp_score(score)))
            })
            .collect();

        // `sort_by` is stable, so equal scores keep insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        if let Some(threshold) = score_threshold {
            scored.retain(|(_, score)| *score >= threshold);
        }
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(idx, score)| {
                let doc = &state.documents[idx];
                SearchResult {
                    id: doc.id.clone(),
                    content: doc.content.clone(),
                    metadata: doc.metadata.clone(),
                    similarity_score: score,
                }
            })
            .collect())
    }

    /// Look up a document by id. The first match in insertion order wins.
    pub async fn get_document_by_id(&self, id: &str) -> Option<Document> {
        self.state.read().await.documents.iter().find(|d| d.id.as_deref() == Some(id)).cloned()
    }

    /// Write the whole store to a JSON snapshot at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::SnapshotError`] if the file cannot be written. The
    /// store itself is never modified.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let snapshot = {
            let state = self.state.read().await;
            Snapshot::from_documents(&state.documents, &self.fields)
        };
        let count = snapshot.metadata.count;

        snapshot.write(path).await.inspect_err(|e| {
            error!(path = %path.display(), error = %e, "error saving vector store");
        })?;
        info!(count, path = %path.display(), "saved vector store");
        Ok(())
    }

    /// Write a snapshot named `vector_store_{YYYYmmdd_HHMMSS}.json` into
    /// `dir` and return its path.
    pub async fn save_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let filename = format!("vector_store_{}.json", chrono::Local::now().format("%Y%m%d_%H%M%S"));
        let path = dir.as_ref().join(filename);
        self.save(&path).await?;
        Ok(path)
    }

    /// Replace the store contents with a snapshot read from `path`.
    ///
    /// Records are resolved with the field names the snapshot declares,
    /// falling back to this store's. Malformed records are skipped. Returns
    /// the number of documents loaded.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::SnapshotError`] for a missing or malformed file and
    /// [`RagError::DimensionMismatch`] for inconsistent embeddings. On any
    /// error the store keeps its previous contents.
    pub async fn load(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let snapshot = Snapshot::read(path).await.inspect_err(|e| {
            error!(path = %path.display(), error = %e, "error loading vector store");
        })?;

        let fields = snapshot.field_names(&self.fields);
        let mut fresh = StoreState::default();
        let loaded = fresh.append(resolve_records(&snapshot.documents, &fields)).inspect_err(|e| {
            error!(path = %path.display(), error = %e, "error loading vector store");
        })?;

        *self.state.write().await = fresh;
        info!(count = loaded, path = %path.display(), "loaded vector store");
        Ok(loaded)
    }
}

#[async_trait]
impl SimilaritySearchBackend for InMemoryVectorStore {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn search(&self, query: &SearchQuery<'_>) -> Result<Vec<SearchResult>> {
        self.similarity_search(query.embedding, query.top_k, query.score_threshold).await
    }
}

/// Resolve records into documents, logging and dropping the unusable ones.
fn resolve_records(records: &[Value], fields: &FieldNames) -> Vec<Document> {
    records
        .iter()
        .enumerate()
        .filter_map(|(position, record)| match Document::from_record(record, fields) {
            Ok(doc) => Some(doc),
            Err(issue) => {
                warn!(position, %issue, "skipping malformed document record");
                None
            }
        })
        .collect()
}

fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum()
}

fn l2_norm(v: &[f32]) -> f64 {
    v.iter().map(|x| f64::from(*x) * f64::from(*x)).sum::<f64>().sqrt()
}

fn is_usable_norm(norm: f64) -> bool {
    norm > 0.0 && norm.is_finite()
}

/// Clamp rounding noise into [-1, 1]; adding 0.0 folds -0.0 into 0.0 so it
/// ties with positive zero.
fn clamp_score(score: f64) -> f32 {
    (score.clamp(-1.0, 1.0) as f32) + 0.0
}

/// Compute cosine similarity between two vectors.
///
/// Returns `None` if either vector has zero norm or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }
    let (norm_a, norm_b) = (l2_norm(a), l2_norm(b));
    if !is_usable_norm(norm_a) || !is_usable_norm(norm_b) {
        return None;
    }
    let score = dot(a, b) / (norm_a * norm_b);
    score.is_finite().then(|| clamp_score(score))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_known_vectors() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), Some(1.0));
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), Some(0.0));
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), Some(-1.0));
        let diagonal = cosine_similarity(&[1.0, 0.0], &[1.0, 1.0]).unwrap();
        assert!((diagonal - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn cosine_is_undefined_for_zero_vectors_and_length_mismatch() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), None);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), None);
    }

    #[test]
    fn negative_zero_scores_fold_to_positive_zero() {
        let score = clamp_score(-0.0);
        assert!(score.is_sign_positive());
    }

    #[test]
    fn append_rejects_mismatched_batch_atomically() {
        let mut state = StoreState::default();
        state.append(vec![Document::new("a", vec![1.0, 0.0])]).unwrap();

        let err = state
            .append(vec![Document::new("b", vec![0.0, 1.0]), Document::new("c", vec![1.0])])
            .unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 2, actual: 1 }));
        assert_eq!(state.documents.len(), 1);
        assert_eq!(state.norms.len(), 1);
    }

    #[tokio::test]
    async fn unresolvable_records_count_as_skipped() {
        let store = InMemoryVectorStore::new();
        let records = [
            serde_json::json!({"content": "Sec. 1", "embedding": [1.0, 0.0]}),
            serde_json::json!({"content": "no vector"}),
            serde_json::json!("not an object"),
            serde_json::json!({"content": "   ", "embedding": [0.0, 1.0]}),
        ];

        let resolved = resolve_records(&records, store.fields());
        let (added, skipped) = store.insert(resolved, records.len()).await.unwrap();
        assert_eq!((added, skipped), (1, 3));
        assert_eq!(store.add_documents(&records).await.unwrap(), 1);
        assert_eq!(store.len().await, 2);
    }
}
