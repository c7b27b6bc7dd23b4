//! Wire types for the Azure AI Search REST API (the subset this crate uses).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const EDM_STRING: &str = "Edm.String";
pub const EDM_SINGLE_COLLECTION: &str = "Collection(Edm.Single)";

/// An index definition, as sent on create and returned on get.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IndexDefinition {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<IndexField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_search: Option<VectorSearch>,
}

impl IndexDefinition {
    /// The dimension of `field_name`, if the index declares it as a vector field.
    pub fn vector_dimensions(&self, field_name: &str) -> Option<usize> {
        self.fields.iter().find(|f| f.name == field_name).and_then(|f| f.dimensions)
    }
}

/// One field of an index.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IndexField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub key: bool,
    #[serde(default)]
    pub searchable: bool,
    #[serde(default)]
    pub filterable: bool,
    #[serde(default = "default_true")]
    pub retrievable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_search_profile: Option<String>,
}

fn default_true() -> bool {
    true
}

impl IndexField {
    /// A retrievable string field.
    pub fn string(name: impl Into<String>) -> Self {
        Self { name: name.into(), field_type: EDM_STRING.to_string(), retrievable: true, ..Default::default() }
    }

    /// A vector field bound to a vector search profile.
    pub fn vector(name: impl Into<String>, dimensions: usize, profile: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: EDM_SINGLE_COLLECTION.to_string(),
            searchable: true,
            retrievable: true,
            dimensions: Some(dimensions),
            vector_search_profile: Some(profile.into()),
            ..Default::default()
        }
    }

    pub fn key(mut self) -> Self {
        self.key = true;
        self
    }

    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    pub fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }
}

/// Vector search configuration of an index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorSearch {
    #[serde(default)]
    pub algorithms: Vec<VectorAlgorithm>,
    #[serde(default)]
    pub profiles: Vec<VectorProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VectorAlgorithm {
    pub name: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exhaustive_knn_parameters: Option<KnnParameters>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnnParameters {
    pub metric: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorProfile {
    pub name: String,
    pub algorithm: String,
}

/// A search request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Full-text query; `None` for a pure vector query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vector_queries: Vec<VectorQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Comma separated list of fields to return.
    pub select: String,
    pub top: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorQuery {
    pub kind: String,
    pub vector: Vec<f32>,
    pub fields: String,
    pub k: usize,
}

/// A search response body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub value: Vec<Map<String, Value>>,
}

/// What to do with a document in an indexing batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IndexActionKind {
    Upload,
    Delete,
}

/// A document plus the action to apply to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexAction {
    #[serde(rename = "@search.action")]
    pub action: IndexActionKind,
    #[serde(flatten)]
    pub document: Map<String, Value>,
}

/// An indexing request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IndexBatch {
    pub value: Vec<IndexAction>,
}

/// Per-document outcome of an indexing request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IndexingResult {
    pub key: String,
    pub status: bool,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct IndexingResponse {
    #[serde(default)]
    pub value: Vec<IndexingResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct IndexList {
    #[serde(default)]
    pub value: Vec<IndexName>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct IndexName {
    pub name: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn index_definition_reads_service_json() {
        let index: IndexDefinition = serde_json::from_value(json!({
            "name": "executive-orders",
            "fields": [
                {"name": "id", "type": "Edm.String", "key": true},
                {"name": "embedding", "type": "Collection(Edm.Single)", "dimensions": 384,
                 "vectorSearchProfile": "eo-vector-profile"}
            ],
            "vectorSearch": null
        }))
        .unwrap();

        assert_eq!(index.vector_dimensions("embedding"), Some(384));
        assert_eq!(index.vector_dimensions("id"), None);
        assert_eq!(index.vector_dimensions("missing"), None);
        assert!(index.fields[0].retrievable);
    }

    #[test]
    fn index_action_flattens_document_fields() {
        let mut document = Map::new();
        document.insert("id".into(), json!("a"));
        let batch = IndexBatch { value: vec![IndexAction { action: IndexActionKind::Upload, document }] };

        assert_eq!(
            serde_json::to_value(&batch).unwrap(),
            json!({"value": [{"@search.action": "upload", "id": "a"}]})
        );
    }

    #[test]
    fn keyword_request_omits_vector_queries() {
        let request = SearchRequest { search: Some("tariffs".into()), select: "id".into(), top: 3, ..Default::default() };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"search": "tariffs", "select": "id", "top": 3})
        );
    }
}
