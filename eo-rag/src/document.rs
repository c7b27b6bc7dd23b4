//! Data types for documents, search results, and citations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::FieldNames;

/// Metadata attached to a document: string keys mapped to JSON scalars.
///
/// A `BTreeMap` keeps serialization order stable, so snapshots and prompts are
/// reproducible byte for byte.
pub type Metadata = BTreeMap<String, Value>;

/// Well-known metadata keys.
pub mod keys {
    /// The file the chunk was cut from.
    pub const SOURCE_FILENAME: &str = "source_filename";
    /// Human readable document title.
    pub const TITLE: &str = "title";
    /// Executive order number.
    pub const EO_NUMBER: &str = "eo_number";
    /// Identifier of the chunk within the corpus.
    pub const CHUNK_ID: &str = "chunk_id";
    /// Position of the chunk within its source document.
    pub const CHUNK_INDEX: &str = "chunk_index";
    /// Page the chunk starts on.
    pub const PAGE_NUMBER: &str = "page_number";
}

/// An embedded chunk of a source document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Caller-supplied identifier. Uniqueness is not enforced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The text content of the chunk.
    pub content: String,
    /// Key-value metadata for the chunk.
    #[serde(default)]
    pub metadata: Metadata,
    /// The vector embedding for this chunk's content.
    pub embedding: Vec<f32>,
}

impl Document {
    /// Create a document with no id and no metadata.
    pub fn new(content: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self { id: None, content: content.into(), metadata: Metadata::new(), embedding }
    }

    /// Set the document id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Insert a single metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Render a metadata value as display text. See [`metadata_text`].
    pub fn metadata_text(&self, key: &str) -> Option<String> {
        metadata_text(&self.metadata, key)
    }

    /// Resolve a flat JSON record into a document using the given field names.
    ///
    /// The record must be an object holding a non-empty string under the
    /// content field and a non-empty numeric array under the embedding field.
    /// The metadata field may be a nested object or a JSON-encoded string.
    pub fn from_record(record: &Value, fields: &FieldNames) -> Result<Self, RecordIssue> {
        let object = record.as_object().ok_or(RecordIssue::NotAnObject)?;

        let content = match object.get(&fields.content_field) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(Value::String(_)) => return Err(RecordIssue::EmptyContent),
            Some(_) => return Err(RecordIssue::MalformedContent),
            None => return Err(RecordIssue::MissingContent(fields.content_field.clone())),
        };

        let embedding = match object.get(&fields.embeddings_field) {
            Some(Value::Array(values)) if !values.is_empty() => values
                .iter()
                .map(|v| v.as_f64().map(|f| f as f32))
                .collect::<Option<Vec<f32>>>()
                .ok_or(RecordIssue::MalformedEmbedding)?,
            Some(Value::Array(_)) => {
                return Err(RecordIssue::MissingEmbedding(fields.embeddings_field.clone()));
            }
            Some(_) => return Err(RecordIssue::MalformedEmbedding),
            None => return Err(RecordIssue::MissingEmbedding(fields.embeddings_field.clone())),
        };

        let metadata = match object.get(&fields.metadata_field) {
            Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Some(Value::String(encoded)) => parse_metadata_json(encoded).unwrap_or_default(),
            _ => Metadata::new(),
        };

        let id = match object.get("id") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        Ok(Self { id, content, metadata, embedding })
    }

    /// Encode this document as a flat JSON record using the given field names.
    pub fn to_record(&self, fields: &FieldNames) -> Value {
        let mut object = Map::new();
        if let Some(id) = &self.id {
            object.insert("id".to_string(), Value::String(id.clone()));
        }
        object.insert(fields.content_field.clone(), Value::String(self.content.clone()));
        object.insert(
            fields.metadata_field.clone(),
            Value::Object(self.metadata.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        );
        object.insert(
            fields.embeddings_field.clone(),
            Value::Array(self.embedding.iter().map(|&x| Value::from(f64::from(x))).collect()),
        );
        Value::Object(object)
    }
}

/// Why a record could not be turned into a [`Document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordIssue {
    /// The record is not a JSON object.
    NotAnObject,
    /// The content field is absent.
    MissingContent(String),
    /// The content field is present but blank.
    EmptyContent,
    /// The content field is not a string.
    MalformedContent,
    /// The embedding field is absent or empty.
    MissingEmbedding(String),
    /// The embedding field is not an array of numbers.
    MalformedEmbedding,
}

impl std::fmt::Display for RecordIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "record is not a JSON object"),
            Self::MissingContent(field) => write!(f, "document missing content field: {field}"),
            Self::EmptyContent => write!(f, "document content is empty"),
            Self::MalformedContent => write!(f, "document content is not a string"),
            Self::MissingEmbedding(field) => {
                write!(f, "document missing embedding field: {field}")
            }
            Self::MalformedEmbedding => write!(f, "document embedding is not a numeric array"),
        }
    }
}

/// A retrieved document paired with its similarity score.
///
/// The embedding is never part of a result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The id of the matched document, if it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The text content of the matched document.
    pub content: String,
    /// The metadata of the matched document.
    #[serde(default)]
    pub metadata: Metadata,
    /// Relevance score, higher is more relevant. Cosine similarity for vector
    /// search, the service's own score for keyword search.
    pub similarity_score: f32,
}

impl SearchResult {
    /// Render a metadata value as display text. See [`metadata_text`].
    pub fn metadata_text(&self, key: &str) -> Option<String> {
        metadata_text(&self.metadata, key)
    }
}

/// Citation details for one retrieved document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceCitation {
    /// Title, falling back to the source filename, then `Unknown Source`.
    pub title: String,
    /// Executive order number, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eo_number: Option<String>,
    /// Page number, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    /// Id of the retrieved chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,
}

/// Render a metadata value as display text.
///
/// Strings are returned verbatim, other scalars through their JSON form.
/// Missing, null, and blank values yield `None`.
pub fn metadata_text(metadata: &Metadata, key: &str) -> Option<String> {
    let text = match metadata.get(key)? {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.trim().is_empty() { None } else { Some(text) }
}

/// Parse a JSON-encoded metadata object. Returns `None` when the text is not
/// a JSON object.
pub fn parse_metadata_json(encoded: &str) -> Option<Metadata> {
    match serde_json::from_str::<Value>(encoded).ok()? {
        Value::Object(map) => Some(map.into_iter().collect()),
        _ => None,
    }
}
