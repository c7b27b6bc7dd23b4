//! Azure AI Search adapter tests against a scripted service client.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use eo_rag::azure::types::{
    IndexActionKind, IndexBatch, IndexDefinition, IndexField, IndexingResult, SearchRequest,
};
use eo_rag::azure::{
    AzureSearchConfig, AzureSearchVectorStore, SearchMode, SearchServiceClient,
    cosine_from_search_score,
};
use eo_rag::document::Document;
use eo_rag::error::{RagError, Result};
use eo_rag::vectorstore::{SearchQuery, SimilaritySearchBackend};
use serde_json::{Map, Value, json};

const INDEX: &str = "executive-orders";

/// An in-process stand-in for the search service.
#[derive(Default)]
struct ScriptedService {
    index: Mutex<Option<IndexDefinition>>,
    fail_get_index: bool,
    hits: Vec<Map<String, Value>>,
    get_index_calls: Mutex<usize>,
    batches: Mutex<Vec<IndexBatch>>,
    searches: Mutex<Vec<SearchRequest>>,
}

impl ScriptedService {
    fn with_index(index: IndexDefinition) -> Self {
        Self { index: Mutex::new(Some(index)), ..Default::default() }
    }

    fn with_hits(mut self, hits: Vec<Value>) -> Self {
        self.hits = hits.into_iter().filter_map(|h| h.as_object().cloned()).collect();
        self
    }
}

fn unavailable() -> RagError {
    RagError::VectorStoreError { backend: "AzureSearch".into(), message: "503 unavailable".into() }
}

#[async_trait]
impl SearchServiceClient for ScriptedService {
    async fn list_index_names(&self) -> Result<Vec<String>> {
        Ok(self.index.lock().unwrap().iter().map(|i| i.name.clone()).collect())
    }

    async fn get_index(&self, name: &str) -> Result<IndexDefinition> {
        *self.get_index_calls.lock().unwrap() += 1;
        if self.fail_get_index {
            return Err(unavailable());
        }
        self.index.lock().unwrap().clone().filter(|i| i.name == name).ok_or_else(unavailable)
    }

    async fn create_index(&self, index: &IndexDefinition) -> Result<()> {
        *self.index.lock().unwrap() = Some(index.clone());
        Ok(())
    }

    async fn delete_index(&self, _name: &str) -> Result<()> {
        *self.index.lock().unwrap() = None;
        Ok(())
    }

    async fn index_documents(&self, _index: &str, batch: &IndexBatch) -> Result<Vec<IndexingResult>> {
        self.batches.lock().unwrap().push(batch.clone());
        Ok(batch
            .value
            .iter()
            .map(|action| IndexingResult {
                key: action.document["id"].as_str().unwrap_or_default().to_string(),
                status: true,
                error_message: None,
            })
            .collect())
    }

    async fn search(&self, _index: &str, request: &SearchRequest) -> Result<Vec<Map<String, Value>>> {
        self.searches.lock().unwrap().push(request.clone());
        Ok(self.hits.clone())
    }
}

fn vector_index(dimensions: usize) -> IndexDefinition {
    IndexDefinition {
        name: INDEX.into(),
        fields: vec![
            IndexField::string("id").key(),
            IndexField::string("content").searchable(),
            IndexField::string("metadata"),
            IndexField::vector("embedding", dimensions, "profile"),
        ],
        vector_search: None,
    }
}

fn keyword_index() -> IndexDefinition {
    IndexDefinition {
        name: INDEX.into(),
        fields: vec![IndexField::string("id").key(), IndexField::string("content").searchable()],
        vector_search: None,
    }
}

fn store(service: &Arc<ScriptedService>) -> AzureSearchVectorStore {
    AzureSearchVectorStore::new(service.clone(), AzureSearchConfig::new(INDEX).with_embedding_dimension(3))
}

#[tokio::test]
async fn vector_mode_sends_vector_query_and_applies_threshold() {
    // The service scores cosine matches as 1 / (2 - cos).
    let service = Arc::new(ScriptedService::with_index(vector_index(3)).with_hits(vec![
        json!({"id": "b", "content": "second", "metadata": "{}", "@search.score": 1.0 / 1.5}),
        json!({"id": "a", "content": "first", "metadata": "{}", "@search.score": 1.0 / 1.1}),
        json!({"id": "c", "content": "orthogonal", "metadata": "{}", "@search.score": 0.5}),
        json!({"id": "d", "content": "opposing", "metadata": "{}", "@search.score": 0.4}),
    ]));
    let store = store(&service);

    assert_eq!(store.search_mode().await, SearchMode::Vector { dimensions: 3 });
    let results = store.similarity_search("tariffs", &[0.1, 0.2, 0.3], 4, Some(0.4)).await.unwrap();

    let ids: Vec<_> = results.iter().map(|r| r.id.as_deref().unwrap()).collect();
    assert_eq!(ids, ["a", "b"]);
    assert!((results[0].similarity_score - 0.9).abs() < 1e-5);
    assert!((results[1].similarity_score - 0.5).abs() < 1e-5);

    let request = service.searches.lock().unwrap()[0].clone();
    assert_eq!(request.search, None);
    assert_eq!(request.top, 4);
    assert_eq!(request.vector_queries[0].fields, "embedding");
    assert_eq!(request.vector_queries[0].k, 4);
    assert!(request.select.starts_with("id,content,metadata"));

    // Capability detection ran once and was cached.
    let unfiltered = store.similarity_search("tariffs", &[0.1, 0.2, 0.3], 4, None).await.unwrap();
    assert_eq!(*service.get_index_calls.lock().unwrap(), 1);
    let scores: Vec<f32> = unfiltered.iter().map(|r| r.similarity_score).collect();
    assert!((scores[2] - 0.0).abs() < 1e-5);
    assert!((scores[3] + 0.5).abs() < 1e-5);
}

#[test]
fn service_scores_convert_back_to_cosine() {
    assert_eq!(cosine_from_search_score(1.0), 1.0);
    assert!((cosine_from_search_score(0.5) - 0.0).abs() < 1e-6);
    assert!((cosine_from_search_score(1.0 / 3.0) + 1.0).abs() < 1e-6);
    assert_eq!(cosine_from_search_score(0.0), -1.0);
    assert_eq!(cosine_from_search_score(f64::NAN), -1.0);
    assert_eq!(cosine_from_search_score(0.1), -1.0);
}

#[tokio::test]
async fn vector_mode_rejects_wrong_query_dimension() {
    let service = Arc::new(ScriptedService::with_index(vector_index(3)));
    let err = store(&service).similarity_search("q", &[1.0, 0.0], 2, None).await.unwrap_err();
    assert!(matches!(err, RagError::DimensionMismatch { expected: 3, actual: 2 }));
    assert!(service.searches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn keyword_mode_searches_query_text_and_ignores_threshold() {
    let service = Arc::new(ScriptedService::with_index(keyword_index()).with_hits(vec![
        json!({"id": "a", "content": "Tariff schedule", "@search.score": 7.5}),
        json!({"id": "b", "content": "Tariff exemptions", "@search.score": 0.3}),
    ]));
    let store = store(&service);

    let backend: &dyn SimilaritySearchBackend = &store;
    let query = SearchQuery { text: "steel tariffs", embedding: &[0.1, 0.2, 0.3], top_k: 4, score_threshold: Some(0.4) };
    let results = backend.search(&query).await.unwrap();

    assert_eq!(backend.name(), "AzureSearch");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].similarity_score, 7.5);

    let request = service.searches.lock().unwrap()[0].clone();
    assert_eq!(request.search.as_deref(), Some("steel tariffs"));
    assert!(request.vector_queries.is_empty());
}

#[tokio::test]
async fn blank_keyword_query_matches_everything() {
    let service = Arc::new(ScriptedService::with_index(keyword_index()));
    store(&service).similarity_search("  ", &[], 2, None).await.unwrap();
    assert_eq!(service.searches.lock().unwrap()[0].search.as_deref(), Some("*"));
}

#[tokio::test]
async fn failed_detection_falls_back_to_keyword_without_caching() {
    let service = Arc::new(ScriptedService {
        fail_get_index: true,
        ..ScriptedService::with_index(vector_index(3))
    });
    let store = store(&service);

    assert_eq!(store.search_mode().await, SearchMode::Keyword);
    assert_eq!(store.search_mode().await, SearchMode::Keyword);
    assert_eq!(*service.get_index_calls.lock().unwrap(), 2);

    store.similarity_search("ai safety", &[1.0, 0.0, 0.0], 1, None).await.unwrap();
    assert_eq!(service.searches.lock().unwrap()[0].search.as_deref(), Some("ai safety"));
}

#[tokio::test]
async fn zero_k_is_invalid() {
    let service = Arc::new(ScriptedService::with_index(keyword_index()));
    let err = store(&service).similarity_search("q", &[], 0, None).await.unwrap_err();
    assert!(matches!(err, RagError::InvalidInput(_)));
}

#[tokio::test]
async fn metadata_is_parsed_and_filled_from_top_level_fields() {
    let service = Arc::new(ScriptedService::with_index(keyword_index()).with_hits(vec![
        json!({
            "id": "a",
            "content": "Sec. 1",
            "metadata": "{\"title\": \"From Metadata\", \"page_number\": 3}",
            "title": "From Index",
            "eo_number": "14110",
            "source_filename": "",
            "@search.score": 1.0
        }),
        json!({"id": "b", "content": "Sec. 2", "metadata": "not json", "title": "Fallback", "@search.score": 0.5}),
    ]));

    let results = store(&service).similarity_search("q", &[], 2, None).await.unwrap();
    let first = &results[0];
    assert_eq!(first.metadata_text("title").as_deref(), Some("From Metadata"));
    assert_eq!(first.metadata_text("eo_number").as_deref(), Some("14110"));
    assert_eq!(first.metadata_text("page_number").as_deref(), Some("3"));
    assert_eq!(first.metadata_text("source_filename"), None);
    assert_eq!(results[1].metadata_text("title").as_deref(), Some("Fallback"));
}

#[tokio::test]
async fn upload_derives_ids_and_sends_embeddings_in_vector_mode() {
    let service = Arc::new(ScriptedService::with_index(vector_index(3)));
    let uploaded = store(&service)
        .add_documents(&[
            Document::new("explicit", vec![1.0, 0.0, 0.0]).with_id("given"),
            Document::new("chunked", vec![0.0, 1.0, 0.0]).with_metadata("chunk_id", "eo-14110-2"),
            Document::new("   ", vec![0.0, 0.0, 1.0]),
            Document::new("anonymous", vec![0.0, 0.0, 1.0]).with_metadata("title", "Order"),
        ])
        .await
        .unwrap();
    assert_eq!(uploaded, 3);

    let batches = service.batches.lock().unwrap();
    let docs: Vec<_> = batches[0].value.iter().map(|a| &a.document).collect();
    assert!(batches[0].value.iter().all(|a| a.action == IndexActionKind::Upload));
    assert_eq!(docs[0]["id"], "given");
    assert_eq!(docs[1]["id"], "eo-14110-2");
    assert_eq!(docs[2]["id"], "doc-2");
    assert_eq!(docs[2]["title"], "Order");
    assert_eq!(docs[2]["metadata"], "{\"title\":\"Order\"}");
    assert_eq!(docs[0]["embedding"], json!([1.0, 0.0, 0.0]));
}

#[tokio::test]
async fn upload_omits_embeddings_for_keyword_index() {
    let service = Arc::new(ScriptedService::with_index(keyword_index()));
    store(&service).add_documents(&[Document::new("text", vec![1.0, 0.0])]).await.unwrap();

    let batches = service.batches.lock().unwrap();
    assert!(batches[0].value[0].document.get("embedding").is_none());
}

#[tokio::test]
async fn upload_rejects_wrong_dimension_before_sending() {
    let service = Arc::new(ScriptedService::with_index(vector_index(3)));
    let err = store(&service)
        .add_documents(&[Document::new("ok", vec![1.0, 0.0, 0.0]), Document::new("bad", vec![1.0])])
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::DimensionMismatch { expected: 3, actual: 1 }));
    assert!(service.batches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn upload_creates_missing_index_and_batches() {
    let service = Arc::new(ScriptedService::default());
    let store = AzureSearchVectorStore::new(
        service.clone(),
        AzureSearchConfig::new(INDEX).with_embedding_dimension(2).with_upload_batch_size(2),
    );

    let docs: Vec<_> = (0..5).map(|i| Document::new(format!("chunk {i}"), vec![1.0, i as f32])).collect();
    assert_eq!(store.add_documents(&docs).await.unwrap(), 5);

    let created = service.index.lock().unwrap().clone().unwrap();
    assert_eq!(created.vector_dimensions("embedding"), Some(2));
    let batch_sizes: Vec<_> = service.batches.lock().unwrap().iter().map(|b| b.value.len()).collect();
    assert_eq!(batch_sizes, [2, 2, 1]);
}

#[tokio::test]
async fn create_index_respects_recreate() {
    let service = Arc::new(ScriptedService::with_index(keyword_index()));
    let store = store(&service);

    assert!(!store.create_index(false).await.unwrap());
    assert!(service.index.lock().unwrap().as_ref().unwrap().vector_dimensions("embedding").is_none());

    assert!(store.create_index(true).await.unwrap());
    assert_eq!(store.search_mode().await, SearchMode::Vector { dimensions: 3 });
}

#[tokio::test]
async fn index_definition_uses_exact_cosine_search() {
    let service = Arc::new(ScriptedService::default());
    let definition = store(&service).index_definition();
    let json = serde_json::to_value(&definition).unwrap();

    assert_eq!(json["vectorSearch"]["algorithms"][0]["kind"], "exhaustiveKnn");
    assert_eq!(json["vectorSearch"]["algorithms"][0]["exhaustiveKnnParameters"]["metric"], "cosine");
    let key_fields: Vec<_> = definition.fields.iter().filter(|f| f.key).map(|f| f.name.as_str()).collect();
    assert_eq!(key_fields, ["id"]);

    let keyword_only = AzureSearchVectorStore::new(service, AzureSearchConfig::new(INDEX).without_vector_search());
    assert!(keyword_only.index_definition().vector_search.is_none());
}

#[tokio::test]
async fn delete_documents_sends_delete_actions() {
    let service = Arc::new(ScriptedService::with_index(keyword_index()));
    assert_eq!(store(&service).delete_documents(&["a", "b"]).await.unwrap(), 2);

    let batches = service.batches.lock().unwrap();
    assert!(batches[0].value.iter().all(|a| a.action == IndexActionKind::Delete));
}
