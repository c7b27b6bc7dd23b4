//! HTTP client for the Azure AI Search REST API.
//!
//! This module is only available when the `azure-search` feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, error};

use super::client::SearchServiceClient;
use super::types::{
    IndexBatch, IndexDefinition, IndexList, IndexingResponse, IndexingResult, SearchRequest,
    SearchResponse,
};
use crate::error::{RagError, Result};

/// The REST API version requests are pinned to.
pub const DEFAULT_API_VERSION: &str = "2023-11-01";

const BACKEND: &str = "AzureSearch";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A [`SearchServiceClient`] that talks to an Azure AI Search service with
/// an admin or query API key.
///
/// # Example
///
/// ```rust,ignore
/// use eo_rag::azure::RestSearchClient;
///
/// let client = RestSearchClient::new("https://my-search.search.windows.net", "key")?;
/// let names = client.list_index_names().await?;
/// ```
pub struct RestSearchClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    api_version: String,
}

impl RestSearchClient {
    /// Create a client for the service at `endpoint`.
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        let api_key = api_key.into();
        if endpoint.is_empty() || api_key.is_empty() {
            return Err(RagError::ConfigError(
                "Azure Search endpoint and API key are required".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| map_err(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, endpoint, api_key, api_version: DEFAULT_API_VERSION.to_string() })
    }

    /// Create a client from `AZURE_SEARCH_ENDPOINT` and `AZURE_SEARCH_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let endpoint = std::env::var("AZURE_SEARCH_ENDPOINT").unwrap_or_default();
        let api_key = std::env::var("AZURE_SEARCH_API_KEY").unwrap_or_default();
        Self::new(endpoint, api_key)
    }

    /// Pin a different REST API version.
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.endpoint))
            .query(&[("api-version", self.api_version.as_str())])
            .header("api-key", &self.api_key)
    }

    async fn send(&self, request: RequestBuilder, operation: &str) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            error!(backend = BACKEND, operation, error = %e, "request failed");
            map_err(format!("{operation}: request failed: {e}"))
        })?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail =
            serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);
        error!(backend = BACKEND, operation, %status, "API error");
        Err(map_err(format!("{operation}: service returned {status}: {detail}")))
    }

    async fn json<T: DeserializeOwned>(response: Response, operation: &str) -> Result<T> {
        response.json().await.map_err(|e| {
            error!(backend = BACKEND, operation, error = %e, "failed to parse response");
            map_err(format!("{operation}: failed to parse response: {e}"))
        })
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

fn map_err(message: String) -> RagError {
    RagError::VectorStoreError { backend: BACKEND.to_string(), message }
}

#[async_trait]
impl SearchServiceClient for RestSearchClient {
    async fn list_index_names(&self) -> Result<Vec<String>> {
        let request = self.request(Method::GET, "/indexes").query(&[("$select", "name")]);
        let response = self.send(request, "list indexes").await?;
        let list: IndexList = Self::json(response, "list indexes").await?;
        Ok(list.value.into_iter().map(|i| i.name).collect())
    }

    async fn get_index(&self, name: &str) -> Result<IndexDefinition> {
        let response =
            self.send(self.request(Method::GET, &format!("/indexes/{name}")), "get index").await?;
        Self::json(response, "get index").await
    }

    async fn create_index(&self, index: &IndexDefinition) -> Result<()> {
        let request = self.request(Method::POST, "/indexes").json(index);
        self.send(request, "create index").await?;
        debug!(backend = BACKEND, index = %index.name, "created index");
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> Result<()> {
        self.send(self.request(Method::DELETE, &format!("/indexes/{name}")), "delete index")
            .await?;
        debug!(backend = BACKEND, index = name, "deleted index");
        Ok(())
    }

    async fn index_documents(&self, index: &str, batch: &IndexBatch) -> Result<Vec<IndexingResult>> {
        let request =
            self.request(Method::POST, &format!("/indexes/{index}/docs/index")).json(batch);
        let response = self.send(request, "index documents").await?;
        let results: IndexingResponse = Self::json(response, "index documents").await?;
        debug!(backend = BACKEND, index, count = results.value.len(), "indexed documents");
        Ok(results.value)
    }

    async fn search(&self, index: &str, request: &SearchRequest) -> Result<Vec<Map<String, Value>>> {
        debug!(
            backend = BACKEND,
            index,
            top = request.top,
            vector = !request.vector_queries.is_empty(),
            "searching"
        );
        let http = self.request(Method::POST, &format!("/indexes/{index}/docs/search")).json(request);
        let response = self.send(http, "search").await?;
        let results: SearchResponse = Self::json(response, "search").await?;
        Ok(results.value)
    }
}
