//! Subcommand handlers.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use eo_rag::azure::{AzureSearchConfig, AzureSearchVectorStore};
use eo_rag::foundry::{FoundryConfig, FoundryLlmClient};
use eo_rag::openai::OpenAIEmbeddingProvider;
use eo_rag::{
    Document, FieldNames, InMemoryVectorStore, RagConfig, Retriever, SimilaritySearchBackend,
};
use serde_json::Value;
use tracing::{info, warn};

use crate::cli::{
    AzureCommands, ChatArgs, EmbeddingArgs, FieldArgs, RetrievalArgs, SearchServiceArgs,
};
use crate::{display, repl};

impl From<&FieldArgs> for FieldNames {
    fn from(args: &FieldArgs) -> Self {
        Self {
            embeddings_field: args.embeddings_field.clone(),
            content_field: args.content_field.clone(),
            metadata_field: args.metadata_field.clone(),
        }
    }
}

pub async fn build(input: &Path, output_dir: &Path, name: Option<&str>, fields: &FieldArgs) -> Result<()> {
    let store = InMemoryVectorStore::from_records_file(input, fields.into())
        .await
        .with_context(|| format!("failed to build vector store from {}", input.display()))?;

    let path = match name {
        Some(name) => {
            let path = output_dir.join(name);
            store.save(&path).await?;
            path
        }
        None => store.save_to_dir(output_dir).await?,
    };
    println!("Saved {} documents to {}", store.len().await, path.display());
    Ok(())
}

pub async fn search(
    index: &Path,
    query: &str,
    retrieval: &RetrievalArgs,
    embedding: &EmbeddingArgs,
) -> Result<()> {
    let retriever = Retriever::builder()
        .config(rag_config(retrieval)?)
        .embedding_provider(embedding_provider(embedding)?)
        .backend(local_store(index).await?)
        .build()?;

    let results = retriever.retrieve(query, None).await?;
    display::print_results(&results);
    Ok(())
}

pub async fn chat(args: &ChatArgs) -> Result<()> {
    let backend: Arc<dyn SimilaritySearchBackend> = match &args.index {
        Some(index) if !args.azure => local_store(index).await?,
        _ => Arc::new(remote_store(&args.search_service, index_config(&args.search_service))?),
    };

    let mut builder = Retriever::builder()
        .config(rag_config(&args.retrieval)?)
        .embedding_provider(embedding_provider(&args.embedding)?)
        .backend(backend);
    if args.llm {
        let llm = FoundryLlmClient::new(FoundryConfig::from_env()?)
            .context("failed to configure the Azure AI Foundry client")?;
        builder = builder.llm(Arc::new(llm));
    }
    let retriever = builder.build()?;

    let mut session = repl::ChatSession::new(retriever, args.history.clone()).await?;
    match &args.query {
        Some(query) => session.ask(query).await,
        None => session.run().await,
    }
}

pub async fn azure(command: &AzureCommands) -> Result<()> {
    match command {
        AzureCommands::CreateIndex { recreate, keyword_only, search_service } => {
            let mut config = index_config(search_service);
            if *keyword_only {
                config = config.without_vector_search();
            }
            let store = remote_store(search_service, config)?;
            if store.create_index(*recreate).await? {
                println!("Created index {}", search_service.index_name);
            } else {
                println!("Index {} already exists (use --recreate to replace it)", search_service.index_name);
            }
        }
        AzureCommands::Upload { input, fields, search_service } => {
            let documents = read_documents(input, &fields.into()).await?;
            if documents.is_empty() {
                bail!("no usable documents in {}", input.display());
            }
            let store = remote_store(search_service, index_config(search_service))?;
            let uploaded = store.add_documents(&documents).await?;
            println!("Uploaded {uploaded} of {} documents to {}", documents.len(), search_service.index_name);
        }
        AzureCommands::Delete { ids, search_service } => {
            let store = remote_store(search_service, index_config(search_service))?;
            let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
            let deleted = store.delete_documents(&ids).await?;
            println!("Deleted {deleted} documents from {}", search_service.index_name);
        }
    }
    Ok(())
}

fn rag_config(args: &RetrievalArgs) -> Result<RagConfig> {
    let builder = RagConfig::builder().top_k(args.top_k);
    let builder = if args.no_threshold {
        builder.no_similarity_threshold()
    } else {
        builder.similarity_threshold(args.threshold)
    };
    Ok(builder.build()?)
}

fn embedding_provider(args: &EmbeddingArgs) -> Result<Arc<OpenAIEmbeddingProvider>> {
    let mut provider = OpenAIEmbeddingProvider::from_env()
        .context("query embeddings need an OpenAI-compatible API key")?
        .with_model(&args.model);
    if let Some(base_url) = &args.base_url {
        provider = provider.with_base_url(base_url);
    }
    if let Some(dimensions) = args.request_dimensions {
        provider = provider.with_dimensions(dimensions);
    }
    Ok(Arc::new(provider))
}

async fn local_store(path: &Path) -> Result<Arc<InMemoryVectorStore>> {
    let store = InMemoryVectorStore::new();
    let count = store
        .load(path)
        .await
        .with_context(|| format!("failed to load vector store from {}", path.display()))?;
    if count == 0 {
        warn!(path = %path.display(), "vector store is empty");
    }
    info!(count, path = %path.display(), "using local vector store");
    Ok(Arc::new(store))
}

fn index_config(args: &SearchServiceArgs) -> AzureSearchConfig {
    AzureSearchConfig::new(&args.index_name).with_embedding_dimension(args.vector_dimensions)
}

fn remote_store(args: &SearchServiceArgs, config: AzureSearchConfig) -> Result<AzureSearchVectorStore> {
    let store = AzureSearchVectorStore::from_endpoint(
        required(&args.endpoint, "AZURE_SEARCH_ENDPOINT")?,
        required(&args.api_key, "AZURE_SEARCH_API_KEY")?,
        config,
    )?;
    info!(index = %args.index_name, "using Azure AI Search");
    Ok(store)
}

fn required<'a>(value: &'a Option<String>, variable: &str) -> Result<&'a str> {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => bail!("{variable} is not set"),
    }
}

async fn read_documents(path: &Path, fields: &FieldNames) -> Result<Vec<Document>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let records: Vec<Value> =
        serde_json::from_str(&text).with_context(|| format!("{} is not a JSON array", path.display()))?;

    Ok(records
        .iter()
        .enumerate()
        .filter_map(|(position, record)| match Document::from_record(record, fields) {
            Ok(doc) => Some(doc),
            Err(issue) => {
                warn!(position, %issue, "skipping record");
                None
            }
        })
        .collect())
}
