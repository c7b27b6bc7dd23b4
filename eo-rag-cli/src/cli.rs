use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "eo-rag")]
#[command(about = "Question answering over executive orders", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Build a vector store snapshot from embedded document records")]
    Build {
        #[arg(short, long, help = "JSON array of records with content, metadata and embedding")]
        input: PathBuf,

        #[arg(short, long, default_value = "data/vector_store", help = "Directory for the snapshot")]
        output_dir: PathBuf,

        #[arg(long, help = "Snapshot file name (default: timestamped)")]
        name: Option<String>,

        #[command(flatten)]
        fields: FieldArgs,
    },

    #[command(about = "Show the documents most similar to a query")]
    Search {
        #[arg(long, env = "VECTOR_DB_PATH", help = "Vector store snapshot to search")]
        index: PathBuf,

        #[arg(short, long, help = "The query to search for")]
        query: String,

        #[command(flatten)]
        retrieval: RetrievalArgs,

        #[command(flatten)]
        embedding: EmbeddingArgs,
    },

    #[command(about = "Ask questions, once or interactively")]
    Chat(ChatArgs),

    #[command(subcommand, about = "Manage an Azure AI Search index")]
    Azure(AzureCommands),
}

#[derive(Args)]
pub struct ChatArgs {
    #[arg(
        long,
        env = "VECTOR_DB_PATH",
        conflicts_with = "azure",
        required_unless_present = "azure",
        help = "Vector store snapshot to search"
    )]
    pub index: Option<PathBuf>,

    #[arg(long, help = "Search an Azure AI Search index instead of a local snapshot")]
    pub azure: bool,

    #[arg(short, long, help = "Answer a single query and exit")]
    pub query: Option<String>,

    #[arg(long, help = "Generate answers with the Azure AI Foundry model")]
    pub llm: bool,

    #[arg(long, help = "File the conversation is loaded from and saved to")]
    pub history: Option<PathBuf>,

    #[command(flatten)]
    pub retrieval: RetrievalArgs,

    #[command(flatten)]
    pub embedding: EmbeddingArgs,

    #[command(flatten)]
    pub search_service: SearchServiceArgs,
}

#[derive(Subcommand)]
pub enum AzureCommands {
    #[command(about = "Create the search index")]
    CreateIndex {
        #[arg(long, help = "Delete and recreate the index if it exists")]
        recreate: bool,

        #[arg(long, help = "Create the index without a vector field")]
        keyword_only: bool,

        #[command(flatten)]
        search_service: SearchServiceArgs,
    },

    #[command(about = "Upload embedded document records")]
    Upload {
        #[arg(short, long, help = "JSON array of records with content, metadata and embedding")]
        input: PathBuf,

        #[command(flatten)]
        fields: FieldArgs,

        #[command(flatten)]
        search_service: SearchServiceArgs,
    },

    #[command(about = "Delete documents by id")]
    Delete {
        #[arg(long = "id", required = true, help = "Document id (repeatable)")]
        ids: Vec<String>,

        #[command(flatten)]
        search_service: SearchServiceArgs,
    },
}

#[derive(Args)]
pub struct RetrievalArgs {
    #[arg(short = 'k', long, default_value_t = 4, help = "Number of documents to retrieve")]
    pub top_k: usize,

    #[arg(long, default_value_t = 0.4, help = "Minimum similarity score")]
    pub threshold: f32,

    #[arg(long, conflicts_with = "threshold", help = "Return results regardless of score")]
    pub no_threshold: bool,
}

#[derive(Args)]
pub struct EmbeddingArgs {
    #[arg(
        long = "embedding-model",
        env = "EMBEDDING_MODEL_NAME",
        default_value = "text-embedding-ada-002",
        help = "Model used to embed queries; must match the stored embeddings"
    )]
    pub model: String,

    #[arg(long = "embedding-base-url", env = "OPENAI_BASE_URL", help = "OpenAI-compatible API base URL")]
    pub base_url: Option<String>,

    #[arg(long = "embedding-dimensions", help = "Request embeddings truncated to this size")]
    pub request_dimensions: Option<usize>,
}

#[derive(Args)]
pub struct SearchServiceArgs {
    #[arg(long = "azure-endpoint", env = "AZURE_SEARCH_ENDPOINT")]
    pub endpoint: Option<String>,

    #[arg(long = "azure-api-key", env = "AZURE_SEARCH_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(
        long = "azure-index",
        env = "AZURE_SEARCH_INDEX_NAME",
        default_value = "executive-orders",
        help = "Search index name"
    )]
    pub index_name: String,

    #[arg(
        long = "azure-dimensions",
        env = "AZURE_SEARCH_EMBEDDING_DIMENSION",
        default_value_t = 384,
        help = "Vector field dimension used when creating the index"
    )]
    pub vector_dimensions: usize,
}

#[derive(Args)]
pub struct FieldArgs {
    #[arg(long, default_value = "embedding", help = "Record field holding the embedding")]
    pub embeddings_field: String,

    #[arg(long, default_value = "content", help = "Record field holding the text")]
    pub content_field: String,

    #[arg(long, default_value = "metadata", help = "Record field holding the metadata")]
    pub metadata_field: String,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn chat_accepts_remote_backend() {
        let parsed = Cli::try_parse_from(["eo-rag", "chat", "--azure", "--llm", "-k", "2"]).unwrap();
        match parsed.command {
            Commands::Chat(args) => {
                assert!(args.azure && args.llm);
                assert_eq!(args.retrieval.top_k, 2);
            }
            _ => panic!("expected chat"),
        }
    }

    #[test]
    fn azure_delete_collects_ids() {
        let parsed =
            Cli::try_parse_from(["eo-rag", "azure", "delete", "--id", "a", "--id", "b"]).unwrap();
        match parsed.command {
            Commands::Azure(AzureCommands::Delete { ids, .. }) => assert_eq!(ids, ["a", "b"]),
            _ => panic!("expected azure delete"),
        }
    }
}
