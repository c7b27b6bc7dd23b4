mod cli;
mod commands;
mod display;
mod repl;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Build { input, output_dir, name, fields } => {
            commands::build(&input, &output_dir, name.as_deref(), &fields).await
        }
        Commands::Search { index, query, retrieval, embedding } => {
            commands::search(&index, &query, &retrieval, &embedding).await
        }
        Commands::Chat(args) => commands::chat(&args).await,
        Commands::Azure(command) => commands::azure(&command).await,
    }
}
