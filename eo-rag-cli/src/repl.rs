//! Interactive question answering loop.

use std::path::PathBuf;

use anyhow::{Context, Result};
use eo_rag::{ChatMessage, Retriever};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{error, warn};

use crate::display;

const FALLBACK_ANSWER: &str =
    "I'm sorry, I encountered an error while generating a response. Please try again later.";

/// One conversation: the retriever, the turns so far and where to keep them.
pub struct ChatSession {
    retriever: Retriever,
    history: Vec<ChatMessage>,
    history_path: Option<PathBuf>,
}

impl ChatSession {
    /// Start a session, resuming the conversation stored at `history_path`.
    pub async fn new(retriever: Retriever, history_path: Option<PathBuf>) -> Result<Self> {
        let history = match &history_path {
            Some(path) if tokio::fs::try_exists(path).await.unwrap_or(false) => {
                let text = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("failed to read history from {}", path.display()))?;
                serde_json::from_str(&text).unwrap_or_else(|e| {
                    warn!(path = %path.display(), error = %e, "ignoring unreadable chat history");
                    Vec::new()
                })
            }
            _ => Vec::new(),
        };
        Ok(Self { retriever, history, history_path })
    }

    /// Answer one query. Without an LLM the retrieved documents are shown.
    pub async fn ask(&mut self, query: &str) -> Result<()> {
        if !self.retriever.can_generate() {
            let results = self.retriever.retrieve(query, None).await?;
            display::print_results(&results);
            return Ok(());
        }

        let answer = match self.retriever.process_query(query, &self.history).await {
            Ok(answer) => answer,
            // Upstream outages get a polite answer; anything else is a real error.
            Err(e) if e.is_upstream() => {
                error!(error = %e, "answer generation failed");
                println!("{FALLBACK_ANSWER}");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        println!("{}", self.retriever.format_response_with_sources(&answer.answer, &answer.sources));
        self.history.push(ChatMessage::user(query));
        self.history.push(ChatMessage::assistant(answer.answer));
        self.save_history().await
    }

    /// Read queries until `exit`, `quit` or end of input.
    pub async fn run(&mut self) -> Result<()> {
        println!("Ask a question about executive orders. Commands:");
        println!("  !clear    - Forget the conversation so far");
        println!("  !history  - Show the conversation so far");
        println!("  exit      - Leave (or Ctrl+D)");
        println!();

        let mut rl = DefaultEditor::new().context("Failed to initialize readline")?;
        loop {
            match rl.readline("You> ") {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(input);

                    match input {
                        "exit" | "quit" => break,
                        "!clear" => {
                            self.history.clear();
                            self.save_history().await?;
                            println!("Conversation cleared.");
                        }
                        "!history" => self.print_history(),
                        query => {
                            if let Err(e) = self.ask(query).await {
                                eprintln!("Error: {e:#}");
                            }
                        }
                    }
                    println!();
                }
                Err(ReadlineError::Interrupted) => {
                    println!("Interrupted. Type exit or press Ctrl+D to leave.");
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("Error: {err:?}");
                    break;
                }
            }
        }
        Ok(())
    }

    fn print_history(&self) {
        if self.history.is_empty() {
            println!("No conversation yet.");
        }
        for message in &self.history {
            println!("{}: {}", message.role.as_str(), display::snippet(&message.content, 200));
        }
    }

    async fn save_history(&self) -> Result<()> {
        let Some(path) = &self.history_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&self.history)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("failed to save history to {}", path.display()))
    }
}
