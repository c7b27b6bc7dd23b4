//! LLM client trait and chat message types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The author of a chat message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One turn of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

/// A hosted language model that answers a query from retrieved context.
///
/// Failures are returned as errors, never as in-band answer text.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate an answer to `query` using `context` blocks and prior turns.
    async fn generate(
        &self,
        query: &str,
        context: &[String],
        chat_history: &[ChatMessage],
    ) -> Result<String>;

    /// A short name used in logs and errors.
    fn name(&self) -> &str {
        "llm"
    }
}

/// Build the system message that grounds the model in `context`.
pub fn system_message(context: &[String]) -> String {
    let context_text = context.join("\n\n");
    format!(
        "You are a helpful assistant that provides accurate information about executive orders \
         and government guidance based on the context provided.\n\n\
         CONTEXT:\n{context_text}\n\n\
         Based solely on the above context, answer the user's question. If the answer cannot be \
         determined from the context, say \"I don't have enough information to answer that \
         question.\" Do not make up information.\n"
    )
}

/// Assemble the chat transcript sent to a chat-completions model: the
/// grounding system message, the prior turns, then the user's query.
pub fn build_messages(
    query: &str,
    context: &[String],
    chat_history: &[ChatMessage],
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(chat_history.len() + 2);
    messages.push(ChatMessage::system(system_message(context)));
    messages.extend(chat_history.iter().cloned());
    messages.push(ChatMessage::user(query));
    messages
}
