//! Prompt assembly and citation formatting.
//!
//! Everything here is deterministic: the same retrieval result always yields
//! the same context block, prompt and source list.

use crate::document::{SearchResult, SourceCitation, keys};

/// Separator placed between document blocks in a context string.
pub const CONTEXT_DELIMITER: &str = "\n----\n";

/// Answer returned when retrieval finds nothing; the LLM is not consulted.
pub const NO_RESULTS_MESSAGE: &str =
    "I couldn't find any relevant information to answer your question.";

/// Format retrieved documents into a context block, preserving rank order.
///
/// Each document becomes
///
/// ```text
/// [Document {n}]:
/// {header}
///
/// {content}
/// ```
///
/// where the header names the title, else the executive order number, and
/// always the source file. Blocks are joined by [`CONTEXT_DELIMITER`].
pub fn format_context(documents: &[SearchResult]) -> String {
    documents
        .iter()
        .enumerate()
        .map(|(i, doc)| format!("[Document {}]:\n{}\n\n{}\n", i + 1, context_header(doc), doc.content))
        .collect::<Vec<_>>()
        .join(CONTEXT_DELIMITER)
}

fn context_header(doc: &SearchResult) -> String {
    if doc.metadata.is_empty() {
        return String::new();
    }
    let source = doc
        .metadata_text(keys::SOURCE_FILENAME)
        .unwrap_or_else(|| "Unknown source".to_string());

    if let Some(title) = doc.metadata_text(keys::TITLE) {
        format!("Title: {title}\nSource: {source}")
    } else if let Some(eo_number) = doc.metadata_text(keys::EO_NUMBER) {
        format!("Executive Order: {eo_number}\nSource: {source}")
    } else {
        format!("Source: {source}")
    }
}

/// Wrap the formatted context in the answering instructions.
pub fn generate_prompt(query: &str, documents: &[SearchResult]) -> String {
    let context = format_context(documents);
    format!(
        "You are an AI assistant helping with questions about executive orders and government \
         guidance.\n\
         Use the following context to answer the question. If the information is not in the \
         context, just say that you don't have enough information to answer and explain why, \
         being specific about what the question is asking for and what's missing from the \
         provided context. In your answer, refer to specific executive orders or guidance \
         documents by their correct titles or numbers.\n\n\
         CONTEXT:\n{context}\n\n\
         QUESTION: {query}\n\n\
         ANSWER:"
    )
}

/// Citation details for every retrieved document, in rank order.
///
/// Sources reflect what was retrieved, not what the answer ended up using.
pub fn extract_source_documents(documents: &[SearchResult]) -> Vec<SourceCitation> {
    documents
        .iter()
        .map(|doc| SourceCitation {
            title: doc
                .metadata_text(keys::TITLE)
                .or_else(|| doc.metadata_text(keys::SOURCE_FILENAME))
                .unwrap_or_else(|| "Unknown Source".to_string()),
            eo_number: doc.metadata_text(keys::EO_NUMBER),
            page: doc.metadata_text(keys::PAGE_NUMBER),
            chunk_id: doc.id.clone(),
        })
        .collect()
}

/// Append a numbered `Sources:` list to an answer.
///
/// The answer is returned unchanged when there are no sources.
pub fn format_response_with_sources(answer: &str, sources: &[SourceCitation]) -> String {
    if sources.is_empty() {
        return answer.to_string();
    }

    let lines = sources
        .iter()
        .enumerate()
        .map(|(i, source)| {
            let mut line = match &source.eo_number {
                Some(eo_number) => format!("{}. Executive Order {eo_number}", i + 1),
                None => format!("{}. {}", i + 1, source.title),
            };
            if let Some(page) = &source.page {
                line.push_str(&format!(", page {page}"));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!("{answer}\n\nSources:\n{lines}")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::document::Metadata;

    fn result(id: &str, content: &str, metadata: serde_json::Value) -> SearchResult {
        let metadata: Metadata = match metadata {
            serde_json::Value::Object(map) => map.into_iter().collect(),
            _ => Metadata::new(),
        };
        SearchResult { id: Some(id.into()), content: content.into(), metadata, similarity_score: 0.9 }
    }

    #[test]
    fn context_headers_prefer_title_then_order_number() {
        let docs = vec![
            result("a", "alpha", json!({"title": "Safe AI", "source_filename": "eo14110.pdf"})),
            result("b", "beta", json!({"eo_number": "14028"})),
            result("c", "gamma", json!({"chunk_index": 2})),
            result("d", "delta", json!({})),
        ];

        let context = format_context(&docs);
        assert_eq!(
            context,
            "[Document 1]:\nTitle: Safe AI\nSource: eo14110.pdf\n\nalpha\n\
             \n----\n\
             [Document 2]:\nExecutive Order: 14028\nSource: Unknown source\n\nbeta\n\
             \n----\n\
             [Document 3]:\nSource: Unknown source\n\ngamma\n\
             \n----\n\
             [Document 4]:\n\n\ndelta\n"
        );
    }

    #[test]
    fn empty_documents_give_empty_context() {
        assert_eq!(format_context(&[]), "");
    }

    #[test]
    fn prompt_keeps_context_question_answer_structure() {
        let docs = vec![result("a", "alpha", json!({"title": "Safe AI"}))];
        let prompt = generate_prompt("What does it require?", &docs);

        assert!(prompt.contains("don't have enough information"));
        assert!(prompt.contains("what's missing"));
        let context_at = prompt.find("CONTEXT:\n[Document 1]:").unwrap();
        let question_at = prompt.find("QUESTION: What does it require?").unwrap();
        assert!(context_at < question_at);
        assert!(prompt.ends_with("ANSWER:"));
    }

    #[test]
    fn citations_fall_back_through_title_sources() {
        let docs = vec![
            result("a", "x", json!({"title": "Safe AI", "eo_number": 14110, "page_number": 3})),
            result("b", "x", json!({"source_filename": "memo.pdf"})),
            result("c", "x", json!({})),
        ];
        let sources = extract_source_documents(&docs);

        assert_eq!(
            sources[0],
            SourceCitation {
                title: "Safe AI".into(),
                eo_number: Some("14110".into()),
                page: Some("3".into()),
                chunk_id: Some("a".into()),
            }
        );
        assert_eq!(sources[1].title, "memo.pdf");
        assert_eq!(sources[2].title, "Unknown Source");
        assert_eq!(sources[2].eo_number, None);
    }

    #[test]
    fn sources_are_numbered_after_the_answer() {
        let sources = vec![
            SourceCitation {
                title: "Safe AI".into(),
                eo_number: Some("14110".into()),
                page: Some("3".into()),
                chunk_id: None,
            },
            SourceCitation { title: "memo.pdf".into(), eo_number: None, page: None, chunk_id: None },
        ];

        assert_eq!(
            format_response_with_sources("The answer.", &sources),
            "The answer.\n\nSources:\n1. Executive Order 14110, page 3\n2. memo.pdf"
        );
    }

    #[test]
    fn answer_without_sources_is_unchanged() {
        assert_eq!(format_response_with_sources("The answer.", &[]), "The answer.");
    }
}
