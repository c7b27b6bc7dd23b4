//! Terminal rendering of search results and answers.

use eo_rag::SearchResult;
use eo_rag::document::keys;

const SNIPPET_CHARS: usize = 200;

/// Print ranked results with their scores and provenance.
pub fn print_results(results: &[SearchResult]) {
    if results.is_empty() {
        println!("No documents matched.");
        return;
    }

    println!("Found {} relevant documents:", results.len());
    for (i, result) in results.iter().enumerate() {
        println!();
        println!("Result {} (score: {:.4})", i + 1, result.similarity_score);
        println!("  Source: {}", field(result, keys::SOURCE_FILENAME));
        println!("  Title: {}", field(result, keys::TITLE));
        println!("  Executive Order: {}", field(result, keys::EO_NUMBER));
        println!("  Content: {}", snippet(&result.content, SNIPPET_CHARS));
    }
}

fn field(result: &SearchResult, key: &str) -> String {
    result.metadata_text(key).unwrap_or_else(|| "Unknown".to_string())
}

/// The first `max_chars` characters of `text` on one line, with an ellipsis
/// when cut.
pub fn snippet(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_cuts_on_char_boundaries() {
        assert_eq!(snippet("short", 10), "short");
        assert_eq!(snippet("line one\nline   two", 100), "line one line two");
        assert_eq!(snippet("ééééé", 3), "ééé...");
    }
}
