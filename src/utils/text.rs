//! Text processing utilities.

/// Characters of document content included in the embedding text.
pub const ARTICLE_CONTENT_CHARS: usize = 1000;

/// First `max_chars` characters of `text`, never splitting a code point.
pub fn char_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Build the text embedded for an article.
///
/// Sections are separated by a blank line; summary and content are left out
/// when absent or blank.
pub fn compose_article_text(title: &str, content: Option<&str>, summary: Option<&str>) -> String {
    let mut parts = vec![format!("Title: {}", title.trim())];

    if let Some(summary) = summary.map(str::trim).filter(|s| !s.is_empty()) {
        parts.push(format!("Summary: {summary}"));
    }

    if let Some(content) = content.map(str::trim).filter(|c| !c.is_empty()) {
        parts.push(format!(
            "Content: {}",
            char_prefix(content, ARTICLE_CONTENT_CHARS)
        ));
    }

    parts.join("\n\n")
}
