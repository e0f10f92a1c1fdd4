//! Token counting and token-boundary truncation.

use std::path::Path;

use tokenizers::Tokenizer;

use crate::error::EmbeddingError;

/// Counts tokens and truncates text to a token budget.
///
/// `truncate` must be idempotent: truncating already-truncated text returns
/// it unchanged.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> Result<usize, EmbeddingError>;

    fn truncate(&self, text: &str, max_tokens: usize) -> Result<String, EmbeddingError>;
}

/// Exact counts from a Hugging Face `tokenizer.json`.
pub struct HfTokenCounter {
    tokenizer: Tokenizer,
}

impl HfTokenCounter {
    pub fn from_file(path: &Path) -> Result<Self, EmbeddingError> {
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| EmbeddingError::Tokenizer(format!("{}: {e}", path.display())))?;
        Ok(Self { tokenizer })
    }

    pub fn from_tokenizer(tokenizer: Tokenizer) -> Self {
        Self { tokenizer }
    }

    fn encode(&self, text: &str) -> Result<tokenizers::Encoding, EmbeddingError> {
        self.tokenizer
            .encode(text, false)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))
    }
}

impl TokenCounter for HfTokenCounter {
    fn count(&self, text: &str) -> Result<usize, EmbeddingError> {
        Ok(self.encode(text)?.len())
    }

    fn truncate(&self, text: &str, max_tokens: usize) -> Result<String, EmbeddingError> {
        if max_tokens == 0 {
            return Ok(String::new());
        }

        let mut current = text;
        loop {
            let encoding = self.encode(current)?;
            if encoding.len() <= max_tokens {
                return Ok(current.to_string());
            }

            // Cut right after the last token that fits, then re-check: some
            // tokenizers merge differently once the tail is gone.
            let offsets = encoding.get_offsets();
            let mut end = offsets
                .get(max_tokens - 1)
                .map_or(current.len(), |&(_, end)| end)
                .min(current.len());
            if end >= current.len() {
                end = current.len().saturating_sub(1);
            }
            current = &current[..floor_char_boundary(current, end)];
        }
    }
}

/// Approximation of roughly four characters per token.
///
/// Used when no tokenizer file is configured.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicTokenCounter {
    chars_per_token: usize,
}

impl HeuristicTokenCounter {
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }
}

impl Default for HeuristicTokenCounter {
    fn default() -> Self {
        Self::new(4)
    }
}

impl TokenCounter for HeuristicTokenCounter {
    fn count(&self, text: &str) -> Result<usize, EmbeddingError> {
        Ok(text.chars().count().div_ceil(self.chars_per_token))
    }

    fn truncate(&self, text: &str, max_tokens: usize) -> Result<String, EmbeddingError> {
        let max_chars = max_tokens.saturating_mul(self.chars_per_token);
        Ok(text.chars().take(max_chars).collect())
    }
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
