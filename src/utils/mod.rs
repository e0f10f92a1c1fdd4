//! Utility modules.

pub mod retry;
pub mod text;

pub use retry::{RetryConfig, Retryable, with_retry};
pub use text::{char_prefix, compose_article_text};
