//! Embedding adapter: text to fixed-dimension vectors.
//!
//! [`Embedder`] sits in front of an [`EmbeddingProvider`] and adds input
//! validation, token-limit truncation, a content-addressed cache and retry
//! with exponential backoff. Batch embedding runs in fixed windows with a
//! pause between windows to stay under provider rate limits.

mod cache;
mod openai;
mod tokenizer;

pub use cache::EmbeddingCache;
pub use openai::OpenAiProvider;
pub use tokenizer::{HeuristicTokenCounter, HfTokenCounter, TokenCounter};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::error::EmbeddingError;
use crate::models::{DEFAULT_MAX_TOKENS, EmbeddingConfig};
use crate::utils::retry::{RetryConfig, with_retry};
use crate::utils::text::compose_article_text;

/// Remote (or local) model that turns one text into one vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Model identifier, for logs and status output.
    fn model(&self) -> &str;
}

/// Result of [`Embedder::embed_batch`].
///
/// `vectors` is positionally aligned with the input. A failed item holds a
/// zero vector and has a matching entry in `errors`; callers must consult
/// `errors` rather than inspect the vector.
#[derive(Debug)]
pub struct BatchEmbedding {
    pub vectors: Vec<Vec<f32>>,
    pub errors: Vec<(usize, EmbeddingError)>,
}

impl BatchEmbedding {
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn is_ok(&self, index: usize) -> bool {
        index < self.vectors.len() && !self.errors.iter().any(|(i, _)| *i == index)
    }

    pub fn succeeded(&self) -> usize {
        self.vectors.len() - self.errors.len()
    }

    pub fn failed(&self) -> usize {
        self.errors.len()
    }
}

/// Embedding adapter shared by the pipeline and the vector store gateway.
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    counter: Arc<dyn TokenCounter>,
    cache: Option<EmbeddingCache>,
    dimension: usize,
    max_tokens: usize,
    retry: RetryConfig,
    batch_concurrency: usize,
    batch_delay: Duration,
}

impl Embedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, dimension: usize) -> Self {
        Self {
            provider,
            counter: Arc::new(HeuristicTokenCounter::default()),
            cache: Some(EmbeddingCache::new()),
            dimension,
            max_tokens: DEFAULT_MAX_TOKENS,
            retry: RetryConfig::default(),
            batch_concurrency: 10,
            batch_delay: Duration::from_millis(500),
        }
    }

    /// Build the HTTP provider and token counter described by `config`.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let provider = Arc::new(OpenAiProvider::new(config)?);
        let counter: Arc<dyn TokenCounter> = match &config.tokenizer_path {
            Some(path) => Arc::new(HfTokenCounter::from_file(path)?),
            None => Arc::new(HeuristicTokenCounter::default()),
        };

        let retry = RetryConfig::new(config.max_retries)
            .with_initial_delay(Duration::from_millis(config.initial_backoff_ms))
            .with_max_delay(Duration::from_millis(config.max_backoff_ms));

        let mut embedder = Self::new(provider, config.dimension as usize)
            .with_token_counter(counter)
            .with_max_tokens(config.max_tokens)
            .with_retry(retry)
            .with_batch_window(
                config.batch_concurrency,
                Duration::from_millis(config.batch_delay_ms),
            );
        if !config.cache_enabled {
            embedder = embedder.without_cache();
        }

        info!(
            model = %config.model,
            dimension = config.dimension,
            exact_tokens = config.tokenizer_path.is_some(),
            "embedder initialized"
        );
        Ok(embedder)
    }

    #[must_use]
    pub fn with_token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = counter;
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens.max(1);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_batch_window(mut self, concurrency: usize, delay: Duration) -> Self {
        self.batch_concurrency = concurrency.max(1);
        self.batch_delay = delay;
        self
    }

    #[must_use]
    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    pub fn count_tokens(&self, text: &str) -> Result<usize, EmbeddingError> {
        self.counter.count(text)
    }

    /// Truncate `text` to the configured token limit.
    pub fn truncate(&self, text: &str) -> Result<String, EmbeddingError> {
        self.counter.truncate(text, self.max_tokens)
    }

    pub async fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear().await;
            debug!("embedding cache cleared");
        }
    }

    pub async fn cache_size(&self) -> usize {
        match &self.cache {
            Some(cache) => cache.len().await,
            None => 0,
        }
    }

    /// Embed a single text.
    ///
    /// Cache hits return before tokenization or any provider call.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput(
                "text must not be empty".to_string(),
            ));
        }

        let key = EmbeddingCache::key(text);
        if let Some(cache) = &self.cache
            && let Some(vector) = cache.get(&key).await
        {
            debug!(key = %&key[..12], "embedding cache hit");
            return Ok(vector);
        }

        let tokens = self.counter.count(text)?;
        let prepared = if tokens > self.max_tokens {
            warn!(
                tokens,
                max_tokens = self.max_tokens,
                "text exceeds token limit, truncating"
            );
            self.counter.truncate(text, self.max_tokens)?
        } else {
            text.to_string()
        };

        let vector = with_retry(&self.retry, || self.provider.embed(&prepared)).await?;

        if vector.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        if let Some(cache) = &self.cache {
            cache.insert(key, vector.clone()).await;
        }
        Ok(vector)
    }

    /// Embed many texts in windows of `concurrency` (the configured window
    /// size when `None`).
    ///
    /// Never fails as a whole; see [`BatchEmbedding`].
    pub async fn embed_batch(&self, texts: &[String], concurrency: Option<usize>) -> BatchEmbedding {
        let window = concurrency.unwrap_or(self.batch_concurrency).max(1);
        let mut vectors = Vec::with_capacity(texts.len());
        let mut errors = Vec::new();

        for (window_index, chunk) in texts.chunks(window).enumerate() {
            if window_index > 0 && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }

            let results = join_all(chunk.iter().map(|text| self.embed(text))).await;
            for (offset, result) in results.into_iter().enumerate() {
                let index = window_index * window + offset;
                match result {
                    Ok(vector) => vectors.push(vector),
                    Err(err) => {
                        warn!(index, error = %err, "batch item failed to embed");
                        vectors.push(vec![0.0; self.dimension]);
                        errors.push((index, err));
                    }
                }
            }
        }

        debug!(
            total = texts.len(),
            failed = errors.len(),
            window,
            "batch embedding finished"
        );
        BatchEmbedding { vectors, errors }
    }

    /// Embed an article from its title, content and optional summary.
    pub async fn embed_article(
        &self,
        title: &str,
        content: Option<&str>,
        summary: Option<&str>,
    ) -> Result<Vec<f32>, EmbeddingError> {
        self.embed(&compose_article_text(title, content, summary))
            .await
    }
}
