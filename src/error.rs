//! Error types for the enrichment and retrieval engine.

use thiserror::Error;

use crate::models::DocumentStage;
use crate::utils::retry::Retryable;

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("invalid embedding input: {0}")]
    InvalidInput(String),

    /// Timeouts, rate limits, provider-side 5xx.
    #[error("transient embedding provider error: {0}")]
    Transient(String),

    /// Authentication, malformed request, invalid model.
    #[error("embedding provider error: {0}")]
    Permanent(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("tokenizer error: {0}")]
    Tokenizer(String),
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        matches!(self, EmbeddingError::Transient(_))
    }
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(err: reqwest::Error) -> Self {
        // Body and decode errors here come from reading the response stream;
        // JSON parsing is mapped separately by the caller.
        if err.is_timeout() || err.is_connect() || err.is_body() || err.is_decode() {
            return EmbeddingError::Transient(err.to_string());
        }
        match err.status() {
            Some(status) if is_transient_status(status.as_u16()) => {
                EmbeddingError::Transient(err.to_string())
            }
            _ => EmbeddingError::Permanent(err.to_string()),
        }
    }
}

/// HTTP statuses worth retrying: request timeout, rate limit, server errors.
pub fn is_transient_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..600).contains(&status)
}

/// Errors raised by the summarizer, scorer and classifier collaborators.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("transient analysis provider error: {0}")]
    Transient(String),

    #[error("analysis provider error: {0}")]
    Permanent(String),
}

/// Errors produced while enriching a single document.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{stage} failed: {source}")]
    Analysis {
        stage: &'static str,
        #[source]
        source: AnalysisError,
    },

    #[error("embedding failed at {stage} stage: {source}")]
    Embedding {
        stage: DocumentStage,
        #[source]
        source: EmbeddingError,
    },

    #[error("invalid document: {0}")]
    InvalidRecord(String),
}

/// Errors related to vector store operations.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("failed to connect to vector store: {0}")]
    ConnectionError(String),

    #[error("collection error: {0}")]
    CollectionError(String),

    #[error("upsert error: {0}")]
    UpsertError(String),

    #[error("search error: {0}")]
    SearchError(String),

    #[error("delete error: {0}")]
    DeleteError(String),

    #[error("vector store client error: {0}")]
    ClientError(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Application-level errors that wrap domain errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("infrastructure not running: {0}")]
    InfrastructureError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_error_retryable() {
        assert!(EmbeddingError::Transient("429".into()).is_retryable());
        assert!(!EmbeddingError::Permanent("401".into()).is_retryable());
        assert!(!EmbeddingError::InvalidInput("empty".into()).is_retryable());
        assert!(
            !EmbeddingError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_transient_status() {
        assert!(is_transient_status(408));
        assert!(is_transient_status(429));
        assert!(is_transient_status(503));
        assert!(!is_transient_status(400));
        assert!(!is_transient_status(401));
        assert!(!is_transient_status(404));
    }

    #[test]
    fn test_pipeline_error_names_stage() {
        let err = PipelineError::Analysis {
            stage: "scorer",
            source: AnalysisError::Permanent("quota".into()),
        };
        assert!(err.to_string().starts_with("scorer failed"));
    }
}
