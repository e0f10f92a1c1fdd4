//! Collaborators that analyse a document before it is embedded.
//!
//! Implementations usually wrap an LLM provider. Any error is fatal for the
//! document being processed; the pipeline does not retry.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::AnalysisError;
use crate::models::{Classification, ImportanceScore, SummaryLanguage, SummaryLength};

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        title: &str,
        content: &str,
        language: SummaryLanguage,
        length: SummaryLength,
    ) -> Result<String, AnalysisError>;
}

#[async_trait]
pub trait Scorer: Send + Sync {
    /// Rate a document. `metadata` carries collector extras such as
    /// citation counts or the publication venue.
    async fn score(
        &self,
        title: &str,
        content: &str,
        metadata: &Map<String, Value>,
    ) -> Result<ImportanceScore, AnalysisError>;
}

#[async_trait]
pub trait Classifier: Send + Sync {
    /// `source_hint` is the document's source type ("paper", "news", ...).
    async fn classify(
        &self,
        title: &str,
        content: &str,
        source_hint: &str,
    ) -> Result<Classification, AnalysisError>;
}
