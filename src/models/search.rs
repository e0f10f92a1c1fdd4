//! Search-related models for filters and results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::{RecordPayload, ScoredRecord};
use super::source::SourceType;

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
    /// Documentation-friendly Markdown format
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

/// Conjunction of optional payload predicates.
///
/// Empty lists and `None` leave a dimension unconstrained, so the default
/// filter matches every record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    /// Source type must be one of these (OR within the list).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_types: Vec<SourceType>,
    /// Category must be one of these (OR within the list).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_importance: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collected_from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collected_to: Option<DateTime<Utc>>,
}

impl SearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_source_types(mut self, source_types: Vec<SourceType>) -> Self {
        self.source_types = source_types;
        self
    }

    #[must_use]
    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = categories;
        self
    }

    #[must_use]
    pub fn with_min_importance(mut self, min: f32) -> Self {
        self.min_importance = Some(min);
        self
    }

    #[must_use]
    pub fn with_collected_range(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.collected_from = from;
        self.collected_to = to;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.source_types.is_empty()
            && self.categories.is_empty()
            && self.min_importance.is_none()
            && self.collected_from.is_none()
            && self.collected_to.is_none()
    }

    /// Evaluate the filter against a payload in process.
    pub fn matches(&self, payload: &RecordPayload) -> bool {
        if !self.source_types.is_empty() && !self.source_types.contains(&payload.source_type) {
            return false;
        }
        if !self.categories.is_empty() && !self.categories.contains(&payload.category) {
            return false;
        }
        if let Some(min) = self.min_importance
            && payload.importance_score < min
        {
            return false;
        }
        if let Some(from) = self.collected_from
            && payload.collected_at < from
        {
            return false;
        }
        if let Some(to) = self.collected_to
            && payload.collected_at > to
        {
            return false;
        }
        true
    }
}

/// Collection of search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    /// Query text, or a description of the reference record
    pub query: String,

    /// Matching records in descending score order
    pub results: Vec<ScoredRecord>,

    /// Query execution time in milliseconds
    pub duration_ms: u64,
}

impl SearchResults {
    pub fn new(query: String, results: Vec<ScoredRecord>, duration_ms: u64) -> Self {
        Self {
            query,
            results,
            duration_ms,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }
}
