//! Documents, enriched records and their persisted payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::analysis::{ImportanceScore, clamp_unit};
use super::source::SourceType;

/// Payload field names owned by [`RecordPayload`]; metadata may not shadow them.
pub const RESERVED_FIELDS: &[&str] = &[
    "source_id",
    "title",
    "summary",
    "source_type",
    "source_name",
    "url",
    "category",
    "keywords",
    "research_field",
    "importance_score",
    "scores",
    "collected_at",
    "collected_at_ts",
    "metadata",
];

/// A document as handed over by the external relational store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    pub source_id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub source_type: SourceType,
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub collected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl RawDocument {
    pub fn new(
        source_id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        source_type: SourceType,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            title: title.into(),
            content: content.into(),
            source_type,
            source_name: None,
            url: None,
            collected_at: None,
            metadata: Map::new(),
        }
    }
}

/// Typed payload stored next to each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPayload {
    pub source_id: String,
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    pub source_type: SourceType,
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    pub category: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub research_field: Option<String>,
    pub importance_score: f32,
    #[serde(default)]
    pub scores: Option<ImportanceScore>,
    pub collected_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl RecordPayload {
    /// Minimal payload; enrichment fields start empty.
    pub fn new(
        source_id: impl Into<String>,
        title: impl Into<String>,
        source_type: SourceType,
        category: impl Into<String>,
        importance_score: f32,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            title: title.into(),
            summary: None,
            source_type,
            source_name: None,
            url: None,
            category: category.into(),
            keywords: Vec::new(),
            research_field: None,
            importance_score,
            scores: None,
            collected_at: Utc::now(),
            metadata: Map::new(),
        }
    }

    /// Checks the invariants enforced before any write.
    pub fn validate(&self) -> Result<(), String> {
        if self.source_id.trim().is_empty() {
            return Err("source_id must not be empty".to_string());
        }
        if self.title.trim().is_empty() {
            return Err("title must not be empty".to_string());
        }
        if !(0.0..=1.0).contains(&self.importance_score) {
            return Err(format!(
                "importance_score {} outside [0, 1]",
                self.importance_score
            ));
        }
        if let Some(key) = self
            .metadata
            .keys()
            .find(|key| RESERVED_FIELDS.contains(&key.as_str()))
        {
            return Err(format!("metadata key '{key}' shadows a payload field"));
        }
        Ok(())
    }
}

/// Output of the enrichment pipeline, ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    pub payload: RecordPayload,
    /// Full document text; used for embedding only, never persisted.
    pub content: Option<String>,
    /// Empty until embedded.
    pub embedding: Vec<f32>,
}

impl EnrichedRecord {
    pub fn new(payload: RecordPayload) -> Self {
        Self {
            payload,
            content: None,
            embedding: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }

    pub fn source_id(&self) -> &str {
        &self.payload.source_id
    }

    pub fn is_embedded(&self) -> bool {
        !self.embedding.is_empty()
    }
}

/// A record read back from the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub vector_id: String,
    pub payload: RecordPayload,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub vector: Option<Vec<f32>>,
}

/// A search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub vector_id: String,
    /// Cosine similarity to the query vector.
    pub score: f32,
    pub payload: RecordPayload,
}

/// Partial update of a stored record. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub title: Option<String>,
    pub summary: Option<String>,
    /// Only used to regenerate the embedding.
    pub content: Option<String>,
    pub source_type: Option<SourceType>,
    pub category: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub research_field: Option<String>,
    pub importance_score: Option<f32>,
    /// Merged key by key into the existing metadata.
    pub metadata: Option<Map<String, Value>>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        *self == RecordPatch::default()
    }

    /// Whether the patch changes any text the embedding is computed from.
    pub fn touches_embedding_inputs(&self) -> bool {
        self.title.is_some() || self.content.is_some() || self.summary.is_some()
    }

    /// Merge the supplied fields into `payload`.
    pub fn apply(&self, payload: &mut RecordPayload) {
        if let Some(title) = &self.title {
            payload.title = title.clone();
        }
        if let Some(summary) = &self.summary {
            payload.summary = Some(summary.clone());
        }
        if let Some(source_type) = &self.source_type {
            payload.source_type = source_type.clone();
        }
        if let Some(category) = &self.category {
            payload.category = category.clone();
        }
        if let Some(keywords) = &self.keywords {
            payload.keywords = keywords.clone();
        }
        if let Some(field) = &self.research_field {
            payload.research_field = Some(field.clone());
        }
        if let Some(score) = self.importance_score {
            payload.importance_score = clamp_unit(score);
        }
        if let Some(metadata) = &self.metadata {
            for (key, value) in metadata {
                payload.metadata.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> RecordPayload {
        RecordPayload::new("art-1", "Scaling laws", SourceType::Paper, "NLP", 0.9)
    }

    #[test]
    fn test_validate_accepts_well_formed() {
        assert!(payload().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_score() {
        let mut p = payload();
        p.importance_score = 1.5;
        assert!(p.validate().unwrap_err().contains("importance_score"));
        p.importance_score = f32::NAN;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_shadowing_metadata() {
        let mut p = payload();
        p.metadata.insert("category".into(), json!("oops"));
        assert!(p.validate().unwrap_err().contains("category"));
    }

    #[test]
    fn test_patch_apply_merges_metadata() {
        let mut p = payload();
        p.metadata.insert("citations".into(), json!(10));
        p.metadata.insert("venue".into(), json!("ACL"));

        let mut extra = Map::new();
        extra.insert("citations".into(), json!(42));
        let patch = RecordPatch {
            category: Some("AI".into()),
            importance_score: Some(1.2),
            metadata: Some(extra),
            ..Default::default()
        };
        patch.apply(&mut p);

        assert_eq!(p.category, "AI");
        assert_eq!(p.importance_score, 1.0);
        assert_eq!(p.metadata["citations"], json!(42));
        assert_eq!(p.metadata["venue"], json!("ACL"));
        assert!(!patch.touches_embedding_inputs());
    }

    #[test]
    fn test_patch_embedding_inputs() {
        assert!(RecordPatch::default().is_empty());
        let patch = RecordPatch {
            summary: Some("new".into()),
            ..Default::default()
        };
        assert!(patch.touches_embedding_inputs());
        assert!(!patch.is_empty());
    }
}
