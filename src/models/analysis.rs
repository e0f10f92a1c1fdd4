//! Outputs of the per-document analyses and pipeline stage tracking.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Importance assessment produced by a [`Scorer`](crate::services::Scorer).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImportanceScore {
    pub innovation: f32,
    pub relevance: f32,
    pub impact: f32,
    pub timeliness: f32,
    /// Weighted overall score, the value stored as `importance_score`.
    pub final_score: f32,
}

impl ImportanceScore {
    /// Returns a copy with every component clamped into [0, 1].
    ///
    /// NaN components collapse to 0.
    pub fn clamped(self) -> Self {
        Self {
            innovation: clamp_unit(self.innovation),
            relevance: clamp_unit(self.relevance),
            impact: clamp_unit(self.impact),
            timeliness: clamp_unit(self.timeliness),
            final_score: clamp_unit(self.final_score),
        }
    }
}

pub(crate) fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Topic assignment produced by a [`Classifier`](crate::services::Classifier).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub research_field: Option<String>,
}

/// Language the summarizer should write in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryLanguage {
    #[default]
    Ko,
    En,
}

impl fmt::Display for SummaryLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryLanguage::Ko => write!(f, "ko"),
            SummaryLanguage::En => write!(f, "en"),
        }
    }
}

/// Target summary length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl fmt::Display for SummaryLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryLength::Short => write!(f, "short"),
            SummaryLength::Medium => write!(f, "medium"),
            SummaryLength::Long => write!(f, "long"),
        }
    }
}

/// Processing stage of a single document inside the enrichment pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStage {
    Pending,
    Analyzing,
    Summarized,
    Embedding,
    Complete,
    Failed,
}

impl DocumentStage {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: DocumentStage) -> bool {
        use DocumentStage::*;
        matches!(
            (self, next),
            (Pending, Analyzing)
                | (Analyzing, Summarized)
                | (Analyzing, Failed)
                | (Summarized, Embedding)
                | (Embedding, Complete)
                | (Embedding, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DocumentStage::Complete | DocumentStage::Failed)
    }
}

impl fmt::Display for DocumentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentStage::Pending => "pending",
            DocumentStage::Analyzing => "analyzing",
            DocumentStage::Summarized => "summarized",
            DocumentStage::Embedding => "embedding",
            DocumentStage::Complete => "complete",
            DocumentStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamped_score() {
        let score = ImportanceScore {
            innovation: 1.4,
            relevance: -0.2,
            impact: f32::NAN,
            timeliness: 0.5,
            final_score: 1.01,
        }
        .clamped();
        assert_eq!(score.innovation, 1.0);
        assert_eq!(score.relevance, 0.0);
        assert_eq!(score.impact, 0.0);
        assert_eq!(score.timeliness, 0.5);
        assert_eq!(score.final_score, 1.0);
    }

    #[test]
    fn test_stage_transitions() {
        use DocumentStage::*;
        assert!(Pending.can_transition_to(Analyzing));
        assert!(Analyzing.can_transition_to(Failed));
        assert!(Embedding.can_transition_to(Failed));
        assert!(!Summarized.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Complete));
        assert!(Complete.is_terminal());
        assert!(!Embedding.is_terminal());
    }

    #[test]
    fn test_summary_options_serde() {
        let lang: SummaryLanguage = serde_json::from_str("\"en\"").unwrap();
        assert_eq!(lang, SummaryLanguage::En);
        assert_eq!(SummaryLength::default().to_string(), "medium");
    }
}
