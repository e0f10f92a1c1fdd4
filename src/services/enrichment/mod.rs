//! Enrichment pipeline: raw document in, embedded record out.
//!
//! Summarisation, scoring and classification run concurrently per document.
//! Embedding starts only once all three have finished. Batches run documents
//! independently under a concurrency bound and report per-document failures.

mod analysis;
mod stats;

pub use analysis::{Classifier, Scorer, Summarizer};
pub use stats::{Statistics, filter_by_category, filter_by_min_score, statistics, top_by_importance};

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::error::{AnalysisError, PipelineError};
use crate::models::{
    DocumentStage, EnrichedRecord, EnrichmentConfig, RawDocument, RecordPayload, SummaryLanguage,
    SummaryLength,
};
use crate::services::embedding::Embedder;

/// Tunables for [`EnrichmentPipeline`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineOptions {
    pub summary_language: SummaryLanguage,
    pub summary_length: SummaryLength,
    pub max_concurrent: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from(&EnrichmentConfig::default())
    }
}

impl From<&EnrichmentConfig> for PipelineOptions {
    fn from(config: &EnrichmentConfig) -> Self {
        Self {
            summary_language: config.summary_language,
            summary_length: config.summary_length,
            max_concurrent: config.max_concurrent.max(1),
        }
    }
}

/// Outcome of [`EnrichmentPipeline::process_batch`].
#[derive(Debug)]
pub struct BatchReport {
    /// Successful records, in completion order.
    pub records: Vec<EnrichedRecord>,
    /// `(source_id, error)` per failed document.
    pub failures: Vec<(String, PipelineError)>,
    pub total: usize,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.records.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Every document failed. An empty batch is not a failure.
    pub fn is_total_failure(&self) -> bool {
        self.total > 0 && self.records.is_empty()
    }

    pub fn is_partial(&self) -> bool {
        !self.records.is_empty() && !self.failures.is_empty()
    }
}

/// Logs each stage change of one document.
struct StageTracker<'a> {
    source_id: &'a str,
    stage: DocumentStage,
}

impl<'a> StageTracker<'a> {
    fn new(source_id: &'a str) -> Self {
        Self {
            source_id,
            stage: DocumentStage::Pending,
        }
    }

    fn advance(&mut self, next: DocumentStage) {
        debug_assert!(
            self.stage.can_transition_to(next),
            "illegal stage transition {} -> {next}",
            self.stage
        );
        debug!(source_id = self.source_id, from = %self.stage, to = %next, "stage transition");
        self.stage = next;
    }
}

pub struct EnrichmentPipeline {
    summarizer: Arc<dyn Summarizer>,
    scorer: Arc<dyn Scorer>,
    classifier: Arc<dyn Classifier>,
    embedder: Arc<Embedder>,
    options: PipelineOptions,
}

impl EnrichmentPipeline {
    pub fn new(
        summarizer: Arc<dyn Summarizer>,
        scorer: Arc<dyn Scorer>,
        classifier: Arc<dyn Classifier>,
        embedder: Arc<Embedder>,
    ) -> Self {
        Self {
            summarizer,
            scorer,
            classifier,
            embedder,
            options: PipelineOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn embedder(&self) -> &Arc<Embedder> {
        &self.embedder
    }

    /// Enrich and embed a single document.
    pub async fn process_one(&self, doc: &RawDocument) -> Result<EnrichedRecord, PipelineError> {
        if doc.source_id.trim().is_empty() {
            return Err(PipelineError::InvalidRecord(
                "source_id must not be empty".to_string(),
            ));
        }
        if doc.title.trim().is_empty() {
            return Err(PipelineError::InvalidRecord(format!(
                "document {} has an empty title",
                doc.source_id
            )));
        }

        let started = Instant::now();
        let mut tracker = StageTracker::new(&doc.source_id);
        tracker.advance(DocumentStage::Analyzing);

        let (summary, score, classification) = tokio::join!(
            self.summarizer.summarize(
                &doc.title,
                &doc.content,
                self.options.summary_language,
                self.options.summary_length,
            ),
            self.scorer.score(&doc.title, &doc.content, &doc.metadata),
            self.classifier
                .classify(&doc.title, &doc.content, doc.source_type.as_hint()),
        );

        let analysed = match (summary, score, classification) {
            (Ok(summary), Ok(score), Ok(classification)) => (summary, score, classification),
            (summary, score, classification) => {
                let failure = first_failure(summary.err(), score.err(), classification.err());
                tracker.advance(DocumentStage::Failed);
                return Err(failure);
            }
        };
        let (summary, score, classification) = analysed;
        tracker.advance(DocumentStage::Summarized);

        let score = score.clamped();
        let mut payload = RecordPayload::new(
            doc.source_id.clone(),
            doc.title.clone(),
            doc.source_type.clone(),
            classification.category,
            score.final_score,
        );
        payload.summary = Some(summary).filter(|s| !s.trim().is_empty());
        payload.source_name = doc.source_name.clone();
        payload.url = doc.url.clone();
        payload.keywords = classification.keywords;
        payload.research_field = classification.research_field;
        payload.scores = Some(score);
        payload.collected_at = doc.collected_at.unwrap_or_else(Utc::now);
        payload.metadata = doc.metadata.clone();
        payload.validate().map_err(PipelineError::InvalidRecord)?;

        tracker.advance(DocumentStage::Embedding);
        let embedding = match self
            .embedder
            .embed_article(&doc.title, Some(&doc.content), payload.summary.as_deref())
            .await
        {
            Ok(embedding) => embedding,
            Err(source) => {
                tracker.advance(DocumentStage::Failed);
                return Err(PipelineError::Embedding {
                    stage: DocumentStage::Embedding,
                    source,
                });
            }
        };
        tracker.advance(DocumentStage::Complete);

        info!(
            source_id = %doc.source_id,
            importance = payload.importance_score,
            category = %payload.category,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "document enriched"
        );

        Ok(EnrichedRecord::new(payload)
            .with_content(doc.content.clone())
            .with_embedding(embedding))
    }

    /// Enrich many documents, at most `max_concurrent` at a time (the
    /// configured bound when `None`).
    pub async fn process_batch(
        &self,
        docs: &[RawDocument],
        max_concurrent: Option<usize>,
    ) -> BatchReport {
        let limit = max_concurrent
            .unwrap_or(self.options.max_concurrent)
            .max(1);
        let semaphore = Semaphore::new(limit);
        let started = Instant::now();

        let mut pending: FuturesUnordered<_> = docs
            .iter()
            .map(|doc| {
                let semaphore = &semaphore;
                async move {
                    let result = match semaphore.acquire().await {
                        Ok(_permit) => self.process_one(doc).await,
                        Err(err) => Err(PipelineError::InvalidRecord(format!(
                            "concurrency limiter closed: {err}"
                        ))),
                    };
                    (doc, result)
                }
            })
            .collect();

        let mut report = BatchReport {
            records: Vec::with_capacity(docs.len()),
            failures: Vec::new(),
            total: docs.len(),
        };

        while let Some((doc, result)) = pending.next().await {
            match result {
                Ok(record) => report.records.push(record),
                Err(err) => {
                    error!(source_id = %doc.source_id, error = %err, "document failed");
                    report.failures.push((doc.source_id.clone(), err));
                }
            }
        }

        if report.is_total_failure() {
            warn!(total = report.total, "every document in the batch failed");
        }
        info!(
            total = report.total,
            succeeded = report.succeeded(),
            failed = report.failed(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch enrichment finished"
        );
        report
    }
}

/// The first error in stage order: summarize, score, classify.
fn first_failure(
    summary: Option<AnalysisError>,
    score: Option<AnalysisError>,
    classification: Option<AnalysisError>,
) -> PipelineError {
    let (stage, source) = match (summary, score, classification) {
        (Some(err), _, _) => ("summarize", err),
        (None, Some(err), _) => ("score", err),
        (None, None, Some(err)) => ("classify", err),
        (None, None, None) => (
            "analysis",
            AnalysisError::Permanent("no analysis result".to_string()),
        ),
    };
    PipelineError::Analysis { stage, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmbeddingError;
    use crate::models::{Classification, ImportanceScore, SourceType};
    use crate::services::embedding::tests::FakeProvider;
    use async_trait::async_trait;
    use serde_json::{Map, Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Scripted analysis double. Titles containing `fail_on` make the
    /// configured stage fail.
    #[derive(Default)]
    struct Analyst {
        fail_summary: Option<&'static str>,
        fail_score: Option<&'static str>,
        fail_classify: Option<&'static str>,
        score: f32,
        delay: Option<Duration>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    impl Analyst {
        fn scoring(score: f32) -> Self {
            Self {
                score,
                ..Default::default()
            }
        }

        async fn work(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn check(marker: Option<&'static str>, title: &str) -> Result<(), AnalysisError> {
        match marker {
            Some(m) if title.contains(m) => Err(AnalysisError::Permanent(format!("rejected {m}"))),
            _ => Ok(()),
        }
    }

    #[async_trait]
    impl Summarizer for Analyst {
        async fn summarize(
            &self,
            title: &str,
            _content: &str,
            language: SummaryLanguage,
            _length: SummaryLength,
        ) -> Result<String, AnalysisError> {
            self.work().await;
            check(self.fail_summary, title)?;
            Ok(format!("[{language}] summary of {title}"))
        }
    }

    #[async_trait]
    impl Scorer for Analyst {
        async fn score(
            &self,
            title: &str,
            _content: &str,
            _metadata: &Map<String, Value>,
        ) -> Result<ImportanceScore, AnalysisError> {
            check(self.fail_score, title)?;
            Ok(ImportanceScore {
                innovation: 0.5,
                relevance: 0.5,
                impact: 0.5,
                timeliness: 0.5,
                final_score: self.score,
            })
        }
    }

    #[async_trait]
    impl Classifier for Analyst {
        async fn classify(
            &self,
            title: &str,
            _content: &str,
            source_hint: &str,
        ) -> Result<Classification, AnalysisError> {
            check(self.fail_classify, title)?;
            Ok(Classification {
                category: if source_hint == "paper" { "NLP" } else { "AI" }.to_string(),
                keywords: vec!["transformer".into()],
                research_field: Some("Machine Learning".into()),
            })
        }
    }

    fn pipeline(analyst: Arc<Analyst>, provider: Arc<FakeProvider>) -> EnrichmentPipeline {
        let embedder = Arc::new(Embedder::new(provider, 4));
        EnrichmentPipeline::new(analyst.clone(), analyst.clone(), analyst, embedder)
    }

    fn doc(id: &str, title: &str) -> RawDocument {
        RawDocument::new(id, title, "We propose a new architecture.", SourceType::Paper)
    }

    #[tokio::test]
    async fn test_process_one_composes_record() {
        let provider = Arc::new(FakeProvider::new(4));
        let pipeline = pipeline(Arc::new(Analyst::scoring(1.7)), provider.clone());

        let mut input = doc("art-1", "Attention");
        input.metadata.insert("citations".into(), json!(5000));
        let collected = chrono::DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        input.collected_at = Some(collected);

        let record = pipeline.process_one(&input).await.unwrap();
        assert_eq!(record.payload.importance_score, 1.0);
        assert_eq!(record.payload.category, "NLP");
        assert_eq!(record.payload.keywords, vec!["transformer"]);
        assert_eq!(record.payload.summary.as_deref(), Some("[ko] summary of Attention"));
        assert_eq!(record.payload.collected_at, collected);
        assert_eq!(record.payload.metadata["citations"], json!(5000));
        assert_eq!(record.embedding.len(), 4);
        assert_eq!(
            provider.inputs.lock().unwrap()[0],
            "Title: Attention\n\nSummary: [ko] summary of Attention\n\nContent: We propose a new architecture."
        );
    }

    #[tokio::test]
    async fn test_failing_stage_is_named() {
        let analyst = Arc::new(Analyst {
            fail_score: Some("bad"),
            fail_classify: Some("bad"),
            score: 0.5,
            ..Default::default()
        });
        let provider = Arc::new(FakeProvider::new(4));
        let pipeline = pipeline(analyst.clone(), provider.clone());

        let err = pipeline.process_one(&doc("x", "bad title")).await.unwrap_err();
        match err {
            PipelineError::Analysis { stage, .. } => assert_eq!(stage, "score"),
            other => panic!("unexpected error: {other}"),
        }
        // summarizer still ran; embedding never started
        assert_eq!(analyst.calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_reports_stage() {
        let provider = Arc::new(FakeProvider::new(4));
        provider
            .failures
            .lock()
            .unwrap()
            .push_back(EmbeddingError::Permanent("401".into()));
        let pipeline = pipeline(Arc::new(Analyst::scoring(0.5)), provider);

        let err = pipeline.process_one(&doc("x", "fine")).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Embedding {
                stage: DocumentStage::Embedding,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_empty_title_rejected() {
        let pipeline = pipeline(
            Arc::new(Analyst::scoring(0.5)),
            Arc::new(FakeProvider::new(4)),
        );
        assert!(matches!(
            pipeline.process_one(&doc("x", "  ")).await,
            Err(PipelineError::InvalidRecord(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_accounting_and_bound() {
        let analyst = Arc::new(Analyst {
            fail_summary: Some("broken"),
            score: 0.8,
            delay: Some(Duration::from_millis(50)),
            ..Default::default()
        });
        let pipeline = pipeline(analyst.clone(), Arc::new(FakeProvider::new(4)));

        let docs: Vec<RawDocument> = (0..7)
            .map(|i| {
                let title = if i % 3 == 0 { "broken" } else { "ok" };
                doc(&format!("doc-{i}"), &format!("{title} {i}"))
            })
            .collect();

        let report = pipeline.process_batch(&docs, Some(2)).await;
        assert_eq!(report.total, 7);
        assert_eq!(report.succeeded() + report.failed(), report.total);
        assert_eq!(report.failed(), 3);
        assert!(report.is_partial());
        assert!(!report.is_total_failure());
        assert!(analyst.peak.load(Ordering::SeqCst) <= 2);

        let failed: Vec<&str> = report.failures.iter().map(|(id, _)| id.as_str()).collect();
        for id in ["doc-0", "doc-3", "doc-6"] {
            assert!(failed.contains(&id));
        }
    }

    #[tokio::test]
    async fn test_batch_total_failure() {
        let analyst = Arc::new(Analyst {
            fail_classify: Some("x"),
            ..Default::default()
        });
        let pipeline = pipeline(analyst, Arc::new(FakeProvider::new(4)));
        let report = pipeline
            .process_batch(&[doc("a", "x1"), doc("b", "x2")], None)
            .await;
        assert!(report.is_total_failure());
        assert!(!report.is_partial());

        let empty = pipeline.process_batch(&[], None).await;
        assert!(!empty.is_total_failure());
        assert_eq!(empty.total, 0);
    }

    #[test]
    fn test_options_from_config() {
        let config = EnrichmentConfig {
            max_concurrent: 0,
            summary_language: SummaryLanguage::En,
            ..Default::default()
        };
        let options = PipelineOptions::from(&config);
        assert_eq!(options.max_concurrent, 1);
        assert_eq!(options.summary_language, SummaryLanguage::En);
    }
}
