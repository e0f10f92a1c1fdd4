//! Ingest, enrich and search against the in-process backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value};

use curator::error::{AnalysisError, EmbeddingError};
use curator::models::{
    Classification, EnrichedRecord, ImportanceScore, RawDocument, RecordPayload, SearchFilter,
    SourceType, SummaryLanguage, SummaryLength,
};
use curator::services::{
    Classifier, Embedder, EmbeddingProvider, EnrichmentPipeline, MemoryBackend, Reference,
    SchemaManager, Scorer, Summarizer, VectorStoreGateway,
};

const DIM: usize = 8;

/// Maps known texts to fixed vectors; anything else gets a hashed vector.
struct TableProvider {
    table: HashMap<String, Vec<f32>>,
    calls: AtomicUsize,
}

impl TableProvider {
    fn new() -> Self {
        Self {
            table: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn hashed(text: &str) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    for (i, b) in text.bytes().enumerate() {
        v[(i * 7 + b as usize) % DIM] += 1.0;
    }
    v
}

#[async_trait]
impl EmbeddingProvider for TableProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .table
            .get(text)
            .cloned()
            .unwrap_or_else(|| hashed(text)))
    }

    fn model(&self) -> &str {
        "table"
    }
}

fn axis(i: usize, lean: f32) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    v[i] = 1.0;
    v[(i + 1) % DIM] = lean;
    v
}

fn payload(id: &str, source_type: SourceType, category: &str, score: f32) -> RecordPayload {
    RecordPayload::new(id, format!("Article {id}"), source_type, category, score)
}

async fn seeded() -> (VectorStoreGateway, Vec<String>) {
    let backend = Arc::new(MemoryBackend::new("articles"));
    SchemaManager::new(backend.clone(), DIM as u64)
        .initialize(false)
        .await
        .unwrap();
    let embedder = Arc::new(Embedder::new(Arc::new(TableProvider::new()), DIM));
    let gateway = VectorStoreGateway::connect(backend, embedder).await.unwrap();

    let records = vec![
        EnrichedRecord::new(payload("A", SourceType::Paper, "NLP", 0.95))
            .with_embedding(axis(0, 0.0)),
        EnrichedRecord::new(payload("B", SourceType::Report, "AI", 0.98))
            .with_embedding(axis(0, 0.3)),
        EnrichedRecord::new(payload("C", SourceType::News, "AI-Safety", 0.85))
            .with_embedding(axis(0, 0.6)),
    ];
    let ids = gateway.upsert_batch(records).await.unwrap();
    (gateway, ids)
}

#[tokio::test]
async fn source_type_filter_keeps_only_papers() {
    let (gateway, _) = seeded().await;
    let filter = SearchFilter::new().with_source_types(vec![SourceType::Paper]);

    let hits = gateway
        .search(&axis(0, 0.05), 5, Some(0.5), &filter)
        .await
        .unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].payload.source_id, "A");
}

#[tokio::test]
async fn results_are_ordered_and_thresholded() {
    let (gateway, _) = seeded().await;
    let hits = gateway
        .search(&axis(0, 0.0), 10, Some(0.9), &SearchFilter::default())
        .await
        .unwrap();

    assert!(!hits.is_empty());
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(hits.iter().all(|h| h.score >= 0.9));
    assert_eq!(hits[0].payload.source_id, "A");
}

#[tokio::test]
async fn filter_predicates_are_anded() {
    let (gateway, _) = seeded().await;
    let filter = SearchFilter::new()
        .with_categories(vec!["AI".into(), "AI-Safety".into()])
        .with_min_importance(0.9);

    let hits = gateway
        .search(&axis(0, 0.0), 10, None, &filter)
        .await
        .unwrap();

    let sources: Vec<&str> = hits.iter().map(|h| h.payload.source_id.as_str()).collect();
    assert_eq!(sources, vec!["B"]);
}

#[tokio::test]
async fn find_similar_never_returns_reference() {
    let (gateway, ids) = seeded().await;

    let hits = gateway
        .find_similar(
            &Reference::VectorId(ids[0].clone()),
            2,
            None,
            &SearchFilter::default(),
        )
        .await
        .unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.vector_id != ids[0]));

    let hits = gateway
        .find_similar(
            &Reference::SourceId("B".into()),
            10,
            None,
            &SearchFilter::default(),
        )
        .await
        .unwrap();
    assert!(hits.iter().all(|h| h.payload.source_id != "B"));
}

#[tokio::test]
async fn embedding_edge_cases() {
    let provider = Arc::new(TableProvider::new());
    let embedder = Embedder::new(provider.clone(), DIM).with_max_tokens(512);

    assert!(matches!(
        embedder.embed("").await,
        Err(EmbeddingError::InvalidInput(_))
    ));

    let long = "x".repeat(100_000);
    let vector = embedder.embed(&long).await.unwrap();
    assert_eq!(vector.len(), DIM);

    let again = embedder.embed(&long).await.unwrap();
    assert_eq!(vector, again);
    assert_eq!(provider.calls(), 1);
}

struct Analyst;

#[async_trait]
impl Summarizer for Analyst {
    async fn summarize(
        &self,
        title: &str,
        _content: &str,
        _language: SummaryLanguage,
        _length: SummaryLength,
    ) -> Result<String, AnalysisError> {
        if title.contains("timeout") {
            return Err(AnalysisError::Transient("provider timed out".into()));
        }
        Ok(format!("About {title}"))
    }
}

#[async_trait]
impl Scorer for Analyst {
    async fn score(
        &self,
        _title: &str,
        content: &str,
        _metadata: &Map<String, Value>,
    ) -> Result<ImportanceScore, AnalysisError> {
        let score = (content.len() as f32 / 100.0).min(1.0);
        Ok(ImportanceScore {
            innovation: score,
            relevance: score,
            impact: score,
            timeliness: score,
            final_score: score,
        })
    }
}

#[async_trait]
impl Classifier for Analyst {
    async fn classify(
        &self,
        _title: &str,
        _content: &str,
        source_hint: &str,
    ) -> Result<Classification, AnalysisError> {
        Ok(Classification {
            category: source_hint.to_uppercase(),
            keywords: Vec::new(),
            research_field: None,
        })
    }
}

#[tokio::test]
async fn enrich_then_store_then_search() {
    let (gateway, _) = seeded().await;
    let analyst = Arc::new(Analyst);
    let pipeline = EnrichmentPipeline::new(
        analyst.clone(),
        analyst.clone(),
        analyst,
        gateway.embedder().clone(),
    );

    let docs = vec![
        RawDocument::new("d1", "Sparse attention", "a".repeat(80), SourceType::Paper),
        RawDocument::new("d2", "timeout incoming", "b".repeat(40), SourceType::Blog),
        RawDocument::new("d3", "Chip exports", "c".repeat(20), SourceType::News),
    ];
    let report = pipeline.process_batch(&docs, Some(2)).await;

    assert_eq!(report.succeeded() + report.failed(), report.total);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.failures[0].0, "d2");
    assert!(report.is_partial());

    let ids = gateway.upsert_batch(report.records).await.unwrap();
    assert_eq!(ids.len(), 2);
    assert_eq!(gateway.count().await.unwrap(), 5);

    let stored = gateway.get_batch(&ids).await.unwrap();
    let paper = stored
        .iter()
        .find(|r| r.payload.source_id == "d1")
        .unwrap();
    assert_eq!(paper.payload.category, "PAPER");
    assert!((paper.payload.importance_score - 0.8).abs() < 1e-6);
    assert_eq!(paper.payload.summary.as_deref(), Some("About Sparse attention"));

    let filter = SearchFilter::new().with_categories(vec!["NEWS".into()]);
    let hits = gateway
        .search_text("Chip exports", 5, None, &filter)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].payload.source_id, "d3");
}
