//! In-process vector store using cosine similarity.
//!
//! Backed by a `HashMap` behind a `tokio::sync::RwLock`; nothing is
//! persisted. Used for tests and local experiments.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{CollectionInfo, DistanceMetric, PayloadField, VectorBackend, VectorPoint};
use crate::error::VectorStoreError;
use crate::models::{RecordPayload, ScoredRecord, SearchFilter, StoredRecord};

#[derive(Debug)]
struct Collection {
    vector_size: u64,
    distance: DistanceMetric,
    indexes: Vec<PayloadField>,
    points: HashMap<String, (Vec<f32>, RecordPayload)>,
}

#[derive(Debug)]
pub struct MemoryBackend {
    collection: String,
    state: RwLock<Option<Collection>>,
}

impl MemoryBackend {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            state: RwLock::new(None),
        }
    }

    /// Indexed fields, in creation order.
    pub async fn indexes(&self) -> Vec<PayloadField> {
        self.state
            .read()
            .await
            .as_ref()
            .map(|c| c.indexes.clone())
            .unwrap_or_default()
    }

    fn missing(&self) -> VectorStoreError {
        VectorStoreError::CollectionError(format!(
            "collection '{}' does not exist",
            self.collection
        ))
    }
}

/// Cosine similarity; 0.0 if either vector has zero magnitude.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn collection(&self) -> &str {
        &self.collection
    }

    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        Ok(true)
    }

    async fn collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError> {
        Ok(self.state.read().await.as_ref().map(|c| CollectionInfo {
            points_count: c.points.len() as u64,
            vector_size: Some(c.vector_size),
            distance: Some(c.distance),
        }))
    }

    async fn create_collection(
        &self,
        vector_size: u64,
        distance: DistanceMetric,
    ) -> Result<(), VectorStoreError> {
        let mut state = self.state.write().await;
        if state.is_some() {
            return Err(VectorStoreError::CollectionError(format!(
                "collection '{}' already exists",
                self.collection
            )));
        }
        *state = Some(Collection {
            vector_size,
            distance,
            indexes: Vec::new(),
            points: HashMap::new(),
        });
        debug!(collection = %self.collection, vector_size, "created memory collection");
        Ok(())
    }

    async fn delete_collection(&self) -> Result<(), VectorStoreError> {
        self.state.write().await.take();
        Ok(())
    }

    async fn create_payload_index(&self, field: PayloadField) -> Result<(), VectorStoreError> {
        let mut state = self.state.write().await;
        let collection = state.as_mut().ok_or_else(|| self.missing())?;
        if !collection.indexes.contains(&field) {
            collection.indexes.push(field);
        }
        Ok(())
    }

    async fn upsert_points(&self, points: Vec<VectorPoint>) -> Result<(), VectorStoreError> {
        let mut state = self.state.write().await;
        let collection = state.as_mut().ok_or_else(|| self.missing())?;

        if let Some(bad) = points
            .iter()
            .find(|p| p.vector.len() as u64 != collection.vector_size)
        {
            return Err(VectorStoreError::UpsertError(format!(
                "point {} has dimension {}, collection expects {}",
                bad.id,
                bad.vector.len(),
                collection.vector_size
            )));
        }

        for point in points {
            collection
                .points
                .insert(point.id, (point.vector, point.payload));
        }
        Ok(())
    }

    async fn retrieve(
        &self,
        ids: &[String],
        with_vectors: bool,
    ) -> Result<Vec<StoredRecord>, VectorStoreError> {
        let state = self.state.read().await;
        let collection = state.as_ref().ok_or_else(|| self.missing())?;

        Ok(ids
            .iter()
            .filter_map(|id| {
                collection.points.get(id).map(|(vector, payload)| StoredRecord {
                    vector_id: id.clone(),
                    payload: payload.clone(),
                    vector: with_vectors.then(|| vector.clone()),
                })
            })
            .collect())
    }

    async fn overwrite_payload(
        &self,
        id: &str,
        payload: &RecordPayload,
    ) -> Result<(), VectorStoreError> {
        let mut state = self.state.write().await;
        let collection = state.as_mut().ok_or_else(|| self.missing())?;
        let entry = collection
            .points
            .get_mut(id)
            .ok_or_else(|| VectorStoreError::NotFound(id.to_string()))?;
        entry.1 = payload.clone();
        Ok(())
    }

    async fn delete_points(&self, ids: &[String]) -> Result<(), VectorStoreError> {
        let mut state = self.state.write().await;
        let collection = state.as_mut().ok_or_else(|| self.missing())?;
        for id in ids {
            collection.points.remove(id);
        }
        Ok(())
    }

    async fn count(&self) -> Result<u64, VectorStoreError> {
        let state = self.state.read().await;
        let collection = state.as_ref().ok_or_else(|| self.missing())?;
        Ok(collection.points.len() as u64)
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: u64,
        score_threshold: Option<f32>,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredRecord>, VectorStoreError> {
        let state = self.state.read().await;
        let collection = state.as_ref().ok_or_else(|| self.missing())?;

        if vector.len() as u64 != collection.vector_size {
            return Err(VectorStoreError::SearchError(format!(
                "query has dimension {}, collection expects {}",
                vector.len(),
                collection.vector_size
            )));
        }

        let mut scored: Vec<ScoredRecord> = collection
            .points
            .iter()
            .filter(|(_, (_, payload))| filter.matches(payload))
            .map(|(id, (stored, payload))| ScoredRecord {
                vector_id: id.clone(),
                score: cosine_similarity(stored, vector),
                payload: payload.clone(),
            })
            .filter(|r| score_threshold.is_none_or(|t| r.score >= t))
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.vector_id.cmp(&b.vector_id))
        });
        scored.truncate(limit as usize);
        Ok(scored)
    }

    async fn find_by_source_id(
        &self,
        source_id: &str,
    ) -> Result<Option<StoredRecord>, VectorStoreError> {
        let state = self.state.read().await;
        let collection = state.as_ref().ok_or_else(|| self.missing())?;

        Ok(collection
            .points
            .iter()
            .find(|(_, (_, payload))| payload.source_id == source_id)
            .map(|(id, (vector, payload))| StoredRecord {
                vector_id: id.clone(),
                payload: payload.clone(),
                vector: Some(vector.clone()),
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceType;

    fn point(id: &str, vector: Vec<f32>, source_type: SourceType, score: f32) -> VectorPoint {
        VectorPoint {
            id: id.to_string(),
            vector,
            payload: RecordPayload::new(format!("src-{id}"), id, source_type, "AI", score),
        }
    }

    async fn seeded() -> MemoryBackend {
        let backend = MemoryBackend::new("test");
        backend
            .create_collection(2, DistanceMetric::Cosine)
            .await
            .unwrap();
        backend
            .upsert_points(vec![
                point("a", vec![1.0, 0.0], SourceType::Paper, 0.9),
                point("b", vec![0.8, 0.6], SourceType::News, 0.5),
                point("c", vec![0.0, 1.0], SourceType::Paper, 0.7),
            ])
            .await
            .unwrap();
        backend
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_search_orders_and_thresholds() {
        let backend = seeded().await;
        let results = backend
            .search(&[1.0, 0.0], 10, Some(0.5), &SearchFilter::default())
            .await
            .unwrap();

        let ids: Vec<&str> = results.iter().map(|r| r.vector_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn test_search_applies_filter_before_limit() {
        let backend = seeded().await;
        let filter = SearchFilter::new().with_source_types(vec![SourceType::Paper]);
        let results = backend.search(&[1.0, 0.0], 1, None, &filter).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].vector_id, "a");
    }

    #[tokio::test]
    async fn test_upsert_rejects_wrong_dimension() {
        let backend = seeded().await;
        let err = backend
            .upsert_points(vec![point("d", vec![1.0], SourceType::Blog, 0.1)])
            .await;
        assert!(matches!(err, Err(VectorStoreError::UpsertError(_))));
        assert_eq!(backend.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_missing_collection_errors() {
        let backend = MemoryBackend::new("none");
        assert!(matches!(
            backend.count().await,
            Err(VectorStoreError::CollectionError(_))
        ));
    }

    #[tokio::test]
    async fn test_find_by_source_id_includes_vector() {
        let backend = seeded().await;
        let found = backend.find_by_source_id("src-c").await.unwrap().unwrap();
        assert_eq!(found.vector_id, "c");
        assert_eq!(found.vector, Some(vec![0.0, 1.0]));
        assert!(backend.find_by_source_id("src-z").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_retrieve_skips_missing() {
        let backend = seeded().await;
        let records = backend
            .retrieve(&["a".to_string(), "zzz".to_string()], false)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].vector.is_none());
    }
}
