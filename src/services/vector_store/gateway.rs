//! Record-level operations over a [`VectorBackend`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{CollectionInfo, VectorBackend, VectorPoint};
use crate::error::VectorStoreError;
use crate::models::{
    EnrichedRecord, RecordPatch, RecordPayload, ScoredRecord, SearchFilter, StoredRecord,
};
use crate::services::embedding::Embedder;
use crate::services::schema::SchemaManager;
use crate::utils::text::compose_article_text;

/// Identifies the record a similarity search starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Id inside the vector store.
    VectorId(String),
    /// Id of the canonical record in the external store.
    SourceId(String),
}

/// Gateway used by the pipeline's callers and the CLI.
///
/// Holds only the backend handle and the shared embedder; all state lives in
/// the store.
pub struct VectorStoreGateway {
    backend: Arc<dyn VectorBackend>,
    embedder: Arc<Embedder>,
}

impl VectorStoreGateway {
    pub fn new(backend: Arc<dyn VectorBackend>, embedder: Arc<Embedder>) -> Self {
        Self { backend, embedder }
    }

    /// Like [`new`](Self::new), but refuses a collection that is missing or
    /// does not match the declared schema for the embedder's dimension.
    pub async fn connect(
        backend: Arc<dyn VectorBackend>,
        embedder: Arc<Embedder>,
    ) -> Result<Self, VectorStoreError> {
        let report = SchemaManager::new(backend.clone(), embedder.dimension() as u64)
            .verify()
            .await;
        if !report.schema_valid {
            return Err(VectorStoreError::SchemaMismatch(report.errors.join("; ")));
        }
        debug!(collection = backend.collection(), "collection schema verified");
        Ok(Self::new(backend, embedder))
    }

    pub fn backend(&self) -> &Arc<dyn VectorBackend> {
        &self.backend
    }

    pub fn embedder(&self) -> &Arc<Embedder> {
        &self.embedder
    }

    pub async fn health_check(&self) -> Result<bool, VectorStoreError> {
        self.backend.health_check().await
    }

    pub async fn collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError> {
        self.backend.collection_info().await
    }

    pub async fn count(&self) -> Result<u64, VectorStoreError> {
        self.backend.count().await
    }

    /// Persist one record under a fresh vector id, embedding it first if needed.
    pub async fn upsert(&self, record: EnrichedRecord) -> Result<String, VectorStoreError> {
        let vector = if record.is_embedded() {
            record.embedding
        } else {
            self.embedder
                .embed_article(
                    &record.payload.title,
                    record.content.as_deref(),
                    record.payload.summary.as_deref(),
                )
                .await?
        };

        self.validate(&record.payload, &vector)?;

        let id = uuid::Uuid::new_v4().to_string();
        self.backend
            .upsert_points(vec![VectorPoint {
                id: id.clone(),
                vector,
                payload: record.payload,
            }])
            .await?;

        debug!(vector_id = %id, "record upserted");
        Ok(id)
    }

    /// Persist many records in one backend call.
    ///
    /// Records whose embedding or validation fails are skipped and logged; the
    /// returned ids cover only written records, in input order.
    pub async fn upsert_batch(
        &self,
        records: Vec<EnrichedRecord>,
    ) -> Result<Vec<String>, VectorStoreError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let pending: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.is_embedded())
            .map(|(i, _)| i)
            .collect();
        let texts: Vec<String> = pending
            .iter()
            .map(|&i| {
                let r = &records[i];
                compose_article_text(
                    &r.payload.title,
                    r.content.as_deref(),
                    r.payload.summary.as_deref(),
                )
            })
            .collect();
        let mut batch = self.embedder.embed_batch(&texts, None).await;

        let mut failed_embedding = vec![false; records.len()];
        for (pos, err) in &batch.errors {
            let index = pending[*pos];
            warn!(source_id = %records[index].source_id(), error = %err, "skipping record, embedding failed");
            failed_embedding[index] = true;
        }

        let mut computed = std::mem::take(&mut batch.vectors).into_iter();
        let total = records.len();
        let mut points = Vec::with_capacity(total);
        for (index, record) in records.into_iter().enumerate() {
            let vector = if record.is_embedded() {
                record.embedding
            } else {
                computed.next().unwrap_or_default()
            };
            if failed_embedding[index] {
                continue;
            }
            if let Err(err) = self.validate(&record.payload, &vector) {
                warn!(source_id = %record.payload.source_id, error = %err, "skipping invalid record");
                continue;
            }
            points.push(VectorPoint {
                id: uuid::Uuid::new_v4().to_string(),
                vector,
                payload: record.payload,
            });
        }

        let ids: Vec<String> = points.iter().map(|p| p.id.clone()).collect();
        self.backend.upsert_points(points).await?;

        info!(
            written = ids.len(),
            skipped = total - ids.len(),
            "batch upsert finished"
        );
        Ok(ids)
    }

    pub async fn get(&self, vector_id: &str) -> Result<StoredRecord, VectorStoreError> {
        self.fetch(vector_id, false).await
    }

    /// Existing records only; unknown ids are skipped.
    pub async fn get_batch(&self, ids: &[String]) -> Result<Vec<StoredRecord>, VectorStoreError> {
        let ids: Vec<String> = ids.iter().filter_map(|id| normalize_id(id).ok()).collect();
        self.backend.retrieve(&ids, false).await
    }

    /// Merge `patch` into a stored record.
    ///
    /// With `regenerate_embedding` and a patch touching title, summary or
    /// content, vector and payload are rewritten together; otherwise only the
    /// payload changes.
    pub async fn update(
        &self,
        vector_id: &str,
        patch: &RecordPatch,
        regenerate_embedding: bool,
    ) -> Result<(), VectorStoreError> {
        let reembed = regenerate_embedding && patch.touches_embedding_inputs();
        let current = self.fetch(vector_id, false).await?;

        let mut payload = current.payload;
        patch.apply(&mut payload);
        payload
            .validate()
            .map_err(VectorStoreError::InvalidRecord)?;

        if reembed {
            let vector = self
                .embedder
                .embed_article(
                    &payload.title,
                    patch.content.as_deref(),
                    payload.summary.as_deref(),
                )
                .await?;
            self.validate(&payload, &vector)?;
            self.backend
                .upsert_points(vec![VectorPoint {
                    id: current.vector_id,
                    vector,
                    payload,
                }])
                .await?;
        } else {
            self.backend
                .overwrite_payload(&current.vector_id, &payload)
                .await?;
        }

        debug!(vector_id, reembed, "record updated");
        Ok(())
    }

    /// Delete one record; `NotFound` if it does not exist.
    pub async fn delete(&self, vector_id: &str) -> Result<(), VectorStoreError> {
        let current = self.fetch(vector_id, false).await?;
        self.backend.delete_points(&[current.vector_id]).await
    }

    /// Delete many records; unknown ids are ignored.
    pub async fn delete_batch(&self, ids: &[String]) -> Result<(), VectorStoreError> {
        let ids: Vec<String> = ids.iter().filter_map(|id| normalize_id(id).ok()).collect();
        self.backend.delete_points(&ids).await
    }

    /// Cosine search with filter predicates ANDed and a hard score cutoff.
    pub async fn search(
        &self,
        vector: &[f32],
        limit: u64,
        score_threshold: Option<f32>,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredRecord>, VectorStoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        if vector.len() != self.embedder.dimension() {
            return Err(VectorStoreError::InvalidRecord(format!(
                "query vector has dimension {}, expected {}",
                vector.len(),
                self.embedder.dimension()
            )));
        }

        let results = self
            .backend
            .search(vector, limit, score_threshold, filter)
            .await?;
        debug!(
            limit,
            threshold = ?score_threshold,
            hits = results.len(),
            "vector search"
        );
        Ok(results)
    }

    /// Embed `query`, then [`search`](Self::search).
    pub async fn search_text(
        &self,
        query: &str,
        limit: u64,
        score_threshold: Option<f32>,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredRecord>, VectorStoreError> {
        let vector = self.embedder.embed(query).await?;
        self.search(&vector, limit, score_threshold, filter).await
    }

    /// Records similar to an existing one, never including the reference itself.
    pub async fn find_similar(
        &self,
        reference: &Reference,
        limit: u64,
        score_threshold: Option<f32>,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredRecord>, VectorStoreError> {
        let stored = match reference {
            Reference::VectorId(id) => self.fetch(id, true).await?,
            Reference::SourceId(source_id) => self
                .backend
                .find_by_source_id(source_id)
                .await?
                .ok_or_else(|| VectorStoreError::NotFound(format!("source_id {source_id}")))?,
        };

        let vector = stored.vector.ok_or_else(|| {
            VectorStoreError::InvalidRecord(format!("record {} has no vector", stored.vector_id))
        })?;

        let mut results = self
            .search(&vector, limit.saturating_add(1), score_threshold, filter)
            .await?;
        results.retain(|r| r.vector_id != stored.vector_id);
        results.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(results)
    }

    async fn fetch(
        &self,
        vector_id: &str,
        with_vector: bool,
    ) -> Result<StoredRecord, VectorStoreError> {
        let id = normalize_id(vector_id)?;
        let found = self
            .backend
            .retrieve(std::slice::from_ref(&id), with_vector)
            .await?;
        found
            .into_iter()
            .next()
            .ok_or(VectorStoreError::NotFound(id))
    }

    fn validate(&self, payload: &RecordPayload, vector: &[f32]) -> Result<(), VectorStoreError> {
        payload.validate().map_err(VectorStoreError::InvalidRecord)?;
        if vector.len() != self.embedder.dimension() {
            return Err(VectorStoreError::InvalidRecord(format!(
                "embedding has dimension {}, collection expects {}",
                vector.len(),
                self.embedder.dimension()
            )));
        }
        Ok(())
    }
}

/// Canonical (lowercase, hyphenated) form of a vector id. Ids that are not
/// UUIDs cannot exist in the store.
fn normalize_id(id: &str) -> Result<String, VectorStoreError> {
    uuid::Uuid::parse_str(id.trim())
        .map(|u| u.to_string())
        .map_err(|_| VectorStoreError::NotFound(id.to_string()))
}
