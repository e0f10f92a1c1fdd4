//! Vector store abstraction layer.
//!
//! [`VectorBackend`] hides the concrete store (Qdrant, PostgreSQL/pgvector, or
//! the in-process memory store) behind typed payloads. [`VectorStoreGateway`]
//! builds record-level operations (embedding on write, similar-record lookup)
//! on top of a backend.

mod gateway;
mod memory;
mod pgvector;
mod qdrant;

pub use gateway::{Reference, VectorStoreGateway};
pub use memory::MemoryBackend;
pub use pgvector::PgVectorBackend;
pub use qdrant::QdrantBackend;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::VectorStoreError;
use crate::models::{
    RecordPayload, ScoredRecord, SearchFilter, StoredRecord, VectorDriver, VectorStoreConfig,
};

/// Similarity metric of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    Cosine,
    Euclid,
    Dot,
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistanceMetric::Cosine => write!(f, "cosine"),
            DistanceMetric::Euclid => write!(f, "euclid"),
            DistanceMetric::Dot => write!(f, "dot"),
        }
    }
}

/// Payload fields that carry a secondary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadField {
    SourceId,
    SourceType,
    Category,
    ImportanceScore,
    CollectedAt,
}

impl PayloadField {
    pub fn as_str(self) -> &'static str {
        match self {
            PayloadField::SourceId => "source_id",
            PayloadField::SourceType => "source_type",
            PayloadField::Category => "category",
            PayloadField::ImportanceScore => "importance_score",
            PayloadField::CollectedAt => "collected_at",
        }
    }

    pub fn kind(self) -> IndexKind {
        match self {
            PayloadField::SourceId | PayloadField::SourceType | PayloadField::Category => {
                IndexKind::Keyword
            }
            PayloadField::ImportanceScore => IndexKind::Float,
            PayloadField::CollectedAt => IndexKind::Datetime,
        }
    }
}

impl std::fmt::Display for PayloadField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Keyword,
    Float,
    Datetime,
}

/// Collection/table information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub points_count: u64,
    /// `None` when the store does not expose it (e.g. named vectors).
    pub vector_size: Option<u64>,
    pub distance: Option<DistanceMetric>,
}

/// A vector with its payload, as written to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: RecordPayload,
}

/// Storage operations every backend provides.
///
/// Point ids are UUID strings. Backends translate [`SearchFilter`] into their
/// native predicate language and return results in descending score order.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Short backend name for logs and status output.
    fn name(&self) -> &'static str;

    /// Collection (or table) name.
    fn collection(&self) -> &str;

    async fn health_check(&self) -> Result<bool, VectorStoreError>;

    /// Returns `None` if the collection doesn't exist.
    async fn collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError>;

    async fn create_collection(
        &self,
        vector_size: u64,
        distance: DistanceMetric,
    ) -> Result<(), VectorStoreError>;

    /// Drop the collection and every point in it. Missing collections are fine.
    async fn delete_collection(&self) -> Result<(), VectorStoreError>;

    async fn create_payload_index(&self, field: PayloadField) -> Result<(), VectorStoreError>;

    /// Insert or replace points in a single call.
    async fn upsert_points(&self, points: Vec<VectorPoint>) -> Result<(), VectorStoreError>;

    /// Fetch points by id; missing ids are skipped.
    async fn retrieve(
        &self,
        ids: &[String],
        with_vectors: bool,
    ) -> Result<Vec<StoredRecord>, VectorStoreError>;

    /// Replace the payload of an existing point, keeping its vector.
    async fn overwrite_payload(
        &self,
        id: &str,
        payload: &RecordPayload,
    ) -> Result<(), VectorStoreError>;

    /// Delete points by id; missing ids are ignored.
    async fn delete_points(&self, ids: &[String]) -> Result<(), VectorStoreError>;

    async fn count(&self) -> Result<u64, VectorStoreError>;

    async fn search(
        &self,
        vector: &[f32],
        limit: u64,
        score_threshold: Option<f32>,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredRecord>, VectorStoreError>;

    /// First point whose payload `source_id` matches, with its vector.
    async fn find_by_source_id(
        &self,
        source_id: &str,
    ) -> Result<Option<StoredRecord>, VectorStoreError>;
}

/// Create a vector store backend based on configuration.
pub async fn create_backend(
    config: &VectorStoreConfig,
) -> Result<Arc<dyn VectorBackend>, VectorStoreError> {
    match config.driver {
        VectorDriver::Qdrant => {
            let backend = QdrantBackend::new(config)?;
            Ok(Arc::new(backend))
        }
        VectorDriver::PostgreSQL => {
            let backend = PgVectorBackend::new(config).await?;
            Ok(Arc::new(backend))
        }
        VectorDriver::Memory => Ok(Arc::new(MemoryBackend::new(&config.collection))),
    }
}
