//! Collection bootstrap and verification.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::VectorStoreError;
use crate::services::vector_store::{CollectionInfo, DistanceMetric, PayloadField, VectorBackend};

/// Declared shape of the collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    pub vector_size: u64,
    pub distance: DistanceMetric,
    pub indexes: Vec<PayloadField>,
}

impl CollectionSchema {
    pub fn new(name: impl Into<String>, vector_size: u64) -> Self {
        Self {
            name: name.into(),
            vector_size,
            distance: DistanceMetric::Cosine,
            indexes: vec![
                PayloadField::SourceType,
                PayloadField::Category,
                PayloadField::ImportanceScore,
                PayloadField::CollectedAt,
                PayloadField::SourceId,
            ],
        }
    }
}

/// Outcome of [`SchemaManager::verify`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaReport {
    pub exists: bool,
    pub schema_valid: bool,
    pub errors: Vec<String>,
    pub info: Option<CollectionInfo>,
}

pub struct SchemaManager {
    backend: Arc<dyn VectorBackend>,
    schema: CollectionSchema,
}

impl SchemaManager {
    pub fn new(backend: Arc<dyn VectorBackend>, vector_size: u64) -> Self {
        let schema = CollectionSchema::new(backend.collection(), vector_size);
        Self { backend, schema }
    }

    pub fn describe(&self) -> &CollectionSchema {
        &self.schema
    }

    /// Make sure the collection exists with the declared vector size.
    ///
    /// `recreate` drops any existing collection first. An existing collection
    /// with a different vector size is a [`VectorStoreError::SchemaMismatch`].
    pub async fn ensure_collection(&self, recreate: bool) -> Result<(), VectorStoreError> {
        let existing = self.backend.collection_info().await?;

        match existing {
            Some(_) if recreate => {
                warn!(collection = %self.schema.name, "dropping collection for recreate");
                self.backend.delete_collection().await?;
            }
            Some(info) => {
                if let Some(size) = info.vector_size
                    && size != self.schema.vector_size
                {
                    return Err(VectorStoreError::SchemaMismatch(format!(
                        "collection '{}' has vector size {size}, configured {}",
                        self.schema.name, self.schema.vector_size
                    )));
                }
                debug!(collection = %self.schema.name, "collection already exists");
                return Ok(());
            }
            None => {}
        }

        self.backend
            .create_collection(self.schema.vector_size, self.schema.distance)
            .await?;
        info!(
            collection = %self.schema.name,
            vector_size = self.schema.vector_size,
            distance = %self.schema.distance,
            "collection created"
        );

        for field in &self.schema.indexes {
            match self.backend.create_payload_index(*field).await {
                Ok(()) => debug!(field = %field, "payload index created"),
                Err(err) => warn!(field = %field, error = %err, "failed to create payload index"),
            }
        }
        Ok(())
    }

    /// Compare the live collection with the declared schema. Never mutates.
    pub async fn verify(&self) -> SchemaReport {
        let info = match self.backend.collection_info().await {
            Ok(Some(info)) => info,
            Ok(None) => {
                return SchemaReport {
                    errors: vec![format!("collection '{}' does not exist", self.schema.name)],
                    ..Default::default()
                };
            }
            Err(err) => {
                return SchemaReport {
                    errors: vec![err.to_string()],
                    ..Default::default()
                };
            }
        };

        let mut errors = Vec::new();
        match info.vector_size {
            Some(size) if size != self.schema.vector_size => errors.push(format!(
                "vector size {size}, expected {}",
                self.schema.vector_size
            )),
            None => errors.push("vector size unknown".to_string()),
            _ => {}
        }
        match info.distance {
            Some(distance) if distance != self.schema.distance => errors.push(format!(
                "distance {distance}, expected {}",
                self.schema.distance
            )),
            None => errors.push("distance unknown".to_string()),
            _ => {}
        }

        SchemaReport {
            exists: true,
            schema_valid: errors.is_empty(),
            errors,
            info: Some(info),
        }
    }

    /// Health check, then [`ensure_collection`](Self::ensure_collection), then
    /// [`verify`](Self::verify).
    pub async fn initialize(&self, recreate: bool) -> Result<SchemaReport, VectorStoreError> {
        if !self.backend.health_check().await? {
            return Err(VectorStoreError::ConnectionError(format!(
                "{} backend is not healthy",
                self.backend.name()
            )));
        }

        self.ensure_collection(recreate).await?;

        let report = self.verify().await;
        if !report.schema_valid {
            return Err(VectorStoreError::SchemaMismatch(report.errors.join("; ")));
        }
        info!(collection = %self.schema.name, "collection ready");
        Ok(report)
    }
}
