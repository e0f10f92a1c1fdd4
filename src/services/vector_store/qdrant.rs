//! Qdrant vector store backend implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_config::Config as VectorsConfigKind;
use qdrant_client::qdrant::vectors_output::VectorsOptions;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
    DeletePointsBuilder, Distance, FieldType, Filter, GetPointsBuilder, PointId, PointStruct,
    PointsIdsList, Range, ScrollPointsBuilder, SearchPointsBuilder, SetPayloadPointsBuilder,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder, VectorsOutput,
};
use qdrant_client::{Payload, Qdrant, QdrantError};
use tracing::debug;

use super::{CollectionInfo, DistanceMetric, IndexKind, PayloadField, VectorBackend, VectorPoint};
use crate::error::VectorStoreError;
use crate::models::{RecordPayload, ScoredRecord, SearchFilter, StoredRecord, VectorStoreConfig};

/// Numeric mirror of `collected_at` (Unix seconds) used for range filters.
const COLLECTED_AT_TS: &str = "collected_at_ts";

/// Qdrant vector store backend.
pub struct QdrantBackend {
    client: Qdrant,
    collection: String,
}

impl QdrantBackend {
    pub fn new(config: &VectorStoreConfig) -> Result<Self, VectorStoreError> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
        })
    }

    fn build_search_filter(filter: &SearchFilter) -> Option<Filter> {
        let mut must_conditions: Vec<Condition> = Vec::new();

        if !filter.source_types.is_empty() {
            let conditions: Vec<Condition> = filter
                .source_types
                .iter()
                .map(|st| Condition::matches("source_type", st.to_string()))
                .collect();
            must_conditions.push(Filter::should(conditions).into());
        }

        if !filter.categories.is_empty() {
            let conditions: Vec<Condition> = filter
                .categories
                .iter()
                .map(|c| Condition::matches("category", c.clone()))
                .collect();
            must_conditions.push(Filter::should(conditions).into());
        }

        if let Some(min) = filter.min_importance {
            must_conditions.push(Condition::range(
                "importance_score",
                Range {
                    gte: Some(f64::from(min)),
                    ..Default::default()
                },
            ));
        }

        if filter.collected_from.is_some() || filter.collected_to.is_some() {
            must_conditions.push(Condition::range(
                COLLECTED_AT_TS,
                Range {
                    gte: filter.collected_from.map(|t| t.timestamp() as f64),
                    lte: filter.collected_to.map(|t| t.timestamp() as f64),
                    ..Default::default()
                },
            ));
        }

        if must_conditions.is_empty() {
            None
        } else {
            Some(Filter::must(must_conditions))
        }
    }

    fn to_payload(payload: &RecordPayload) -> Result<Payload, VectorStoreError> {
        let mut value = serde_json::to_value(payload)
            .map_err(|e| VectorStoreError::InvalidRecord(e.to_string()))?;
        if let Some(map) = value.as_object_mut() {
            map.insert(
                COLLECTED_AT_TS.to_string(),
                payload.collected_at.timestamp().into(),
            );
        }
        Payload::try_from(value).map_err(|e| VectorStoreError::InvalidRecord(e.to_string()))
    }

    fn from_payload(
        id: &str,
        payload: HashMap<String, QdrantValue>,
    ) -> Result<RecordPayload, VectorStoreError> {
        let object: serde_json::Map<String, serde_json::Value> = payload
            .into_iter()
            .map(|(k, v)| (k, kind_to_json(v.kind)))
            .collect();
        serde_json::from_value(serde_json::Value::Object(object)).map_err(|e| {
            VectorStoreError::InvalidRecord(format!("point {id} has malformed payload: {e}"))
        })
    }

    fn point_id(id: Option<&PointId>) -> String {
        match id.and_then(|pid| pid.point_id_options.as_ref()) {
            Some(PointIdOptions::Uuid(uuid)) => uuid.clone(),
            Some(PointIdOptions::Num(num)) => num.to_string(),
            None => String::new(),
        }
    }

    #[allow(deprecated)]
    fn dense_vector(vectors: Option<VectorsOutput>) -> Option<Vec<f32>> {
        match vectors?.vectors_options? {
            VectorsOptions::Vector(v) => Some(v.data),
            VectorsOptions::Vectors(_) => None,
        }
    }

    fn point_ids(ids: &[String]) -> Vec<PointId> {
        ids.iter().map(|id| id.as_str().into()).collect()
    }

    fn map_err(err: QdrantError, wrap: fn(String) -> VectorStoreError) -> VectorStoreError {
        wrap(err.to_string())
    }
}

/// Convert a Qdrant payload value back to JSON.
fn kind_to_json(kind: Option<Kind>) -> serde_json::Value {
    match kind {
        None | Some(Kind::NullValue(_)) => serde_json::Value::Null,
        Some(Kind::BoolValue(b)) => b.into(),
        Some(Kind::IntegerValue(n)) => n.into(),
        Some(Kind::DoubleValue(n)) => serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Some(Kind::StringValue(s)) => s.into(),
        Some(Kind::ListValue(list)) => list
            .values
            .into_iter()
            .map(|v| kind_to_json(v.kind))
            .collect(),
        Some(Kind::StructValue(st)) => serde_json::Value::Object(
            st.fields
                .into_iter()
                .map(|(k, v)| (k, kind_to_json(v.kind)))
                .collect(),
        ),
    }
}

#[async_trait]
impl VectorBackend for QdrantBackend {
    fn name(&self) -> &'static str {
        "qdrant"
    }

    fn collection(&self) -> &str {
        &self.collection
    }

    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        self.client
            .health_check()
            .await
            .map(|_| true)
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))
    }

    async fn collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| Self::map_err(e, VectorStoreError::CollectionError))?;
        if !exists {
            return Ok(None);
        }

        let info = self
            .client
            .collection_info(&self.collection)
            .await
            .map_err(|e| Self::map_err(e, VectorStoreError::CollectionError))?;

        let result = info.result.unwrap_or_default();
        let params = result
            .config
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config);

        let (vector_size, distance) = match params {
            Some(VectorsConfigKind::Params(params)) => {
                let distance = match Distance::try_from(params.distance) {
                    Ok(Distance::Cosine) => Some(DistanceMetric::Cosine),
                    Ok(Distance::Euclid) => Some(DistanceMetric::Euclid),
                    Ok(Distance::Dot) => Some(DistanceMetric::Dot),
                    _ => None,
                };
                (Some(params.size), distance)
            }
            _ => (None, None),
        };

        Ok(Some(CollectionInfo {
            points_count: result.points_count.unwrap_or(0),
            vector_size,
            distance,
        }))
    }

    async fn create_collection(
        &self,
        vector_size: u64,
        distance: DistanceMetric,
    ) -> Result<(), VectorStoreError> {
        let distance = match distance {
            DistanceMetric::Cosine => Distance::Cosine,
            DistanceMetric::Euclid => Distance::Euclid,
            DistanceMetric::Dot => Distance::Dot,
        };
        let create_collection = CreateCollectionBuilder::new(&self.collection)
            .vectors_config(VectorParamsBuilder::new(vector_size, distance));

        self.client
            .create_collection(create_collection)
            .await
            .map_err(|e| Self::map_err(e, VectorStoreError::CollectionError))?;

        debug!(collection = %self.collection, vector_size, "created qdrant collection");
        Ok(())
    }

    async fn delete_collection(&self) -> Result<(), VectorStoreError> {
        if self.collection_info().await?.is_none() {
            return Ok(());
        }

        self.client
            .delete_collection(&self.collection)
            .await
            .map_err(|e| Self::map_err(e, VectorStoreError::DeleteError))?;
        debug!(collection = %self.collection, "deleted qdrant collection");
        Ok(())
    }

    async fn create_payload_index(&self, field: PayloadField) -> Result<(), VectorStoreError> {
        // Date ranges are filtered on the numeric mirror field.
        let (name, field_type) = match (field, field.kind()) {
            (PayloadField::CollectedAt, _) => (COLLECTED_AT_TS, FieldType::Integer),
            (_, IndexKind::Keyword) => (field.as_str(), FieldType::Keyword),
            (_, IndexKind::Float) => (field.as_str(), FieldType::Float),
            (_, IndexKind::Datetime) => (field.as_str(), FieldType::Datetime),
        };

        self.client
            .create_field_index(
                CreateFieldIndexCollectionBuilder::new(&self.collection, name, field_type)
                    .wait(true),
            )
            .await
            .map_err(|e| Self::map_err(e, VectorStoreError::CollectionError))?;
        Ok(())
    }

    async fn upsert_points(&self, points: Vec<VectorPoint>) -> Result<(), VectorStoreError> {
        if points.is_empty() {
            return Ok(());
        }

        let count = points.len();
        let points = points
            .into_iter()
            .map(|point| {
                let payload = Self::to_payload(&point.payload)?;
                Ok(PointStruct::new(point.id, point.vector, payload))
            })
            .collect::<Result<Vec<PointStruct>, VectorStoreError>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(|e| Self::map_err(e, VectorStoreError::UpsertError))?;

        debug!(collection = %self.collection, count, "upserted points to qdrant");
        Ok(())
    }

    async fn retrieve(
        &self,
        ids: &[String],
        with_vectors: bool,
    ) -> Result<Vec<StoredRecord>, VectorStoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(&self.collection, Self::point_ids(ids))
                    .with_payload(true)
                    .with_vectors(with_vectors),
            )
            .await
            .map_err(|e| Self::map_err(e, VectorStoreError::ClientError))?;

        response
            .result
            .into_iter()
            .map(|point| {
                let vector_id = Self::point_id(point.id.as_ref());
                let payload = Self::from_payload(&vector_id, point.payload)?;
                Ok(StoredRecord {
                    vector_id,
                    payload,
                    vector: if with_vectors {
                        Self::dense_vector(point.vectors)
                    } else {
                        None
                    },
                })
            })
            .collect()
    }

    async fn overwrite_payload(
        &self,
        id: &str,
        payload: &RecordPayload,
    ) -> Result<(), VectorStoreError> {
        let payload = Self::to_payload(payload)?;
        self.client
            .overwrite_payload(
                SetPayloadPointsBuilder::new(&self.collection, payload)
                    .points_selector(PointsIdsList {
                        ids: vec![id.into()],
                    })
                    .wait(true),
            )
            .await
            .map_err(|e| Self::map_err(e, VectorStoreError::UpsertError))?;
        Ok(())
    }

    async fn delete_points(&self, ids: &[String]) -> Result<(), VectorStoreError> {
        if ids.is_empty() {
            return Ok(());
        }

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(PointsIdsList {
                        ids: Self::point_ids(ids),
                    })
                    .wait(true),
            )
            .await
            .map_err(|e| Self::map_err(e, VectorStoreError::DeleteError))?;

        debug!(collection = %self.collection, count = ids.len(), "deleted points from qdrant");
        Ok(())
    }

    async fn count(&self) -> Result<u64, VectorStoreError> {
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await
            .map_err(|e| Self::map_err(e, VectorStoreError::ClientError))?;
        Ok(response.result.map_or(0, |r| r.count))
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: u64,
        score_threshold: Option<f32>,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredRecord>, VectorStoreError> {
        let mut search_builder =
            SearchPointsBuilder::new(&self.collection, vector.to_vec(), limit).with_payload(true);

        if let Some(f) = Self::build_search_filter(filter) {
            search_builder = search_builder.filter(f);
        }

        if let Some(score) = score_threshold {
            search_builder = search_builder.score_threshold(score);
        }

        let results = self
            .client
            .search_points(search_builder)
            .await
            .map_err(|e| Self::map_err(e, VectorStoreError::SearchError))?;

        results
            .result
            .into_iter()
            .map(|point| {
                let vector_id = Self::point_id(point.id.as_ref());
                let payload = Self::from_payload(&vector_id, point.payload)?;
                Ok(ScoredRecord {
                    vector_id,
                    score: point.score,
                    payload,
                })
            })
            .collect()
    }

    async fn find_by_source_id(
        &self,
        source_id: &str,
    ) -> Result<Option<StoredRecord>, VectorStoreError> {
        let response = self
            .client
            .scroll(
                ScrollPointsBuilder::new(&self.collection)
                    .filter(Filter::must([Condition::matches(
                        "source_id",
                        source_id.to_string(),
                    )]))
                    .limit(1)
                    .with_payload(true)
                    .with_vectors(true),
            )
            .await
            .map_err(|e| Self::map_err(e, VectorStoreError::SearchError))?;

        match response.result.into_iter().next() {
            Some(point) => {
                let vector_id = Self::point_id(point.id.as_ref());
                let payload = Self::from_payload(&vector_id, point.payload)?;
                Ok(Some(StoredRecord {
                    vector_id,
                    payload,
                    vector: Self::dense_vector(point.vectors),
                }))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceType;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn sample_payload() -> RecordPayload {
        let mut payload =
            RecordPayload::new("art-7", "Constitutional AI", SourceType::Report, "AI", 0.98);
        payload.keywords = vec!["alignment".into(), "rlhf".into()];
        payload.collected_at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        payload.metadata.insert("citations".into(), json!(120));
        payload
    }

    #[test]
    fn test_empty_filter_is_none() {
        assert!(QdrantBackend::build_search_filter(&SearchFilter::default()).is_none());
    }

    #[test]
    fn test_filter_builds_one_must_per_predicate() {
        let filter = SearchFilter::new()
            .with_source_types(vec![SourceType::Paper, SourceType::News])
            .with_categories(vec!["AI".into()])
            .with_min_importance(0.8)
            .with_collected_range(Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()), None);

        let built = QdrantBackend::build_search_filter(&filter).unwrap();
        assert_eq!(built.must.len(), 4);
        assert!(built.should.is_empty());
    }

    #[test]
    fn test_payload_roundtrip_through_qdrant_values() {
        let payload = sample_payload();
        let qdrant_payload = QdrantBackend::to_payload(&payload).unwrap();
        let map: HashMap<String, QdrantValue> = qdrant_payload.into();

        assert!(map.contains_key(COLLECTED_AT_TS));
        let back = QdrantBackend::from_payload("id", map).unwrap();
        assert_eq!(back.source_id, payload.source_id);
        assert_eq!(back.keywords, payload.keywords);
        assert_eq!(back.collected_at, payload.collected_at);
        assert_eq!(back.metadata["citations"], json!(120));
        assert!((back.importance_score - 0.98).abs() < 1e-6);
    }

    #[test]
    fn test_kind_to_json_nested() {
        let value = json!({"a": [1, "two", null], "b": {"c": true}});
        let payload = Payload::try_from(value.clone()).unwrap();
        let map: HashMap<String, QdrantValue> = payload.into();
        let back: serde_json::Map<String, serde_json::Value> = map
            .into_iter()
            .map(|(k, v)| (k, kind_to_json(v.kind)))
            .collect();
        assert_eq!(serde_json::Value::Object(back), value);
    }
}
