use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pgvector::Vector;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use std::time::Duration;
use tracing::debug;

use super::{CollectionInfo, DistanceMetric, PayloadField, VectorBackend, VectorPoint};
use crate::error::VectorStoreError;
use crate::models::{
    ImportanceScore, RecordPayload, ScoredRecord, SearchFilter, SourceType, StoredRecord,
    VectorStoreConfig,
};

const PAYLOAD_COLUMNS: &str = "vector_id::text AS vector_id, source_id, title, summary, \
     source_type, source_name, url, category, keywords, research_field, importance_score, \
     scores, collected_at, metadata";

pub struct PgVectorBackend {
    pool: PgPool,
    table_name: String,
}

impl PgVectorBackend {
    pub async fn new(config: &VectorStoreConfig) -> Result<Self, VectorStoreError> {
        let table_name = validate_identifier(&config.collection)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max)
            .acquire_timeout(Duration::from_secs(config.pool_acquire_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        let backend = Self { pool, table_name };
        backend.check_pgvector_extension().await?;
        Ok(backend)
    }

    async fn check_pgvector_extension(&self) -> Result<(), VectorStoreError> {
        let result: Option<(String,)> =
            sqlx::query_as("SELECT extname FROM pg_extension WHERE extname = 'vector'")
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| VectorStoreError::ClientError(e.to_string()))?;

        if result.is_none() {
            return Err(VectorStoreError::ConnectionError(
                "pgvector extension is not installed. Run: CREATE EXTENSION vector;".to_string(),
            ));
        }

        Ok(())
    }

    fn row_to_payload(row: &PgRow) -> Result<RecordPayload, VectorStoreError> {
        let invalid = |e: sqlx::Error| VectorStoreError::InvalidRecord(e.to_string());

        let source_type: String = row.try_get("source_type").map_err(invalid)?;
        let Ok(source_type) = source_type.parse::<SourceType>();
        let scores: Option<serde_json::Value> = row.try_get("scores").map_err(invalid)?;
        let scores: Option<ImportanceScore> = scores
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| VectorStoreError::InvalidRecord(e.to_string()))?;
        let metadata: serde_json::Value = row.try_get("metadata").map_err(invalid)?;
        let collected_at: DateTime<Utc> = row.try_get("collected_at").map_err(invalid)?;

        Ok(RecordPayload {
            source_id: row.try_get("source_id").map_err(invalid)?,
            title: row.try_get("title").map_err(invalid)?,
            summary: row.try_get("summary").map_err(invalid)?,
            source_type,
            source_name: row.try_get("source_name").map_err(invalid)?,
            url: row.try_get("url").map_err(invalid)?,
            category: row.try_get("category").map_err(invalid)?,
            keywords: row.try_get("keywords").map_err(invalid)?,
            research_field: row.try_get("research_field").map_err(invalid)?,
            importance_score: row.try_get("importance_score").map_err(invalid)?,
            scores,
            collected_at,
            metadata: match metadata {
                serde_json::Value::Object(map) => map,
                _ => serde_json::Map::new(),
            },
        })
    }

    fn scores_json(payload: &RecordPayload) -> Option<serde_json::Value> {
        payload
            .scores
            .as_ref()
            .and_then(|s| serde_json::to_value(s).ok())
    }

    fn parse_id(id: &str) -> Result<uuid::Uuid, VectorStoreError> {
        uuid::Uuid::parse_str(id)
            .map_err(|e| VectorStoreError::InvalidRecord(format!("invalid UUID {id}: {e}")))
    }
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
fn validate_identifier(name: &str) -> Result<String, VectorStoreError> {
    let valid = !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(name.to_string())
    } else {
        Err(VectorStoreError::CollectionError(format!(
            "'{name}' is not a valid table name"
        )))
    }
}

#[async_trait]
impl VectorBackend for PgVectorBackend {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn collection(&self) -> &str {
        &self.table_name
    }

    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| true)
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))
    }

    async fn collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError> {
        let dimension: Option<(i32,)> = sqlx::query_as(
            "SELECT atttypmod FROM pg_attribute \
             WHERE attrelid = to_regclass($1) AND attname = 'embedding'",
        )
        .bind(&self.table_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;

        let Some((dimension,)) = dimension else {
            return Ok(None);
        };

        let cosine_index: Option<(String,)> = sqlx::query_as(
            "SELECT indexname FROM pg_indexes \
             WHERE tablename = $1 AND indexdef LIKE '%vector_cosine_ops%'",
        )
        .bind(&self.table_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;

        let points_count = self.count().await?;

        Ok(Some(CollectionInfo {
            points_count,
            vector_size: u64::try_from(dimension).ok(),
            distance: cosine_index.map(|_| DistanceMetric::Cosine),
        }))
    }

    async fn create_collection(
        &self,
        vector_size: u64,
        distance: DistanceMetric,
    ) -> Result<(), VectorStoreError> {
        let ops = match distance {
            DistanceMetric::Cosine => "vector_cosine_ops",
            DistanceMetric::Euclid => "vector_l2_ops",
            DistanceMetric::Dot => "vector_ip_ops",
        };

        let create_table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                vector_id UUID PRIMARY KEY,
                source_id TEXT NOT NULL,
                title TEXT NOT NULL,
                summary TEXT,
                source_type TEXT NOT NULL,
                source_name TEXT,
                url TEXT,
                category TEXT NOT NULL,
                keywords TEXT[] NOT NULL DEFAULT '{{}}',
                research_field TEXT,
                importance_score REAL NOT NULL,
                scores JSONB,
                collected_at TIMESTAMPTZ NOT NULL,
                metadata JSONB NOT NULL DEFAULT '{{}}',
                embedding vector({}) NOT NULL
            )
            "#,
            self.table_name, vector_size
        );

        sqlx::query(&create_table)
            .execute(&self.pool)
            .await
            .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;

        let vector_index = format!(
            "CREATE INDEX IF NOT EXISTS {0}_embedding_idx ON {0} USING hnsw (embedding {1})",
            self.table_name, ops
        );
        sqlx::query(&vector_index)
            .execute(&self.pool)
            .await
            .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;

        debug!(table = %self.table_name, vector_size, "created pgvector table");
        Ok(())
    }

    async fn delete_collection(&self) -> Result<(), VectorStoreError> {
        let query = format!("DROP TABLE IF EXISTS {}", self.table_name);
        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| VectorStoreError::DeleteError(e.to_string()))?;
        Ok(())
    }

    async fn create_payload_index(&self, field: PayloadField) -> Result<(), VectorStoreError> {
        let column = field.as_str();
        let query = format!(
            "CREATE INDEX IF NOT EXISTS {0}_{1}_idx ON {0} ({1})",
            self.table_name, column
        );
        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;
        Ok(())
    }

    async fn upsert_points(&self, points: Vec<VectorPoint>) -> Result<(), VectorStoreError> {
        if points.is_empty() {
            return Ok(());
        }

        let query = format!(
            r#"
            INSERT INTO {} (vector_id, source_id, title, summary, source_type, source_name, url,
                            category, keywords, research_field, importance_score, scores,
                            collected_at, metadata, embedding)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (vector_id) DO UPDATE SET
                source_id = EXCLUDED.source_id,
                title = EXCLUDED.title,
                summary = EXCLUDED.summary,
                source_type = EXCLUDED.source_type,
                source_name = EXCLUDED.source_name,
                url = EXCLUDED.url,
                category = EXCLUDED.category,
                keywords = EXCLUDED.keywords,
                research_field = EXCLUDED.research_field,
                importance_score = EXCLUDED.importance_score,
                scores = EXCLUDED.scores,
                collected_at = EXCLUDED.collected_at,
                metadata = EXCLUDED.metadata,
                embedding = EXCLUDED.embedding
            "#,
            self.table_name
        );

        let count = points.len();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| VectorStoreError::UpsertError(e.to_string()))?;

        for point in points {
            let id = Self::parse_id(&point.id)?;
            let payload = &point.payload;
            let embedding = Vector::from(point.vector);

            sqlx::query(&query)
                .bind(id)
                .bind(&payload.source_id)
                .bind(&payload.title)
                .bind(&payload.summary)
                .bind(payload.source_type.to_string())
                .bind(&payload.source_name)
                .bind(&payload.url)
                .bind(&payload.category)
                .bind(&payload.keywords)
                .bind(&payload.research_field)
                .bind(payload.importance_score)
                .bind(Self::scores_json(payload))
                .bind(payload.collected_at)
                .bind(serde_json::Value::Object(payload.metadata.clone()))
                .bind(&embedding)
                .execute(&mut *tx)
                .await
                .map_err(|e| VectorStoreError::UpsertError(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| VectorStoreError::UpsertError(e.to_string()))?;

        debug!(table = %self.table_name, count, "upserted rows to pgvector");
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

        let uuids = ids
            .iter()
            .map(|id| Self::parse_id(id))
            .collect::<Result<Vec<_>, _>>()?;

        let query = format!(
            "SELECT {}, embedding FROM {} WHERE vector_id = ANY($1)",
            PAYLOAD_COLUMNS, self.table_name
        );

        let rows = sqlx::query(&query)
            .bind(&uuids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VectorStoreError::ClientError(e.to_string()))?;

        rows.iter()
            .map(|row| {
                let vector = if with_vectors {
                    let embedding: Vector = row
                        .try_get("embedding")
                        .map_err(|e| VectorStoreError::InvalidRecord(e.to_string()))?;
                    Some(embedding.to_vec())
                } else {
                    None
                };
                Ok(StoredRecord {
                    vector_id: row
                        .try_get("vector_id")
                        .map_err(|e| VectorStoreError::InvalidRecord(e.to_string()))?,
                    payload: Self::row_to_payload(row)?,
                    vector,
                })
            })
            .collect()
    }

    async fn overwrite_payload(
        &self,
        id: &str,
        payload: &RecordPayload,
    ) -> Result<(), VectorStoreError> {
        let query = format!(
            r#"
            UPDATE {} SET
                source_id = $2, title = $3, summary = $4, source_type = $5, source_name = $6,
                url = $7, category = $8, keywords = $9, research_field = $10,
                importance_score = $11, scores = $12, collected_at = $13, metadata = $14
            WHERE vector_id = $1
            "#,
            self.table_name
        );

        let result = sqlx::query(&query)
            .bind(Self::parse_id(id)?)
            .bind(&payload.source_id)
            .bind(&payload.title)
            .bind(&payload.summary)
            .bind(payload.source_type.to_string())
            .bind(&payload.source_name)
            .bind(&payload.url)
            .bind(&payload.category)
            .bind(&payload.keywords)
            .bind(&payload.research_field)
            .bind(payload.importance_score)
            .bind(Self::scores_json(payload))
            .bind(payload.collected_at)
            .bind(serde_json::Value::Object(payload.metadata.clone()))
            .execute(&self.pool)
            .await
            .map_err(|e| VectorStoreError::UpsertError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(VectorStoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn delete_points(&self, ids: &[String]) -> Result<(), VectorStoreError> {
        if ids.is_empty() {
            return Ok(());
        }

        let uuids = ids
            .iter()
            .map(|id| Self::parse_id(id))
            .collect::<Result<Vec<_>, _>>()?;

        let query = format!("DELETE FROM {} WHERE vector_id = ANY($1)", self.table_name);
        sqlx::query(&query)
            .bind(&uuids)
            .execute(&self.pool)
            .await
            .map_err(|e| VectorStoreError::DeleteError(e.to_string()))?;
        Ok(())
    }

    async fn count(&self) -> Result<u64, VectorStoreError> {
        let query = format!("SELECT COUNT(*) AS count FROM {}", self.table_name);
        let row: (i64,) = sqlx::query_as(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| VectorStoreError::ClientError(e.to_string()))?;
        Ok(row.0 as u64)
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: u64,
        score_threshold: Option<f32>,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredRecord>, VectorStoreError> {
        let embedding = Vector::from(vector.to_vec());

        let mut where_parts = Vec::new();
        let mut param_index = 2;

        if !filter.source_types.is_empty() {
            where_parts.push(format!("source_type = ANY(${})", param_index));
            param_index += 1;
        }
        if !filter.categories.is_empty() {
            where_parts.push(format!("category = ANY(${})", param_index));
            param_index += 1;
        }
        if filter.min_importance.is_some() {
            where_parts.push(format!("importance_score >= ${}", param_index));
            param_index += 1;
        }
        if filter.collected_from.is_some() {
            where_parts.push(format!("collected_at >= ${}", param_index));
            param_index += 1;
        }
        if filter.collected_to.is_some() {
            where_parts.push(format!("collected_at <= ${}", param_index));
            param_index += 1;
        }
        if score_threshold.is_some() {
            where_parts.push(format!("(1 - (embedding <=> $1)) >= ${}", param_index));
            param_index += 1;
        }

        let where_clause = if where_parts.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", where_parts.join(" AND "))
        };

        let query = format!(
            r#"
            SELECT {}, 1 - (embedding <=> $1) AS score
            FROM {}
            {}
            ORDER BY embedding <=> $1
            LIMIT ${}
            "#,
            PAYLOAD_COLUMNS, self.table_name, where_clause, param_index
        );

        let mut query_builder = sqlx::query(&query).bind(&embedding);

        if !filter.source_types.is_empty() {
            let source_types: Vec<String> =
                filter.source_types.iter().map(|s| s.to_string()).collect();
            query_builder = query_builder.bind(source_types);
        }
        if !filter.categories.is_empty() {
            query_builder = query_builder.bind(filter.categories.clone());
        }
        if let Some(min) = filter.min_importance {
            query_builder = query_builder.bind(min);
        }
        if let Some(from) = filter.collected_from {
            query_builder = query_builder.bind(from);
        }
        if let Some(to) = filter.collected_to {
            query_builder = query_builder.bind(to);
        }
        if let Some(threshold) = score_threshold {
            query_builder = query_builder.bind(f64::from(threshold));
        }
        query_builder = query_builder.bind(i64::try_from(limit).unwrap_or(i64::MAX));

        let rows = query_builder
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VectorStoreError::SearchError(e.to_string()))?;

        rows.iter()
            .map(|row| {
                let score: f64 = row
                    .try_get("score")
                    .map_err(|e| VectorStoreError::InvalidRecord(e.to_string()))?;
                Ok(ScoredRecord {
                    vector_id: row
                        .try_get("vector_id")
                        .map_err(|e| VectorStoreError::InvalidRecord(e.to_string()))?,
                    score: score as f32,
                    payload: Self::row_to_payload(row)?,
                })
            })
            .collect()
    }

    async fn find_by_source_id(
        &self,
        source_id: &str,
    ) -> Result<Option<StoredRecord>, VectorStoreError> {
        let query = format!(
            "SELECT {}, embedding FROM {} WHERE source_id = $1 ORDER BY collected_at DESC LIMIT 1",
            PAYLOAD_COLUMNS, self.table_name
        );

        let row = sqlx::query(&query)
            .bind(source_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| VectorStoreError::SearchError(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let embedding: Vector = row
            .try_get("embedding")
            .map_err(|e| VectorStoreError::InvalidRecord(e.to_string()))?;
        Ok(Some(StoredRecord {
            vector_id: row
                .try_get("vector_id")
                .map_err(|e| VectorStoreError::InvalidRecord(e.to_string()))?,
            payload: Self::row_to_payload(&row)?,
            vector: Some(embedding.to_vec()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("research_articles").is_ok());
        assert!(validate_identifier("_tmp1").is_ok());
        assert!(validate_identifier("1table").is_err());
        assert!(validate_identifier("articles; DROP TABLE x").is_err());
        assert!(validate_identifier("").is_err());
    }

    #[test]
    fn test_parse_id() {
        assert!(PgVectorBackend::parse_id("not-a-uuid").is_err());
        assert!(PgVectorBackend::parse_id("67e55044-10b1-426f-9247-bb680e5fe0c8").is_ok());
    }
}
