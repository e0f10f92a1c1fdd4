mod analysis;
mod config;
mod record;
mod search;
mod source;

pub use analysis::{Classification, DocumentStage, ImportanceScore, SummaryLanguage, SummaryLength};
pub use config::{
    Config, DEFAULT_COLLECTION, DEFAULT_EMBEDDING_DIMENSION, DEFAULT_EMBEDDING_MODEL,
    DEFAULT_EMBEDDING_URL, DEFAULT_MAX_TOKENS, DEFAULT_QDRANT_URL, ENV_API_KEY, ENV_COLLECTION,
    ENV_QDRANT_URL, EmbeddingConfig, EnrichmentConfig, SearchConfig, VectorDriver,
    VectorStoreConfig,
};
pub use record::{
    EnrichedRecord, RESERVED_FIELDS, RawDocument, RecordPatch, RecordPayload, ScoredRecord,
    StoredRecord,
};
pub use search::{OutputFormat, SearchFilter, SearchResults};
pub use source::SourceType;
