pub mod embedding;
pub mod enrichment;
pub mod schema;
pub mod vector_store;

pub use embedding::{
    BatchEmbedding, Embedder, EmbeddingCache, EmbeddingProvider, HeuristicTokenCounter,
    HfTokenCounter, OpenAiProvider, TokenCounter,
};
pub use enrichment::{
    BatchReport, Classifier, EnrichmentPipeline, PipelineOptions, Scorer, Statistics, Summarizer,
};
pub use schema::{CollectionSchema, SchemaManager, SchemaReport};
pub use vector_store::{
    CollectionInfo, DistanceMetric, MemoryBackend, PayloadField, PgVectorBackend, QdrantBackend,
    Reference, VectorBackend, VectorPoint, VectorStoreGateway, create_backend,
};
