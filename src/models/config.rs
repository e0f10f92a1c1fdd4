use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::analysis::{SummaryLanguage, SummaryLength};
use super::search::OutputFormat;
use crate::error::ConfigError;

pub const DEFAULT_EMBEDDING_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 1536;
pub const DEFAULT_MAX_TOKENS: usize = 8191;
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_COLLECTION: &str = "research_articles";

pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_QDRANT_URL: &str = "CURATOR_QDRANT_URL";
pub const ENV_COLLECTION: &str = "CURATOR_COLLECTION";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    #[serde(default)]
    pub search: SearchConfig,
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("curator").join("config.toml"))
    }

    /// Load from the user config file (defaults if absent), then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::config_path().ok_or_else(|| {
            ConfigError::PathError("could not determine config directory".to_string())
        })?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Environment wins over the file. The API key is only taken from the
    /// environment when the file does not set one.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.embedding.api_key.is_none()
            && let Some(key) = lookup(ENV_API_KEY).filter(|k| !k.is_empty())
        {
            self.embedding.api_key = Some(key);
        }
        if let Some(url) = lookup(ENV_QDRANT_URL).filter(|u| !u.is_empty()) {
            self.vector_store.url = url;
        }
        if let Some(collection) = lookup(ENV_COLLECTION).filter(|c| !c.is_empty()) {
            self.vector_store.collection = collection;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| -> Result<(), ConfigError> {
            Err(ConfigError::ValidationError(msg))
        };

        if self.embedding.dimension == 0 {
            return invalid("embedding.dimension must be greater than 0".into());
        }
        if self.embedding.max_tokens == 0 {
            return invalid("embedding.max_tokens must be greater than 0".into());
        }
        if self.embedding.batch_concurrency == 0 {
            return invalid("embedding.batch_concurrency must be at least 1".into());
        }
        if self.embedding.max_retries == 0 {
            return invalid("embedding.max_retries must be at least 1".into());
        }
        if self.enrichment.max_concurrent == 0 {
            return invalid("enrichment.max_concurrent must be at least 1".into());
        }
        if !(0.0..=1.0).contains(&self.enrichment.high_quality_threshold) {
            return invalid("enrichment.high_quality_threshold must be within [0, 1]".into());
        }
        if let Some(min) = self.search.default_min_score
            && !(0.0..=1.0).contains(&min)
        {
            return invalid("search.default_min_score must be within [0, 1]".into());
        }
        if self.search.default_limit == 0 {
            return invalid("search.default_limit must be greater than 0".into());
        }
        if self.vector_store.collection.trim().is_empty() {
            return invalid("vector_store.collection must not be empty".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_embedding_url")]
    pub url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_dimension")]
    pub dimension: u32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// `tokenizer.json` for exact token counts; a heuristic is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenizer_path: Option<PathBuf>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,

    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_true")]
    pub cache_enabled: bool,
}

fn default_embedding_url() -> String {
    DEFAULT_EMBEDDING_URL.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_dimension() -> u32 {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_max_tokens() -> usize {
    DEFAULT_MAX_TOKENS
}

fn default_timeout() -> u64 {
    60
}

fn default_batch_concurrency() -> usize {
    10
}

fn default_batch_delay_ms() -> u64 {
    500
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            model: default_embedding_model(),
            api_key: None,
            dimension: default_dimension(),
            max_tokens: default_max_tokens(),
            tokenizer_path: None,
            timeout_secs: default_timeout(),
            batch_concurrency: default_batch_concurrency(),
            batch_delay_ms: default_batch_delay_ms(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            cache_enabled: true,
        }
    }
}

/// Vector store backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorDriver {
    #[default]
    Qdrant,
    #[serde(alias = "postgres", alias = "pgvector")]
    PostgreSQL,
    /// In-process store, nothing persisted.
    Memory,
}

impl std::fmt::Display for VectorDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorDriver::Qdrant => write!(f, "qdrant"),
            VectorDriver::PostgreSQL => write!(f, "postgresql"),
            VectorDriver::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub driver: VectorDriver,

    /// Qdrant gRPC URL or PostgreSQL connection string, depending on `driver`.
    #[serde(default = "default_qdrant_url")]
    pub url: String,

    /// Collection name (table name for PostgreSQL).
    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_pool_max")]
    pub pool_max: u32,

    #[serde(default = "default_pool_timeout")]
    pub pool_acquire_timeout_secs: u64,
}

fn default_qdrant_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_pool_max() -> u32 {
    5
}

fn default_pool_timeout() -> u64 {
    30
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            driver: VectorDriver::default(),
            url: default_qdrant_url(),
            collection: default_collection(),
            api_key: None,
            pool_max: default_pool_max(),
            pool_acquire_timeout_secs: default_pool_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    #[serde(default)]
    pub summary_language: SummaryLanguage,

    #[serde(default)]
    pub summary_length: SummaryLength,

    #[serde(default = "default_high_quality_threshold")]
    pub high_quality_threshold: f32,
}

fn default_max_concurrent() -> usize {
    5
}

fn default_high_quality_threshold() -> f32 {
    0.7
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            summary_language: SummaryLanguage::default(),
            summary_length: SummaryLength::default(),
            high_quality_threshold: default_high_quality_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub default_limit: u32,

    #[serde(default)]
    pub default_format: OutputFormat,

    #[serde(default)]
    pub default_min_score: Option<f32>,
}

fn default_limit() -> u32 {
    10
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            default_format: OutputFormat::Text,
            default_min_score: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.embedding.url, DEFAULT_EMBEDDING_URL);
        assert_eq!(config.embedding.dimension, 1536);
        assert_eq!(config.embedding.max_tokens, 8191);
        assert_eq!(config.vector_store.url, DEFAULT_QDRANT_URL);
        assert_eq!(config.vector_store.collection, DEFAULT_COLLECTION);
        assert_eq!(config.vector_store.driver, VectorDriver::Qdrant);
        assert_eq!(config.enrichment.max_concurrent, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_path() {
        let path = Config::config_path();
        assert!(path.is_some());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [vector_store]
            driver = "pgvector"
            url = "postgres://localhost/curator"

            [enrichment]
            summary_language = "en"
            "#,
        )
        .unwrap();

        assert_eq!(config.vector_store.driver, VectorDriver::PostgreSQL);
        assert_eq!(config.vector_store.collection, DEFAULT_COLLECTION);
        assert_eq!(config.enrichment.summary_language, SummaryLanguage::En);
        assert_eq!(config.embedding.batch_concurrency, 10);
        assert_eq!(config.embedding.batch_delay_ms, 500);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.vector_store.driver = VectorDriver::Memory;
        config.search.default_limit = 25;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.vector_store.driver, VectorDriver::Memory);
        assert_eq!(loaded.search.default_limit, 25);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_API_KEY, "sk-test"),
            (ENV_QDRANT_URL, "http://qdrant:6334"),
            (ENV_COLLECTION, "articles_test"),
        ]);
        let mut config = Config::default();
        config.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.embedding.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.vector_store.url, "http://qdrant:6334");
        assert_eq!(config.vector_store.collection, "articles_test");
    }

    #[test]
    fn test_file_api_key_not_overridden() {
        let mut config = Config::default();
        config.embedding.api_key = Some("from-file".into());
        config.apply_env_overrides(|_| Some("from-env".into()));
        assert_eq!(config.embedding.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.embedding.dimension = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.enrichment.high_quality_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.search.default_min_score = Some(-0.1);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.enrichment.max_concurrent = 0;
        assert!(config.validate().is_err());
    }
}
