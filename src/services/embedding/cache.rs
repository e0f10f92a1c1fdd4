//! Process-local embedding cache keyed by content digest.

use std::collections::HashMap;

use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

/// Maps the SHA-256 of the submitted text to its vector.
///
/// Entries live until [`EmbeddingCache::clear`]; concurrent writers for the
/// same key store identical vectors, so the last write wins.
#[derive(Debug, Default)]
pub struct EmbeddingCache {
    entries: RwLock<HashMap<String, Vec<f32>>>,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(text: &str) -> String {
        hex::encode(Sha256::digest(text.as_bytes()))
    }

    pub async fn get(&self, key: &str) -> Option<Vec<f32>> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn insert(&self, key: String, vector: Vec<f32>) {
        self.entries.write().await.insert(key, vector);
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_sha256_hex() {
        assert_eq!(
            EmbeddingCache::key(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_ne!(EmbeddingCache::key("a"), EmbeddingCache::key("a "));
    }

    #[tokio::test]
    async fn test_insert_get_clear() {
        let cache = EmbeddingCache::new();
        let key = EmbeddingCache::key("hello");
        assert!(cache.get(&key).await.is_none());

        cache.insert(key.clone(), vec![1.0, 2.0]).await;
        assert_eq!(cache.get(&key).await, Some(vec![1.0, 2.0]));
        assert_eq!(cache.len().await, 1);

        cache.clear().await;
        assert!(cache.is_empty().await);
    }
}
