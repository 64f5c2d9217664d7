//! Semantic cache: embedding of the last user utterance → fingerprint.
//!
//! The index stores fingerprints, not responses. A hit yields a candidate
//! fingerprint that the caller must confirm with an exact-cache `get`;
//! vector entries have no TTL, so a stale pointer (exact entry expired) is
//! expected and tolerated.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument};

use super::error::SemanticCacheError;
use crate::embedding::TextEmbedder;
use crate::hashing::fingerprint_to_point_id;
use crate::vectordb::{SEMANTIC_COLLECTION_NAME, SemanticPoint, VectorIndex};

/// Semantic cache tuning.
#[derive(Debug, Clone)]
pub struct SemanticCacheConfig {
    /// Index collection name.
    pub collection_name: String,
    /// Minimum similarity for a hit.
    pub similarity_threshold: f32,
    /// Embedding dimension enforced by the collection.
    pub vector_size: u64,
}

impl Default for SemanticCacheConfig {
    fn default() -> Self {
        Self {
            collection_name: SEMANTIC_COLLECTION_NAME.to_string(),
            similarity_threshold: 0.95,
            vector_size: crate::embedding::EMBEDDING_DIM as u64,
        }
    }
}

impl SemanticCacheConfig {
    /// Overrides the similarity threshold.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    fn validate(&self) -> Result<(), SemanticCacheError> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(SemanticCacheError::InvalidConfig {
                reason: format!(
                    "similarity threshold {} outside [0, 1]",
                    self.similarity_threshold
                ),
            });
        }
        if self.vector_size == 0 {
            return Err(SemanticCacheError::InvalidConfig {
                reason: "vector size must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Statistics snapshot for inspection endpoints and tests.
#[derive(Debug, Clone, Serialize)]
pub struct SemanticCacheStats {
    /// Collection name.
    pub collection_name: String,
    /// Stored entries.
    pub total_entries: u64,
    /// Embedding dimension.
    pub embedding_dimensions: usize,
}

/// Embedding-keyed cache layer over a [`VectorIndex`].
pub struct SemanticCache<V: VectorIndex> {
    embedder: Arc<TextEmbedder>,
    index: V,
    config: SemanticCacheConfig,
}

impl<V: VectorIndex> std::fmt::Debug for SemanticCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticCache")
            .field("embedder", &self.embedder)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<V: VectorIndex> SemanticCache<V> {
    /// Builds a semantic cache over an embedder and index.
    pub fn new(
        embedder: Arc<TextEmbedder>,
        index: V,
        config: SemanticCacheConfig,
    ) -> Result<Self, SemanticCacheError> {
        config.validate()?;
        Ok(Self {
            embedder,
            index,
            config,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SemanticCacheConfig {
        &self.config
    }

    /// Returns the embedder.
    pub fn embedder(&self) -> &TextEmbedder {
        &self.embedder
    }

    /// Returns the index.
    pub fn index(&self) -> &V {
        &self.index
    }

    /// Creates the collection if missing. Called once at startup.
    pub async fn ensure_collection(&self) -> Result<(), SemanticCacheError> {
        self.index
            .ensure_collection(&self.config.collection_name, self.config.vector_size)
            .await?;
        Ok(())
    }

    /// Indexes `text` under the exact-cache `fingerprint`.
    ///
    /// Concurrent adds for the same fingerprint are idempotent up to
    /// overwrite: the point id is derived from the fingerprint.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub async fn add(&self, fingerprint: &str, text: &str) -> Result<(), SemanticCacheError> {
        let embedding = self.embedder.embed(text)?;
        let point = SemanticPoint::new(
            fingerprint_to_point_id(fingerprint),
            embedding,
            fingerprint,
            text,
        );

        self.index
            .upsert(&self.config.collection_name, point)
            .await?;

        debug!(fingerprint, "indexed semantic cache entry");
        Ok(())
    }

    /// Finds the fingerprint of the most similar cached text, if any entry
    /// clears the similarity threshold.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub async fn search(&self, text: &str) -> Result<Option<String>, SemanticCacheError> {
        let embedding = self.embedder.embed(text)?;

        let hits = self
            .index
            .search_nearest(&self.config.collection_name, embedding, 1)
            .await?;

        let Some(best) = hits.into_iter().next() else {
            debug!("semantic cache empty for query");
            return Ok(None);
        };

        if best.score >= self.config.similarity_threshold {
            info!(
                score = best.score,
                cache_key = %best.cache_key,
                "semantic cache hit"
            );
            Ok(Some(best.cache_key))
        } else {
            debug!(
                score = best.score,
                threshold = self.config.similarity_threshold,
                "best candidate below threshold"
            );
            Ok(None)
        }
    }

    /// Entry count and identity, for the stats surface.
    pub async fn stats(&self) -> Result<SemanticCacheStats, SemanticCacheError> {
        let total_entries = self.index.count(&self.config.collection_name).await?;
        Ok(SemanticCacheStats {
            collection_name: self.config.collection_name.clone(),
            total_entries,
            embedding_dimensions: self.embedder.embedding_dim(),
        })
    }

    /// Drops every entry, keeping the collection.
    pub async fn clear(&self) -> Result<(), SemanticCacheError> {
        self.index
            .clear(&self.config.collection_name, self.config.vector_size)
            .await?;
        info!("semantic cache cleared");
        Ok(())
    }
}

#[cfg(any(test, feature = "mock"))]
impl SemanticCache<crate::vectordb::MockVectorIndex> {
    /// Creates a stub-embedder cache over an in-memory index.
    pub async fn new_mock(config: SemanticCacheConfig) -> Result<Self, SemanticCacheError> {
        let embedder = Arc::new(
            TextEmbedder::load(crate::embedding::EmbedderConfig::stub())
                .map_err(SemanticCacheError::from)?,
        );
        let cache = Self::new(embedder, crate::vectordb::MockVectorIndex::new(), config)?;
        cache.ensure_collection().await?;
        Ok(cache)
    }
}
