//! Qdrant-backed vector index.

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder,
    UpsertPointsBuilder, VectorParamsBuilder,
};
use std::collections::HashMap;
use std::future::Future;

use super::error::VectorIndexError;
use super::model::{SearchHit, SemanticPoint};

/// Minimal async interface the semantic cache needs from an ANN index.
pub trait VectorIndex: Send + Sync {
    /// Ensures a collection exists.
    fn ensure_collection(
        &self,
        name: &str,
        vector_size: u64,
    ) -> impl Future<Output = Result<(), VectorIndexError>> + Send;

    /// Inserts or overwrites one point.
    fn upsert(
        &self,
        collection: &str,
        point: SemanticPoint,
    ) -> impl Future<Output = Result<(), VectorIndexError>> + Send;

    /// Returns up to `limit` nearest neighbors, best first.
    fn search_nearest(
        &self,
        collection: &str,
        query: Vec<f32>,
        limit: u64,
    ) -> impl Future<Output = Result<Vec<SearchHit>, VectorIndexError>> + Send;

    /// Number of stored points.
    fn count(&self, collection: &str) -> impl Future<Output = Result<u64, VectorIndexError>> + Send;

    /// Drops every point in the collection, keeping the collection itself.
    fn clear(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> impl Future<Output = Result<(), VectorIndexError>> + Send;
}

/// Qdrant client wrapper with cosine-distance collections.
#[derive(Clone)]
pub struct QdrantIndex {
    client: std::sync::Arc<Qdrant>,
    url: String,
}

impl QdrantIndex {
    /// Creates a client for `url`.
    pub fn connect(url: &str) -> Result<Self, VectorIndexError> {
        let client =
            Qdrant::from_url(url)
                .build()
                .map_err(|e| VectorIndexError::ConnectionFailed {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;

        Ok(Self {
            client: std::sync::Arc::new(client),
            url: url.to_string(),
        })
    }

    /// Returns the configured URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Performs a basic health check request.
    pub async fn health_check(&self) -> Result<(), VectorIndexError> {
        self.client
            .health_check()
            .await
            .map_err(|e| VectorIndexError::ConnectionFailed {
                url: self.url.clone(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn create_collection(
        &self,
        name: &str,
        vector_size: u64,
    ) -> Result<(), VectorIndexError> {
        let vectors_config = VectorParamsBuilder::new(vector_size, Distance::Cosine);

        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(vectors_config)
                    .on_disk_payload(true),
            )
            .await
            .map_err(|e| VectorIndexError::CreateCollectionFailed {
                collection: name.to_string(),
                message: e.to_string(),
            })?;

        Ok(())
    }
}

impl VectorIndex for QdrantIndex {
    async fn ensure_collection(&self, name: &str, vector_size: u64) -> Result<(), VectorIndexError> {
        let exists = self.client.collection_exists(name).await.map_err(|e| {
            VectorIndexError::CreateCollectionFailed {
                collection: name.to_string(),
                message: e.to_string(),
            }
        })?;

        if !exists {
            self.create_collection(name, vector_size).await?;
        }

        Ok(())
    }

    async fn upsert(&self, collection: &str, point: SemanticPoint) -> Result<(), VectorIndexError> {
        let mut payload: HashMap<String, qdrant_client::qdrant::Value> = HashMap::new();
        payload.insert("cache_key".to_string(), point.cache_key.into());
        payload.insert("text_length".to_string(), (point.text.len() as i64).into());
        payload.insert("text".to_string(), point.text.into());

        let qdrant_point = PointStruct::new(point.id, point.vector, payload);

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, vec![qdrant_point]))
            .await
            .map_err(|e| VectorIndexError::UpsertFailed {
                collection: collection.to_string(),
                message: e.to_string(),
            })?;

        Ok(())
    }

    async fn search_nearest(
        &self,
        collection: &str,
        query: Vec<f32>,
        limit: u64,
    ) -> Result<Vec<SearchHit>, VectorIndexError> {
        let search_result = self
            .client
            .search_points(SearchPointsBuilder::new(collection, query, limit).with_payload(true))
            .await
            .map_err(|e| VectorIndexError::SearchFailed {
                collection: collection.to_string(),
                message: e.to_string(),
            })?;

        Ok(search_result
            .result
            .into_iter()
            .filter_map(SearchHit::from_scored_point)
            .collect())
    }

    async fn count(&self, collection: &str) -> Result<u64, VectorIndexError> {
        let response = self
            .client
            .count(CountPointsBuilder::new(collection).exact(true))
            .await
            .map_err(|e| VectorIndexError::CountFailed {
                collection: collection.to_string(),
                message: e.to_string(),
            })?;

        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }

    async fn clear(&self, collection: &str, vector_size: u64) -> Result<(), VectorIndexError> {
        self.client
            .delete_collection(collection)
            .await
            .map_err(|e| VectorIndexError::ClearFailed {
                collection: collection.to_string(),
                message: e.to_string(),
            })?;

        self.create_collection(collection, vector_size).await
    }
}
