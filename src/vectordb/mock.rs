//! In-memory vector index for tests.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::client::VectorIndex;
use super::error::VectorIndexError;
use super::model::{SearchHit, SemanticPoint};

#[derive(Default)]
struct MockCollection {
    vector_size: u64,
    points: HashMap<u64, SemanticPoint>,
}

/// Brute-force cosine-similarity index.
#[derive(Default)]
pub struct MockVectorIndex {
    collections: RwLock<HashMap<String, MockCollection>>,
    /// When set, every search hit reports this score instead of the real
    /// cosine similarity. Lets tests steer the threshold comparison without
    /// needing correlated stub embeddings.
    score_override: RwLock<Option<f32>>,
}

impl MockVectorIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points in a collection, if it exists.
    pub fn point_count(&self, collection: &str) -> Option<usize> {
        self.collections
            .read()
            .get(collection)
            .map(|c| c.points.len())
    }

    /// Forces every subsequent search hit to report `score`.
    pub fn set_score_override(&self, score: Option<f32>) {
        *self.score_override.write() = score;
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a * norm_b)
    }
}

impl VectorIndex for MockVectorIndex {
    async fn ensure_collection(&self, name: &str, vector_size: u64) -> Result<(), VectorIndexError> {
        self.collections
            .write()
            .entry(name.to_string())
            .or_insert(MockCollection {
                vector_size,
                points: HashMap::new(),
            });
        Ok(())
    }

    async fn upsert(&self, collection: &str, point: SemanticPoint) -> Result<(), VectorIndexError> {
        let mut collections = self.collections.write();
        let coll =
            collections
                .get_mut(collection)
                .ok_or_else(|| VectorIndexError::CollectionNotFound {
                    collection: collection.to_string(),
                })?;

        if point.vector.len() as u64 != coll.vector_size {
            return Err(VectorIndexError::InvalidDimension {
                expected: coll.vector_size as usize,
                actual: point.vector.len(),
            });
        }

        coll.points.insert(point.id, point);
        Ok(())
    }

    async fn search_nearest(
        &self,
        collection: &str,
        query: Vec<f32>,
        limit: u64,
    ) -> Result<Vec<SearchHit>, VectorIndexError> {
        let collections = self.collections.read();
        let coll =
            collections
                .get(collection)
                .ok_or_else(|| VectorIndexError::CollectionNotFound {
                    collection: collection.to_string(),
                })?;

        let override_score = *self.score_override.read();

        let mut hits: Vec<SearchHit> = coll
            .points
            .values()
            .map(|p| SearchHit {
                id: p.id,
                score: override_score
                    .unwrap_or_else(|| Self::cosine_similarity(&query, &p.vector)),
                cache_key: p.cache_key.clone(),
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit as usize);
        Ok(hits)
    }

    async fn count(&self, collection: &str) -> Result<u64, VectorIndexError> {
        Ok(self.point_count(collection).unwrap_or(0) as u64)
    }

    async fn clear(&self, collection: &str, vector_size: u64) -> Result<(), VectorIndexError> {
        let mut collections = self.collections.write();
        collections.insert(
            collection.to_string(),
            MockCollection {
                vector_size,
                points: HashMap::new(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(x: f32, y: f32) -> Vec<f32> {
        let norm = (x * x + y * y).sqrt();
        vec![x / norm, y / norm]
    }

    #[tokio::test]
    async fn test_upsert_and_search_orders_by_similarity() {
        let index = MockVectorIndex::new();
        index.ensure_collection("c", 2).await.unwrap();

        index
            .upsert("c", SemanticPoint::new(1, unit(1.0, 0.0), "fp-east", "east"))
            .await
            .unwrap();
        index
            .upsert("c", SemanticPoint::new(2, unit(0.0, 1.0), "fp-north", "north"))
            .await
            .unwrap();

        let hits = index
            .search_nearest("c", unit(0.9, 0.1), 2)
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].cache_key, "fp-east");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_upsert_rejects_wrong_dimension() {
        let index = MockVectorIndex::new();
        index.ensure_collection("c", 2).await.unwrap();

        let result = index
            .upsert("c", SemanticPoint::new(1, vec![1.0, 0.0, 0.0], "fp", "t"))
            .await;
        assert!(matches!(
            result,
            Err(VectorIndexError::InvalidDimension { .. })
        ));
    }

    #[tokio::test]
    async fn test_upsert_same_id_overwrites() {
        let index = MockVectorIndex::new();
        index.ensure_collection("c", 2).await.unwrap();

        index
            .upsert("c", SemanticPoint::new(1, unit(1.0, 0.0), "fp-a", "a"))
            .await
            .unwrap();
        index
            .upsert("c", SemanticPoint::new(1, unit(0.0, 1.0), "fp-b", "b"))
            .await
            .unwrap();

        assert_eq!(index.point_count("c"), Some(1));
        let hits = index.search_nearest("c", unit(0.0, 1.0), 1).await.unwrap();
        assert_eq!(hits[0].cache_key, "fp-b");
    }

    #[tokio::test]
    async fn test_score_override_and_clear() {
        let index = MockVectorIndex::new();
        index.ensure_collection("c", 2).await.unwrap();
        index
            .upsert("c", SemanticPoint::new(1, unit(1.0, 0.0), "fp", "t"))
            .await
            .unwrap();

        index.set_score_override(Some(0.42));
        let hits = index.search_nearest("c", unit(0.0, 1.0), 1).await.unwrap();
        assert!((hits[0].score - 0.42).abs() < f32::EPSILON);

        index.clear("c", 2).await.unwrap();
        assert_eq!(index.count("c").await.unwrap(), 0);
    }
}
