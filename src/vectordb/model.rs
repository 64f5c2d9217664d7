//! Vector index data shapes.

use qdrant_client::qdrant::ScoredPoint;
use qdrant_client::qdrant::point_id::PointIdOptions;

/// One semantic-cache entry as stored in the index.
///
/// `id` is derived from the exact-cache fingerprint, and `cache_key` carries
/// the fingerprint itself so a hit can be confirmed against the exact cache.
#[derive(Debug, Clone)]
pub struct SemanticPoint {
    /// Point id (fingerprint-derived).
    pub id: u64,
    /// Unit-norm embedding of `text`.
    pub vector: Vec<f32>,
    /// Exact-cache fingerprint this entry points at.
    pub cache_key: String,
    /// The embedded text, kept for inspection.
    pub text: String,
}

impl SemanticPoint {
    /// Builds a point.
    pub fn new(id: u64, vector: Vec<f32>, cache_key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id,
            vector,
            cache_key: cache_key.into(),
            text: text.into(),
        }
    }
}

/// A nearest-neighbor result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Point id.
    pub id: u64,
    /// Cosine similarity to the query (higher is closer).
    pub score: f32,
    /// Exact-cache fingerprint stored with the point.
    pub cache_key: String,
}

impl SearchHit {
    /// Extracts a hit from a Qdrant scored point; `None` when the payload
    /// is missing the cache key (a foreign or corrupt point).
    pub fn from_scored_point(point: ScoredPoint) -> Option<Self> {
        let id = match point.id.and_then(|pid| pid.point_id_options) {
            Some(PointIdOptions::Num(n)) => n,
            _ => return None,
        };

        let cache_key = point
            .payload
            .get("cache_key")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())?;

        Some(SearchHit {
            id,
            score: point.score,
            cache_key,
        })
    }
}
