//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is the minimal point-store surface the graph
//! needs: collection lifecycle, overwrite-by-id upsert, retrieval by id,
//! similarity search with an optional equality filter, scroll, and
//! delete-all. There is no edge index; traversal is built on top of these
//! operations by the query engine.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Distance metric for a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distance {
    Cosine,
}

/// Equality match on one top-level payload field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadFilter {
    pub key: String,
    pub value: Value,
}

impl PayloadFilter {
    pub fn equals(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, payload: &Value) -> bool {
        payload.get(&self.key) == Some(&self.value)
    }
}

/// A point to write.
#[derive(Debug, Clone)]
pub struct Point {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Value,
}

/// A point read back without a score.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPoint {
    pub id: String,
    pub payload: Value,
}

/// A point returned from similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: Value,
}

/// Abstract point store.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`collection_exists`](VectorStore::collection_exists) | Check a collection |
/// | [`create_collection`](VectorStore::create_collection) | Create with size and distance |
/// | [`upsert`](VectorStore::upsert) | Overwrite-by-id write, acknowledged before return |
/// | [`retrieve`](VectorStore::retrieve) | Point lookup; unknown ids are skipped |
/// | [`search`](VectorStore::search) | Nearest neighbours, score-descending |
/// | [`scroll`](VectorStore::scroll) | Enumerate up to `limit` points |
/// | [`delete_all`](VectorStore::delete_all) | Remove every point in a collection |
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn collection_exists(&self, collection: &str) -> Result<bool>;

    async fn create_collection(&self, collection: &str, dims: usize, distance: Distance)
        -> Result<()>;

    /// Write `point`, replacing any point with the same id. The write is
    /// visible to subsequent reads once this returns.
    async fn upsert(&self, collection: &str, point: Point) -> Result<()>;

    async fn retrieve(&self, collection: &str, ids: &[String]) -> Result<Vec<StoredPoint>>;

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<ScoredPoint>>;

    async fn scroll(
        &self,
        collection: &str,
        limit: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<StoredPoint>>;

    async fn delete_all(&self, collection: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_matches_top_level_field() {
        let f = PayloadFilter::equals("type", "domain");
        assert!(f.matches(&json!({ "type": "domain", "name": "a.test" })));
        assert!(!f.matches(&json!({ "type": "service" })));
        assert!(!f.matches(&json!({ "metadata": { "type": "domain" } })));
    }
}
