//! In-memory [`VectorStore`] implementation for testing.
//!
//! Collections are `BTreeMap`s keyed by point id behind `std::sync::RwLock`,
//! so scroll order is id order, the same as Qdrant. Search is brute-force
//! cosine similarity over every point in the collection.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::embedding::cosine_similarity;

use super::{Distance, PayloadFilter, Point, ScoredPoint, StoredPoint, VectorStore};

struct StoredVector {
    vector: Vec<f32>,
    payload: Value,
}

struct MemoryCollection {
    dims: usize,
    points: BTreeMap<String, StoredVector>,
}

/// In-memory store for tests and dry runs.
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Number of points in `collection` (0 if it does not exist).
    pub fn point_count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|c| c.get(collection).map_or(0, |c| c.points.len()))
            .unwrap_or(0)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        let guard = self.collections.read().map_err(poisoned)?;
        Ok(guard.contains_key(collection))
    }

    async fn create_collection(
        &self,
        collection: &str,
        dims: usize,
        _distance: Distance,
    ) -> Result<()> {
        let mut guard = self.collections.write().map_err(poisoned)?;
        if guard.contains_key(collection) {
            bail!("Collection `{}` already exists", collection);
        }
        guard.insert(
            collection.to_string(),
            MemoryCollection {
                dims,
                points: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn upsert(&self, collection: &str, point: Point) -> Result<()> {
        let mut guard = self.collections.write().map_err(poisoned)?;
        let coll = guard
            .get_mut(collection)
            .ok_or_else(|| anyhow!("Collection `{}` doesn't exist", collection))?;
        if point.vector.len() != coll.dims {
            bail!(
                "Wrong input: vector dimension error: expected dim: {}, got {}",
                coll.dims,
                point.vector.len()
            );
        }
        coll.points.insert(
            point.id,
            StoredVector {
                vector: point.vector,
                payload: point.payload,
            },
        );
        Ok(())
    }

    async fn retrieve(&self, collection: &str, ids: &[String]) -> Result<Vec<StoredPoint>> {
        let guard = self.collections.read().map_err(poisoned)?;
        let coll = guard
            .get(collection)
            .ok_or_else(|| anyhow!("Collection `{}` doesn't exist", collection))?;
        Ok(ids
            .iter()
            .filter_map(|id| {
                coll.points.get(id).map(|sv| StoredPoint {
                    id: id.clone(),
                    payload: sv.payload.clone(),
                })
            })
            .collect())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<ScoredPoint>> {
        let guard = self.collections.read().map_err(poisoned)?;
        let coll = guard
            .get(collection)
            .ok_or_else(|| anyhow!("Collection `{}` doesn't exist", collection))?;
        let mut hits: Vec<ScoredPoint> = coll
            .points
            .iter()
            .filter(|(_, sv)| filter.map_or(true, |f| f.matches(&sv.payload)))
            .map(|(id, sv)| ScoredPoint {
                id: id.clone(),
                score: cosine_similarity(vector, &sv.vector),
                payload: sv.payload.clone(),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn scroll(
        &self,
        collection: &str,
        limit: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<StoredPoint>> {
        let guard = self.collections.read().map_err(poisoned)?;
        let coll = guard
            .get(collection)
            .ok_or_else(|| anyhow!("Collection `{}` doesn't exist", collection))?;
        Ok(coll
            .points
            .iter()
            .filter(|(_, sv)| filter.map_or(true, |f| f.matches(&sv.payload)))
            .take(limit)
            .map(|(id, sv)| StoredPoint {
                id: id.clone(),
                payload: sv.payload.clone(),
            })
            .collect())
    }

    async fn delete_all(&self, collection: &str) -> Result<()> {
        let mut guard = self.collections.write().map_err(poisoned)?;
        let coll = guard
            .get_mut(collection)
            .ok_or_else(|| anyhow!("Collection `{}` doesn't exist", collection))?;
        coll.points.clear();
        Ok(())
    }
}
