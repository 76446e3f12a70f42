//! Vector Store Gateway: collection naming and typed point operations.
//!
//! Collections are named `<prefix>_<name>` and sized to
//! [`EMBEDDING_DIMS`](crate::embedding::EMBEDDING_DIMS) with cosine
//! distance. Point ids are UUIDv5 values derived from the caller's id
//! (Qdrant only accepts integers or UUIDs), so the same node id always maps
//! to the same point.
//!
//! Errors from the store propagate unchanged; the gateway never retries.

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::embedding::EMBEDDING_DIMS;
use crate::store::{Distance, PayloadFilter, Point, ScoredPoint, StoredPoint, VectorStore};

/// Namespace for point-id derivation. Changing it orphans every stored point.
const POINT_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6b, 0x1f, 0x0e, 0x52, 0x9a, 0x3c, 0x4d, 0x71, 0x8e, 0x05, 0x2b, 0xc4, 0x17, 0xd9, 0x60, 0xa3,
]);

/// The fixed set of collections. Only [`Collection::Infrastructure`] is
/// written by the mapper; the rest are created so other writers can rely
/// on them existing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Infrastructure,
    Services,
    Applications,
    Servers,
    Relationships,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Infrastructure,
        Collection::Services,
        Collection::Applications,
        Collection::Servers,
        Collection::Relationships,
    ];

    pub fn suffix(&self) -> &'static str {
        match self {
            Collection::Infrastructure => "infrastructure",
            Collection::Services => "services",
            Collection::Applications => "applications",
            Collection::Servers => "servers",
            Collection::Relationships => "relationships",
        }
    }
}

/// Derive the store point id for a logical id such as `server:abc`.
pub fn point_id(id: &str) -> String {
    Uuid::new_v5(&POINT_NAMESPACE, id.as_bytes()).to_string()
}

/// Typed access to a [`VectorStore`] under one naming prefix.
pub struct VectorGateway<S> {
    store: S,
    prefix: String,
    dims: usize,
}

impl<S: VectorStore> VectorGateway<S> {
    pub fn new(store: S, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            dims: EMBEDDING_DIMS,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn collection_name(&self, collection: Collection) -> String {
        if self.prefix.is_empty() {
            collection.suffix().to_string()
        } else {
            format!("{}_{}", self.prefix, collection.suffix())
        }
    }

    /// Create any missing collection. Safe to call on every run.
    pub async fn ensure_collections(&self) -> Result<()> {
        for collection in Collection::ALL {
            let name = self.collection_name(collection);
            let exists = self
                .store
                .collection_exists(&name)
                .await
                .with_context(|| format!("checking collection {}", name))?;
            if !exists {
                self.store
                    .create_collection(&name, self.dims, Distance::Cosine)
                    .await
                    .with_context(|| format!("creating collection {}", name))?;
                info!(collection = %name, dims = self.dims, "created collection");
            }
        }
        Ok(())
    }

    /// Overwrite-by-id write; visible to reads once this returns.
    pub async fn upsert(
        &self,
        collection: Collection,
        id: &str,
        vector: Vec<f32>,
        payload: Value,
    ) -> Result<()> {
        let point = Point {
            id: point_id(id),
            vector,
            payload,
        };
        self.store
            .upsert(&self.collection_name(collection), point)
            .await
    }

    /// Look up points by logical id. Unknown ids are simply absent.
    pub async fn retrieve_by_id(
        &self,
        collection: Collection,
        ids: &[&str],
    ) -> Result<Vec<StoredPoint>> {
        let point_ids: Vec<String> = ids.iter().map(|id| point_id(id)).collect();
        self.store
            .retrieve(&self.collection_name(collection), &point_ids)
            .await
    }

    pub async fn search(
        &self,
        collection: Collection,
        vector: &[f32],
        limit: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<ScoredPoint>> {
        self.store
            .search(&self.collection_name(collection), vector, limit, filter)
            .await
    }

    pub async fn scroll(
        &self,
        collection: Collection,
        limit: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<StoredPoint>> {
        self.store
            .scroll(&self.collection_name(collection), limit, filter)
            .await
    }

    pub async fn delete_all(&self, collection: Collection) -> Result<()> {
        self.store
            .delete_all(&self.collection_name(collection))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use serde_json::json;

    #[test]
    fn test_point_id_is_stable_uuid() {
        let a = point_id("server:abc");
        assert_eq!(a, point_id("server:abc"));
        assert_ne!(a, point_id("server:abd"));
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_collection_names() {
        let gw = VectorGateway::new(InMemoryStore::new(), "fleet");
        assert_eq!(gw.collection_name(Collection::Infrastructure), "fleet_infrastructure");
        let bare = VectorGateway::new(InMemoryStore::new(), "");
        assert_eq!(bare.collection_name(Collection::Servers), "servers");
    }

    #[tokio::test]
    async fn test_ensure_collections_is_idempotent() {
        let gw = VectorGateway::new(InMemoryStore::new(), "t");
        gw.ensure_collections().await.unwrap();
        gw.ensure_collections().await.unwrap();
        for c in Collection::ALL {
            assert!(gw
                .store()
                .collection_exists(&gw.collection_name(c))
                .await
                .unwrap());
        }
    }

    #[tokio::test]
    async fn test_upsert_then_retrieve_by_logical_id() {
        let gw = VectorGateway::new(InMemoryStore::new(), "t");
        gw.ensure_collections().await.unwrap();
        let v = vec![0.0; gw.dims()];
        gw.upsert(Collection::Infrastructure, "server:a", v, json!({ "id": "server:a" }))
            .await
            .unwrap();
        let got = gw
            .retrieve_by_id(Collection::Infrastructure, &["server:a", "server:missing"])
            .await
            .unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].payload["id"], "server:a");
    }
}
