//! Graph Query Engine: semantic search and traversal over indexed nodes.
//!
//! The store has no edge index. Outgoing edges are read straight off the
//! node; incoming edges are found by an [`IncomingEdges`] strategy, which
//! by default ([`ScrollScan`]) scrolls the whole collection and checks every
//! node's relationships. That is O(nodes × edges) per call and is only meant
//! for fleets of tens to low hundreds of resources.
//!
//! Every public query returns a plain value. Store failures are logged and
//! turned into the neutral result (`[]`, zero stats, `resource: None`).

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::embedding::Embedder;
use crate::gateway::{Collection, VectorGateway};
use crate::models::{InfrastructureNode, NodeType, RelationType, SearchResult};
use crate::store::{PayloadFilter, StoredPoint, VectorStore};

pub const DEFAULT_SEARCH_LIMIT: usize = 10;
pub const DEFAULT_MIN_SCORE: f32 = 0.5;
pub const DEFAULT_SCAN_LIMIT: usize = 1000;
pub const DEFAULT_LIST_LIMIT: usize = 10_000;

/// Options for [`GraphQuery::search`].
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    pub node_type: Option<NodeType>,
    /// Results scoring below this are dropped.
    pub min_score: f32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_SEARCH_LIMIT,
            node_type: None,
            min_score: DEFAULT_MIN_SCORE,
        }
    }
}

/// A node with its direct neighbours.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LinkedResources {
    pub resource: Option<InfrastructureNode>,
    /// Nodes that store an edge pointing at `resource`.
    pub incoming: Vec<InfrastructureNode>,
    /// Targets of `resource`'s own edges that exist in the store.
    pub outgoing: Vec<InfrastructureNode>,
}

/// A domain and what it routes to.
#[derive(Debug, Clone, Serialize)]
pub struct DomainEntry {
    pub domain: InfrastructureNode,
    /// Target id of the first edge to a service.
    pub service: Option<String>,
    /// Target id of the first edge to an application.
    pub application: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerWorkloads {
    pub server: Option<InfrastructureNode>,
    pub services: Vec<InfrastructureNode>,
    pub applications: Vec<InfrastructureNode>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProjectHierarchy {
    pub project: Option<InfrastructureNode>,
    pub environments: Vec<InfrastructureNode>,
    pub services: Vec<InfrastructureNode>,
    pub applications: Vec<InfrastructureNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphStats {
    pub total: usize,
    pub by_type: BTreeMap<NodeType, usize>,
}

/// How "who points at me" is answered.
///
/// The store keeps edges only on their source node, so this is the seam
/// where a reverse index keyed by target id would plug in.
#[async_trait]
pub trait IncomingEdges<S: VectorStore>: Send + Sync {
    async fn incoming(
        &self,
        gateway: &VectorGateway<S>,
        target_id: &str,
        relation_types: Option<&[RelationType]>,
    ) -> Result<Vec<InfrastructureNode>>;
}

/// Scroll the collection (one page of up to `limit` points) and keep every
/// node with a matching edge.
#[derive(Debug, Clone, Copy)]
pub struct ScrollScan {
    pub limit: usize,
}

impl Default for ScrollScan {
    fn default() -> Self {
        Self {
            limit: DEFAULT_SCAN_LIMIT,
        }
    }
}

#[async_trait]
impl<S: VectorStore> IncomingEdges<S> for ScrollScan {
    async fn incoming(
        &self,
        gateway: &VectorGateway<S>,
        target_id: &str,
        relation_types: Option<&[RelationType]>,
    ) -> Result<Vec<InfrastructureNode>> {
        let points = gateway
            .scroll(Collection::Infrastructure, self.limit, None)
            .await?;
        Ok(decode_points(points)
            .into_iter()
            .filter(|n| n.points_to(target_id, relation_types))
            .collect())
    }
}

/// Read-only queries over a [`VectorGateway`].
pub struct GraphQuery<'a, S> {
    gateway: &'a VectorGateway<S>,
    embedder: &'a Embedder,
    incoming: Box<dyn IncomingEdges<S> + 'a>,
    list_limit: usize,
}

impl<'a, S: VectorStore> GraphQuery<'a, S> {
    pub fn new(gateway: &'a VectorGateway<S>, embedder: &'a Embedder) -> Self {
        Self {
            gateway,
            embedder,
            incoming: Box::new(ScrollScan::default()),
            list_limit: DEFAULT_LIST_LIMIT,
        }
    }

    pub fn with_incoming(mut self, incoming: impl IncomingEdges<S> + 'a) -> Self {
        self.incoming = Box::new(incoming);
        self
    }

    /// Page cap for [`find_by_type`](Self::find_by_type) and
    /// [`stats`](Self::stats).
    pub fn with_list_limit(mut self, limit: usize) -> Self {
        self.list_limit = limit;
        self
    }

    /// Semantic search, optionally restricted to one type. Store order is
    /// kept; nothing is re-sorted.
    pub async fn search(&self, query: &str, opts: &SearchOptions) -> Vec<SearchResult> {
        let vector = self.embedder.embed(query).await;
        let filter = opts
            .node_type
            .map(|t| PayloadFilter::equals("type", t.as_str()));
        let hits = match self
            .gateway
            .search(Collection::Infrastructure, &vector, opts.limit, filter.as_ref())
            .await
        {
            Ok(h) => h,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "search failed");
                return Vec::new();
            }
        };
        hits.into_iter()
            .filter(|h| h.score >= opts.min_score)
            .filter_map(|h| {
                decode_payload(&h.id, h.payload).map(|node| SearchResult {
                    node,
                    score: h.score,
                })
            })
            .collect()
    }

    /// The node plus its outgoing and incoming neighbours, optionally
    /// restricted to some relation kinds. Dangling edges are skipped.
    pub async fn find_linked_to(
        &self,
        resource_id: &str,
        relation_types: Option<&[RelationType]>,
    ) -> LinkedResources {
        match self.linked(resource_id, relation_types).await {
            Ok(l) => l,
            Err(e) => {
                warn!(resource = resource_id, error = %format!("{:#}", e), "linked lookup failed");
                LinkedResources::default()
            }
        }
    }

    async fn linked(
        &self,
        resource_id: &str,
        relation_types: Option<&[RelationType]>,
    ) -> Result<LinkedResources> {
        let Some(resource) = self.get(resource_id).await? else {
            return Ok(LinkedResources::default());
        };

        let mut outgoing = Vec::new();
        for rel in resource.outgoing(relation_types) {
            match self.get(&rel.target_id).await? {
                Some(target) => outgoing.push(target),
                None => {
                    tracing::debug!(from = resource_id, to = %rel.target_id, "dangling edge");
                }
            }
        }

        let incoming = self
            .incoming
            .incoming(self.gateway, resource_id, relation_types)
            .await?;

        Ok(LinkedResources {
            resource: Some(resource),
            incoming,
            outgoing,
        })
    }

    async fn get(&self, id: &str) -> Result<Option<InfrastructureNode>> {
        let points = self
            .gateway
            .retrieve_by_id(Collection::Infrastructure, &[id])
            .await?;
        Ok(decode_points(points).into_iter().next())
    }

    /// Every node of `node_type`, in one page capped at the list limit.
    pub async fn find_by_type(&self, node_type: NodeType) -> Vec<InfrastructureNode> {
        let filter = PayloadFilter::equals("type", node_type.as_str());
        match self
            .gateway
            .scroll(Collection::Infrastructure, self.list_limit, Some(&filter))
            .await
        {
            Ok(points) => decode_points(points),
            Err(e) => {
                warn!(node_type = %node_type, error = %format!("{:#}", e), "type listing failed");
                Vec::new()
            }
        }
    }

    pub async fn find_all_domains(&self) -> Vec<DomainEntry> {
        self.find_by_type(NodeType::Domain)
            .await
            .into_iter()
            .map(|domain| {
                let first = |t: NodeType| {
                    domain
                        .relationships
                        .iter()
                        .find(|r| r.target_type == t)
                        .map(|r| r.target_id.clone())
                };
                DomainEntry {
                    service: first(NodeType::Service),
                    application: first(NodeType::Application),
                    domain,
                }
            })
            .collect()
    }

    /// Services and applications with a `deployed_on` edge to `server_id`.
    pub async fn find_on_server(&self, server_id: &str) -> ServerWorkloads {
        let linked = self
            .find_linked_to(server_id, Some(&[RelationType::DeployedOn][..]))
            .await;
        let (services, applications) = partition(linked.incoming);
        ServerWorkloads {
            server: linked.resource,
            services,
            applications,
        }
    }

    /// Environments (outgoing) plus services and applications (incoming).
    /// Other node types on either side are dropped.
    pub async fn find_project_hierarchy(&self, project_id: &str) -> ProjectHierarchy {
        let linked = self.find_linked_to(project_id, None).await;
        let environments = linked
            .outgoing
            .into_iter()
            .filter(|n| n.node_type() == NodeType::Environment)
            .collect();
        let (services, applications) = partition(linked.incoming);
        ProjectHierarchy {
            project: linked.resource,
            environments,
            services,
            applications,
        }
    }

    pub async fn stats(&self) -> GraphStats {
        let points = match self
            .gateway
            .scroll(Collection::Infrastructure, self.list_limit, None)
            .await
        {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "stats scroll failed");
                return GraphStats::default();
            }
        };
        let nodes = decode_points(points);
        let mut by_type = BTreeMap::new();
        for node in &nodes {
            *by_type.entry(node.node_type()).or_insert(0) += 1;
        }
        GraphStats {
            total: nodes.len(),
            by_type,
        }
    }
}

fn partition(nodes: Vec<InfrastructureNode>) -> (Vec<InfrastructureNode>, Vec<InfrastructureNode>) {
    let mut services = Vec::new();
    let mut applications = Vec::new();
    for node in nodes {
        match node.node_type() {
            NodeType::Service => services.push(node),
            NodeType::Application => applications.push(node),
            _ => {}
        }
    }
    (services, applications)
}

fn decode_payload(point_id: &str, payload: Value) -> Option<InfrastructureNode> {
    match serde_json::from_value(payload) {
        Ok(node) => Some(node),
        Err(e) => {
            warn!(point = point_id, error = %e, "skipping point with unreadable payload");
            None
        }
    }
}

fn decode_points(points: Vec<StoredPoint>) -> Vec<InfrastructureNode> {
    points
        .into_iter()
        .filter_map(|p| decode_payload(&p.id, p.payload))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NodeMetadata, Relationship};
    use crate::store::memory::InMemoryStore;
    use crate::store::{Distance, Point};

    fn node(t: NodeType, key: &str, rels: Vec<Relationship>) -> InfrastructureNode {
        InfrastructureNode {
            id: t.node_id(key),
            name: key.to_string(),
            description: format!("{} {}", t, key),
            metadata: NodeMetadata::from_value(t, Value::Null).unwrap(),
            relationships: rels,
        }
    }

    async fn index(gw: &VectorGateway<InMemoryStore>, embedder: &Embedder, nodes: &[InfrastructureNode]) {
        gw.ensure_collections().await.unwrap();
        for n in nodes {
            let v = embedder.embed(&n.search_text()).await;
            gw.upsert(
                Collection::Infrastructure,
                &n.id,
                v,
                serde_json::to_value(n).unwrap(),
            )
            .await
            .unwrap();
        }
    }

    #[tokio::test]
    async fn test_find_on_server_partitions_incoming() {
        let gw = VectorGateway::new(InMemoryStore::new(), "t");
        let embedder = Embedder::deterministic();
        let deployed = |srv: &str| {
            vec![Relationship::new(RelationType::DeployedOn, NodeType::Server, srv, "")]
        };
        index(
            &gw,
            &embedder,
            &[
                node(NodeType::Server, "x", vec![]),
                node(NodeType::Server, "y", vec![]),
                node(NodeType::Service, "a", deployed("x")),
                node(NodeType::Application, "b", deployed("y")),
                node(NodeType::Application, "c", deployed("x")),
            ],
        )
        .await;

        let q = GraphQuery::new(&gw, &embedder);
        let on_x = q.find_on_server("server:x").await;
        assert_eq!(on_x.server.unwrap().id, "server:x");
        assert_eq!(on_x.services.len(), 1);
        assert_eq!(on_x.services[0].id, "service:a");
        assert_eq!(on_x.applications.len(), 1);
        assert_eq!(on_x.applications[0].id, "application:c");
    }

    #[tokio::test]
    async fn test_unknown_resource_is_empty() {
        let gw = VectorGateway::new(InMemoryStore::new(), "t");
        let embedder = Embedder::deterministic();
        index(&gw, &embedder, &[]).await;
        let linked = GraphQuery::new(&gw, &embedder).find_linked_to("server:nope", None).await;
        assert!(linked.resource.is_none());
        assert!(linked.incoming.is_empty());
        assert!(linked.outgoing.is_empty());
    }

    #[tokio::test]
    async fn test_missing_collection_degrades_to_empty() {
        let gw = VectorGateway::new(InMemoryStore::new(), "never-created");
        let embedder = Embedder::deterministic();
        let q = GraphQuery::new(&gw, &embedder);
        assert!(q.search("anything", &SearchOptions::default()).await.is_empty());
        assert!(q.find_by_type(NodeType::Server).await.is_empty());
        assert!(q.find_linked_to("server:a", None).await.resource.is_none());
        assert_eq!(q.stats().await, GraphStats::default());
    }

    /// Reverse index stand-in: answers from a fixed list.
    struct Fixed(Vec<InfrastructureNode>);

    #[async_trait]
    impl IncomingEdges<InMemoryStore> for Fixed {
        async fn incoming(
            &self,
            _gateway: &VectorGateway<InMemoryStore>,
            _target_id: &str,
            _relation_types: Option<&[RelationType]>,
        ) -> Result<Vec<InfrastructureNode>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_incoming_strategy_is_swappable() {
        let gw = VectorGateway::new(InMemoryStore::new(), "t");
        let embedder = Embedder::deterministic();
        index(&gw, &embedder, &[node(NodeType::Server, "x", vec![])]).await;
        let q = GraphQuery::new(&gw, &embedder)
            .with_incoming(Fixed(vec![node(NodeType::Service, "ghost", vec![])]));
        let on_x = q.find_on_server("server:x").await;
        assert_eq!(on_x.services.len(), 1);
        assert_eq!(on_x.services[0].id, "service:ghost");
    }

    #[tokio::test]
    async fn test_bad_payload_is_skipped() {
        let store = InMemoryStore::new();
        store.create_collection("t_infrastructure", 2, Distance::Cosine).await.unwrap();
        store
            .upsert(
                "t_infrastructure",
                Point {
                    id: "p".into(),
                    vector: vec![1.0, 0.0],
                    payload: serde_json::json!({ "garbage": true }),
                },
            )
            .await
            .unwrap();
        let gw = VectorGateway::new(store, "t");
        let embedder = Embedder::deterministic();
        assert_eq!(GraphQuery::new(&gw, &embedder).stats().await.total, 0);
    }
}
