//! Node and edge types for the infrastructure graph.
//!
//! An [`InfrastructureNode`] is the unit of indexing: one resource from the
//! fleet (or one synthesized environment/domain), its embedded description,
//! a typed metadata bag, and the outgoing [`Relationship`]s stored on it.
//!
//! # Payload shape
//!
//! Nodes are stored as vector-store payloads with a flat `type` field so the
//! store can filter on it:
//!
//! ```json
//! {
//!   "id": "server:3f2a…",
//!   "type": "server",
//!   "name": "edge-1",
//!   "description": "Primary edge box. Host IP 10.0.0.4",
//!   "metadata": { "uuid": "3f2a…", "ip": "10.0.0.4" },
//!   "relationships": []
//! }
//! ```
//!
//! In memory, `metadata` is a [`NodeMetadata`] variant chosen by `type`;
//! the node type is derived from that variant, so the two cannot disagree.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed set of node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Server,
    Project,
    Service,
    Application,
    Environment,
    Deployment,
    Domain,
    Database,
}

impl NodeType {
    pub const ALL: [NodeType; 8] = [
        NodeType::Server,
        NodeType::Project,
        NodeType::Service,
        NodeType::Application,
        NodeType::Environment,
        NodeType::Deployment,
        NodeType::Domain,
        NodeType::Database,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Server => "server",
            NodeType::Project => "project",
            NodeType::Service => "service",
            NodeType::Application => "application",
            NodeType::Environment => "environment",
            NodeType::Deployment => "deployment",
            NodeType::Domain => "domain",
            NodeType::Database => "database",
        }
    }

    /// Build the node id `<type>:<natural key>`.
    pub fn node_id(&self, key: &str) -> String {
        format!("{}:{}", self.as_str(), key)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match NodeType::ALL.iter().find(|t| t.as_str() == s) {
            Some(t) => Ok(*t),
            None => bail!(
                "Unknown node type: '{}'. Must be one of: server, project, service, application, environment, deployment, domain, database",
                s
            ),
        }
    }
}

/// Edge kinds produced by the mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    DeployedOn,
    BelongsToProject,
    HasEnvironment,
    HasDomain,
    PointsToService,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::DeployedOn => "deployed_on",
            RelationType::BelongsToProject => "belongs_to_project",
            RelationType::HasEnvironment => "has_environment",
            RelationType::HasDomain => "has_domain",
            RelationType::PointsToService => "points_to_service",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "deployed_on" => Ok(RelationType::DeployedOn),
            "belongs_to_project" => Ok(RelationType::BelongsToProject),
            "has_environment" => Ok(RelationType::HasEnvironment),
            "has_domain" => Ok(RelationType::HasDomain),
            "points_to_service" => Ok(RelationType::PointsToService),
            other => bail!("Unknown relation type: '{}'", other),
        }
    }
}

/// A directed edge stored on its source node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub target_id: String,
    pub target_type: NodeType,
    pub relation_type: RelationType,
    pub description: String,
}

impl Relationship {
    pub fn new(
        relation_type: RelationType,
        target_type: NodeType,
        target_key: &str,
        description: impl Into<String>,
    ) -> Self {
        Self {
            target_id: target_type.node_id(target_key),
            target_type,
            relation_type,
            description: description.into(),
        }
    }
}

/// Upstream fields we do not model explicitly.
pub type Extra = BTreeMap<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_reachable: Option<bool>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default)]
    pub environment_count: usize,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_uuid: Option<String>,
    #[serde(default)]
    pub application_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fqdn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_pack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports_exposes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fqdn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_uuid: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Type-specific node attributes, one variant per [`NodeType`].
///
/// `Deployment` and `Database` are part of the closed type set but no
/// crawler produces them yet, so they only carry the open bag.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeMetadata {
    Server(ServerMetadata),
    Project(ProjectMetadata),
    Service(ServiceMetadata),
    Application(ApplicationMetadata),
    Environment(EnvironmentMetadata),
    Deployment(Extra),
    Domain(DomainMetadata),
    Database(Extra),
}

impl NodeMetadata {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeMetadata::Server(_) => NodeType::Server,
            NodeMetadata::Project(_) => NodeType::Project,
            NodeMetadata::Service(_) => NodeType::Service,
            NodeMetadata::Application(_) => NodeType::Application,
            NodeMetadata::Environment(_) => NodeType::Environment,
            NodeMetadata::Deployment(_) => NodeType::Deployment,
            NodeMetadata::Domain(_) => NodeType::Domain,
            NodeMetadata::Database(_) => NodeType::Database,
        }
    }

    pub fn to_value(&self) -> Value {
        let v = match self {
            NodeMetadata::Server(m) => serde_json::to_value(m),
            NodeMetadata::Project(m) => serde_json::to_value(m),
            NodeMetadata::Service(m) => serde_json::to_value(m),
            NodeMetadata::Application(m) => serde_json::to_value(m),
            NodeMetadata::Environment(m) => serde_json::to_value(m),
            NodeMetadata::Deployment(m) => serde_json::to_value(m),
            NodeMetadata::Domain(m) => serde_json::to_value(m),
            NodeMetadata::Database(m) => serde_json::to_value(m),
        };
        v.unwrap_or_else(|_| Value::Object(Default::default()))
    }

    /// Parse a metadata object according to `node_type`.
    pub fn from_value(node_type: NodeType, value: Value) -> Result<Self> {
        let value = if value.is_null() {
            Value::Object(Default::default())
        } else {
            value
        };
        Ok(match node_type {
            NodeType::Server => NodeMetadata::Server(serde_json::from_value(value)?),
            NodeType::Project => NodeMetadata::Project(serde_json::from_value(value)?),
            NodeType::Service => NodeMetadata::Service(serde_json::from_value(value)?),
            NodeType::Application => NodeMetadata::Application(serde_json::from_value(value)?),
            NodeType::Environment => NodeMetadata::Environment(serde_json::from_value(value)?),
            NodeType::Deployment => NodeMetadata::Deployment(serde_json::from_value(value)?),
            NodeType::Domain => NodeMetadata::Domain(serde_json::from_value(value)?),
            NodeType::Database => NodeMetadata::Database(serde_json::from_value(value)?),
        })
    }
}

/// One indexed infrastructure resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "NodeRecord", try_from = "NodeRecord")]
pub struct InfrastructureNode {
    /// `<type>:<natural key>`, stable across crawls.
    pub id: String,
    pub name: String,
    /// Embedded text: the resource's own description plus context.
    pub description: String,
    pub metadata: NodeMetadata,
    /// Outgoing edges, in emission order.
    pub relationships: Vec<Relationship>,
}

impl InfrastructureNode {
    pub fn node_type(&self) -> NodeType {
        self.metadata.node_type()
    }

    /// Text handed to the embedder: type, name, description, every edge
    /// description and the metadata rendered as JSON.
    pub fn search_text(&self) -> String {
        let mut parts: Vec<String> = vec![
            self.node_type().to_string(),
            self.name.clone(),
            self.description.clone(),
        ];
        parts.extend(self.relationships.iter().map(|r| r.description.clone()));
        parts.push(self.metadata.to_value().to_string());
        parts.join(" ")
    }

    pub fn outgoing<'a>(
        &'a self,
        relation_types: Option<&'a [RelationType]>,
    ) -> impl Iterator<Item = &'a Relationship> + 'a {
        self.relationships
            .iter()
            .filter(move |r| relation_types.map_or(true, |f| f.contains(&r.relation_type)))
    }

    /// Whether this node stores an edge to `target_id` of an allowed kind.
    pub fn points_to(&self, target_id: &str, relation_types: Option<&[RelationType]>) -> bool {
        self.outgoing(relation_types).any(|r| r.target_id == target_id)
    }
}

/// Wire form of [`InfrastructureNode`].
#[derive(Serialize, Deserialize)]
struct NodeRecord {
    id: String,
    #[serde(rename = "type")]
    node_type: NodeType,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    metadata: Value,
    #[serde(default)]
    relationships: Vec<Relationship>,
}

impl From<InfrastructureNode> for NodeRecord {
    fn from(node: InfrastructureNode) -> Self {
        NodeRecord {
            node_type: node.node_type(),
            metadata: node.metadata.to_value(),
            id: node.id,
            name: node.name,
            description: node.description,
            relationships: node.relationships,
        }
    }
}

impl TryFrom<NodeRecord> for InfrastructureNode {
    type Error = anyhow::Error;

    fn try_from(rec: NodeRecord) -> Result<Self> {
        Ok(InfrastructureNode {
            metadata: NodeMetadata::from_value(rec.node_type, rec.metadata)?,
            id: rec.id,
            name: rec.name,
            description: rec.description,
            relationships: rec.relationships,
        })
    }
}

/// A node plus its similarity to a query. Built per query, never stored.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub node: InfrastructureNode,
    /// Cosine similarity in `[0, 1]` for normalized vectors.
    pub score: f32,
}
