//! Graph Mapper: crawl the fleet API, normalize resources into
//! [`InfrastructureNode`]s, and index them.
//!
//! # Mapping run
//!
//! 1. Ensure collections exist (failure aborts the run).
//! 2. Servers → one node each, no edges.
//! 3. Projects → one node each plus one environment node per environment.
//!    The project gets `has_environment`, the environment gets
//!    `belongs_to_project` back.
//! 4. Services → one node each with `deployed_on` / `belongs_to_project`.
//!    Every nested application with an `fqdn` adds `has_domain` on the
//!    service and a synthesized domain node carrying `points_to_service`.
//! 5. Applications → one node each with `deployed_on`,
//!    `belongs_to_project` and `has_domain`. No domain node is synthesized
//!    here.
//! 6. Each node is embedded from [`InfrastructureNode::search_text`] and
//!    upserted into the infrastructure collection, one at a time.
//!
//! A failing category (steps 2–5) is recorded in [`MapReport::errors`] and
//! the run continues. A failing node in step 6 is logged, counted in
//! [`MapReport::failed`], and skipped. Nothing is rolled back.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::embedding::Embedder;
use crate::fleet::{
    clean_fqdn, ApplicationResource, FleetSource, ProjectResource, ServerResource,
    ServiceResource,
};
use crate::gateway::{Collection, VectorGateway};
use crate::models::{
    ApplicationMetadata, DomainMetadata, EnvironmentMetadata, InfrastructureNode, NodeMetadata,
    NodeType, ProjectMetadata, RelationType, Relationship, ServerMetadata, ServiceMetadata,
};
use crate::store::VectorStore;

/// Outcome of [`GraphMapper::map_infrastructure`].
#[derive(Debug, Clone, Serialize)]
pub struct MapReport {
    /// Every node produced, in crawl order. Domain nodes claimed by several
    /// services appear once per claim; the store keeps the last one.
    pub nodes: Vec<InfrastructureNode>,
    /// Successful upserts.
    pub indexed: usize,
    /// Nodes whose embed-or-upsert failed.
    pub failed: usize,
    /// One entry per failed category (or project detail lookup).
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl MapReport {
    pub fn counts_by_type(&self) -> BTreeMap<NodeType, usize> {
        let mut counts = BTreeMap::new();
        for node in &self.nodes {
            *counts.entry(node.node_type()).or_insert(0) += 1;
        }
        counts
    }
}

/// Crawls a [`FleetSource`] into a [`VectorGateway`].
pub struct GraphMapper<'a, F: ?Sized, S> {
    fleet: &'a F,
    gateway: &'a VectorGateway<S>,
    embedder: &'a Embedder,
}

impl<'a, F, S> GraphMapper<'a, F, S>
where
    F: FleetSource + ?Sized,
    S: VectorStore,
{
    pub fn new(fleet: &'a F, gateway: &'a VectorGateway<S>, embedder: &'a Embedder) -> Self {
        Self {
            fleet,
            gateway,
            embedder,
        }
    }

    pub async fn map_infrastructure(&self) -> Result<MapReport> {
        let started_at = Utc::now();
        self.gateway
            .ensure_collections()
            .await
            .context("Failed to ensure vector store collections")?;

        let mut nodes = Vec::new();
        let mut errors = Vec::new();

        match self.crawl_servers().await {
            Ok(found) => nodes.extend(found),
            Err(e) => record(&mut errors, "servers", e),
        }
        let projects = self.crawl_projects(&mut errors).await;
        match projects {
            Ok(found) => nodes.extend(found),
            Err(e) => record(&mut errors, "projects", e),
        }
        match self.crawl_services().await {
            Ok(found) => nodes.extend(found),
            Err(e) => record(&mut errors, "services", e),
        }
        match self.crawl_applications().await {
            Ok(found) => nodes.extend(found),
            Err(e) => record(&mut errors, "applications", e),
        }

        info!(nodes = nodes.len(), errors = errors.len(), "crawl finished, indexing");

        let mut indexed = 0;
        let mut failed = 0;
        for node in &nodes {
            match self.index_node(node).await {
                Ok(()) => indexed += 1,
                Err(e) => {
                    failed += 1;
                    warn!(node = %node.id, error = %format!("{:#}", e), "failed to index node");
                }
            }
        }

        let duration_ms = (Utc::now() - started_at).num_milliseconds();
        info!(indexed, failed, duration_ms, "mapping finished");

        Ok(MapReport {
            nodes,
            indexed,
            failed,
            errors,
            started_at,
            duration_ms,
        })
    }

    /// Delete every indexed node. See [`clear_infrastructure`].
    pub async fn clear_infrastructure(&self) -> Result<()> {
        clear_infrastructure(self.gateway).await
    }

    async fn crawl_servers(&self) -> Result<Vec<InfrastructureNode>> {
        let servers = self.fleet.list_servers().await?;
        debug!(count = servers.len(), "fetched servers");
        Ok(servers.iter().filter_map(server_node).collect())
    }

    async fn crawl_projects(&self, errors: &mut Vec<String>) -> Result<Vec<InfrastructureNode>> {
        let projects = self.fleet.list_projects().await?;
        debug!(count = projects.len(), "fetched projects");
        let mut nodes = Vec::new();
        for project in &projects {
            let Some(uuid) = non_empty(project.uuid.as_deref()) else {
                warn!(name = ?project.name, "skipping project without uuid");
                continue;
            };
            let detail = match self.fleet.get_project(uuid).await {
                Ok(d) => d,
                Err(e) => {
                    record(errors, &format!("project {}", uuid), e);
                    project.clone()
                }
            };
            nodes.extend(project_nodes(project, &detail));
        }
        Ok(nodes)
    }

    async fn crawl_services(&self) -> Result<Vec<InfrastructureNode>> {
        let services = self.fleet.list_services().await?;
        debug!(count = services.len(), "fetched services");
        Ok(services.iter().flat_map(service_nodes).collect())
    }

    async fn crawl_applications(&self) -> Result<Vec<InfrastructureNode>> {
        let apps = self.fleet.list_applications().await?;
        debug!(count = apps.len(), "fetched applications");
        Ok(apps.iter().filter_map(application_node).collect())
    }

    async fn index_node(&self, node: &InfrastructureNode) -> Result<()> {
        let vector = self.embedder.embed(&node.search_text()).await;
        let payload = serde_json::to_value(node)?;
        self.gateway
            .upsert(Collection::Infrastructure, &node.id, vector, payload)
            .await
    }
}

fn record(errors: &mut Vec<String>, what: &str, e: anyhow::Error) {
    let msg = format!("{}: {:#}", what, e);
    warn!("{}", msg);
    errors.push(msg);
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn label<'s>(name: Option<&'s str>, fallback: &'s str) -> &'s str {
    non_empty(name).unwrap_or(fallback)
}

/// Join the resource's own description with contextual facts.
fn describe(own: Option<&str>, facts: &[String]) -> String {
    let mut parts: Vec<&str> = Vec::new();
    if let Some(d) = non_empty(own) {
        parts.push(d.trim_end_matches('.'));
    }
    parts.extend(facts.iter().map(String::as_str));
    parts.join(". ")
}

fn to_extra(map: &serde_json::Map<String, serde_json::Value>, skip: &[&str]) -> crate::models::Extra {
    map.iter()
        .filter(|(k, _)| !skip.contains(&k.as_str()))
        .filter(|(_, v)| v.is_string() || v.is_number() || v.is_boolean())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Delete every indexed node. Irrecoverable.
pub async fn clear_infrastructure<S: VectorStore>(gateway: &VectorGateway<S>) -> Result<()> {
    gateway
        .delete_all(Collection::Infrastructure)
        .await
        .context("Failed to clear infrastructure collection")?;
    info!("infrastructure collection cleared");
    Ok(())
}

pub fn server_node(server: &ServerResource) -> Option<InfrastructureNode> {
    let uuid = non_empty(server.uuid.as_deref())?;
    let name = label(server.name.as_deref(), uuid);
    let mut facts = vec![format!("Server {}", name)];
    if let Some(ip) = non_empty(server.ip.as_deref()) {
        facts.push(format!("Host IP {}", ip));
    }
    Some(InfrastructureNode {
        id: NodeType::Server.node_id(uuid),
        name: name.to_string(),
        description: describe(server.description.as_deref(), &facts),
        metadata: NodeMetadata::Server(ServerMetadata {
            uuid: Some(uuid.to_string()),
            ip: server.ip.clone(),
            port: server.port(),
            user: server.user.clone(),
            is_reachable: server.is_reachable(),
            extra: to_extra(&server.extra, &["port", "is_reachable"]),
        }),
        relationships: Vec::new(),
    })
}

/// The project node followed by one node per environment in `detail`.
pub fn project_nodes(project: &ProjectResource, detail: &ProjectResource) -> Vec<InfrastructureNode> {
    let Some(uuid) = non_empty(project.uuid.as_deref()) else {
        return Vec::new();
    };
    let name = label(project.name.as_deref(), uuid);
    let project_id = NodeType::Project.node_id(uuid);

    let mut environments = Vec::new();
    let mut edges = Vec::new();
    for env in &detail.environments {
        let env_name = non_empty(env.name.as_deref());
        let key = match (env.key(), env_name) {
            (Some(k), _) => k,
            (None, Some(n)) => format!("{}/{}", uuid, n),
            (None, None) => {
                warn!(project = uuid, "skipping environment without id or name");
                continue;
            }
        };
        let env_label = env_name.map(str::to_string).unwrap_or_else(|| key.clone());
        edges.push(Relationship::new(
            RelationType::HasEnvironment,
            NodeType::Environment,
            &key,
            format!("Project {} has environment {}", name, env_label),
        ));
        environments.push(InfrastructureNode {
            id: NodeType::Environment.node_id(&key),
            name: env_label.clone(),
            description: describe(
                env.description.as_deref(),
                &[format!("Environment {} of project {}", env_label, name)],
            ),
            metadata: NodeMetadata::Environment(EnvironmentMetadata {
                project_uuid: Some(uuid.to_string()),
                created_at: env.created_at.clone(),
                updated_at: env.updated_at.clone(),
                extra: Default::default(),
            }),
            relationships: vec![Relationship::new(
                RelationType::BelongsToProject,
                NodeType::Project,
                uuid,
                format!("Environment {} belongs to project {}", env_label, name),
            )],
        });
    }

    let description = describe(
        project.description.as_deref().or(detail.description.as_deref()),
        &[format!(
            "Project {} with {} environment{}",
            name,
            environments.len(),
            if environments.len() == 1 { "" } else { "s" }
        )],
    );
    let mut nodes = vec![InfrastructureNode {
        id: project_id,
        name: name.to_string(),
        description,
        metadata: NodeMetadata::Project(ProjectMetadata {
            uuid: Some(uuid.to_string()),
            environment_count: environments.len(),
            extra: to_extra(&project.extra, &[]),
        }),
        relationships: edges,
    }];
    nodes.extend(environments);
    nodes
}

/// The service node followed by one domain node per nested `fqdn`.
pub fn service_nodes(service: &ServiceResource) -> Vec<InfrastructureNode> {
    let Some(uuid) = non_empty(service.uuid.as_deref()) else {
        warn!(name = ?service.name, "skipping service without uuid");
        return Vec::new();
    };
    let name = label(service.name.as_deref(), uuid);
    let server_uuid = service.destination.as_ref().and_then(|d| d.server_uuid());
    let server_label = service
        .destination
        .as_ref()
        .and_then(|d| d.server_label())
        .or(server_uuid);
    let project_uuid = service.project.as_ref().and_then(|p| p.uuid());
    let project_label = service
        .project
        .as_ref()
        .and_then(|p| non_empty(p.name.as_deref()))
        .or(project_uuid);

    let mut facts = Vec::new();
    if let Some(t) = non_empty(service.service_type.as_deref()) {
        facts.push(format!("Service type {}", t));
    }
    if let Some(s) = server_label {
        facts.push(format!("Deployed on server {}", s));
    }
    if let Some(p) = project_label {
        facts.push(format!("Part of project {}", p));
    }
    if facts.is_empty() {
        facts.push(format!("Service {}", name));
    }

    let mut edges = Vec::new();
    if let Some(server) = server_uuid {
        edges.push(Relationship::new(
            RelationType::DeployedOn,
            NodeType::Server,
            server,
            format!("{} is deployed on server {}", name, server_label.unwrap_or(server)),
        ));
    }
    if let Some(project) = project_uuid {
        edges.push(Relationship::new(
            RelationType::BelongsToProject,
            NodeType::Project,
            project,
            format!("{} belongs to project {}", name, project_label.unwrap_or(project)),
        ));
    }

    let mut domains = Vec::new();
    for app in &service.applications {
        let Some(fqdn) = clean_fqdn(app.fqdn.as_deref()) else {
            continue;
        };
        edges.push(Relationship::new(
            RelationType::HasDomain,
            NodeType::Domain,
            fqdn,
            format!("{} is reachable at {}", name, fqdn),
        ));
        domains.push(InfrastructureNode {
            id: NodeType::Domain.node_id(fqdn),
            name: fqdn.to_string(),
            description: format!("Domain {} served by service {}", fqdn, name),
            metadata: NodeMetadata::Domain(DomainMetadata {
                fqdn: Some(fqdn.to_string()),
                service_uuid: Some(uuid.to_string()),
                application_name: app.name.clone(),
                application_uuid: app.uuid.clone(),
                extra: Default::default(),
            }),
            relationships: vec![Relationship::new(
                RelationType::PointsToService,
                NodeType::Service,
                uuid,
                format!("{} points to service {}", fqdn, name),
            )],
        });
    }

    let mut nodes = vec![InfrastructureNode {
        id: NodeType::Service.node_id(uuid),
        name: name.to_string(),
        description: describe(service.description.as_deref(), &facts),
        metadata: NodeMetadata::Service(ServiceMetadata {
            uuid: Some(uuid.to_string()),
            service_type: service.service_type.clone(),
            status: service.status.clone(),
            server_uuid: server_uuid.map(str::to_string),
            project_uuid: project_uuid.map(str::to_string),
            application_count: service.applications.len(),
            created_at: service.created_at.clone(),
            extra: to_extra(&service.extra, &[]),
        }),
        relationships: edges,
    }];
    nodes.extend(domains);
    nodes
}

/// One application node. Its `has_domain` edge has no domain node behind
/// it unless a service also claims the same fqdn.
pub fn application_node(app: &ApplicationResource) -> Option<InfrastructureNode> {
    let Some(uuid) = non_empty(app.uuid.as_deref()) else {
        warn!(name = ?app.name, "skipping application without uuid");
        return None;
    };
    let name = label(app.name.as_deref(), uuid);
    let server_uuid = app.destination.as_ref().and_then(|d| d.server_uuid());
    let server_label = app
        .destination
        .as_ref()
        .and_then(|d| d.server_label())
        .or(server_uuid);
    let project_uuid = app.project.as_ref().and_then(|p| p.uuid());
    let project_label = app
        .project
        .as_ref()
        .and_then(|p| non_empty(p.name.as_deref()))
        .or(project_uuid);
    let fqdn = clean_fqdn(app.fqdn.as_deref());

    let mut facts = Vec::new();
    if let Some(repo) = non_empty(app.git_repository.as_deref()) {
        match non_empty(app.git_branch.as_deref()) {
            Some(branch) => facts.push(format!("Built from {} ({})", repo, branch)),
            None => facts.push(format!("Built from {}", repo)),
        }
    }
    if let Some(f) = fqdn {
        facts.push(format!("Served at {}", f));
    }
    if let Some(s) = server_label {
        facts.push(format!("Deployed on server {}", s));
    }
    if facts.is_empty() {
        facts.push(format!("Application {}", name));
    }

    let mut edges = Vec::new();
    if let Some(server) = server_uuid {
        edges.push(Relationship::new(
            RelationType::DeployedOn,
            NodeType::Server,
            server,
            format!("{} is deployed on server {}", name, server_label.unwrap_or(server)),
        ));
    }
    if let Some(project) = project_uuid {
        edges.push(Relationship::new(
            RelationType::BelongsToProject,
            NodeType::Project,
            project,
            format!("{} belongs to project {}", name, project_label.unwrap_or(project)),
        ));
    }
    if let Some(f) = fqdn {
        edges.push(Relationship::new(
            RelationType::HasDomain,
            NodeType::Domain,
            f,
            format!("{} is reachable at {}", name, f),
        ));
    }

    Some(InfrastructureNode {
        id: NodeType::Application.node_id(uuid),
        name: name.to_string(),
        description: describe(app.description.as_deref(), &facts),
        metadata: NodeMetadata::Application(ApplicationMetadata {
            uuid: Some(uuid.to_string()),
            git_repository: app.git_repository.clone(),
            git_branch: app.git_branch.clone(),
            fqdn: fqdn.map(str::to_string),
            build_pack: app.build_pack.clone(),
            status: app.status.clone(),
            ports_exposes: app.ports_exposes.clone(),
            server_uuid: server_uuid.map(str::to_string),
            project_uuid: project_uuid.map(str::to_string),
            created_at: app.created_at.clone(),
            extra: to_extra(&app.extra, &[]),
        }),
        relationships: edges,
    })
}
