//! Read-only query commands. Each prints pretty JSON on stdout.

use anyhow::Result;
use serde::Serialize;

use infragraph_core::embedding::Embedder;
use infragraph_core::gateway::VectorGateway;
use infragraph_core::models::{NodeType, RelationType};
use infragraph_core::query::{GraphQuery, ScrollScan, SearchOptions};
use infragraph_core::store::VectorStore;

use crate::config::{Config, GraphConfig};
use crate::embedding::create_embedder;
use crate::qdrant::{open_gateway, QdrantStore};

/// A query command, with its arguments already parsed.
#[derive(Debug, Clone)]
pub enum Query {
    Search {
        query: String,
        node_type: Option<NodeType>,
        limit: Option<usize>,
        min_score: Option<f32>,
    },
    Linked {
        id: String,
        relations: Vec<RelationType>,
    },
    List(NodeType),
    Domains,
    Server(String),
    Project(String),
}

pub async fn run_query(config: &Config, query: Query) -> Result<()> {
    let gateway: VectorGateway<QdrantStore> = open_gateway(&config.store)?;
    let embedder = create_embedder(&config.embedding)?;
    let json = execute(&gateway, &embedder, &config.graph, query).await?;
    println!("{}", json);
    Ok(())
}

/// Run `query` and render the result as pretty JSON.
pub async fn execute<S: VectorStore>(
    gateway: &VectorGateway<S>,
    embedder: &Embedder,
    graph: &GraphConfig,
    query: Query,
) -> Result<String> {
    let engine = GraphQuery::new(gateway, embedder)
        .with_incoming(ScrollScan {
            limit: graph.scan_limit,
        })
        .with_list_limit(graph.list_limit);

    match query {
        Query::Search {
            query,
            node_type,
            limit,
            min_score,
        } => {
            let opts = SearchOptions {
                limit: limit.unwrap_or(graph.search_limit),
                node_type,
                min_score: min_score.unwrap_or(graph.min_score),
            };
            render(&engine.search(&query, &opts).await)
        }
        Query::Linked { id, relations } => {
            let filter = (!relations.is_empty()).then_some(relations.as_slice());
            render(&engine.find_linked_to(&id, filter).await)
        }
        Query::List(node_type) => render(&engine.find_by_type(node_type).await),
        Query::Domains => render(&engine.find_all_domains().await),
        Query::Server(id) => render(
            &engine
                .find_on_server(&node_id(NodeType::Server, &id))
                .await,
        ),
        Query::Project(id) => render(
            &engine
                .find_project_hierarchy(&node_id(NodeType::Project, &id))
                .await,
        ),
    }
}

fn render<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Accept either a bare uuid or a full `<type>:<uuid>` node id.
pub fn node_id(node_type: NodeType, arg: &str) -> String {
    let arg = arg.trim();
    let prefix = format!("{}:", node_type);
    if arg.starts_with(&prefix) {
        arg.to_string()
    } else {
        node_type.node_id(arg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_accepts_bare_and_full() {
        assert_eq!(node_id(NodeType::Server, "abc"), "server:abc");
        assert_eq!(node_id(NodeType::Server, "server:abc"), "server:abc");
        assert_eq!(node_id(NodeType::Project, " p1 "), "project:p1");
    }
}
