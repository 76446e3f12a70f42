//! Graph statistics overview.
//!
//! `igraph stats` prints how many nodes are indexed, broken down by type,
//! as a quick check that `igraph map` did what was expected.

use anyhow::Result;

use infragraph_core::gateway::{Collection, VectorGateway};
use infragraph_core::models::NodeType;
use infragraph_core::query::{GraphQuery, GraphStats};
use infragraph_core::store::VectorStore;

use crate::config::Config;
use crate::qdrant::open_gateway;

pub async fn run_stats(config: &Config) -> Result<()> {
    let gateway = open_gateway(&config.store)?;
    let embedder = infragraph_core::embedding::Embedder::deterministic();
    let stats = GraphQuery::new(&gateway, &embedder)
        .with_list_limit(config.graph.list_limit)
        .stats()
        .await;
    print!("{}", format_stats(&gateway, &config.store.url, &stats));
    Ok(())
}

/// Render the summary. Types with no nodes are listed with 0.
pub fn format_stats<S: VectorStore>(
    gateway: &VectorGateway<S>,
    store_url: &str,
    stats: &GraphStats,
) -> String {
    let mut out = String::new();
    out.push_str("Infrastructure Graph Stats\n");
    out.push_str("==========================\n\n");
    out.push_str(&format!("  Store:       {}\n", store_url));
    out.push_str(&format!(
        "  Collection:  {}\n\n",
        gateway.collection_name(Collection::Infrastructure)
    ));
    out.push_str(&format!("  Nodes:       {}\n", stats.total));

    if stats.total > 0 {
        out.push_str("\n  By type:\n");
        out.push_str(&format!("  {:<14} {:>6} {:>6}\n", "TYPE", "NODES", "%"));
        out.push_str(&format!("  {}\n", "-".repeat(28)));
        for node_type in NodeType::ALL {
            let count = stats.by_type.get(&node_type).copied().unwrap_or(0);
            out.push_str(&format!(
                "  {:<14} {:>6} {:>5}%\n",
                node_type.as_str(),
                count,
                count * 100 / stats.total
            ));
        }
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use infragraph_core::store::memory::InMemoryStore;
    use std::collections::BTreeMap;

    #[test]
    fn test_empty_graph_has_no_breakdown() {
        let gw = VectorGateway::new(InMemoryStore::new(), "fleet");
        let out = format_stats(&gw, "http://q:6333", &GraphStats::default());
        assert!(out.contains("fleet_infrastructure"));
        assert!(out.contains("Nodes:       0"));
        assert!(!out.contains("By type"));
    }

    #[test]
    fn test_breakdown_lists_every_type() {
        let gw = VectorGateway::new(InMemoryStore::new(), "fleet");
        let stats = GraphStats {
            total: 4,
            by_type: BTreeMap::from([(NodeType::Server, 1), (NodeType::Service, 3)]),
        };
        let out = format_stats(&gw, "http://q:6333", &stats);
        assert!(out.contains("server"));
        assert!(out.contains("75%"));
        assert!(out.contains("database"));
    }
}
