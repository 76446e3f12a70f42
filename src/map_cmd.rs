//! `igraph map` and `igraph clear`.

use anyhow::Result;
use std::time::Duration;

use infragraph_core::embedding::Embedder;
use infragraph_core::fleet::FleetSource;
use infragraph_core::gateway::{Collection, VectorGateway};
use infragraph_core::mapper::{clear_infrastructure, GraphMapper, MapReport};
use infragraph_core::store::VectorStore;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::fleet_client::FleetClient;
use crate::qdrant::open_gateway;

/// Crawl the fleet API and index every resource.
pub async fn run_map(config: &Config) -> Result<()> {
    let fleet = FleetClient::new(&config.fleet)?;
    let gateway = open_gateway(&config.store)?;
    let embedder = create_embedder(&config.embedding)?;
    let report = map_with(&fleet, &gateway, &embedder).await?;
    print_report(&report, &embedder);
    Ok(())
}

pub async fn map_with<S: VectorStore>(
    fleet: &dyn FleetSource,
    gateway: &VectorGateway<S>,
    embedder: &Embedder,
) -> Result<MapReport> {
    GraphMapper::new(fleet, gateway, embedder)
        .map_infrastructure()
        .await
}

fn print_report(report: &MapReport, embedder: &Embedder) {
    println!("map");
    println!("  embedding: {} ({:?})", embedder.model_name(), embedder.strategy());
    println!("  nodes: {}", report.nodes.len());
    println!("  indexed: {}", report.indexed);
    if report.failed > 0 {
        println!("  failed: {}", report.failed);
    }
    for (node_type, count) in report.counts_by_type() {
        println!("    {:<12} {:>5}", node_type.as_str(), count);
    }
    println!(
        "  started: {} ({} ms)",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.duration_ms
    );
    if report.errors.is_empty() {
        println!("ok");
    } else {
        println!("  errors: {}", report.errors.len());
        for e in &report.errors {
            println!("    - {}", e);
        }
    }
}

/// Delete every indexed node after a grace period.
pub async fn run_clear(config: &Config) -> Result<()> {
    let gateway = open_gateway(&config.store)?;

    let delay = config.graph.clear_delay_secs;
    if delay > 0 {
        println!(
            "About to delete every node in {}. Press Ctrl-C within {}s to abort.",
            gateway.collection_name(Collection::Infrastructure),
            delay
        );
        tokio::time::sleep(Duration::from_secs(delay)).await;
    }

    clear_infrastructure(&gateway).await?;
    println!("cleared");
    Ok(())
}
