//! # infragraph CLI (`igraph`)
//!
//! Builds and queries the infrastructure knowledge graph.
//!
//! ## Usage
//!
//! ```bash
//! igraph --config ./config/igraph.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `igraph map` | Crawl the fleet API and index every resource |
//! | `igraph clear` | Delete every indexed node (after a grace period) |
//! | `igraph search "<query>"` | Semantic search over nodes |
//! | `igraph linked <id>` | A node with its incoming and outgoing neighbours |
//! | `igraph list <type>` | Every node of one type |
//! | `igraph domains` | Domains and what they route to |
//! | `igraph server <uuid>` | Services and applications on a server |
//! | `igraph project <uuid>` | Environments, services and applications of a project |
//! | `igraph stats` | Node counts by type |
//!
//! ## Examples
//!
//! ```bash
//! # Build the graph
//! igraph map
//!
//! # What runs on this box?
//! igraph server 0b5c6f8e-2f5e-4c89-9d7e-6f1c3a2b4d10
//!
//! # Only services, looser threshold
//! igraph search "postgres backups" --type service --min-score 0.3
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use infragraph::query_cmd::Query;
use infragraph::{config, logging, map_cmd, query_cmd, stats};
use infragraph_core::models::{NodeType, RelationType};

/// infragraph: a searchable knowledge graph of your fleet.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/igraph.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "igraph",
    about = "Map a fleet-management API into a searchable infrastructure knowledge graph",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/igraph.toml")]
    config: PathBuf,

    /// Debug logging (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl servers, projects, services and applications and index them.
    ///
    /// Safe to re-run: nodes are overwritten by id. A failing resource
    /// category is reported and the others are still indexed.
    Map,

    /// Delete every indexed node.
    ///
    /// Waits `graph.clear_delay_secs` first so the command can be aborted.
    Clear,

    /// Semantic search over indexed nodes.
    Search {
        query: String,

        /// Restrict to one node type (e.g. `service`, `domain`).
        #[arg(long = "type", value_parser = parse_node_type)]
        node_type: Option<NodeType>,

        /// Maximum number of results.
        #[arg(long)]
        limit: Option<usize>,

        /// Drop results scoring below this.
        #[arg(long)]
        min_score: Option<f32>,
    },

    /// Show a node and its direct neighbours.
    Linked {
        /// Full node id, e.g. `service:<uuid>`.
        id: String,

        /// Only follow these relation kinds (repeatable).
        #[arg(long = "relation", value_parser = parse_relation_type)]
        relations: Vec<RelationType>,
    },

    /// List every node of a type.
    List {
        #[arg(value_parser = parse_node_type)]
        node_type: NodeType,
    },

    /// List domains with the service or application they point to.
    Domains,

    /// Services and applications deployed on a server.
    Server {
        /// Server uuid or `server:<uuid>`.
        id: String,
    },

    /// Environments, services and applications of a project.
    Project {
        /// Project uuid or `project:<uuid>`.
        id: String,
    },

    /// Node counts by type.
    Stats,
}

fn parse_node_type(s: &str) -> Result<NodeType, String> {
    s.parse().map_err(|e: anyhow::Error| e.to_string())
}

fn parse_relation_type(s: &str) -> Result<RelationType, String> {
    s.parse().map_err(|e: anyhow::Error| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Map => map_cmd::run_map(&cfg).await?,
        Commands::Clear => map_cmd::run_clear(&cfg).await?,
        Commands::Stats => stats::run_stats(&cfg).await?,
        Commands::Search {
            query,
            node_type,
            limit,
            min_score,
        } => {
            query_cmd::run_query(
                &cfg,
                Query::Search {
                    query,
                    node_type,
                    limit,
                    min_score,
                },
            )
            .await?
        }
        Commands::Linked { id, relations } => {
            query_cmd::run_query(&cfg, Query::Linked { id, relations }).await?
        }
        Commands::List { node_type } => query_cmd::run_query(&cfg, Query::List(node_type)).await?,
        Commands::Domains => query_cmd::run_query(&cfg, Query::Domains).await?,
        Commands::Server { id } => query_cmd::run_query(&cfg, Query::Server(id)).await?,
        Commands::Project { id } => query_cmd::run_query(&cfg, Query::Project(id)).await?,
    }

    Ok(())
}
