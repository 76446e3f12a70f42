//! # infragraph
//!
//! Maps a fleet-management API (servers, projects, services,
//! applications) into a knowledge graph stored in a vector database, then
//! answers semantic and relational questions over it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────┐
//! │  Fleet API  │──▶│ Graph Mapper │──▶│  Qdrant  │
//! │ REST (GET)  │   │ Node+Embed   │   │ vectors  │
//! └─────────────┘   └──────────────┘   └────┬─────┘
//!                                           │
//!                                           ▼
//!                                   ┌──────────────┐
//!                                   │ Graph Query  │
//!                                   │ (igraph CLI) │
//!                                   └──────────────┘
//! ```
//!
//! The node model, mapper and query engine live in `infragraph-core`;
//! this crate supplies the HTTP clients, configuration and CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`fleet_client`] | Fleet REST client |
//! | [`qdrant`] | Qdrant REST vector store |
//! | [`embedding`] | OpenAI / Ollama providers and strategy selection |
//! | [`logging`] | tracing subscriber setup |
//! | [`map_cmd`] | `map` and `clear` commands |
//! | [`query_cmd`] | JSON query commands |
//! | [`stats`] | `stats` command |

pub mod config;
pub mod embedding;
pub mod fleet_client;
pub mod logging;
pub mod map_cmd;
pub mod qdrant;
pub mod query_cmd;
pub mod stats;
