//! # infragraph core
//!
//! Transport-free logic for infragraph: the node model, the embedding
//! strategy and its deterministic fallback, the vector store trait, the
//! graph mapper and the query engine.
//!
//! This crate has no tokio, reqwest or filesystem dependencies. The
//! application crate supplies the HTTP-backed [`fleet::FleetSource`],
//! [`store::VectorStore`] and [`embedding::EmbeddingProvider`]
//! implementations.

pub mod embedding;
pub mod fleet;
pub mod gateway;
pub mod mapper;
pub mod models;
pub mod query;
pub mod store;
